#![allow(dead_code)]

pub mod stream {
    use std::io::{self, Cursor, Read, Write};

    /// In-memory connection: reads come from a fixed request, writes are captured.
    pub struct MockStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
        read_before_write: Option<u64>,
    }

    impl MockStream {
        pub fn new(request: impl AsRef<[u8]>) -> Self {
            Self {
                input: Cursor::new(request.as_ref().to_vec()),
                output: Vec::new(),
                read_before_write: None,
            }
        }

        /// Input bytes handed out before the first byte of output was written.
        pub fn read_before_write(&self) -> Option<u64> {
            self.read_before_write
        }

        pub fn output(&self) -> &[u8] {
            &self.output
        }

        pub fn output_str(&self) -> String {
            String::from_utf8_lossy(&self.output).into_owned()
        }

        /// Status code of the first response written, if any.
        pub fn status(&self) -> Option<u16> {
            status_of(&self.output_str())
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.read_before_write.get_or_insert(self.input.position());
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    pub fn status_of(response: &str) -> Option<u16> {
        response.split_whitespace().nth(1)?.parse().ok()
    }

    /// Body of a serialised response.
    pub fn body_of(response: &str) -> &str {
        response.split_once("\r\n\r\n").map_or("", |(_, body)| body)
    }

    /// Value of the first header named `name` (case-insensitive).
    pub fn header_of<'a>(response: &'a str, name: &str) -> Option<&'a str> {
        let (head, _) = response.split_once("\r\n\r\n")?;
        head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(": ")?;
            key.eq_ignore_ascii_case(name).then_some(value)
        })
    }
}

pub mod temp_files {
    use broccoli::config::ServerConfig;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// A throwaway server working directory.
    pub struct WorkingDir {
        dir: TempDir,
    }

    impl WorkingDir {
        pub fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        pub fn path(&self) -> &Path {
            self.dir.path()
        }

        /// Write `contents` at `relative`, creating parent directories.
        pub fn write(&self, relative: &str, contents: impl AsRef<[u8]>) {
            let path = self.dir.path().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }

        /// Defaults rooted here, without reading the environment.
        pub fn config(&self) -> ServerConfig {
            ServerConfig::with_working_directory(self.dir.path())
        }
    }
}

pub mod test_server {
    use std::sync::Once;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }
}

pub mod controllers {
    use broccoli::controller::{HandlerConfig, HandlerState, HttpHandler};
    use broccoli::message::{HttpRequest, HttpResponse};

    /// Answers every GET with a fixed text.
    #[derive(Default)]
    pub struct Text {
        state: HandlerState,
        text: &'static str,
    }

    impl Text {
        pub fn new(text: &'static str) -> Self {
            Self {
                state: HandlerState::default(),
                text,
            }
        }
    }

    impl HttpHandler for Text {
        fn init(&mut self, config: HandlerConfig) -> anyhow::Result<()> {
            self.state.set(config);
            Ok(())
        }

        fn is_initialized(&self) -> bool {
            self.state.is_initialized()
        }

        fn do_get(&self, _request: &mut HttpRequest, response: &mut HttpResponse) -> anyhow::Result<()> {
            response.set_content(self.text);
            Ok(())
        }
    }
}

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    /// Send one raw request and read until the server closes the connection.
    pub fn send_request(addr: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        stream.write_all(request.as_bytes()).unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }
}

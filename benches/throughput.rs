use broccoli::controller::{Application, ControllerRegistration, HandlerConfig, HandlerState, HttpHandler};
use broccoli::message::{HttpRequest, HttpResponse};
use broccoli::server::{HttpServer, ServerBuilder};
use broccoli::ServerConfig;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::io::{self, Cursor, Read, Write};

#[derive(Default)]
struct Hello(HandlerState);

impl HttpHandler for Hello {
    fn init(&mut self, config: HandlerConfig) -> anyhow::Result<()> {
        self.0.set(config);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.0.is_initialized()
    }

    fn do_get(&self, _request: &mut HttpRequest, response: &mut HttpResponse) -> anyhow::Result<()> {
        response.set_content("Hello");
        Ok(())
    }
}

/// Replays one request and discards the response.
struct Replay {
    input: Cursor<&'static [u8]>,
}

impl Read for Replay {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for Replay {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn server(working_dir: &std::path::Path) -> HttpServer {
    ServerBuilder::new(ServerConfig::with_working_directory(working_dir))
        .application(
            Application::new("ROOT")
                .with_controller(ControllerRegistration::new("/hello", Hello::default)),
        )
        .application(
            Application::new("shop")
                .with_controller(ControllerRegistration::new("/items/*", Hello::default)),
        )
        .build()
        .expect("failed to build server")
}

fn bench_request_throughput(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("failed to create working dir");
    let server = server(dir.path());
    let requests: [&'static [u8]; 3] = [
        b"GET /hello HTTP/1.1\r\nHost: localhost\r\nAccept: */*\r\n\r\n",
        b"GET /shop/items/42?color=red HTTP/1.1\r\nHost: localhost\r\nCookie: a=1; b=2\r\n\r\n",
        b"POST /hello HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\n\
          Content-Length: 15\r\n\r\nname=Ana&age=30",
    ];

    c.bench_function("handle_connection", |b| {
        b.iter(|| {
            for raw in requests {
                let mut stream = Replay {
                    input: Cursor::new(raw),
                };
                black_box(server.handle_connection(&mut stream).ok());
            }
        })
    });
}

criterion_group!(benches, bench_request_throughput);
criterion_main!(benches);

use super::connection::ConnectionHandler;
use crate::config::ServerConfig;
use crate::handler::{Duplex, HandlerOutcome};
use crate::ids::ConnectionId;
use crate::message::HttpResponse;
use crate::session::SessionStore;
use crate::worker_pool::{WorkerPool, WorkerPoolConfig};
use http::StatusCode;
use may::coroutine::JoinHandle;
use may::net::{TcpListener, TcpStream};
use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn};

/// A configured server, ready to bind.
///
/// Built by [`ServerBuilder`](super::ServerBuilder); every handler in the chain
/// has already been initialised.
pub struct HttpServer {
    connections: Arc<ConnectionHandler>,
    config: Arc<ServerConfig>,
    session_store: Arc<SessionStore>,
}

/// Handle to a running HTTP server
///
/// Provides methods for waiting until the server is ready, stopping it,
/// or joining the acceptor coroutine.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener is bound to (useful when binding port 0).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the server to be ready to accept connections
    ///
    /// Polls the server address by attempting TCP connections until successful.
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` error if the server doesn't become ready within ~250ms (50 attempts × 5ms).
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if std::net::TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop accepting connections.
    ///
    /// Cancels the acceptor coroutine and waits for it to finish. Connections
    /// already being served run to completion.
    pub fn stop(self) {
        // SAFETY: may::CoroutineHandle::coroutine().cancel() is marked unsafe by the may runtime.
        // This is safe because:
        // - The coroutine handle is valid (we're holding it)
        // - The acceptor only blocks in accept(), where cancellation unwinds cleanly
        // - Cancellation is the intended behavior during shutdown
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
        info!(addr = %self.addr, "Server stopped");
    }

    /// Wait for the acceptor to complete
    ///
    /// The acceptor runs until the listener fails or [`stop`](Self::stop) is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the acceptor coroutine panicked.
    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}

impl HttpServer {
    pub(crate) fn new(
        connections: ConnectionHandler,
        config: Arc<ServerConfig>,
        session_store: Arc<SessionStore>,
    ) -> Self {
        Self {
            connections: Arc::new(connections),
            config,
            session_store,
        }
    }

    pub fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }

    pub fn session_store(&self) -> &Arc<SessionStore> {
        &self.session_store
    }

    /// Handler names and orders, in the order they see a request.
    pub fn chain(&self) -> Vec<(&str, i32)> {
        self.connections.chain()
    }

    /// Serve one request over an arbitrary stream.
    pub fn handle_connection(&self, stream: &mut dyn Duplex) -> io::Result<HandlerOutcome> {
        self.connections.handle(stream)
    }

    /// Start the HTTP server on the given address
    ///
    /// # Arguments
    ///
    /// * `addr` - Address to bind to (e.g., `"0.0.0.0:8080"` or `"127.0.0.1:0"`)
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid, the port cannot be bound or
    /// the acceptor coroutine cannot be spawned.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let listener = TcpListener::bind(addr)?;
        let addr = listener.local_addr()?;
        let stack_size = self.config.stack_size;
        let server = Arc::new(self);

        let pool = match server.config.max_connection_workers {
            0 => None,
            workers => {
                let worker_server = Arc::clone(&server);
                // SAFETY: WorkerPool::new spawns may coroutines. serve_connection
                // uses no thread-local storage and owns everything it touches.
                Some(unsafe {
                    WorkerPool::new(
                        "connections",
                        WorkerPoolConfig::new(workers, stack_size),
                        move |stream: TcpStream| worker_server.serve_connection(stream),
                    )
                })
            }
        };

        info!(
            addr = %addr,
            workers = server.config.max_connection_workers,
            "Server listening"
        );

        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The acceptor owns the listener, the server and the pool; nothing it
        // captures is borrowed from this stack frame.
        let handle = unsafe {
            may::coroutine::Builder::new()
                .name("broccoli-acceptor".to_string())
                .stack_size(stack_size)
                .spawn(move || accept_loop(&listener, &server, pool.as_ref()))?
        };
        Ok(ServerHandle { addr, handle })
    }

    fn serve_connection(&self, stream: TcpStream) {
        let connection_id = ConnectionId::new();
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let span = info_span!("connection", connection_id = %connection_id, peer = %peer);
        let _enter = span.enter();

        let timeout = Some(self.config.socket_timeout).filter(|t| !t.is_zero());
        if let Err(err) = stream.set_read_timeout(timeout) {
            warn!(error = %err, "Cannot set socket timeout");
        }

        let mut stream = stream;
        match self.connections.handle(&mut stream) {
            Ok(outcome) if self.config.show_request_log => {
                info!(outcome = ?outcome, "Request served");
            }
            Ok(outcome) => debug!(outcome = ?outcome, "Request served"),
            Err(err) => warn!(error = %err, "Connection failed"),
        }
        let _ = stream.shutdown(Shutdown::Both);
    }
}

/// Pause after an accept failure that is not an idle timeout, such as
/// running out of file descriptors.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// How long to wait before accepting again after `kind`; idle timeouts retry at once.
fn accept_retry_delay(kind: io::ErrorKind) -> Option<Duration> {
    match kind {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => None,
        _ => Some(ACCEPT_ERROR_BACKOFF),
    }
}

fn accept_loop(listener: &TcpListener, server: &Arc<HttpServer>, pool: Option<&WorkerPool<TcpStream>>) {
    loop {
        let stream = match listener.accept() {
            Ok((stream, _)) => stream,
            Err(err) => {
                if let Some(delay) = accept_retry_delay(err.kind()) {
                    error!(error = %err, "Accept failed");
                    may::coroutine::sleep(delay);
                }
                continue;
            }
        };

        match pool {
            Some(pool) => {
                if let Err(stream) = pool.dispatch(stream) {
                    warn!(
                        queue_depth = pool.metrics().get_queue_depth(),
                        "Connection workers saturated, shedding connection"
                    );
                    shed(stream);
                }
            }
            None => spawn_connection(server, stream),
        }
    }
}

fn spawn_connection(server: &Arc<HttpServer>, stream: TcpStream) {
    let server = Arc::clone(server);
    // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
    // The coroutine owns its stream and a reference-counted server handle.
    let spawned = unsafe {
        may::coroutine::Builder::new()
            .stack_size(server.config.stack_size)
            .spawn(move || server.serve_connection(stream))
    };
    if let Err(err) = spawned {
        error!(error = %err, "Failed to spawn connection coroutine");
    }
}

fn shed(mut stream: TcpStream) {
    let mut response = HttpResponse::new();
    response.set_status(StatusCode::SERVICE_UNAVAILABLE);
    response.set_content("Service Unavailable");
    let _ = stream.write_all(&response.to_bytes());
    let _ = stream.shutdown(Shutdown::Both);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_accept_timeouts_retry_immediately() {
        assert_eq!(accept_retry_delay(io::ErrorKind::WouldBlock), None);
        assert_eq!(accept_retry_delay(io::ErrorKind::TimedOut), None);
    }

    #[test]
    fn test_accept_failures_back_off() {
        assert_eq!(accept_retry_delay(io::ErrorKind::Other), Some(ACCEPT_ERROR_BACKOFF));
        assert_eq!(
            accept_retry_delay(io::ErrorKind::ConnectionAborted),
            Some(ACCEPT_ERROR_BACKOFF)
        );
    }
}

//! # Handler Chain Contracts
//!
//! A connection is served by an ordered chain of [`RequestHandler`]s. Each one
//! sees the connection and the [`SharedRequestState`] filled by the handlers
//! before it, and answers with a [`HandlerOutcome`]:
//!
//! - [`HandlerOutcome::NotHandled`] passes the connection to the next handler
//! - [`HandlerOutcome::Handled`] stops the chain, a response was written
//! - [`HandlerOutcome::HandledWithError`] stops the chain after a failure that
//!   was already answered on the wire
//!
//! Only socket I/O failures travel as `Err`; they end the connection.
//! After the chain stops, every [`RequestCleanup`] runs, whatever the outcome.

use crate::error::ServerError;
use crate::message::HttpResponse;
use crate::shared_state::SharedRequestState;
use std::io::{self, BufRead, BufReader, Read, Write};

/// Result of offering a connection to one handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    NotHandled,
    Handled,
    HandledWithError(String),
}

impl HandlerOutcome {
    /// `true` when the chain must stop.
    pub fn is_handled(&self) -> bool {
        !matches!(self, HandlerOutcome::NotHandled)
    }
}

/// A link in the request chain.
///
/// Handlers are shared by every connection, so per-request data lives in the
/// [`SharedRequestState`], never in the handler.
pub trait RequestHandler: Send + Sync {
    /// One-time startup hook; an error aborts server startup.
    fn init(&mut self) -> Result<(), ServerError> {
        Ok(())
    }

    fn handle_request(
        &self,
        conn: &mut Connection<'_>,
        shared: &mut SharedRequestState,
    ) -> io::Result<HandlerOutcome>;

    /// Position in the chain, ascending.
    fn order(&self) -> i32;

    /// Name used in logs.
    fn name(&self) -> &str {
        "request-handler"
    }
}

/// Runs once per connection after the chain stops.
pub trait RequestCleanup: Send + Sync {
    fn destroy(&self, shared: &mut SharedRequestState);
}

/// Anything a connection can be served over: a TCP socket in production, an
/// in-memory buffer in tests.
pub trait Duplex: Read + Write + Send {}

impl<T: Read + Write + Send> Duplex for T {}

/// Buffered view of one client connection.
///
/// Reads go through an internal buffer so the parser can consume the metadata
/// byte by byte; writes go straight to the underlying stream.
pub struct Connection<'a> {
    reader: BufReader<&'a mut dyn Duplex>,
}

impl<'a> Connection<'a> {
    pub fn new(stream: &'a mut dyn Duplex) -> Self {
        Self {
            reader: BufReader::new(stream),
        }
    }

    /// Next byte, `None` at end of stream.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = match self.reader.fill_buf()?.first() {
            Some(b) => *b,
            None => return Ok(None),
        };
        self.reader.consume(1);
        Ok(Some(byte))
    }

    /// Bytes that can be read without touching the socket again.
    pub fn available(&self) -> usize {
        self.reader.buffer().len()
    }

    /// Serialise `response` and flush it to the client.
    pub fn send(&mut self, response: &HttpResponse) -> io::Result<()> {
        self.write_all(&response.to_bytes())?;
        self.flush()
    }
}

impl Read for Connection<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Write for Connection<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.reader.get_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.reader.get_mut().flush()
    }
}

//! # Server Module
//!
//! Turns accepted sockets into requests and runs them through the handler chain.
//!
//! - [`ServerBuilder`] assembles the chain and initialises every handler
//! - [`HttpServer::start`] binds the listener and spawns the acceptor coroutine
//! - [`RequestParser`] is the first link: it reads the request off the wire
//!   and decodes the body with a [`BodyDecoder`]
//!
//! Each connection carries exactly one request; the socket is shut down once
//! the chain and the cleanups have run. With `MAX_CONNECTION_WORKERS = 0`
//! every connection gets its own coroutine, otherwise connections are queued
//! to a bounded [`WorkerPool`](crate::worker_pool::WorkerPool) and the excess
//! is answered with 503.

mod body;
mod connection;
mod http_server;
mod request;
mod service;

pub use body::{decoder_for, BodyDecoder, MultipartDecoder, UrlEncodedDecoder, MULTIPART_FORM_DATA};
pub use connection::ConnectionHandler;
pub use http_server::{HttpServer, ServerHandle};
pub use request::{sanitize_path, RequestParser, COOKIE_HEADER};
pub use service::ServerBuilder;

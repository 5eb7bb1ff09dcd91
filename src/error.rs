//! Error taxonomy for the request pipeline and server startup.
//!
//! Request-time conditions are caught by the handler that can act on them and
//! turned into responses; only [`ServerError`] escapes, and only at startup.

use std::io;
use thiserror::Error;

/// Malformed request metadata: request line, headers or line terminators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<io::Error> for ParseError {
    fn from(err: io::Error) -> Self {
        ParseError::new(err.to_string())
    }
}

/// Failure while turning a connection's bytes into an [`HttpRequest`](crate::message::HttpRequest).
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Declared `Content-Length` exceeds `MAX_REQUEST_SIZE`.
    #[error("Request too big.")]
    TooBig { content_length: u64 },
}

/// No static file resolves for the request URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Resource \"{0}\" not found!")]
pub struct ResourceNotFound(pub String);

/// Malformed `RESOURCE_CACHING_EXPRESSION`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot parse caching expression '{expression}', check the syntax.")]
pub struct ExpressionParseError {
    pub expression: String,
}

/// A configuration value could not be coerced to the type of its key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value '{value}' for configuration key {key}")]
pub struct ConfigError {
    pub key: String,
    pub value: String,
}

/// Fatal errors raised while building or starting a server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Expression(#[from] ExpressionParseError),
    #[error("controller route {route} is registered twice")]
    DuplicateRoute { route: String },
    #[error("controller {route} failed to initialise: {message}")]
    ControllerInit { route: String, message: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

//! Turns request-time failures into responses.
//!
//! Oversized requests are always answered. Every other failure is written to
//! the client only when `PRINT_EXCEPTIONS` is on; otherwise the caller gets
//! [`HandlerOutcome::NotHandled`] and the rest of the chain decides what the
//! client sees (usually the Fallback 404).

use crate::error::RequestError;
use crate::handler::{Connection, HandlerOutcome};
use crate::message::HttpResponse;
use http::StatusCode;
use std::io;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct ErrorHandling {
    print_exceptions: bool,
}

impl ErrorHandling {
    pub fn new(print_exceptions: bool) -> Self {
        Self { print_exceptions }
    }

    pub fn print_exceptions(&self) -> bool {
        self.print_exceptions
    }

    /// 400 with the error text, regardless of `PRINT_EXCEPTIONS`.
    pub fn handle_request_too_big(
        &self,
        conn: &mut Connection<'_>,
        err: &RequestError,
        response: &mut HttpResponse,
    ) -> io::Result<HandlerOutcome> {
        warn!(error = %err, "Rejecting oversized request");
        response.set_status(StatusCode::BAD_REQUEST);
        write_error(conn, &err.to_string(), response)?;
        Ok(HandlerOutcome::Handled)
    }

    /// `status` with the error text, or [`HandlerOutcome::NotHandled`] when printing is off.
    pub fn handle_exception(
        &self,
        conn: &mut Connection<'_>,
        err: &dyn std::fmt::Display,
        response: &mut HttpResponse,
        status: StatusCode,
    ) -> io::Result<HandlerOutcome> {
        if !self.print_exceptions {
            return Ok(HandlerOutcome::NotHandled);
        }
        response.set_status(status);
        write_error(conn, &err.to_string(), response)?;
        Ok(HandlerOutcome::Handled)
    }

    /// [`handle_exception`](Self::handle_exception) with 500.
    pub fn handle_internal_error(
        &self,
        conn: &mut Connection<'_>,
        err: &dyn std::fmt::Display,
        response: &mut HttpResponse,
    ) -> io::Result<HandlerOutcome> {
        self.handle_exception(conn, err, response, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

fn write_error(conn: &mut Connection<'_>, text: &str, response: &mut HttpResponse) -> io::Result<()> {
    response.set_content(text);
    conn.send(response)
}

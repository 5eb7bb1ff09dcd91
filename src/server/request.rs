//! # Request Parser
//!
//! First link of the chain. Reads the metadata block byte by byte, builds an
//! [`HttpRequest`] and an empty [`HttpResponse`], decodes the body and stores
//! both in the [`SharedRequestState`].
//!
//! ## Metadata rules
//!
//! - a line ends with `CR LF`; any other byte after `CR`, or a bare `LF`, is a
//!   [`ParseError`] naming the 1-based line
//! - an empty line ends the block; fewer than two bytes read is an empty request
//! - line 1 is `METHOD SP TARGET [SP VERSION]`; path and query are percent-decoded
//! - other lines are `Name: value`, split at the first colon
//!
//! ## Body
//!
//! `Content-Length` comes from the header, or from whatever is already buffered
//! when the header is absent. A length above `MAX_REQUEST_SIZE` drains exactly
//! that many bytes and answers 400.

use super::body::decoder_for;
use crate::config::ServerConfig;
use crate::error::{ParseError, RequestError};
use crate::error_handling::ErrorHandling;
use crate::handler::{Connection, HandlerOutcome, RequestHandler};
use crate::message::{decode_component, HttpCookie, HttpRequest, HttpResponse, CONTENT_LENGTH};
use crate::shared_state::{SharedRequestState, HTTP_REQUEST, HTTP_RESPONSE};
use http::{Method, StatusCode};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{self, Read};
use std::sync::Arc;
use tracing::{debug, info};

pub const COOKIE_HEADER: &str = "Cookie";

static TRAVERSAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.{2,}/?").expect("Failed to compile traversal regex"));

/// Parses the raw connection into request and response objects.
pub struct RequestParser {
    config: Arc<ServerConfig>,
    error_handling: ErrorHandling,
}

impl RequestParser {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        let error_handling = ErrorHandling::new(config.print_exceptions);
        Self {
            config,
            error_handling,
        }
    }

    /// Read and decode one request from `conn`.
    pub fn parse(&self, conn: &mut Connection<'_>) -> Result<HttpRequest, RequestError> {
        let lines = read_metadata_lines(conn)?;
        if self.config.show_request_log {
            info!(request = %lines.join("\n"), "Incoming request");
        }

        let mut request = parse_request_line(&lines[0])?;
        for line in &lines[1..] {
            let (name, value) = line.split_once(':').ok_or_else(|| {
                ParseError::new(format!("Malformed header line '{line}'."))
            })?;
            request.add_header(name, value.trim_start());
        }
        parse_cookies(&mut request)?;

        request.content_length = match request.header(CONTENT_LENGTH) {
            Some(value) => value.trim().parse().map_err(|_| {
                ParseError::new(format!("Invalid Content-Length '{value}'."))
            })?,
            None => conn.available() as u64,
        };
        if request.content_length > self.config.max_request_size {
            return Err(RequestError::TooBig {
                content_length: request.content_length,
            });
        }

        let mut body = Vec::with_capacity(request.content_length.min(64 * 1024) as usize);
        conn.by_ref()
            .take(request.content_length)
            .read_to_end(&mut body)
            .map_err(ParseError::from)?;
        let content_type = request.content_type().map(str::to_string);
        decoder_for(content_type.as_deref()).decode(&body, &mut request)?;

        request.request_url = sanitize_path(&request.request_url);
        Ok(request)
    }
}

impl RequestHandler for RequestParser {
    fn handle_request(
        &self,
        conn: &mut Connection<'_>,
        shared: &mut SharedRequestState,
    ) -> io::Result<HandlerOutcome> {
        match self.parse(conn) {
            Ok(request) => {
                debug!(method = %request.method, path = %request.request_url, "Parsed request");
                shared.insert(HTTP_REQUEST, request);
                shared.insert(HTTP_RESPONSE, HttpResponse::new());
                Ok(HandlerOutcome::NotHandled)
            }
            Err(err @ RequestError::TooBig { content_length }) => {
                drain(conn, content_length)?;
                self.error_handling
                    .handle_request_too_big(conn, &err, &mut HttpResponse::new())
            }
            Err(RequestError::Parse(err)) => {
                debug!(error = %err, "Cannot parse request");
                self.error_handling.handle_exception(
                    conn,
                    &err,
                    &mut HttpResponse::new(),
                    StatusCode::BAD_REQUEST,
                )
            }
        }
    }

    fn order(&self) -> i32 {
        i32::MIN
    }

    fn name(&self) -> &str {
        "request-parser"
    }
}

/// Consume exactly `len` bytes so the client sees its whole upload read.
fn drain(conn: &mut Connection<'_>, len: u64) -> io::Result<()> {
    io::copy(&mut conn.by_ref().take(len), &mut io::sink()).map(|_| ())
}

fn read_metadata_lines(conn: &mut Connection<'_>) -> Result<Vec<String>, ParseError> {
    let mut lines = Vec::new();
    let mut current = Vec::new();
    let mut line_number = 1;
    let mut bytes_read = 0usize;
    let mut at_line_start = true;

    while let Some(byte) = conn.read_byte()? {
        bytes_read += 1;
        match byte {
            b'\r' => {
                let next = conn.read_byte()?;
                if !matches!(next, None | Some(b'\n')) {
                    return Err(ParseError::new(format!(
                        "Illegal character after return on line {line_number}."
                    )));
                }
                line_number += 1;
                if at_line_start {
                    break;
                }
                lines.push(String::from_utf8_lossy(&current).into_owned());
                current.clear();
                if next.is_none() {
                    break;
                }
                at_line_start = true;
            }
            b'\n' => {
                return Err(ParseError::new(format!(
                    "Illegal new-line character without preceding return on line {line_number}."
                )));
            }
            other => {
                current.push(other);
                at_line_start = false;
            }
        }
    }
    if !current.is_empty() {
        lines.push(String::from_utf8_lossy(&current).into_owned());
    }
    if bytes_read < 2 || lines.is_empty() {
        return Err(ParseError::new("Request is empty"));
    }
    Ok(lines)
}

fn parse_request_line(line: &str) -> Result<HttpRequest, ParseError> {
    let mut parts = line.split_ascii_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Err(ParseError::new(format!("Malformed request line '{line}'.")));
    };
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| ParseError::new(format!("Invalid method '{method}'.")))?;

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };
    let mut request = HttpRequest::new(method, decode_component(path)?);
    if let Some(query) = query {
        // Every `?` after the first starts another parameter group.
        for pair in query.split(['&', '?']).filter(|p| !p.is_empty()) {
            let mut kv = pair.splitn(2, '=');
            let key = decode_component(kv.next().unwrap_or(""))?;
            let value = kv.next().map(decode_component).transpose()?;
            request.query_parameters.insert(key, value);
        }
    }
    Ok(request)
}

fn parse_cookies(request: &mut HttpRequest) -> Result<(), ParseError> {
    let Some(header) = request.header(COOKIE_HEADER).map(str::to_string) else {
        return Ok(());
    };
    for pair in header.split("; ").filter(|p| !p.trim().is_empty()) {
        let mut kv = pair.splitn(2, '=');
        let name = decode_component(kv.next().unwrap_or("").trim())?;
        let value = kv.next().map(decode_component).transpose()?;
        let cookie = HttpCookie {
            value,
            ..HttpCookie::new(name.clone(), "")
        };
        request.cookies.insert(name, cookie);
    }
    Ok(())
}

/// Remove `..` traversal sequences (and a following `/`).
pub fn sanitize_path(path: &str) -> String {
    TRAVERSAL.replace_all(path, "").into_owned()
}

//! # Body Decoders
//!
//! Turn a request body into body parameters and uploads. The parser picks the
//! decoder from `Content-Type`: `multipart/form-data` goes to
//! [`MultipartDecoder`], anything else (including no header) to
//! [`UrlEncodedDecoder`].
//!
//! Upload streams opened here are not closed here; the request cleanup phase
//! owns that.

use crate::error::ParseError;
use crate::message::{decode_form_component, HttpRequest, MultipartFile};
use memchr::memmem;

pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

const CRLF: &[u8] = b"\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Decodes a request body into `request`.
pub trait BodyDecoder: Send + Sync {
    fn decode(&self, body: &[u8], request: &mut HttpRequest) -> Result<(), ParseError>;
}

/// Pick the decoder for a `Content-Type` value.
pub fn decoder_for(content_type: Option<&str>) -> &'static dyn BodyDecoder {
    match content_type {
        Some(ct) if ct.trim_start().starts_with(MULTIPART_FORM_DATA) => &MultipartDecoder,
        _ => &UrlEncodedDecoder,
    }
}

/// `application/x-www-form-urlencoded`: `a=1&b=2&flag`.
///
/// A key without `=` maps to `None`. A blank body is not an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct UrlEncodedDecoder;

impl BodyDecoder for UrlEncodedDecoder {
    fn decode(&self, body: &[u8], request: &mut HttpRequest) -> Result<(), ParseError> {
        let text = String::from_utf8_lossy(body);
        if text.trim().is_empty() {
            return Ok(());
        }
        for pair in text.trim().split('&').filter(|p| !p.is_empty()) {
            let mut kv = pair.splitn(2, '=');
            let key = decode_form_component(kv.next().unwrap_or(""))?;
            let value = kv.next().map(decode_form_component).transpose()?;
            request.add_body_parameter(key, value);
        }
        Ok(())
    }
}

/// `multipart/form-data` with the boundary taken from `Content-Type`.
///
/// Parts with a `filename` become [`MultipartFile`]s, the rest body parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultipartDecoder;

impl BodyDecoder for MultipartDecoder {
    fn decode(&self, body: &[u8], request: &mut HttpRequest) -> Result<(), ParseError> {
        let boundary = request
            .content_type()
            .and_then(boundary_of)
            .ok_or_else(|| ParseError::new("Multipart boundary not found."))?;
        let delimiter = format!("--{boundary}").into_bytes();
        let finder = memmem::Finder::new(&delimiter);

        let mut pos = finder
            .find(body)
            .ok_or_else(|| malformed("missing opening boundary"))?
            + delimiter.len();

        loop {
            let rest = &body[pos..];
            if rest.starts_with(b"--") {
                return Ok(());
            }
            let rest = rest
                .strip_prefix(CRLF)
                .ok_or_else(|| malformed("boundary not followed by a line break"))?;
            let part_start = body.len() - rest.len();

            let part_len = next_delimiter(&finder, rest)
                .ok_or_else(|| malformed("missing closing boundary"))?;
            let part = &rest[..part_len];
            self.decode_part(part, request)?;

            pos = part_start + part_len + CRLF.len() + delimiter.len();
        }
    }
}

impl MultipartDecoder {
    fn decode_part(&self, part: &[u8], request: &mut HttpRequest) -> Result<(), ParseError> {
        let header_len =
            memmem::find(part, HEADER_END).ok_or_else(|| malformed("part headers not terminated"))?;
        let headers = String::from_utf8_lossy(&part[..header_len]);
        let payload = &part[header_len + HEADER_END.len()..];

        let mut field_name = None;
        let mut file_name = None;
        let mut content_type = None;
        for line in headers.split("\r\n") {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if name.eq_ignore_ascii_case("Content-Disposition") {
                for param in value.split(';').skip(1) {
                    match param.trim().split_once('=') {
                        Some(("name", v)) => field_name = Some(unquote(v).to_string()),
                        Some(("filename", v)) => file_name = Some(unquote(v).to_string()),
                        _ => {}
                    }
                }
            } else if name.eq_ignore_ascii_case("Content-Type") {
                content_type = Some(value.to_string());
            }
        }

        let field_name = field_name.ok_or_else(|| malformed("part without a field name"))?;
        match file_name {
            Some(file_name) => {
                let file = MultipartFile::spool(field_name, file_name, content_type, payload)?;
                request.multipart_files.push(file);
            }
            None => {
                let value = String::from_utf8_lossy(payload).into_owned();
                request.add_body_parameter(field_name, Some(value));
            }
        }
        Ok(())
    }
}

/// Offset of the `\r\n--boundary` that ends the part starting at `rest[0]`.
fn next_delimiter(finder: &memmem::Finder<'_>, rest: &[u8]) -> Option<usize> {
    let mut from = 0;
    while let Some(found) = finder.find(&rest[from..]) {
        let at = from + found;
        if at >= CRLF.len() && &rest[at - CRLF.len()..at] == CRLF {
            return Some(at - CRLF.len());
        }
        from = at + 1;
    }
    None
}

fn boundary_of(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| unquote(value.trim()))
        .filter(|b| !b.is_empty())
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn malformed(reason: &str) -> ParseError {
    ParseError::new(format!("Malformed multipart body: {reason}."))
}

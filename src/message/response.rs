use super::cookie::HttpCookie;
use http::StatusCode;
use std::collections::BTreeMap;

pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const CACHE_CONTROL: &str = "Cache-Control";
pub const LOCATION: &str = "Location";

/// The in-progress response of a connection.
///
/// Serialisation is deterministic: headers are kept in a sorted map and
/// cookies are emitted in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    status: Option<StatusCode>,
    headers: BTreeMap<String, String>,
    content: Vec<u8>,
    cookies: Vec<HttpCookie>,
}

impl HttpResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status set by a handler, `None` if nobody set one yet.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    pub fn set_content(&mut self, content: &str) {
        self.content = content.as_bytes().to_vec();
    }

    pub fn set_content_bytes(&mut self, content: Vec<u8>) {
        self.content = content;
    }

    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Add or replace a header.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Get a header by name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn add_cookie(&mut self, cookie: HttpCookie) {
        self.cookies.push(cookie);
    }

    pub fn add_cookie_pair(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.push(HttpCookie::new(name, value));
    }

    #[must_use]
    pub fn cookies(&self) -> &[HttpCookie] {
        &self.cookies
    }

    /// 303 See Other pointing at `location`.
    pub fn send_redirect(&mut self, location: &str) {
        self.set_status(StatusCode::SEE_OTHER);
        self.add_header(LOCATION, location);
        self.set_content(location);
    }

    /// Status line and headers, terminated by the blank line.
    ///
    /// `Content-Length` is derived from the content unless a handler set it
    /// explicitly (streamed bodies).
    #[must_use]
    pub fn head_bytes(&self) -> Vec<u8> {
        let status = self.status.unwrap_or(StatusCode::OK);
        let mut out = format!(
            "HTTP/1.1 {} {}\r\n",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        );
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        if !self.has_header(CONTENT_LENGTH) {
            out.push_str(&format!("{}: {}\r\n", CONTENT_LENGTH, self.content.len()));
        }
        for cookie in &self.cookies {
            out.push_str("Set-Cookie: ");
            out.push_str(&cookie.to_rfc_string());
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out.into_bytes()
    }

    /// Full wire representation: head followed by the content.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.head_bytes();
        out.extend_from_slice(&self.content);
        out
    }
}

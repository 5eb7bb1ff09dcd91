use super::cookie::HttpCookie;
use super::multipart::MultipartFile;
use crate::session::HttpSession;
use http::Method;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// A parsed HTTP request.
///
/// Produced by the [`RequestParser`](crate::server::RequestParser) and stored in
/// the connection's shared state. The Dispatcher fills in the context path and
/// the session; everything else is fixed once parsing completes.
#[derive(Debug)]
pub struct HttpRequest {
    pub method: Method,
    /// Percent-decoded, sanitised request path (never contains `..`).
    pub request_url: String,
    /// Query parameters, last occurrence wins; `None` for `?flag` without `=`.
    pub query_parameters: HashMap<String, Option<String>>,
    /// Headers keyed as received.
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, HttpCookie>,
    pub content_length: u64,
    /// Parameters decoded from the body; `None` for a key without `=`.
    pub body_parameters: HashMap<String, Option<String>>,
    pub multipart_files: Vec<MultipartFile>,
    /// Application prefix (e.g. `/shop`); empty for the root application.
    pub context_path: String,
    pub session: Option<Arc<HttpSession>>,
}

impl HttpRequest {
    pub fn new(method: Method, request_url: impl Into<String>) -> Self {
        Self {
            method,
            request_url: request_url.into(),
            query_parameters: HashMap::new(),
            headers: HashMap::new(),
            cookies: HashMap::new(),
            content_length: 0,
            body_parameters: HashMap::new(),
            multipart_files: Vec::new(),
            context_path: String::new(),
            session: None,
        }
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    #[must_use]
    pub fn query_parameter(&self, name: &str) -> Option<&str> {
        self.query_parameters.get(name).and_then(|v| v.as_deref())
    }

    #[must_use]
    pub fn body_parameter(&self, name: &str) -> Option<&str> {
        self.body_parameters.get(name).and_then(|v| v.as_deref())
    }

    pub fn add_body_parameter(&mut self, name: impl Into<String>, value: Option<String>) {
        self.body_parameters.insert(name.into(), value);
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&HttpCookie> {
        self.cookies.get(name)
    }

    /// Request path with the context path removed.
    #[must_use]
    pub fn relative_request_url(&self) -> &str {
        match self.request_url.strip_prefix(self.context_path.as_str()) {
            Some(rest) if !self.context_path.is_empty() => rest,
            _ => &self.request_url,
        }
    }

    /// `true` when the last path segment carries a file extension (`/css/site.css`).
    #[must_use]
    pub fn is_resource(&self) -> bool {
        let last = self.request_url.rsplit('/').next().unwrap_or("");
        Path::new(last).extension().is_some()
    }

    #[must_use]
    pub fn session(&self) -> Option<&Arc<HttpSession>> {
        self.session.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut req = HttpRequest::new(Method::GET, "/");
        req.add_header("Content-Type", "text/plain");
        assert_eq!(req.header("content-type"), Some("text/plain"));
        assert_eq!(req.content_type(), Some("text/plain"));
        assert!(req.headers.contains_key("Content-Type"));
    }

    #[test]
    fn test_relative_url_strips_context_path() {
        let mut req = HttpRequest::new(Method::GET, "/shop/items/1");
        assert_eq!(req.relative_request_url(), "/shop/items/1");
        req.context_path = "/shop".to_string();
        assert_eq!(req.relative_request_url(), "/items/1");
    }

    #[test]
    fn test_is_resource() {
        assert!(HttpRequest::new(Method::GET, "/css/site.css").is_resource());
        assert!(!HttpRequest::new(Method::GET, "/hello").is_resource());
        assert!(!HttpRequest::new(Method::GET, "/.well-known/").is_resource());
        assert!(!HttpRequest::new(Method::GET, "/.hidden").is_resource());
    }

    #[test]
    fn test_null_parameters_read_as_absent() {
        let mut req = HttpRequest::new(Method::POST, "/");
        req.add_body_parameter("flag", None);
        req.add_body_parameter("name", Some("x".into()));
        assert!(req.body_parameters.contains_key("flag"));
        assert_eq!(req.body_parameter("flag"), None);
        assert_eq!(req.body_parameter("name"), Some("x"));
    }
}

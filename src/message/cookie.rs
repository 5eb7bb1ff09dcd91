use chrono::{DateTime, Utc};

/// A cookie received in a `Cookie` header or emitted through `Set-Cookie`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpCookie {
    pub name: String,
    /// `None` when the cookie was sent without `=value`.
    pub value: Option<String>,
    pub path: Option<String>,
    pub expires: Option<DateTime<Utc>>,
}

impl HttpCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            path: None,
            expires: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Value of the cookie, empty when it was sent bare.
    pub fn value(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    /// `Set-Cookie` representation: `name=value; Path=...; Expires=<RFC 1123>`.
    pub fn to_rfc_string(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value());
        if let Some(path) = &self.path {
            out.push_str("; Path=");
            out.push_str(path);
        }
        if let Some(expires) = &self.expires {
            out.push_str("; Expires=");
            out.push_str(&expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
        }
        out
    }
}

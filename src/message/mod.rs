//! # HTTP Message Types
//!
//! Request, response, cookie and upload types shared by every handler in the
//! chain, plus the percent-decoding used by the parser and body decoders.

mod cookie;
mod multipart;
mod request;
mod response;

pub use cookie::HttpCookie;
pub use multipart::MultipartFile;
pub use request::HttpRequest;
pub use response::{HttpResponse, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};

use crate::error::ParseError;

/// Percent-decode a URL component (`%XX` only, `+` is left untouched).
///
/// Decoding a value that contains no `%` returns it unchanged.
pub fn decode_component(raw: &str) -> Result<String, ParseError> {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|err| ParseError::new(format!("Cannot decode '{raw}': {err}")))
}

/// Decode an `application/x-www-form-urlencoded` component: `+` is a space.
pub fn decode_form_component(raw: &str) -> Result<String, ParseError> {
    decode_component(&raw.replace('+', " "))
}

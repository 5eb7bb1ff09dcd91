//! # Static Resources
//!
//! [`ResourceHandler`] serves files for requests no controller claimed. A URL
//! is owned by the application whose `/{name}` prefix matches longest (the root
//! application otherwise); with that prefix removed, the file is looked up in
//!
//! 1. `webapps/<app>/<compile output>/<resources>/` (bundled with the app)
//! 2. `assets/<app>/` (managed at runtime)
//!
//! and the first regular file wins. A miss declines the request so the
//! Fallback can answer 404.
//!
//! `Cache-Control` is added from the rule table parsed out of
//! `RESOURCE_CACHING_EXPRESSION` by [`CachingExpressionParser`], unless the
//! request brought its own directive.

use crate::config::ServerConfig;
use crate::error::{ExpressionParseError, ResourceNotFound, ServerError};
use crate::handler::{Connection, HandlerOutcome, RequestHandler};
use crate::message::{HttpRequest, HttpResponse, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use crate::shared_state::{SharedRequestState, HTTP_REQUEST, HTTP_RESPONSE};
use http::StatusCode;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const CHUNK_SIZE: usize = 2048;

/// Parser for the cache-rule language:
///
/// ```text
/// image/png, image/gif @ max-age=120 & text/css @ max-age=84600, public
/// ```
///
/// Clauses are separated by `&`; each is `media types @ directive` where the
/// media types are comma separated and the directive is copied verbatim.
pub struct CachingExpressionParser;

impl CachingExpressionParser {
    pub fn parse(expression: &str) -> Result<HashMap<String, String>, ExpressionParseError> {
        let mut rules = HashMap::new();
        if expression.trim().is_empty() {
            return Ok(rules);
        }
        let error = || ExpressionParseError {
            expression: expression.to_string(),
        };

        for clause in expression.split('&') {
            let tokens: Vec<&str> = clause.split('@').map(str::trim).collect();
            let [media_types, directive] = tokens.as_slice() else {
                return Err(error());
            };
            if directive.is_empty() {
                return Err(error());
            }
            let mut any = false;
            for media_type in media_types.split(',').map(str::trim).filter(|m| !m.is_empty()) {
                rules.insert(media_type.to_string(), directive.to_string());
                any = true;
            }
            if !any {
                return Err(error());
            }
        }
        Ok(rules)
    }
}

/// Serves files from application resource and asset directories.
pub struct ResourceHandler {
    config: Arc<ServerConfig>,
    app_names: Vec<String>,
    cache_rules: HashMap<String, String>,
}

impl ResourceHandler {
    /// `app_names` lists every co-hosted application, root included.
    pub fn new(config: Arc<ServerConfig>, app_names: Vec<String>) -> Self {
        Self {
            config,
            app_names,
            cache_rules: HashMap::new(),
        }
    }

    pub fn cache_rules(&self) -> &HashMap<String, String> {
        &self.cache_rules
    }

    /// Application owning `url` and the URL relative to it.
    fn split_app<'u>(&self, url: &'u str) -> (&str, &'u str) {
        self.app_names
            .iter()
            .filter(|name| !self.config.is_root_app(name))
            .filter_map(|name| {
                let rest = url.strip_prefix('/')?.strip_prefix(name.as_str())?;
                (rest.is_empty() || rest.starts_with('/')).then_some((name.as_str(), rest))
            })
            .max_by_key(|(name, _)| name.len())
            .unwrap_or((self.config.main_app_jar_name.as_str(), url))
    }

    /// First regular file for `url` under the owning application's directories.
    pub fn locate_resource(&self, url: &str) -> Result<PathBuf, ResourceNotFound> {
        let (app, relative) = self.split_app(url);
        [
            self.config.app_resources_dir(app),
            self.config.app_assets_dir(app),
        ]
        .iter()
        .filter_map(|base| map_path(base, relative))
        .find(|path| path.is_file())
        .ok_or_else(|| ResourceNotFound(relative.to_string()))
    }

    /// Add `Cache-Control` when caching is on and the response has none:
    /// the request's own directive first, then the first rule matching any of
    /// `media_types` (a file type may have several names, e.g. JavaScript).
    pub fn add_caching_header(
        &self,
        request: &HttpRequest,
        response: &mut HttpResponse,
        media_types: &[String],
    ) {
        if !self.config.enable_resource_caching || response.has_header(CACHE_CONTROL) {
            return;
        }
        let directive = request.header(CACHE_CONTROL).or_else(|| {
            media_types
                .iter()
                .find_map(|media_type| self.cache_rules.get(media_type).map(String::as_str))
        });
        if let Some(directive) = directive {
            response.add_header(CACHE_CONTROL, directive);
        }
    }

    fn serve(
        &self,
        conn: &mut Connection<'_>,
        request: &HttpRequest,
        response: &mut HttpResponse,
        path: &Path,
    ) -> io::Result<()> {
        let mut file = File::open(path)?;
        let length = file.metadata()?.len();
        let media_types = media_types(path);

        response.set_status(StatusCode::OK);
        response.add_header(CONTENT_TYPE, media_types[0].as_str());
        response.add_header(CONTENT_LENGTH, length.to_string());
        response.add_header("Content-Disposition", "inline");
        self.add_caching_header(request, response, &media_types);

        conn.write_all(&response.head_bytes())?;
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            let read = file.read(&mut buf)?;
            if read == 0 {
                break;
            }
            conn.write_all(&buf[..read])?;
        }
        conn.flush()
    }
}

impl RequestHandler for ResourceHandler {
    fn init(&mut self) -> Result<(), ServerError> {
        self.cache_rules = CachingExpressionParser::parse(&self.config.resource_caching_expression)?;
        debug!(rules = self.cache_rules.len(), "Loaded resource caching rules");
        Ok(())
    }

    fn handle_request(
        &self,
        conn: &mut Connection<'_>,
        shared: &mut SharedRequestState,
    ) -> io::Result<HandlerOutcome> {
        let Some(mut response) = shared.take::<HttpResponse>(HTTP_RESPONSE) else {
            return Ok(HandlerOutcome::NotHandled);
        };
        let outcome = match shared.get::<HttpRequest>(HTTP_REQUEST) {
            Some(request) => match self.locate_resource(&request.request_url) {
                Ok(path) => {
                    debug!(path = %path.display(), "Serving static resource");
                    self.serve(conn, request, &mut response, &path)
                        .map(|()| HandlerOutcome::Handled)
                }
                Err(ResourceNotFound(_)) => Ok(HandlerOutcome::NotHandled),
            },
            None => Ok(HandlerOutcome::NotHandled),
        };
        shared.restore(HTTP_RESPONSE, response);
        outcome
    }

    fn order(&self) -> i32 {
        self.config.resource_handler_order
    }

    fn name(&self) -> &str {
        "resource-handler"
    }
}

/// Join `url_path` onto `base`, refusing anything that could leave `base`.
fn map_path(base: &Path, url_path: &str) -> Option<PathBuf> {
    let mut pb = base.to_path_buf();
    let mut pushed = false;
    for comp in Path::new(url_path.trim_start_matches('/')).components() {
        match comp {
            Component::Normal(s) => {
                pb.push(s);
                pushed = true;
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    pushed.then_some(pb)
}

/// Every media type known for `path`, most common first; never empty.
fn media_types(path: &Path) -> Vec<String> {
    let guesses: Vec<String> = mime_guess::from_path(path)
        .iter()
        .map(|mime| mime.essence_str().to_string())
        .collect();
    if guesses.is_empty() {
        vec![mime_guess::mime::APPLICATION_OCTET_STREAM.essence_str().to_string()]
    } else {
        guesses
    }
}

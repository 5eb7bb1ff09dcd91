//! # Controllers
//!
//! User code plugs into the server as [`HttpHandler`] implementations, each
//! registered under a route with a [`ControllerRegistration`] and grouped into
//! an [`Application`]. The Dispatcher builds its route table from these
//! registrations at startup; nothing is discovered at runtime.
//!
//! ```rust,ignore
//! use broccoli::controller::{Application, ControllerRegistration, HandlerState, HttpHandler};
//!
//! #[derive(Default)]
//! struct Hello(HandlerState);
//!
//! impl HttpHandler for Hello {
//!     fn init(&mut self, config: HandlerConfig) -> anyhow::Result<()> {
//!         self.0.set(config);
//!         Ok(())
//!     }
//!     fn is_initialized(&self) -> bool {
//!         self.0.is_initialized()
//!     }
//!     fn do_get(&self, _req: &mut HttpRequest, res: &mut HttpResponse) -> anyhow::Result<()> {
//!         res.set_content("Hello");
//!         Ok(())
//!     }
//! }
//!
//! let app = Application::new("ROOT")
//!     .with_controller(ControllerRegistration::new("/hello", Hello::default));
//! ```

use crate::config::ServerConfig;
use crate::message::{HttpRequest, HttpResponse, CONTENT_TYPE};
use crate::session::SessionStore;
use http::{Method, StatusCode};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a controller receives at initialisation.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub app_name: String,
    /// `/{app}` for non-root applications, empty for the root one.
    pub app_name_prefix: String,
    /// `<working>/<assets>/<app>`
    pub assets_dir: PathBuf,
    /// `<working>/<webapps>/<app>/<compile output>`
    pub working_dir: PathBuf,
    pub session_store: Arc<SessionStore>,
    pub server_config: Arc<ServerConfig>,
}

impl HandlerConfig {
    pub fn new(
        app_name: &str,
        server_config: Arc<ServerConfig>,
        session_store: Arc<SessionStore>,
    ) -> Self {
        let app_name_prefix = if server_config.is_root_app(app_name) {
            String::new()
        } else {
            format!("/{app_name}")
        };
        Self {
            app_name: app_name.to_string(),
            app_name_prefix,
            assets_dir: server_config.app_assets_dir(app_name),
            working_dir: server_config.app_working_dir(app_name),
            session_store,
            server_config,
        }
    }

    /// Application-qualified route: `/shop` + `/cart` = `/shop/cart`.
    pub fn create_route(&self, route: &str) -> String {
        format!("{}{}", self.app_name_prefix, route)
    }
}

/// Keeps the [`HandlerConfig`] of a controller once it has been initialised.
#[derive(Debug, Default)]
pub struct HandlerState {
    config: Option<HandlerConfig>,
}

impl HandlerState {
    pub fn set(&mut self, config: HandlerConfig) {
        self.config = Some(config);
    }

    pub fn config(&self) -> Option<&HandlerConfig> {
        self.config.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.config.is_some()
    }
}

/// A request controller.
///
/// [`service`](Self::service) dispatches on the method to the `do_*` hooks;
/// every hook left unimplemented answers 501.
pub trait HttpHandler: Send + Sync {
    fn init(&mut self, config: HandlerConfig) -> anyhow::Result<()>;

    fn is_initialized(&self) -> bool;

    /// `false` makes the Dispatcher decline the request after `service` ran,
    /// so later handlers (static resources, 404) may answer instead.
    fn has_intercepted(&self, _request: &HttpRequest, _response: &HttpResponse) -> bool {
        true
    }

    fn service(&self, request: &mut HttpRequest, response: &mut HttpResponse) -> anyhow::Result<()> {
        match request.method {
            Method::GET => self.do_get(request, response),
            Method::POST => self.do_post(request, response),
            Method::PUT => self.do_put(request, response),
            Method::DELETE => self.do_delete(request, response),
            _ => {
                not_implemented(request, response);
                Ok(())
            }
        }
    }

    fn do_get(&self, request: &mut HttpRequest, response: &mut HttpResponse) -> anyhow::Result<()> {
        not_implemented(request, response);
        Ok(())
    }

    fn do_post(&self, request: &mut HttpRequest, response: &mut HttpResponse) -> anyhow::Result<()> {
        not_implemented(request, response);
        Ok(())
    }

    fn do_put(&self, request: &mut HttpRequest, response: &mut HttpResponse) -> anyhow::Result<()> {
        not_implemented(request, response);
        Ok(())
    }

    fn do_delete(&self, request: &mut HttpRequest, response: &mut HttpResponse) -> anyhow::Result<()> {
        not_implemented(request, response);
        Ok(())
    }
}

fn not_implemented(request: &HttpRequest, response: &mut HttpResponse) {
    response.set_status(StatusCode::NOT_IMPLEMENTED);
    response.add_header(CONTENT_TYPE, "text/html");
    response.set_content(&format!(
        "<h1>[ERROR] {} {} </h1><br/><h3>[MESSAGE] The page or functionality you are looking for is not found.</h3>",
        request.method, request.request_url
    ));
}

pub type ControllerFactory = Box<dyn Fn() -> Box<dyn HttpHandler> + Send + Sync>;

/// Declarative registration of one controller.
pub struct ControllerRegistration {
    pub name: String,
    /// Route relative to the application (`/hello`, `/items/*`, `/*`).
    pub route: String,
    /// `false` defers construction and `init` to the first matching request.
    pub load_on_startup: bool,
    pub factory: ControllerFactory,
}

impl ControllerRegistration {
    pub fn new<F, H>(route: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> H + Send + Sync + 'static,
        H: HttpHandler + 'static,
    {
        let route = route.into();
        Self {
            name: route.clone(),
            route,
            load_on_startup: true,
            factory: Box::new(move || Box::new(factory())),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn lazy(mut self) -> Self {
        self.load_on_startup = false;
        self
    }
}

impl std::fmt::Debug for ControllerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerRegistration")
            .field("name", &self.name)
            .field("route", &self.route)
            .field("load_on_startup", &self.load_on_startup)
            .finish()
    }
}

/// A co-hosted application: a name and its controllers.
#[derive(Debug)]
pub struct Application {
    pub name: String,
    pub controllers: Vec<ControllerRegistration>,
}

impl Application {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            controllers: Vec::new(),
        }
    }

    pub fn with_controller(mut self, registration: ControllerRegistration) -> Self {
        self.controllers.push(registration);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Default)]
    struct OnlyGet(HandlerState);

    impl HttpHandler for OnlyGet {
        fn init(&mut self, config: HandlerConfig) -> anyhow::Result<()> {
            self.0.set(config);
            Ok(())
        }

        fn is_initialized(&self) -> bool {
            self.0.is_initialized()
        }

        fn do_get(&self, _request: &mut HttpRequest, response: &mut HttpResponse) -> anyhow::Result<()> {
            response.set_content("got");
            Ok(())
        }
    }

    fn config(app: &str) -> HandlerConfig {
        HandlerConfig::new(
            app,
            Arc::new(ServerConfig::with_working_directory("/srv")),
            Arc::new(SessionStore::new(Duration::from_secs(60))),
        )
    }

    #[test]
    fn test_method_dispatch_and_501() {
        let handler = OnlyGet::default();
        let mut res = HttpResponse::new();
        handler
            .service(&mut HttpRequest::new(Method::GET, "/x"), &mut res)
            .unwrap();
        assert_eq!(res.content(), b"got");

        let mut res = HttpResponse::new();
        handler
            .service(&mut HttpRequest::new(Method::PATCH, "/x"), &mut res)
            .unwrap();
        assert_eq!(res.status(), Some(StatusCode::NOT_IMPLEMENTED));
        assert_eq!(res.header("content-type"), Some("text/html"));
        let body = String::from_utf8_lossy(res.content()).into_owned();
        assert!(body.starts_with("<h1>[ERROR] PATCH /x </h1>"));
    }

    #[test]
    fn test_create_route_prefixes_non_root_apps() {
        assert_eq!(config("ROOT").create_route("/hello"), "/hello");
        let shop = config("shop");
        assert_eq!(shop.create_route("/cart"), "/shop/cart");
        assert_eq!(shop.assets_dir, PathBuf::from("/srv/assets/shop"));
        assert_eq!(shop.working_dir, PathBuf::from("/srv/webapps/shop/classes"));
    }

    #[test]
    fn test_registration_builder() {
        let reg = ControllerRegistration::new("/items/*", OnlyGet::default)
            .named("items")
            .lazy();
        assert_eq!(reg.name, "items");
        assert!(!reg.load_on_startup);
        let mut handler = (reg.factory)();
        assert!(!handler.is_initialized());
        handler.init(config("ROOT")).unwrap();
        assert!(handler.is_initialized());
    }
}

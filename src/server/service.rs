use super::connection::ConnectionHandler;
use super::http_server::HttpServer;
use super::request::RequestParser;
use crate::cleanup::RequestDestroyHandler;
use crate::config::ServerConfig;
use crate::controller::Application;
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use crate::fallback::FallbackHandler;
use crate::handler::{RequestCleanup, RequestHandler};
use crate::session::SessionStore;
use crate::static_files::ResourceHandler;
use std::sync::Arc;
use tracing::info;

/// Assembles the handler chain and the shared state it runs against.
///
/// The standard chain is the request parser, the dispatcher, the resource
/// handler and the 404 fallback, positioned by their orders. Extra handlers
/// and cleanups slot in by their own orders.
///
/// ```rust,ignore
/// let server = ServerBuilder::new(ServerConfig::load(".")?)
///     .application(Application::new("ROOT").with_controller(hello))
///     .build()?;
/// let handle = server.start(("0.0.0.0", 8000))?;
/// ```
pub struct ServerBuilder {
    config: ServerConfig,
    applications: Vec<Application>,
    handlers: Vec<Box<dyn RequestHandler>>,
    cleanups: Vec<Box<dyn RequestCleanup>>,
}

impl ServerBuilder {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            applications: Vec::new(),
            handlers: Vec::new(),
            cleanups: Vec::new(),
        }
    }

    /// Host `application`; its name decides the context path.
    pub fn application(mut self, application: Application) -> Self {
        self.applications.push(application);
        self
    }

    pub fn request_handler(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn cleanup(mut self, cleanup: impl RequestCleanup + 'static) -> Self {
        self.cleanups.push(Box::new(cleanup));
        self
    }

    /// Initialise every handler and freeze the chain.
    ///
    /// # Errors
    ///
    /// A malformed caching expression, a duplicate route or a controller that
    /// fails eager initialisation.
    pub fn build(self) -> Result<HttpServer, ServerError> {
        let config = Arc::new(self.config);
        let session_store = Arc::new(SessionStore::new(config.session_timeout));

        let mut app_names = vec![config.main_app_jar_name.clone()];
        app_names.extend(
            self.applications
                .iter()
                .map(|app| app.name.clone())
                .filter(|name| !config.is_root_app(name)),
        );

        let mut handlers: Vec<Box<dyn RequestHandler>> = vec![
            Box::new(RequestParser::new(Arc::clone(&config))),
            Box::new(Dispatcher::new(
                Arc::clone(&config),
                Arc::clone(&session_store),
                self.applications,
            )),
            Box::new(ResourceHandler::new(Arc::clone(&config), app_names)),
            Box::new(FallbackHandler),
        ];
        handlers.extend(self.handlers);
        for handler in &mut handlers {
            handler.init()?;
        }

        let mut cleanups: Vec<Box<dyn RequestCleanup>> = vec![Box::new(RequestDestroyHandler)];
        cleanups.extend(self.cleanups);

        let connections = ConnectionHandler::new(handlers, cleanups);
        for (name, order) in connections.chain() {
            info!(handler = name, order, "Request handler registered");
        }
        Ok(HttpServer::new(connections, config, session_store))
    }
}

use crate::config::ServerConfig;
use crate::controller::{Application, HandlerConfig};
use crate::error::ServerError;
use crate::handler::{Connection, HandlerOutcome, RequestHandler};
use crate::message::{HttpRequest, HttpResponse};
use crate::router::{RouteEntry, RouteTable};
use crate::session::{SessionManager, SessionStore};
use crate::shared_state::{SharedRequestState, HTTP_REQUEST, HTTP_RESPONSE};
use http::StatusCode;
use std::fs;
use std::io;
use std::mem;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Routes parsed requests to application controllers.
pub struct Dispatcher {
    config: Arc<ServerConfig>,
    sessions: SessionManager,
    routes: RouteTable,
    /// Registrations waiting for [`RequestHandler::init`].
    applications: Vec<Application>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<ServerConfig>,
        session_store: Arc<SessionStore>,
        applications: Vec<Application>,
    ) -> Self {
        Self {
            config,
            sessions: SessionManager::new(session_store),
            routes: RouteTable::new(),
            applications,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Build the route table and initialise eager controllers.
    fn load_applications(&mut self) -> Result<(), ServerError> {
        for app in mem::take(&mut self.applications) {
            let handler_config = HandlerConfig::new(
                &app.name,
                Arc::clone(&self.config),
                Arc::clone(self.sessions.store()),
            );
            if let Err(err) = fs::create_dir_all(&handler_config.assets_dir) {
                warn!(
                    app = %app.name,
                    dir = %handler_config.assets_dir.display(),
                    error = %err,
                    "Cannot create application asset directory"
                );
            }
            self.routes.add_context(&handler_config.app_name_prefix);

            for registration in app.controllers {
                let route = handler_config.create_route(&registration.route);
                let entry = RouteEntry::new(route, registration, handler_config.clone());
                if entry.load_on_startup {
                    entry.controller().map_err(|err| ServerError::ControllerInit {
                        route: entry.route.clone(),
                        message: format!("{err:#}"),
                    })?;
                }
                self.routes.insert(entry)?;
            }
            info!(app = %app.name, context_path = %handler_config.app_name_prefix, "Application loaded");
        }
        Ok(())
    }

    /// Resolve the context path into `request` and return the matching route.
    pub fn find_candidate(&self, request: &mut HttpRequest) -> Option<&RouteEntry> {
        request.context_path = self
            .routes
            .resolve_context_path(&request.request_url)
            .to_string();
        self.routes.find(&request.request_url, &request.context_path)
    }

    fn dispatch(
        &self,
        conn: &mut Connection<'_>,
        request: &mut HttpRequest,
        response: &mut HttpResponse,
    ) -> io::Result<HandlerOutcome> {
        let candidate = self.find_candidate(request);
        self.sessions.init_session_if_existent(request);

        let Some(entry) = candidate else {
            return Ok(HandlerOutcome::NotHandled);
        };
        if request.is_resource() && !self.config.track_resources {
            return Ok(HandlerOutcome::NotHandled);
        }
        debug!(route = %entry.route, path = %request.request_url, "Dispatching to controller");

        let result = entry
            .controller()
            .and_then(|controller| controller.service(request, response).map(|()| controller));
        let controller = match result {
            Ok(controller) => controller,
            Err(err) => return self.fail_closed(conn, entry, response, err),
        };
        if !controller.has_intercepted(request, response) {
            return Ok(HandlerOutcome::NotHandled);
        }

        if response.status().is_none() {
            response.set_status(StatusCode::OK);
        }
        self.sessions.send_session_if_existent(request, response);
        self.sessions.clear_invalid_sessions();
        conn.send(response)?;
        Ok(HandlerOutcome::Handled)
    }

    /// A failing controller still ends the chain: static resources and the
    /// 404 fallback must not answer for it.
    fn fail_closed(
        &self,
        conn: &mut Connection<'_>,
        entry: &RouteEntry,
        response: &mut HttpResponse,
        err: anyhow::Error,
    ) -> io::Result<HandlerOutcome> {
        error!(route = %entry.route, name = %entry.name, error = %format!("{err:#}"), "Controller failed");
        if response.status().is_none() {
            response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
        if self.config.print_exceptions {
            response.set_content(&format!("{err:#}"));
        }
        conn.send(response)?;
        Ok(HandlerOutcome::HandledWithError(err.to_string()))
    }
}

impl RequestHandler for Dispatcher {
    fn init(&mut self) -> Result<(), ServerError> {
        self.load_applications()
    }

    fn handle_request(
        &self,
        conn: &mut Connection<'_>,
        shared: &mut SharedRequestState,
    ) -> io::Result<HandlerOutcome> {
        let Some(mut request) = shared.take::<HttpRequest>(HTTP_REQUEST) else {
            return Ok(HandlerOutcome::NotHandled);
        };
        let Some(mut response) = shared.take::<HttpResponse>(HTTP_RESPONSE) else {
            shared.restore(HTTP_REQUEST, request);
            return Ok(HandlerOutcome::NotHandled);
        };

        let outcome = self.dispatch(conn, &mut request, &mut response);

        shared.restore(HTTP_REQUEST, request);
        shared.restore(HTTP_RESPONSE, response);
        outcome
    }

    fn order(&self) -> i32 {
        self.config.dispatcher_order
    }

    fn name(&self) -> &str {
        "dispatcher"
    }
}

//! Route table: built once at startup, read concurrently afterwards.

use crate::controller::{ControllerFactory, ControllerRegistration, HandlerConfig, HttpHandler};
use crate::error::ServerError;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info};

/// One registered controller and its lazily constructed instance.
pub struct RouteEntry {
    pub route: String,
    pub name: String,
    pub load_on_startup: bool,
    config: HandlerConfig,
    factory: ControllerFactory,
    controller: OnceCell<Box<dyn HttpHandler>>,
    /// Serialises first construction; waiters yield their coroutine instead
    /// of parking the worker thread inside `OnceCell`.
    init_lock: may::sync::Mutex<()>,
}

impl RouteEntry {
    pub fn new(route: String, registration: ControllerRegistration, config: HandlerConfig) -> Self {
        Self {
            route,
            name: registration.name,
            load_on_startup: registration.load_on_startup,
            config,
            factory: registration.factory,
            controller: OnceCell::new(),
            init_lock: may::sync::Mutex::new(()),
        }
    }

    /// The initialised controller; constructed and initialised on first use, exactly once.
    pub fn controller(&self) -> anyhow::Result<&dyn HttpHandler> {
        if let Some(controller) = self.controller.get() {
            return Ok(&**controller);
        }
        let _guard = self
            .init_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("controller init lock poisoned for {}", self.route))?;
        let controller = self.controller.get_or_try_init(|| {
            let mut controller = (self.factory)();
            if !controller.is_initialized() {
                controller.init(self.config.clone())?;
            }
            debug!(route = %self.route, name = %self.name, "Controller initialised");
            Ok::<_, anyhow::Error>(controller)
        })?;
        Ok(&**controller)
    }

    pub fn is_loaded(&self) -> bool {
        self.controller.get().is_some()
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("route", &self.route)
            .field("name", &self.name)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// URL namespace of one application.
#[derive(Debug)]
struct AppContext {
    context_path: String,
    /// `^{context}/[a-zA-Z0-9]+/`
    segment_pattern: Regex,
}

impl AppContext {
    fn new(context_path: String) -> Self {
        let segment_pattern = Regex::new(&format!(
            "^{}/[a-zA-Z0-9]+/",
            regex::escape(&context_path)
        ))
        .expect("Failed to compile application route regex");
        Self {
            context_path,
            segment_pattern,
        }
    }

    /// `/shop` owns `/shop` and `/shop/...`, not `/shopping`.
    fn owns(&self, url: &str) -> bool {
        url.strip_prefix(self.context_path.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

/// Route → controller mapping with the application namespaces it spans.
///
/// Resolution order for a URL inside context `C`:
///
/// 1. exact route
/// 2. `C/{segment}/*` when the URL starts with `C/{segment}/`
/// 3. `C/*`
#[derive(Debug)]
pub struct RouteTable {
    routes: HashMap<String, RouteEntry>,
    root: AppContext,
    apps: Vec<AppContext>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            root: AppContext::new(String::new()),
            apps: Vec::new(),
        }
    }

    /// Register a non-root application namespace (`/shop`). Registration order
    /// decides which application owns a URL when prefixes overlap.
    pub fn add_context(&mut self, context_path: &str) {
        if context_path.is_empty() || self.apps.iter().any(|a| a.context_path == context_path) {
            return;
        }
        self.apps.push(AppContext::new(context_path.to_string()));
    }

    pub fn insert(&mut self, entry: RouteEntry) -> Result<(), ServerError> {
        if self.routes.contains_key(&entry.route) {
            return Err(ServerError::DuplicateRoute { route: entry.route });
        }
        info!(route = %entry.route, name = %entry.name, "Registered controller route");
        self.routes.insert(entry.route.clone(), entry);
        Ok(())
    }

    /// Context path of the first non-root application owning `url`, else `""`.
    pub fn resolve_context_path(&self, url: &str) -> &str {
        self.apps
            .iter()
            .find(|app| app.owns(url))
            .map_or("", |app| app.context_path.as_str())
    }

    /// Best route for `url` within `context_path`.
    pub fn find(&self, url: &str, context_path: &str) -> Option<&RouteEntry> {
        if let Some(entry) = self.routes.get(url) {
            return Some(entry);
        }
        let app = self
            .apps
            .iter()
            .find(|app| app.context_path == context_path)
            .unwrap_or(&self.root);
        if let Some(found) = app.segment_pattern.find(url) {
            if let Some(entry) = self.routes.get(&format!("{}*", found.as_str())) {
                return Some(entry);
            }
        }
        self.routes.get(&format!("{context_path}/*"))
    }

    pub fn get(&self, route: &str) -> Option<&RouteEntry> {
        self.routes.get(route)
    }

    pub fn entries(&self) -> impl Iterator<Item = &RouteEntry> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

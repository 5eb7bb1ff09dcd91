//! # Session Module
//!
//! Cookie-keyed sessions shared across connections.
//!
//! - [`HttpSession`] is reference counted; a request holds an `Arc` to it, the
//!   [`SessionStore`] owns the registry entry.
//! - [`SessionStore`] guards its whole map with a single mutex: lookups,
//!   inserts and sweeps all happen on the hot path of every request.
//! - [`SessionManager`] implements the per-request protocol: attach before the
//!   controller runs, persist and emit the cookie afterwards, then sweep.
//!
//! The session cookie name is [`SESSION_COOKIE_NAME`] followed by the
//! request's context path, so co-hosted applications never share a session.

use crate::ids::generate_session_id;
use crate::message::{HttpCookie, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Prefix of the session cookie name.
pub const SESSION_COOKIE_NAME: &str = "BROCCOLI_SESSION_ID";

/// Value written into the cookie that tells the browser to drop the session.
const REMOVED_COOKIE_VALUE: &str = "removed";

/// A server-side session.
#[derive(Debug)]
pub struct HttpSession {
    id: String,
    attributes: Mutex<HashMap<String, Value>>,
    valid: AtomicBool,
    created_at: Instant,
    last_accessed: Mutex<Instant>,
    max_inactive: Duration,
}

impl HttpSession {
    pub fn new(max_inactive: Duration) -> Self {
        let now = Instant::now();
        Self {
            id: generate_session_id(),
            attributes: Mutex::new(HashMap::new()),
            valid: AtomicBool::new(true),
            created_at: now,
            last_accessed: Mutex::new(now),
            max_inactive,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Valid until invalidated or inactive for longer than its timeout.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire) && !self.is_expired(Instant::now())
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(*self.last_accessed.lock()) > self.max_inactive
    }

    /// Mark the session as used by the current request.
    pub fn touch(&self) {
        *self.last_accessed.lock() = Instant::now();
    }

    pub fn add_attribute(&self, name: impl Into<String>, value: Value) {
        self.attributes.lock().insert(name.into(), value);
    }

    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.lock().get(name).cloned()
    }

    pub fn remove_attribute(&self, name: &str) -> Option<Value> {
        self.attributes.lock().remove(name)
    }

    /// Snapshot of every attribute.
    pub fn attributes(&self) -> HashMap<String, Value> {
        self.attributes.lock().clone()
    }

    /// Store any serialisable value as an attribute.
    pub fn set_attribute<T: Serialize>(&self, name: &str, value: &T) -> serde_json::Result<()> {
        let value = serde_json::to_value(value)?;
        self.add_attribute(name, value);
        Ok(())
    }

    /// Read an attribute back as `T`; `None` when absent or of another shape.
    pub fn attribute_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.attribute(name)
            .and_then(|value| serde_json::from_value(value).ok())
    }
}

/// Registry of live sessions, keyed by id.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<HttpSession>>>,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// A new session using this store's timeout. Not persisted until added.
    pub fn create_session(&self) -> Arc<HttpSession> {
        Arc::new(HttpSession::new(self.timeout))
    }

    pub fn add_session(&self, session: Arc<HttpSession>) {
        self.sessions.lock().insert(session.id().to_string(), session);
    }

    pub fn get_session(&self, id: &str) -> Option<Arc<HttpSession>> {
        self.sessions.lock().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.lock().contains_key(id)
    }

    /// Drop invalidated and inactive sessions. Returns how many were removed.
    pub fn refresh_sessions(&self) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, session| session.is_valid());
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, remaining = sessions.len(), "Swept sessions");
        }
        removed
    }

    /// Snapshot of the registry.
    pub fn all_sessions(&self) -> HashMap<String, Arc<HttpSession>> {
        self.sessions.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

/// Attaches sessions to requests and emits session cookies.
#[derive(Debug, Clone)]
pub struct SessionManager {
    store: Arc<SessionStore>,
}

impl SessionManager {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// `BROCCOLI_SESSION_ID<contextPath>`
    pub fn cookie_name(context_path: &str) -> String {
        format!("{SESSION_COOKIE_NAME}{context_path}")
    }

    /// Attach the session named by the request's cookie, or a fresh one.
    ///
    /// A cookie naming a missing or invalid session is dropped from the
    /// request and replaced by a new, not yet persisted, session.
    pub fn init_session_if_existent(&self, request: &mut HttpRequest) {
        let cookie_name = Self::cookie_name(&request.context_path);
        let existing = request
            .cookie(&cookie_name)
            .map(|cookie| cookie.value().to_string());

        match existing {
            Some(id) => match self.store.get_session(&id) {
                Some(session) if session.is_valid() => {
                    session.touch();
                    request.session = Some(session);
                }
                _ => {
                    debug!(session_id = %id, "Stale session cookie, issuing new session");
                    request.cookies.remove(&cookie_name);
                    request.session = Some(self.store.create_session());
                }
            },
            None => request.session = Some(self.store.create_session()),
        }
    }

    /// Persist the request's session and emit the matching cookie.
    ///
    /// A valid session gets a cookie expiring in one day; a session
    /// invalidated during the request gets a cookie expiring at the epoch.
    pub fn send_session_if_existent(&self, request: &HttpRequest, response: &mut HttpResponse) {
        let Some(session) = request.session() else {
            return;
        };
        if !self.store.contains(session.id()) {
            self.store.add_session(Arc::clone(session));
        }

        let cookie_name = Self::cookie_name(&request.context_path);
        if session.is_valid() {
            response.add_cookie(
                HttpCookie::new(cookie_name, session.id())
                    .with_path("/")
                    .with_expires(Utc::now() + chrono::Duration::days(1)),
            );
        } else {
            let epoch = DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_else(Utc::now);
            response.add_cookie(
                HttpCookie::new(cookie_name, REMOVED_COOKIE_VALUE)
                    .with_path("/")
                    .with_expires(epoch),
            );
        }
    }

    pub fn clear_invalid_sessions(&self) -> usize {
        self.store.refresh_sessions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use serde_json::json;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(SessionStore::new(Duration::from_secs(60))))
    }

    #[test]
    fn test_new_session_is_not_persisted_until_sent() {
        let manager = manager();
        let mut req = HttpRequest::new(Method::GET, "/");
        manager.init_session_if_existent(&mut req);
        let id = req.session().unwrap().id().to_string();
        assert!(!manager.store().contains(&id));

        let mut res = HttpResponse::new();
        manager.send_session_if_existent(&req, &mut res);
        assert!(manager.store().contains(&id));
        let cookie = &res.cookies()[0];
        assert_eq!(cookie.name, SESSION_COOKIE_NAME);
        assert_eq!(cookie.value(), id);
        assert!(cookie.expires.unwrap() > Utc::now());
    }

    #[test]
    fn test_cookie_reattaches_same_session() {
        let manager = manager();
        let session = manager.store().create_session();
        session.add_attribute("user", json!("ana"));
        manager.store().add_session(Arc::clone(&session));

        let mut req = HttpRequest::new(Method::GET, "/");
        req.cookies
            .insert(SESSION_COOKIE_NAME.into(), HttpCookie::new(SESSION_COOKIE_NAME, session.id()));
        manager.init_session_if_existent(&mut req);
        let attached = req.session().unwrap();
        assert_eq!(attached.id(), session.id());
        assert_eq!(attached.attribute("user"), Some(json!("ana")));
    }

    #[test]
    fn test_stale_cookie_gets_new_session() {
        let manager = manager();
        let mut req = HttpRequest::new(Method::GET, "/shop/cart");
        req.context_path = "/shop".into();
        let name = SessionManager::cookie_name("/shop");
        req.cookies.insert(name.clone(), HttpCookie::new(name.clone(), "gone"));
        manager.init_session_if_existent(&mut req);
        assert!(req.cookie(&name).is_none());
        assert_ne!(req.session().unwrap().id(), "gone");
    }

    #[test]
    fn test_invalidated_session_emits_removal_cookie_and_is_swept() {
        let manager = manager();
        let mut req = HttpRequest::new(Method::GET, "/");
        manager.init_session_if_existent(&mut req);
        req.session().unwrap().invalidate();

        let mut res = HttpResponse::new();
        manager.send_session_if_existent(&req, &mut res);
        let cookie = &res.cookies()[0];
        assert_eq!(cookie.value(), "removed");
        assert_eq!(cookie.expires.unwrap().timestamp(), 0);

        assert_eq!(manager.clear_invalid_sessions(), 1);
        assert!(manager.store().is_empty());
    }

    #[test]
    fn test_inactive_sessions_are_swept() {
        let store = SessionStore::new(Duration::ZERO);
        let session = store.create_session();
        store.add_session(session);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.refresh_sessions(), 1);
    }

    #[test]
    fn test_typed_attributes() {
        #[derive(Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Cart {
            items: Vec<u32>,
        }
        let session = HttpSession::new(Duration::from_secs(1));
        session.set_attribute("cart", &Cart { items: vec![1, 2] }).unwrap();
        assert_eq!(
            session.attribute_as::<Cart>("cart"),
            Some(Cart { items: vec![1, 2] })
        );
        assert_eq!(session.attribute_as::<u32>("cart"), None);
    }
}

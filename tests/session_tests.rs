//! Integration tests for cookie-backed sessions
//!
//! # Test Coverage
//!
//! - A first request gets a fresh session and a `Set-Cookie`
//! - Sending the cookie back resumes the same session and its attributes
//! - Each application uses its own context-qualified cookie
//! - Invalidated sessions are answered with an epoch-dated removal cookie
//! - Unknown session ids are replaced

use broccoli::controller::{Application, ControllerRegistration, HandlerConfig, HandlerState, HttpHandler};
use broccoli::message::{HttpRequest, HttpResponse};
use broccoli::server::{HttpServer, ServerBuilder};
use broccoli::session::SESSION_COOKIE_NAME;

mod common;
use common::stream::{body_of, MockStream};
use common::temp_files::WorkingDir;

/// Counts visits in the session; `POST` logs out.
#[derive(Default)]
struct Visits(HandlerState);

impl HttpHandler for Visits {
    fn init(&mut self, config: HandlerConfig) -> anyhow::Result<()> {
        self.0.set(config);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.0.is_initialized()
    }

    fn do_get(&self, request: &mut HttpRequest, response: &mut HttpResponse) -> anyhow::Result<()> {
        let session = request
            .session()
            .ok_or_else(|| anyhow::anyhow!("no session attached"))?;
        let visits = session.attribute_as::<u32>("visits").unwrap_or(0) + 1;
        session.set_attribute("visits", &visits)?;
        response.set_content(&visits.to_string());
        Ok(())
    }

    fn do_post(&self, request: &mut HttpRequest, response: &mut HttpResponse) -> anyhow::Result<()> {
        if let Some(session) = request.session() {
            session.invalidate();
        }
        response.set_content("bye");
        Ok(())
    }
}

fn server(dir: &WorkingDir) -> HttpServer {
    ServerBuilder::new(dir.config())
        .application(
            Application::new("ROOT")
                .with_controller(ControllerRegistration::new("/visits", Visits::default)),
        )
        .application(
            Application::new("shop")
                .with_controller(ControllerRegistration::new("/visits", Visits::default)),
        )
        .build()
        .unwrap()
}

fn send(server: &HttpServer, method: &str, path: &str, cookie: Option<&str>) -> String {
    let cookie = cookie.map(|c| format!("Cookie: {c}\r\n")).unwrap_or_default();
    let mut stream = MockStream::new(format!("{method} {path} HTTP/1.1\r\n{cookie}\r\n"));
    server.handle_connection(&mut stream).unwrap();
    stream.output_str()
}

/// `name=value` of the first `Set-Cookie` header.
fn set_cookie(response: &str) -> Option<&str> {
    response
        .lines()
        .find_map(|line| line.strip_prefix("Set-Cookie: "))
        .map(|cookie| cookie.split(';').next().unwrap_or(cookie))
}

#[test]
fn test_session_survives_across_requests() {
    let dir = WorkingDir::new();
    let server = server(&dir);

    let first = send(&server, "GET", "/visits", None);
    assert_eq!(body_of(&first), "1");
    let cookie = set_cookie(&first).unwrap().to_string();
    assert!(cookie.starts_with(&format!("{SESSION_COOKIE_NAME}=")));
    assert!(first.contains("; Path=/; Expires="));

    let second = send(&server, "GET", "/visits", Some(&cookie));
    assert_eq!(body_of(&second), "2");
    assert_eq!(set_cookie(&second), Some(cookie.as_str()));
    assert_eq!(server.session_store().len(), 1);
}

#[test]
fn test_each_application_has_its_own_cookie() {
    let dir = WorkingDir::new();
    let server = server(&dir);

    let root = send(&server, "GET", "/visits", None);
    let root_cookie = set_cookie(&root).unwrap().to_string();

    // The root cookie means nothing to the shop.
    let shop = send(&server, "GET", "/shop/visits", Some(&root_cookie));
    assert_eq!(body_of(&shop), "1");
    let shop_cookie = set_cookie(&shop).unwrap();
    assert!(shop_cookie.starts_with(&format!("{SESSION_COOKIE_NAME}/shop=")));
    assert_eq!(server.session_store().len(), 2);
}

#[test]
fn test_invalidated_session_gets_removal_cookie() {
    let dir = WorkingDir::new();
    let server = server(&dir);

    let first = send(&server, "GET", "/visits", None);
    let cookie = set_cookie(&first).unwrap().to_string();

    let logout = send(&server, "POST", "/visits", Some(&cookie));
    assert_eq!(body_of(&logout), "bye");
    assert_eq!(
        set_cookie(&logout),
        Some(format!("{SESSION_COOKIE_NAME}=removed").as_str())
    );
    assert!(logout.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
    // The sweep after the response dropped it.
    assert!(server.session_store().is_empty());

    let after = send(&server, "GET", "/visits", Some(&cookie));
    assert_eq!(body_of(&after), "1");
    assert_ne!(set_cookie(&after), Some(cookie.as_str()));
}

#[test]
fn test_unknown_session_id_is_replaced() {
    let dir = WorkingDir::new();
    let server = server(&dir);
    let stale = format!("{SESSION_COOKIE_NAME}=01ARZ3NDEKTSV4RRFFQ69G5FAV");
    let response = send(&server, "GET", "/visits", Some(&stale));
    assert_eq!(body_of(&response), "1");
    assert_ne!(set_cookie(&response), Some(stale.as_str()));
}

//! Integration tests for static resources
//!
//! # Test Coverage
//!
//! - Bundled resources win over runtime assets
//! - Media type, length and `Cache-Control` from the rule table
//! - JavaScript matches its rule under either of its media type names
//! - A request's own `Cache-Control` directive is echoed back
//! - Per-application directories under `/{app}`
//! - Traversal attempts and missing files end at the 404 fallback
//! - A malformed caching expression aborts startup

use broccoli::controller::Application;
use broccoli::fallback::NOT_FOUND_MESSAGE;
use broccoli::server::{HttpServer, ServerBuilder};
use broccoli::{ServerConfig, ServerError};

mod common;
use common::stream::{body_of, header_of, status_of, MockStream};
use common::temp_files::WorkingDir;

fn server_with(config: ServerConfig) -> HttpServer {
    ServerBuilder::new(config)
        .application(Application::new("ROOT"))
        .application(Application::new("shop"))
        .build()
        .unwrap()
}

fn get(server: &HttpServer, path: &str, extra_headers: &str) -> String {
    let mut stream = MockStream::new(format!("GET {path} HTTP/1.1\r\n{extra_headers}\r\n"));
    server.handle_connection(&mut stream).unwrap();
    stream.output_str()
}

#[test]
fn test_bundled_resource_is_served_with_cache_rule() {
    let dir = WorkingDir::new();
    dir.write("webapps/ROOT/classes/webapp/css/site.css", "body { color: green }");
    let server = server_with(dir.config());

    let response = get(&server, "/css/site.css", "");
    assert_eq!(status_of(&response), Some(200));
    assert_eq!(header_of(&response, "Content-Type"), Some("text/css"));
    assert_eq!(header_of(&response, "Content-Length"), Some("21"));
    assert_eq!(header_of(&response, "Cache-Control"), Some("max-age=84600, public"));
    assert_eq!(body_of(&response), "body { color: green }");
}

#[test]
fn test_javascript_gets_default_cache_rule() {
    let dir = WorkingDir::new();
    dir.write("webapps/ROOT/classes/webapp/app.js", "run()");
    let server = server_with(dir.config());

    let response = get(&server, "/app.js", "");
    assert_eq!(status_of(&response), Some(200));
    assert!(header_of(&response, "Content-Type").is_some_and(|t| t.ends_with("/javascript")));
    assert_eq!(header_of(&response, "Cache-Control"), Some("max-age=7200"));
}

#[test]
fn test_bundled_resource_shadows_asset() {
    let dir = WorkingDir::new();
    dir.write("webapps/ROOT/classes/webapp/logo.png", "bundled");
    dir.write("assets/ROOT/logo.png", "asset");
    dir.write("assets/ROOT/upload.png", "asset only");
    let server = server_with(dir.config());

    assert_eq!(body_of(&get(&server, "/logo.png", "")), "bundled");
    let upload = get(&server, "/upload.png", "");
    assert_eq!(body_of(&upload), "asset only");
    assert_eq!(header_of(&upload, "Cache-Control"), Some("max-age=120"));
}

#[test]
fn test_request_cache_directive_is_echoed() {
    let dir = WorkingDir::new();
    dir.write("assets/ROOT/app.js", "run()");
    let server = server_with(dir.config());
    let response = get(&server, "/app.js", "Cache-Control: no-cache\r\n");
    assert_eq!(header_of(&response, "Cache-Control"), Some("no-cache"));
}

#[test]
fn test_no_cache_header_without_rule_or_when_disabled() {
    let dir = WorkingDir::new();
    dir.write("assets/ROOT/notes.txt", "plain");
    dir.write("assets/ROOT/site.css", "css");

    let enabled = server_with(dir.config());
    assert_eq!(header_of(&get(&enabled, "/notes.txt", ""), "Cache-Control"), None);

    let disabled = server_with(ServerConfig {
        enable_resource_caching: false,
        ..dir.config()
    });
    assert_eq!(header_of(&get(&disabled, "/site.css", ""), "Cache-Control"), None);
}

#[test]
fn test_application_resources_are_served_under_prefix() {
    let dir = WorkingDir::new();
    dir.write("assets/shop/banner.gif", "GIF89a");
    dir.write("assets/ROOT/banner.gif", "root banner");
    let server = server_with(dir.config());

    let shop = get(&server, "/shop/banner.gif", "");
    assert_eq!(body_of(&shop), "GIF89a");
    assert_eq!(header_of(&shop, "Content-Type"), Some("image/gif"));
    assert_eq!(body_of(&get(&server, "/banner.gif", "")), "root banner");
}

#[test]
fn test_missing_and_escaping_paths_are_404() {
    let dir = WorkingDir::new();
    dir.write("config/secret.txt", "do not serve");
    let server = server_with(dir.config());

    for path in ["/missing.css", "/../../config/secret.txt", "/shop/"] {
        let response = get(&server, path, "");
        assert_eq!(status_of(&response), Some(404), "{path}");
        assert_eq!(body_of(&response), NOT_FOUND_MESSAGE);
    }
}

#[test]
fn test_malformed_caching_expression_aborts_startup() {
    let dir = WorkingDir::new();
    let result = ServerBuilder::new(ServerConfig {
        resource_caching_expression: "image/png max-age=1".to_string(),
        ..dir.config()
    })
    .build();
    match result {
        Err(ServerError::Expression(err)) => assert_eq!(err.expression, "image/png max-age=1"),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("startup should fail"),
    }
}

//! # Broccoli
//!
//! **Broccoli** is an embeddable HTTP/1.1 application server running on the `may` coroutine
//! runtime. It hosts one or more applications side by side, each made of controllers registered
//! under routes, and serves their static resources and cookie-backed sessions.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - **[`server`]** - Acceptor, connection handling, request parsing and body decoding
//! - **[`handler`]** - The handler chain contracts every stage implements
//! - **[`dispatcher`]** - Routes parsed requests to application controllers
//! - **[`router`]** - Route table: exact routes, wildcards and per-app context paths
//! - **[`controller`]** - The [`HttpHandler`](controller::HttpHandler) trait user code implements
//! - **[`static_files`]** - Static resources and `Cache-Control` rules
//! - **[`session`]** - Session store and the session cookie
//! - **[`fallback`]** - The 404 answer at the end of the chain
//! - **[`config`]** - `config/config.ini` with environment overrides
//!
//! ### Request Handling Flow
//!
//! Every connection carries one request through an ordered chain of handlers. The first handler
//! that answers stops the chain; cleanups run afterwards whatever happened.
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Acceptor as HttpServer<br/>(acceptor coroutine)
//!     participant Parser as RequestParser
//!     participant Dispatcher as Dispatcher
//!     participant Resources as ResourceHandler
//!     participant Fallback as FallbackHandler
//!     participant Cleanup as RequestDestroyHandler
//!
//!     Client->>Acceptor: TCP connect
//!     Acceptor->>Acceptor: spawn coroutine<br/>(or queue to worker pool)
//!     Acceptor->>Parser: connection
//!     Parser->>Parser: request line, headers,<br/>cookies, body
//!
//!     alt Malformed or too big
//!         Parser-->>Client: 400 Bad Request
//!     end
//!
//!     Parser->>Dispatcher: request + empty response
//!     Dispatcher->>Dispatcher: context path, route, session
//!
//!     alt Controller answered
//!         Dispatcher-->>Client: controller response<br/>+ session cookie
//!     end
//!
//!     Dispatcher->>Resources: not handled
//!     alt File exists
//!         Resources-->>Client: 200 + file<br/>+ Cache-Control
//!     end
//!
//!     Resources->>Fallback: not handled
//!     Fallback-->>Client: 404 Not Found
//!
//!     Acceptor->>Cleanup: close upload streams
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use broccoli::config::ServerConfig;
//! use broccoli::controller::{Application, ControllerRegistration};
//! use broccoli::server::ServerBuilder;
//!
//! let config = ServerConfig::load(".")?;
//! let port = config.server_port;
//! let server = ServerBuilder::new(config)
//!     .application(Application::new("ROOT").with_controller(
//!         ControllerRegistration::new("/hello", Hello::default),
//!     ))
//!     .build()?;
//! let handle = server.start(("0.0.0.0", port))?;
//! handle.join().ok();
//! ```
//!
//! ## Configuration
//!
//! Settings come from compiled-in defaults, then `config/config.ini` under the working directory,
//! then environment variables of the same name. See [`config::ServerConfig`].
//!
//! Logging is configured separately through `BROCCOLI_LOG_*` variables, see [`logging`].

pub mod cleanup;
pub mod cli;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod error_handling;
pub mod fallback;
pub mod handler;
pub mod ids;
pub mod logging;
pub mod message;
pub mod router;
pub mod server;
pub mod session;
pub mod shared_state;
pub mod static_files;
pub mod worker_pool;

pub use config::ServerConfig;
pub use controller::{Application, ControllerRegistration, HttpHandler};
pub use error::ServerError;
pub use server::{HttpServer, ServerBuilder, ServerHandle};

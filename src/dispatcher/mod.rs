//! # Dispatcher Module
//!
//! The dispatcher hands parsed requests to application controllers.
//!
//! ## Startup
//!
//! Every [`Application`](crate::controller::Application) is turned into route
//! table entries. Routes of the root application are used as registered; all
//! others are prefixed with `/{app}`. Each controller receives its own
//! [`HandlerConfig`](crate::controller::HandlerConfig) (asset and working
//! directories, session store, server configuration). Controllers marked
//! `load_on_startup` are initialised immediately and a failure aborts startup;
//! the rest are initialised on their first request. The application's asset
//! directory is created if it does not exist.
//!
//! ## Request Flow
//!
//! 1. Resolve the context path and the best route (see [`crate::router`])
//! 2. Attach the caller's session, or a fresh one
//! 3. Decline when nothing matched, or when the URL names a static resource and
//!    `BROCCOLINA_TRACK_RESOURCES` is off
//! 4. Run the controller's `service`
//! 5. Default the status to 200, emit the session cookie, sweep expired
//!    sessions, write the response
//!
//! ## Error Handling
//!
//! A controller error is logged and ends the chain with
//! [`HandlerOutcome::HandledWithError`](crate::handler::HandlerOutcome): the
//! response gets status 500 unless the controller set one, and the error text
//! as body when `PRINT_EXCEPTIONS` is on. A broken controller never falls
//! through to static resources or the 404 fallback.

mod core;

pub use core::Dispatcher;

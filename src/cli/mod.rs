//! # CLI Module
//!
//! Command-line entry points of the `broccoli` binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Run the server for a working directory:
//!
//! ```bash
//! broccoli serve --working-dir /srv/broccoli --port 8080
//! ```
//!
//! Options:
//! - `--working-dir <DIR>` - Directory holding `config/`, `webapps/`, `assets/` and `logs/`
//!   (default: current directory)
//! - `--port <PORT>` - Overrides `SERVER_PORT`
//! - `--host <HOST>` - Interface to bind (default: `0.0.0.0`)
//!
//! The server stops on SIGINT or SIGTERM.
//!
//! ### `check-config`
//!
//! Load the configuration the way `serve` would and print the resolved
//! settings and caching rules; exits non-zero if either is invalid:
//!
//! ```bash
//! broccoli check-config --working-dir /srv/broccoli
//! ```

mod commands;


pub use commands::{check_config, run, run_cli, Cli, Commands};

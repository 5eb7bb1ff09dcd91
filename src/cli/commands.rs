use crate::config::ServerConfig;
use crate::controller::Application;
use crate::logging::{init_logging, LogConfig};
use crate::server::{ServerBuilder, ServerHandle};
use crate::static_files::CachingExpressionParser;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Command-line interface for Broccoli
#[derive(Parser)]
#[command(name = "broccoli")]
#[command(about = "Broccoli HTTP application server", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the server
    Serve {
        /// Working directory (default: current directory)
        #[arg(short, long, env = "WORKING_DIRECTORY")]
        working_dir: Option<PathBuf>,

        /// Port to listen on, overrides SERVER_PORT
        #[arg(short, long)]
        port: Option<u16>,

        /// Interface to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },
    /// Validate the configuration and print the caching rules
    CheckConfig {
        /// Working directory (default: current directory)
        #[arg(short, long, env = "WORKING_DIRECTORY")]
        working_dir: Option<PathBuf>,
    },
}

/// Parse the process arguments and run the selected command.
pub fn run_cli() -> anyhow::Result<()> {
    run(Cli::parse())
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve {
            working_dir,
            port,
            host,
        } => serve(resolve_working_dir(working_dir)?, port, &host),
        Commands::CheckConfig { working_dir } => {
            let working_dir = resolve_working_dir(working_dir)?;
            let config = ServerConfig::load(working_dir)?;
            println!("{config:#?}");
            for (media_type, directive) in check_config(&config)? {
                println!("Cache-Control for {media_type}: {directive}");
            }
            Ok(())
        }
    }
}

/// The caching rules `config` would serve with, sorted by media type.
pub fn check_config(config: &ServerConfig) -> anyhow::Result<BTreeMap<String, String>> {
    let rules = CachingExpressionParser::parse(&config.resource_caching_expression)?;
    Ok(rules.into_iter().collect())
}

fn resolve_working_dir(working_dir: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match working_dir {
        Some(dir) => Ok(dir),
        None => env::current_dir().context("cannot determine the current directory"),
    }
}

fn serve(working_dir: PathBuf, port: Option<u16>, host: &str) -> anyhow::Result<()> {
    let mut config = ServerConfig::load(working_dir)?;
    if let Some(port) = port {
        config.server_port = port;
    }
    let _log_guard = init_logging(&LogConfig::from_env().with_log_dir(config.logs_dir()))?;
    may::config().set_stack_size(config.stack_size);

    let port = config.server_port;
    let root = Application::new(config.main_app_jar_name.clone());
    let server = ServerBuilder::new(config).application(root).build()?;
    let handle = server
        .start((host, port))
        .with_context(|| format!("cannot listen on {host}:{port}"))?;
    info!(addr = %handle.addr(), "Broccoli started");

    wait_for_shutdown(handle)
}

#[cfg(unix)]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "Shutting down");
    }
    handle.stop();
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    handle
        .join()
        .map_err(|e| anyhow::anyhow!("acceptor panicked: {e:?}"))
}

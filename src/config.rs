//! # Server Configuration Module
//!
//! Every component receives its settings through a [`ServerConfig`] value passed
//! at construction time; there is no process-wide configuration singleton.
//!
//! ## Precedence
//!
//! 1. Compiled-in defaults ([`ServerConfig::default`])
//! 2. `config/config.ini` under the working directory
//! 3. Environment variables with the same key names (highest wins)
//!
//! ## File format
//!
//! One `KEY: value` pair per line. Keys are case-insensitive, unknown keys and
//! lines without a `: ` separator are skipped.
//!
//! ```text
//! SERVER_PORT: 8080
//! PRINT_EXCEPTIONS: false
//! RESOURCE_CACHING_EXPRESSION: image/png @ max-age=120 & text/css @ max-age=84600
//! ```
//!
//! Values are coerced to the type of the key; `STACK_SIZE` also accepts `0x` hex
//! the same way the coroutine runtime settings always have.

use crate::error::ConfigError;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Default `Cache-Control` rules applied to static resources.
pub const DEFAULT_CACHING_EXPRESSION: &str = "image/png, image/gif, image/jpeg @ max-age=120 \
& text/css @ max-age=84600, public \
& application/javascript, text/javascript @ max-age=7200";

/// Relative location of the optional configuration file.
pub const CONFIG_FILE: &str = "config/config.ini";

/// Every key the server understands, in the spelling used by `config.ini` and
/// the environment overlay.
pub const CONFIG_KEYS: &[&str] = &[
    "SERVER_PORT",
    "WORKING_DIRECTORY",
    "MAX_REQUEST_SIZE",
    "ASSETS_DIR_NAME",
    "WEB_APPS_DIR_NAME",
    "APP_COMPILE_OUTPUT_DIR_NAME",
    "APP_RESOURCES_DIR_NAME",
    "MAIN_APP_JAR_NAME",
    "LIB_DIR_NAME",
    "LOGS_DIR_NAME",
    "ENABLE_RESOURCE_CACHING",
    "RESOURCE_CACHING_EXPRESSION",
    "PRINT_EXCEPTIONS",
    "RESOURCE_HANDLER_ORDER",
    "DISPATCHER_ORDER",
    "BROCCOLINA_TRACK_RESOURCES",
    "SHOW_REQUEST_LOG",
    "SOCKET_TIMEOUT_MILLISECONDS",
    "SESSION_TIMEOUT_SECONDS",
    "MAX_CONNECTION_WORKERS",
    "STACK_SIZE",
];

/// Settings consumed by the request pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub server_port: u16,
    pub working_directory: PathBuf,
    /// Largest accepted `Content-Length` in bytes.
    pub max_request_size: u64,
    pub assets_dir_name: String,
    pub web_apps_dir_name: String,
    pub app_compile_output_dir_name: String,
    pub app_resources_dir_name: String,
    /// Name of the root application (served without a URL prefix).
    pub main_app_jar_name: String,
    pub lib_dir_name: String,
    pub logs_dir_name: String,
    pub enable_resource_caching: bool,
    pub resource_caching_expression: String,
    pub print_exceptions: bool,
    pub resource_handler_order: i32,
    pub dispatcher_order: i32,
    /// When false the Dispatcher yields asset-like URLs to the ResourceHandler.
    pub track_resources: bool,
    pub show_request_log: bool,
    pub socket_timeout: Duration,
    pub session_timeout: Duration,
    /// 0 spawns one coroutine per connection; N > 0 bounds concurrency to N workers.
    pub max_connection_workers: usize,
    /// Coroutine stack size in bytes.
    pub stack_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_port: 8000,
            working_directory: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            max_request_size: i32::MAX as u64,
            assets_dir_name: "assets/".to_string(),
            web_apps_dir_name: "webapps/".to_string(),
            app_compile_output_dir_name: "classes".to_string(),
            app_resources_dir_name: "webapp".to_string(),
            main_app_jar_name: "ROOT".to_string(),
            lib_dir_name: "lib/".to_string(),
            logs_dir_name: "logs/".to_string(),
            enable_resource_caching: true,
            resource_caching_expression: DEFAULT_CACHING_EXPRESSION.to_string(),
            print_exceptions: true,
            resource_handler_order: 1,
            dispatcher_order: 2,
            track_resources: true,
            show_request_log: false,
            socket_timeout: Duration::from_millis(60_000),
            session_timeout: Duration::from_secs(86_400),
            max_connection_workers: 0,
            stack_size: 0x10000,
        }
    }
}

impl ServerConfig {
    /// Defaults rooted at `working_directory`, without reading any file or
    /// environment variable.
    pub fn with_working_directory<P: Into<PathBuf>>(working_directory: P) -> Self {
        Self {
            working_directory: working_directory.into(),
            ..Self::default()
        }
    }

    /// Load the full precedence chain for `working_directory`.
    pub fn load<P: Into<PathBuf>>(working_directory: P) -> Result<Self, ConfigError> {
        let mut config = Self::with_working_directory(working_directory);
        let path = config.working_directory.join(CONFIG_FILE);
        match fs::read_to_string(&path) {
            Ok(contents) => {
                info!(path = %path.display(), "Loading configuration file");
                config.apply_ini(&contents)?;
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No configuration file, using defaults");
            }
            Err(err) => {
                return Err(ConfigError {
                    key: CONFIG_FILE.to_string(),
                    value: err.to_string(),
                })
            }
        }
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `KEY: value` lines on top of the current values.
    pub fn apply_ini(&mut self, contents: &str) -> Result<(), ConfigError> {
        for line in contents.lines() {
            let Some((key, value)) = line.trim().split_once(": ") else {
                continue;
            };
            let key = key.trim().to_ascii_uppercase();
            if CONFIG_KEYS.contains(&key.as_str()) {
                self.set(&key, value.trim())?;
            }
        }
        Ok(())
    }

    /// Apply environment variables named after [`CONFIG_KEYS`].
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(CONFIG_KEYS.iter().filter_map(|key| {
            env::var(key).ok().map(|value| (key.to_string(), value))
        }))
    }

    /// Apply an explicit set of key/value overrides, as the environment overlay does.
    pub fn apply_overrides<I>(&mut self, overrides: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in overrides {
            let key = key.to_ascii_uppercase();
            if CONFIG_KEYS.contains(&key.as_str()) {
                self.set(&key, &value)?;
            }
        }
        Ok(())
    }

    /// Set a single key from its textual representation.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "SERVER_PORT" => self.server_port = parse_value(key, value)?,
            "WORKING_DIRECTORY" => self.working_directory = PathBuf::from(value),
            "MAX_REQUEST_SIZE" => self.max_request_size = parse_value(key, value)?,
            "ASSETS_DIR_NAME" => self.assets_dir_name = value.to_string(),
            "WEB_APPS_DIR_NAME" => self.web_apps_dir_name = value.to_string(),
            "APP_COMPILE_OUTPUT_DIR_NAME" => self.app_compile_output_dir_name = value.to_string(),
            "APP_RESOURCES_DIR_NAME" => self.app_resources_dir_name = value.to_string(),
            "MAIN_APP_JAR_NAME" => self.main_app_jar_name = value.to_string(),
            "LIB_DIR_NAME" => self.lib_dir_name = value.to_string(),
            "LOGS_DIR_NAME" => self.logs_dir_name = value.to_string(),
            "ENABLE_RESOURCE_CACHING" => self.enable_resource_caching = parse_bool(key, value)?,
            "RESOURCE_CACHING_EXPRESSION" => self.resource_caching_expression = value.to_string(),
            "PRINT_EXCEPTIONS" => self.print_exceptions = parse_bool(key, value)?,
            "RESOURCE_HANDLER_ORDER" => self.resource_handler_order = parse_value(key, value)?,
            "DISPATCHER_ORDER" => self.dispatcher_order = parse_value(key, value)?,
            "BROCCOLINA_TRACK_RESOURCES" => self.track_resources = parse_bool(key, value)?,
            "SHOW_REQUEST_LOG" => self.show_request_log = parse_bool(key, value)?,
            "SOCKET_TIMEOUT_MILLISECONDS" => {
                self.socket_timeout = Duration::from_millis(parse_value(key, value)?)
            }
            "SESSION_TIMEOUT_SECONDS" => {
                self.session_timeout = Duration::from_secs(parse_value(key, value)?)
            }
            "MAX_CONNECTION_WORKERS" => self.max_connection_workers = parse_value(key, value)?,
            "STACK_SIZE" => self.stack_size = parse_size(key, value)?,
            _ => {}
        }
        Ok(())
    }

    /// `<working>/<assets>`
    pub fn assets_dir(&self) -> PathBuf {
        self.working_directory.join(trim_slashes(&self.assets_dir_name))
    }

    /// `<working>/<webapps>`
    pub fn web_apps_dir(&self) -> PathBuf {
        self.working_directory
            .join(trim_slashes(&self.web_apps_dir_name))
    }

    /// `<working>/<logs>`
    pub fn logs_dir(&self) -> PathBuf {
        self.working_directory.join(trim_slashes(&self.logs_dir_name))
    }

    /// `<working>/<webapps>/<app>/<compile output>`: working directory handed to controllers.
    pub fn app_working_dir(&self, app_name: &str) -> PathBuf {
        self.web_apps_dir()
            .join(trim_slashes(app_name))
            .join(trim_slashes(&self.app_compile_output_dir_name))
    }

    /// `<working>/<webapps>/<app>/<compile output>/<resources>`: bundled static resources.
    pub fn app_resources_dir(&self, app_name: &str) -> PathBuf {
        self.app_working_dir(app_name)
            .join(trim_slashes(&self.app_resources_dir_name))
    }

    /// `<working>/<assets>/<app>`: app-managed assets.
    pub fn app_assets_dir(&self, app_name: &str) -> PathBuf {
        self.assets_dir().join(trim_slashes(app_name))
    }

    /// `true` when `app_name` names the root application.
    pub fn is_root_app(&self, app_name: &str) -> bool {
        app_name.is_empty() || app_name == self.main_app_jar_name
    }
}

fn trim_slashes(segment: &str) -> &Path {
    Path::new(segment.trim_matches(|c| c == '/' || c == '\\'))
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_size(key: &str, value: &str) -> Result<usize, ConfigError> {
    let value = value.trim();
    let parsed = if let Some(hex) = value.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    };
    parsed.ok_or_else(|| ConfigError {
        key: key.to_string(),
        value: value.to_string(),
    })
}

use crate::core::{Result, SteadyError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Connection parameters captured when a client is constructed.
///
/// Only `database` is required; everything else falls back to the same
/// defaults as [`Config::new`].
#[derive(Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_charset")]
    pub charset: String,
    #[serde(default = "default_true")]
    pub persistent: bool,
    #[serde(default)]
    pub lazy: bool,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_username() -> String {
    "root".to_string()
}

fn default_charset() -> String {
    "UTF8".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Creates a configuration for `database` with every other field at its default.
    pub fn new(database: impl Into<String>) -> Self {
        Config {
            host: default_host(),
            port: default_port(),
            database: database.into(),
            username: default_username(),
            password: String::new(),
            charset: default_charset(),
            persistent: true,
            lazy: false,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Defers connecting until the first operation when `lazy` is true.
    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Data source name used in log output. Never includes the password.
    pub fn dsn(&self) -> String {
        format!(
            "host={};port={};dbname={};charset={}",
            self.host, self.port, self.database, self.charset
        )
    }

    /// Rejects configurations no driver could use.
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(SteadyError::Config("database name must not be empty".to_string()));
        }
        if self.charset.trim().is_empty() {
            return Err(SteadyError::Config("charset must not be empty".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .field("charset", &self.charset)
            .field("persistent", &self.persistent)
            .field("lazy", &self.lazy)
            .finish()
    }
}

/// Top-level settings file structure parsed from TOML.
#[derive(Debug, Deserialize)]
pub struct Settings {
    pub connection: Config,
    pub logging: Option<LoggingConfig>,
}

/// Logging-related configuration.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// A `tracing_subscriber::EnvFilter` directive, e.g. `steadyql=debug`.
    pub filter: Option<String>,
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.connection.validate()?;
        Ok(settings)
    }

    /// The configured log filter, if any.
    pub fn log_filter(&self) -> Option<&str> {
        self.logging.as_ref()?.filter.as_deref()
    }
}

/// Loads settings from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let settings = steadyql::config::load_settings("steadyql.toml").expect("Failed to load settings");
/// println!("{:?}", settings.connection);
/// ```
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let content = fs::read_to_string(path)?;
    Settings::from_toml_str(&content)
}

/// Default location of the settings file: `<config dir>/steadyql/config.toml`.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("steadyql").join("config.toml"))
}

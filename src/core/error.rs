/// steadyql Error Module
///
/// This module defines the error type for failures that abort an operation
/// outright: bad configuration, a connection that cannot be established,
/// and I/O around the CLI. Per-statement SQL failures are not errors in this
/// sense; they are reported through [`ErrorInfo`](crate::core::db::ErrorInfo).
use thiserror::Error;

/// Error type for fatal steadyql failures.
///
/// This enum covers:
/// - Driver errors surfaced while opening or configuring a connection
/// - Connection establishment failures
/// - Configuration loading and validation
/// - File system, JSON and TOML errors in the CLI layer
#[derive(Error, Debug)]
pub enum SteadyError {
    /// Errors raised by the SQLite driver outside statement execution
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The connection could not be established
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// REPL command validation errors
    #[error("Command error: {0}")]
    Command(String),
}

/// Type alias for Result to use SteadyError as the error type.
pub type Result<T> = std::result::Result<T, SteadyError>;

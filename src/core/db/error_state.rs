/// Error State Module
///
/// The normalized three-field error tuple reported after every client
/// operation, and the precedence rule that merges the statement-level tuple
/// over the connection-level one.

use serde::Serialize;
use std::fmt;

/// Status of a successful operation.
pub const SQLSTATE_SUCCESS: &str = "00000";
/// Generic driver error. Treated as transient and retried with a fresh connection.
pub const SQLSTATE_GENERAL_ERROR: &str = "HY000";
/// Client unable to establish the connection.
pub const SQLSTATE_CONNECTION_FAILED: &str = "08001";

/// A normalized `{status, driver code, driver message}` error tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    /// SQLSTATE-like status; `"00000"` on success, empty when nothing ran yet
    pub sql_state: String,
    /// Driver-specific error code
    pub driver_code: Option<i64>,
    /// Driver-specific error message
    pub message: Option<String>,
}

impl ErrorInfo {
    pub fn new(sql_state: impl Into<String>, driver_code: Option<i64>, message: Option<String>) -> Self {
        ErrorInfo {
            sql_state: sql_state.into(),
            driver_code,
            message,
        }
    }

    /// The success tuple `{"00000", None, None}`.
    pub fn success() -> Self {
        ErrorInfo::new(SQLSTATE_SUCCESS, None, None)
    }

    /// The tuple of a statement that has not been executed yet.
    pub fn unpopulated() -> Self {
        ErrorInfo::new("", None, None)
    }

    /// Tuple recorded when a connection could not be (re-)established.
    pub fn connection_failed(message: impl fmt::Display) -> Self {
        ErrorInfo::new(SQLSTATE_CONNECTION_FAILED, None, Some(message.to_string()))
    }

    pub fn is_success(&self) -> bool {
        self.sql_state == SQLSTATE_SUCCESS
    }

    /// Whether the status is the generic `HY000` class that triggers a reconnect.
    pub fn is_transient(&self) -> bool {
        self.sql_state == SQLSTATE_GENERAL_ERROR
    }

    pub fn is_populated(&self) -> bool {
        !self.sql_state.is_empty()
    }

    /// Whether either driver detail field is set.
    pub fn has_details(&self) -> bool {
        self.driver_code.is_some() || self.message.is_some()
    }

    /// Merges the two reporting layers.
    ///
    /// The statement tuple wins whenever a statement exists and its status is
    /// populated; otherwise the connection tuple is reported.
    pub fn merge(connection: ErrorInfo, statement: Option<&ErrorInfo>) -> ErrorInfo {
        match statement {
            Some(statement) if statement.is_populated() => statement.clone(),
            _ => connection,
        }
    }
}

impl Default for ErrorInfo {
    fn default() -> Self {
        ErrorInfo::success()
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.sql_state)?;
        if let Some(code) = self.driver_code {
            write!(f, " ({})", code)?;
        }
        if let Some(message) = &self.message {
            write!(f, " {}", message)?;
        }
        Ok(())
    }
}

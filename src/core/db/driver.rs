/// Driver Module
///
/// The transport boundary. A [`Driver`] opens connections from a [`Config`];
/// a [`DriverConnection`] exposes the capability set the client forwards to.
/// Failed calls do not return `Err`: they return an empty value and leave the
/// details in the connection's or the statement's [`ErrorInfo`], so the
/// client can normalize both layers the same way.

use super::error_state::ErrorInfo;
use super::value::{FetchMode, ParamType, Row, Value};
use crate::config::Config;
use crate::core::Result;
use std::collections::VecDeque;

/// Opens connections.
pub trait Driver {
    type Connection: DriverConnection;

    /// Establishes a new connection. Failures are fatal and never retried.
    fn connect(&self, config: &Config) -> Result<Self::Connection>;
}

/// The capabilities of a live connection.
pub trait DriverConnection {
    /// Runs `sql` and buffers its result set. `None` when it failed.
    fn query(&mut self, sql: &str) -> Option<Statement>;

    /// Runs `sql` directly and returns the number of affected rows.
    fn exec(&mut self, sql: &str) -> Option<u64>;

    /// Compiles `sql` without running it. `None` when it failed.
    fn prepare(&mut self, sql: &str) -> Option<Statement>;

    /// Binds `params` and executes a prepared statement.
    ///
    /// Failures are recorded on the statement, not on the connection.
    fn execute(&mut self, statement: &mut Statement, params: &[Value]) -> bool;

    fn quote(&mut self, value: &Value, param_type: ParamType) -> Option<String>;

    /// Identifier generated by the most recent successful insert.
    fn last_insert_id(&mut self) -> String;

    fn begin_transaction(&mut self) -> bool;

    fn commit(&mut self) -> bool;

    fn roll_back(&mut self) -> bool;

    /// Error tuple of the most recent call on this connection.
    fn error_info(&self) -> ErrorInfo;

    /// Releases the handle.
    fn close(self) -> Result<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// A statement: the SQL it was built from, its buffered result set and its
/// own error tuple.
#[derive(Debug, Clone)]
pub struct Statement {
    sql: String,
    columns: Vec<String>,
    rows: VecDeque<Vec<Value>>,
    affected_rows: u64,
    error: ErrorInfo,
}

impl Statement {
    /// A compiled statement that has not run yet.
    pub fn prepared(sql: impl Into<String>) -> Self {
        Statement {
            sql: sql.into(),
            columns: Vec::new(),
            rows: VecDeque::new(),
            affected_rows: 0,
            error: ErrorInfo::unpopulated(),
        }
    }

    /// An executed statement holding its result set.
    pub fn with_results(sql: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let mut statement = Statement::prepared(sql);
        statement.set_results(columns, rows);
        statement.error = ErrorInfo::success();
        statement
    }

    pub fn set_results(&mut self, columns: Vec<String>, rows: Vec<Vec<Value>>) {
        self.columns = columns;
        self.rows = rows.into();
    }

    pub fn set_affected_rows(&mut self, affected_rows: u64) {
        self.affected_rows = affected_rows;
    }

    pub fn set_error(&mut self, error: ErrorInfo) {
        self.error = error;
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Whether the statement produced a result set (had columns).
    pub fn has_result_set(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Rows affected by a data-modifying statement.
    pub fn row_count(&self) -> u64 {
        self.affected_rows
    }

    pub fn error_info(&self) -> &ErrorInfo {
        &self.error
    }

    /// Takes the next buffered row.
    pub fn fetch(&mut self, mode: FetchMode) -> Option<Row> {
        let values = self.rows.pop_front()?;
        Some(Row::from_values(&self.columns, values, mode))
    }

    /// Takes every remaining buffered row.
    pub fn fetch_all(&mut self, mode: FetchMode) -> Vec<Row> {
        let columns = &self.columns;
        self.rows
            .drain(..)
            .map(|values| Row::from_values(columns, values, mode))
            .collect()
    }
}

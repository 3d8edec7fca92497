/// SQLite Driver Module
///
/// [`Driver`] implementation backed by `rusqlite`. SQLite result codes are
/// mapped onto SQLSTATE-like statuses so the retry policy and callers see the
/// same error vocabulary regardless of driver.

use super::driver::{Driver, DriverConnection, Statement};
use super::error_state::{ErrorInfo, SQLSTATE_GENERAL_ERROR};
use super::value::{ParamType, Value};
use crate::config::Config;
use crate::core::{Result, SteadyError};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params_from_iter, Batch, Connection, ErrorCode};
use tracing::debug;

/// Message patterns that refine SQLite's catch-all `SQLITE_ERROR` code.
static MESSAGE_STATES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"syntax error|incomplete input", "42000"),
        (r"^no such table", "42S02"),
        (r"^no such column", "42S22"),
        (r"already exists$", "42S01"),
        (r"^cannot (start a transaction within a transaction|commit|rollback)", "25000"),
        (r"no transaction is active", "25000"),
        (r"^no such function|wrong number of arguments|^misuse of", "42000"),
    ]
    .into_iter()
    .map(|(pattern, state)| (Regex::new(pattern).expect("valid message pattern"), state))
    .collect()
});

/// Maps a SQLite result code and message to a SQLSTATE-like status.
pub fn sqlstate_for(code: ErrorCode, message: &str) -> &'static str {
    match code {
        ErrorCode::ConstraintViolation => "23000",
        ErrorCode::ReadOnly => "25006",
        ErrorCode::TooBig => "22001",
        ErrorCode::TypeMismatch => "22018",
        ErrorCode::Unknown => MESSAGE_STATES
            .iter()
            .find(|(pattern, _)| pattern.is_match(message))
            .map(|(_, state)| *state)
            .unwrap_or(SQLSTATE_GENERAL_ERROR),
        _ => SQLSTATE_GENERAL_ERROR,
    }
}

/// Converts a `rusqlite` error into the normalized tuple.
pub fn error_info_from(err: &rusqlite::Error) -> ErrorInfo {
    match err {
        rusqlite::Error::SqliteFailure(failure, message) => {
            let message = message.clone().unwrap_or_else(|| failure.to_string());
            ErrorInfo::new(
                sqlstate_for(failure.code, &message),
                Some(failure.extended_code.into()),
                Some(message),
            )
        }
        rusqlite::Error::SqlInputError { error, msg, .. } => ErrorInfo::new(
            sqlstate_for(error.code, msg),
            Some(error.extended_code.into()),
            Some(msg.clone()),
        ),
        rusqlite::Error::InvalidParameterCount(..) | rusqlite::Error::InvalidParameterName(_) => {
            ErrorInfo::new("HY093", None, Some(err.to_string()))
        }
        other => ErrorInfo::new(SQLSTATE_GENERAL_ERROR, None, Some(other.to_string())),
    }
}

/// Maps a configured charset onto a SQLite text encoding.
fn sqlite_encoding(charset: &str) -> Result<&'static str> {
    match charset.to_ascii_lowercase().replace('-', "").as_str() {
        "utf8" | "utf8mb4" => Ok("UTF-8"),
        "utf16" | "utf16le" => Ok("UTF-16le"),
        "utf16be" => Ok("UTF-16be"),
        other => Err(SteadyError::Config(format!("unsupported charset for SQLite: {}", other))),
    }
}

/// Opens SQLite databases. `Config::database` is the file path (or `:memory:`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    type Connection = SqliteConnection;

    fn connect(&self, config: &Config) -> Result<SqliteConnection> {
        config.validate()?;
        let encoding = sqlite_encoding(&config.charset)?;

        let conn = Connection::open(&config.database)
            .map_err(|e| SteadyError::Connection(format!("{}: {}", config.database, e)))?;

        // Encoding only takes effect on a freshly created database file
        conn.execute_batch(&format!(
            "PRAGMA encoding = '{}';
             PRAGMA foreign_keys = ON;",
            encoding
        ))
        .map_err(|e| SteadyError::Connection(format!("{}: {}", config.database, e)))?;

        debug!(database = %config.database, encoding, "opened SQLite connection");
        Ok(SqliteConnection {
            conn,
            last_error: ErrorInfo::success(),
        })
    }
}

/// A live SQLite connection plus the error tuple of its most recent call.
#[derive(Debug)]
pub struct SqliteConnection {
    conn: Connection,
    last_error: ErrorInfo,
}

impl SqliteConnection {
    fn run_batch(&mut self, sql: &str) -> bool {
        match self.conn.execute_batch(sql) {
            Ok(()) => {
                self.last_error = ErrorInfo::success();
                true
            }
            Err(e) => {
                self.last_error = error_info_from(&e);
                false
            }
        }
    }
}

/// Columns, buffered rows and affected-row count of one executed statement.
#[derive(Debug, Default)]
struct Outcome {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    affected: u64,
}

/// Connection-wide count of modified rows.
fn total_changes(conn: &Connection) -> rusqlite::Result<i64> {
    conn.prepare_cached("SELECT total_changes()")?.query_row([], |row| row.get(0))
}

/// Runs a compiled statement and buffers its columns and rows.
///
/// `changes()` is left untouched by DDL, so it only counts when the
/// connection-wide total moved.
fn run_statement(conn: &Connection, stmt: &mut rusqlite::Statement<'_>, params: &[Value]) -> rusqlite::Result<Outcome> {
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let column_count = columns.len();
    let before = total_changes(conn)?;

    let mut rows = Vec::new();
    let mut cursor = stmt.query(params_from_iter(params.iter()))?;
    while let Some(row) = cursor.next()? {
        let values = (0..column_count)
            .map(|i| row.get_ref(i).map(Value::from))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.push(values);
    }
    drop(cursor);

    let affected = if column_count == 0 && total_changes(conn)? > before {
        conn.changes()
    } else {
        0
    };
    Ok(Outcome { columns, rows, affected })
}

/// Runs every statement of `sql` in order.
///
/// The result set is the last statement's; affected rows are summed.
fn run_script(conn: &Connection, sql: &str) -> rusqlite::Result<Outcome> {
    let mut batch = Batch::new(conn, sql);
    let mut outcome = Outcome::default();
    while let Some(mut stmt) = batch.next()? {
        let current = run_statement(conn, &mut stmt, &[])?;
        outcome = Outcome {
            affected: outcome.affected + current.affected,
            ..current
        };
    }
    Ok(outcome)
}

/// Whether `sql` holds more than one statement.
fn has_trailing_statements(conn: &Connection, sql: &str) -> bool {
    let mut batch = Batch::new(conn, sql);
    let _first = batch.next();
    !matches!(batch.next(), Ok(None))
}

impl DriverConnection for SqliteConnection {
    fn query(&mut self, sql: &str) -> Option<Statement> {
        self.last_error = ErrorInfo::success();
        match run_script(&self.conn, sql) {
            Ok(outcome) => {
                let mut statement = Statement::with_results(sql, outcome.columns, outcome.rows);
                statement.set_affected_rows(outcome.affected);
                Some(statement)
            }
            Err(e) => {
                self.last_error = error_info_from(&e);
                None
            }
        }
    }

    fn exec(&mut self, sql: &str) -> Option<u64> {
        self.last_error = ErrorInfo::success();
        match run_script(&self.conn, sql) {
            Ok(outcome) => Some(outcome.affected),
            Err(e) => {
                self.last_error = error_info_from(&e);
                None
            }
        }
    }

    fn prepare(&mut self, sql: &str) -> Option<Statement> {
        self.last_error = ErrorInfo::success();
        if let Err(e) = self.conn.prepare_cached(sql) {
            self.last_error = error_info_from(&e);
            return None;
        }
        if has_trailing_statements(&self.conn, sql) {
            self.last_error = ErrorInfo::new(
                "42000",
                None,
                Some("prepared statements take a single SQL statement".to_string()),
            );
            return None;
        }
        Some(Statement::prepared(sql))
    }

    fn execute(&mut self, statement: &mut Statement, params: &[Value]) -> bool {
        self.last_error = ErrorInfo::success();
        let result = self
            .conn
            .prepare_cached(statement.sql())
            .and_then(|mut stmt| run_statement(&self.conn, &mut stmt, params));

        match result {
            Ok(outcome) => {
                statement.set_results(outcome.columns, outcome.rows);
                statement.set_affected_rows(outcome.affected);
                statement.set_error(ErrorInfo::success());
                true
            }
            Err(e) => {
                statement.set_error(error_info_from(&e));
                false
            }
        }
    }

    fn quote(&mut self, value: &Value, param_type: ParamType) -> Option<String> {
        self.last_error = ErrorInfo::success();
        let quoted = match (value, param_type) {
            (Value::Null, _) | (_, ParamType::Null) => "NULL".to_string(),
            (Value::Integer(i), ParamType::Int | ParamType::Bool) => i.to_string(),
            (Value::Real(f), ParamType::Int) => f.to_string(),
            (Value::Blob(b), ParamType::Lob) => {
                let hex: String = b.iter().map(|byte| format!("{:02X}", byte)).collect();
                format!("X'{}'", hex)
            }
            (other, _) => format!("'{}'", other.to_string().replace('\'', "''")),
        };
        Some(quoted)
    }

    fn last_insert_id(&mut self) -> String {
        self.last_error = ErrorInfo::success();
        self.conn.last_insert_rowid().to_string()
    }

    fn begin_transaction(&mut self) -> bool {
        self.run_batch("BEGIN")
    }

    fn commit(&mut self) -> bool {
        self.run_batch("COMMIT")
    }

    fn roll_back(&mut self) -> bool {
        self.run_batch("ROLLBACK")
    }

    fn error_info(&self) -> ErrorInfo {
        self.last_error.clone()
    }

    fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| SteadyError::Database(e))
    }
}

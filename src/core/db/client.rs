/// Client Module
///
/// The public operation set. Every operation resets the error tuple, routes
/// through the [`CommandProxy`] and reports failure through sentinels plus
/// [`Client::current_error`] rather than `Err` values.

use super::connection::ConnectionManager;
use super::driver::{Driver, DriverConnection, Statement};
use super::error_state::ErrorInfo;
use super::proxy::{Command, CommandOutput, CommandProxy};
use super::sqlite::SqliteDriver;
use super::value::{FetchMode, ParamType, Quotable, Row, Value};
use crate::config::Config;
use crate::core::Result;
use tracing::debug;

/// Transaction control accepted by [`Client::transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionAction {
    Begin,
    Commit,
    RollBack,
}

impl TransactionAction {
    /// `C`/`COMMIT` commit, `R`/`ROLLBACK` roll back, anything else begins.
    pub fn parse(action: &str) -> Self {
        match action.trim().to_ascii_uppercase().as_str() {
            "C" | "COMMIT" => TransactionAction::Commit,
            "R" | "ROLLBACK" => TransactionAction::RollBack,
            _ => TransactionAction::Begin,
        }
    }

    fn command(self) -> Command {
        match self {
            TransactionAction::Begin => Command::BeginTransaction,
            TransactionAction::Commit => Command::Commit,
            TransactionAction::RollBack => Command::RollBack,
        }
    }
}

/// A resilient database client owning exactly one connection.
///
/// Not meant for concurrent use; wrap it in a `Mutex` or use one client per
/// thread, since a reconnect replaces the connection in place.
///
/// # Examples
///
/// ```no_run
/// use steadyql::config::Config;
/// use steadyql::core::db::Client;
///
/// let mut client = Client::new(Config::new("app.db").with_lazy(true))?;
/// let id = client.insert("INSERT INTO t(x) VALUES (1)");
/// if id.is_empty() {
///     eprintln!("insert failed: {}", client.current_error());
/// }
/// # Ok::<(), steadyql::core::SteadyError>(())
/// ```
pub struct Client<D: Driver = SqliteDriver> {
    proxy: CommandProxy<D>,
    error: ErrorInfo,
}

impl Client<SqliteDriver> {
    /// Creates a SQLite-backed client.
    pub fn new(config: Config) -> Result<Self> {
        Client::with_driver(SqliteDriver, config)
    }
}

impl<D: Driver> Client<D> {
    /// Creates a client on top of `driver`.
    ///
    /// Connects immediately unless `config.lazy` is set.
    ///
    /// # Errors
    ///
    /// Returns the configuration or connection error when an eager connect fails.
    pub fn with_driver(driver: D, config: Config) -> Result<Self> {
        config.validate()?;
        let lazy = config.lazy;
        let mut proxy = CommandProxy::new(ConnectionManager::new(driver, config));
        if !lazy {
            proxy.manager_mut().connect(false)?;
        }
        Ok(Client {
            proxy,
            error: ErrorInfo::success(),
        })
    }

    pub fn config(&self) -> &Config {
        self.proxy.config()
    }

    pub fn is_connected(&self) -> bool {
        self.proxy.manager().is_connected()
    }

    /// Establishes the connection, replacing the current one when `force` is set.
    pub fn connect(&mut self, force: bool) -> Result<()> {
        self.error = ErrorInfo::success();
        self.proxy.manager_mut().connect(force)
    }

    /// Error tuple of the most recent operation.
    pub fn current_error(&self) -> ErrorInfo {
        self.error.clone()
    }

    /// Records the tuple an operation ended with.
    ///
    /// When neither the driver code nor the message was captured and the call
    /// reached the connection, the connection is asked for its own error state.
    fn settle(&mut self, error: ErrorInfo, reached_connection: bool) {
        self.error = match self.proxy.manager().connection() {
            Some(conn) if reached_connection && !error.has_details() => conn.error_info(),
            _ => error,
        };
    }

    fn run(&mut self, command: &Command) -> CommandOutput {
        self.error = ErrorInfo::success();
        let (output, error) = self.proxy.invoke(command);
        self.settle(error, true);
        output
    }

    /// Forwards a named driver operation.
    ///
    /// Unknown operations are logged and return [`CommandOutput::None`].
    pub fn call(&mut self, name: &str, args: &[Value]) -> CommandOutput {
        self.error = ErrorInfo::success();
        let (output, error) = self.proxy.invoke_named(name, args);
        let reached_connection = !output.is_none();
        self.settle(error, reached_connection);
        output
    }

    fn query_statement(&mut self, sql: &str) -> Option<Statement> {
        self.run(&Command::Query { sql: sql.to_string() }).into_statement()
    }

    /// Fetches the first row of `sql`.
    ///
    /// Returns the empty row when the query matched nothing or failed; check
    /// [`current_error`](Self::current_error) to tell the two apart.
    pub fn get_row(&mut self, sql: &str, mode: FetchMode) -> Row {
        match self.query_statement(sql) {
            Some(mut statement) => statement.fetch(mode).unwrap_or_default(),
            None => Row::empty(),
        }
    }

    /// Fetches every row of `sql`; empty on failure.
    pub fn get_rows(&mut self, sql: &str, mode: FetchMode) -> Vec<Row> {
        match self.query_statement(sql) {
            Some(mut statement) => statement.fetch_all(mode),
            None => Vec::new(),
        }
    }

    /// Runs an insert and returns the generated identifier, or `""` on failure.
    pub fn insert(&mut self, sql: &str) -> String {
        if self.query_statement(sql).is_none() {
            return String::new();
        }
        // Read from the connection that ran the insert, bypassing the retry loop
        match self.proxy.manager_mut().connection_mut() {
            Some(conn) => conn.last_insert_id(),
            None => String::new(),
        }
    }

    /// Runs a data-modifying statement directly.
    ///
    /// Returns the affected-row count, or `-1` when execution failed.
    pub fn update(&mut self, sql: &str) -> i64 {
        match self.run(&Command::Exec { sql: sql.to_string() }).into_affected() {
            Some(count) => i64::try_from(count).unwrap_or(i64::MAX),
            None => -1,
        }
    }

    /// Same as [`update`](Self::update).
    pub fn delete(&mut self, sql: &str) -> i64 {
        self.update(sql)
    }

    /// Prepares `sql` and executes it with `params`.
    ///
    /// `None` when preparing failed (error from the connection). An execution
    /// failure still returns the statement, with the error taken from it.
    pub fn execute_prepared(&mut self, sql: &str, params: &[Value]) -> Option<Statement> {
        self.run(&Command::Prepared {
            sql: sql.to_string(),
            params: params.to_vec(),
        })
        .into_statement()
    }

    /// Runs `sql` directly when `params` is empty, otherwise as a prepared statement.
    pub fn exec(&mut self, sql: &str, params: &[Value]) -> Option<Statement> {
        if params.is_empty() {
            self.query_statement(sql)
        } else {
            self.execute_prepared(sql, params)
        }
    }

    /// Identifier generated by the last insert on the current connection.
    pub fn last_insert_id(&mut self) -> String {
        self.error = ErrorInfo::success();
        match self.proxy.manager_mut().connection_mut() {
            Some(conn) => {
                let id = conn.last_insert_id();
                self.error = conn.error_info();
                id
            }
            None => {
                self.error = ErrorInfo::connection_failed("not connected");
                String::new()
            }
        }
    }

    /// Quotes a value, or a list of values joined with `", "`, for literal
    /// interpolation into SQL. Null renders as `NULL`.
    ///
    /// Returns `None` only when no connection could be established.
    pub fn quote(&mut self, value: impl Into<Quotable>, param_type: ParamType) -> Option<String> {
        self.error = ErrorInfo::success();
        if let Err(info) = self.proxy.ensure_connected() {
            self.error = info;
            return None;
        }

        match value.into() {
            Quotable::Scalar(value) => self.quote_one(value, param_type),
            Quotable::List(values) => {
                let mut quoted = Vec::with_capacity(values.len());
                for value in values {
                    quoted.push(self.quote_one(value, param_type)?);
                }
                Some(quoted.join(", "))
            }
        }
    }

    fn quote_one(&mut self, value: Value, param_type: ParamType) -> Option<String> {
        if value.is_null() {
            return Some("NULL".to_string());
        }
        // Never retried, quoting has no transient failure mode
        self.run(&Command::Quote { value, param_type }).into_quoted()
    }

    /// Begins, commits or rolls back a transaction; see [`TransactionAction::parse`].
    pub fn transaction(&mut self, action: &str) -> bool {
        let action = TransactionAction::parse(action);
        debug!(?action, "transaction");
        self.run(&action.command()).into_flag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{temp_database, Faults, FlakyDriver};

    const SCHEMA: &str = "CREATE TABLE t (id INTEGER PRIMARY KEY, x INTEGER, label TEXT UNIQUE)";

    fn client(lazy: bool) -> (tempfile::TempDir, Faults, Client<FlakyDriver>) {
        let driver = FlakyDriver::new();
        let faults = driver.faults();
        let (dir, config) = temp_database(lazy);
        let client = Client::with_driver(driver, config).unwrap();
        (dir, faults, client)
    }

    fn seeded(lazy: bool) -> (tempfile::TempDir, Faults, Client<FlakyDriver>) {
        let (dir, faults, mut client) = client(lazy);
        assert_eq!(client.update(SCHEMA), 0);
        assert_eq!(client.update("INSERT INTO t (x, label) VALUES (10, 'a'), (20, 'b')"), 2);
        (dir, faults, client)
    }

    #[test]
    fn test_lazy_client_defers_connection() {
        let (_dir, faults, mut client) = client(true);
        assert!(!client.is_connected());
        assert_eq!(faults.connects(), 0);

        client.update(SCHEMA);
        assert!(client.is_connected());
        assert_eq!(faults.connects(), 1);
    }

    #[test]
    fn test_eager_client_connects_at_construction() {
        let (_dir, faults, client) = client(false);
        assert!(client.is_connected());
        assert_eq!(faults.connects(), 1);
    }

    #[test]
    fn test_eager_connect_failure_is_fatal() {
        let result = Client::new(Config::new("/nonexistent/dir/app.db"));
        assert!(result.is_err());

        // A lazy client only finds out on first use
        let mut client = Client::new(Config::new("/nonexistent/dir/app.db").with_lazy(true)).unwrap();
        assert!(client.get_row("SELECT 1", FetchMode::Num).is_empty());
        assert_eq!(client.current_error().sql_state, "08001");
    }

    #[test]
    fn test_success_tuple_after_every_operation() {
        let (_dir, _faults, mut client) = seeded(true);

        client.get_row("SELECT * FROM t", FetchMode::Both);
        assert_eq!(client.current_error(), ErrorInfo::success());
        client.get_rows("SELECT * FROM t", FetchMode::Both);
        assert_eq!(client.current_error(), ErrorInfo::success());
        client.insert("INSERT INTO t (x) VALUES (1)");
        assert_eq!(client.current_error(), ErrorInfo::success());
        client.update("UPDATE t SET x = x + 1");
        assert_eq!(client.current_error(), ErrorInfo::success());
        client.execute_prepared("SELECT * FROM t WHERE x > ?1", &[Value::Integer(0)]);
        assert_eq!(client.current_error(), ErrorInfo::success());
        client.quote("abc", ParamType::Str);
        assert_eq!(client.current_error(), ErrorInfo::success());
    }

    #[test]
    fn test_get_row_without_match_is_not_an_error() {
        let (_dir, _faults, mut client) = seeded(false);
        let row = client.get_row("SELECT * FROM t WHERE x = 999", FetchMode::Assoc);
        assert!(row.is_empty());
        assert!(client.current_error().is_success());

        let row = client.get_row("SELECT x, label FROM t ORDER BY id", FetchMode::Assoc);
        assert_eq!(row.get("x"), Some(&Value::Integer(10)));
        assert_eq!(row.get("label"), Some(&Value::from("a")));
    }

    #[test]
    fn test_get_row_failure_records_error() {
        let (_dir, _faults, mut client) = seeded(false);
        assert!(client.get_row("SELECT * FROM nope", FetchMode::Both).is_empty());
        assert_eq!(client.current_error().sql_state, "42S02");

        assert!(client.get_rows("SELEKT", FetchMode::Both).is_empty());
        assert_eq!(client.current_error().sql_state, "42000");
    }

    #[test]
    fn test_update_distinguishes_zero_rows_from_failure() {
        let (_dir, _faults, mut client) = seeded(false);
        assert_eq!(client.delete("DELETE FROM t WHERE 1=0"), 0);
        assert!(client.current_error().is_success());
        assert_eq!(client.update("UPDATE t SET x = 0"), 2);
        assert_eq!(client.update("UPDATE nowhere SET"), -1);
        assert!(!client.current_error().is_success());
    }

    #[test]
    fn test_insert_returns_generated_id() {
        let (_dir, _faults, mut client) = seeded(false);
        assert_eq!(client.insert("INSERT INTO t (x) VALUES (30)"), "3");
        assert_eq!(client.last_insert_id(), "3");

        assert_eq!(client.insert("INSERT INTO t (label) VALUES ('a')"), "");
        assert_eq!(client.current_error().sql_state, "23000");
    }

    #[test]
    fn test_lazy_insert_survives_dropped_connection() {
        let (_dir, faults, mut client) = client(true);
        client.update(SCHEMA);

        // The server silently closed the idle connection
        faults.fail_next(1);
        let id = client.insert("INSERT INTO t(x) VALUES (1)");
        assert_eq!(id, "1");
        assert!(client.current_error().is_success());
        assert_eq!(faults.connects(), 2);
    }

    #[test]
    fn test_exhausted_retries_surface_last_failure() {
        let (_dir, faults, mut client) = seeded(false);
        faults.fail_next(11);
        assert_eq!(client.update("UPDATE t SET x = 1"), -1);
        let error = client.current_error();
        assert!(error.is_transient());
        assert_eq!(error.message.as_deref(), Some("MySQL server has gone away"));
        assert_eq!(faults.connects(), 11);
    }

    #[test]
    fn test_execute_prepared_error_sources() {
        let (_dir, _faults, mut client) = seeded(false);

        let mut statement = client
            .execute_prepared("SELECT label FROM t WHERE x = ?1", &[Value::Integer(20)])
            .unwrap();
        let row = statement.fetch(FetchMode::Num).unwrap();
        assert_eq!(row.get(0), Some(&Value::from("b")));

        // Prepare failure: no statement, error from the connection
        assert!(client.execute_prepared("SELECT * FROM nope WHERE x = ?1", &[Value::Integer(1)]).is_none());
        assert_eq!(client.current_error().sql_state, "42S02");

        // Execute failure: statement returned, error from the statement
        let statement = client
            .execute_prepared("INSERT INTO t (label) VALUES (?1)", &[Value::from("a")])
            .unwrap();
        assert_eq!(statement.error_info().sql_state, "23000");
        assert_eq!(client.current_error().sql_state, "23000");
    }

    #[test]
    fn test_exec_dispatches_on_params() {
        let (_dir, _faults, mut client) = seeded(false);
        let mut direct = client.exec("SELECT COUNT(*) FROM t", &[]).unwrap();
        assert_eq!(direct.fetch(FetchMode::Num).unwrap().get(0), Some(&Value::Integer(2)));

        let mut bound = client.exec("SELECT COUNT(*) FROM t WHERE x > ?1", &[Value::Integer(15)]).unwrap();
        assert_eq!(bound.fetch(FetchMode::Num).unwrap().get(0), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_quote_null_and_lists() {
        let (_dir, _faults, mut client) = client(true);
        assert_eq!(client.quote(Value::Null, ParamType::Str).as_deref(), Some("NULL"));
        assert_eq!(
            client
                .quote(vec![Value::from(1), Value::from("a"), Value::Null], ParamType::Str)
                .as_deref(),
            Some("'1', 'a', NULL")
        );
        assert_eq!(client.quote("O'Brien", ParamType::Str).as_deref(), Some("'O''Brien'"));
        assert!(client.is_connected());
    }

    #[test]
    fn test_quote_is_never_retried() {
        let (_dir, faults, mut client) = client(false);
        faults.fail_next(1);
        assert_eq!(client.quote("x", ParamType::Str).as_deref(), Some("'x'"));
        // The pending fault was not consumed by quoting
        assert_eq!(faults.injected(), 0);
        assert_eq!(faults.connects(), 1);
    }

    #[test]
    fn test_transaction_actions() {
        assert_eq!(TransactionAction::parse("c"), TransactionAction::Commit);
        assert_eq!(TransactionAction::parse("COMMIT"), TransactionAction::Commit);
        assert_eq!(TransactionAction::parse("r"), TransactionAction::RollBack);
        assert_eq!(TransactionAction::parse("rollback"), TransactionAction::RollBack);
        assert_eq!(TransactionAction::parse("begin"), TransactionAction::Begin);
        assert_eq!(TransactionAction::parse(""), TransactionAction::Begin);

        let (_dir, _faults, mut client) = seeded(false);
        assert!(client.transaction("begin"));
        client.update("DELETE FROM t");
        assert!(client.transaction("R"));
        assert_eq!(client.get_rows("SELECT * FROM t", FetchMode::Num).len(), 2);

        assert!(!client.transaction("COMMIT"));
        assert!(!client.current_error().is_success());
    }

    #[test]
    fn test_current_error_falls_back_to_connection() {
        let (_dir, _faults, mut client) = seeded(false);
        client.get_row("SELECT 1", FetchMode::Num);
        // Stored tuple has no details, so the live connection answers
        assert!(!client.current_error().has_details());
        assert!(client.current_error().is_success());
    }

    #[test]
    fn test_operations_without_driver_call_leave_success() {
        let (_dir, _faults, mut client) = seeded(false);
        assert_eq!(client.update("UPDATE nowhere SET x = 1"), -1);
        assert_eq!(client.current_error().sql_state, "42S02");

        assert_eq!(client.quote(Value::Null, ParamType::Str).as_deref(), Some("NULL"));
        assert_eq!(client.current_error(), ErrorInfo::success());

        client.update("UPDATE nowhere SET x = 1");
        assert_eq!(client.quote(Vec::<Value>::new(), ParamType::Str).as_deref(), Some(""));
        assert_eq!(client.current_error(), ErrorInfo::success());

        client.update("UPDATE nowhere SET x = 1");
        assert!(client.call("nosuchop", &[]).is_none());
        assert_eq!(client.current_error(), ErrorInfo::success());
    }

    #[test]
    fn test_last_insert_id_without_connection() {
        let (_dir, faults, mut client) = client(true);
        assert_eq!(client.last_insert_id(), "");
        assert_eq!(client.current_error().sql_state, "08001");
        assert_eq!(faults.connects(), 0);
    }

    #[test]
    fn test_nested_begin_keeps_open_transaction() {
        let (_dir, faults, mut client) = seeded(false);
        assert!(client.transaction("BEGIN"));
        assert_eq!(client.update("INSERT INTO t (x) VALUES (30)"), 1);

        assert!(!client.transaction("BEGIN"));
        assert_eq!(client.current_error().sql_state, "25000");
        assert_eq!(faults.connects(), 1);

        assert!(client.transaction("COMMIT"));
        assert_eq!(client.get_rows("SELECT * FROM t", FetchMode::Num).len(), 3);
    }

    #[test]
    fn test_ddl_after_insert_affects_no_rows() {
        let (_dir, _faults, mut client) = seeded(false);
        assert_eq!(client.update("INSERT INTO t (x) VALUES (1), (2), (3)"), 3);
        assert_eq!(client.update("CREATE TABLE u (id INTEGER)"), 0);
    }

    #[test]
    fn test_multi_statement_update_runs_every_statement() {
        let (_dir, _faults, mut client) = seeded(false);
        assert_eq!(client.update("INSERT INTO t (x) VALUES (1); INSERT INTO t (x) VALUES (2)"), 2);
        assert!(client.current_error().is_success());
        assert_eq!(client.get_rows("SELECT * FROM t", FetchMode::Num).len(), 4);
    }

    #[test]
    fn test_call_forwards_named_operations() {
        let (_dir, _faults, mut client) = seeded(false);
        let statement = client
            .call("query", &[Value::from("SELECT x FROM t ORDER BY id")])
            .into_statement();
        assert!(statement.is_some());

        let output = client.call("setAttribute", &[Value::Integer(1), Value::Integer(2)]);
        assert!(output.is_none());
        assert!(client.current_error().is_success());
    }

    #[test]
    fn test_forced_reconnect_from_caller() {
        let (_dir, faults, mut client) = seeded(false);
        client.connect(false).unwrap();
        assert_eq!(faults.connects(), 1);
        client.connect(true).unwrap();
        assert_eq!(faults.connects(), 2);
        assert_eq!(client.get_rows("SELECT * FROM t", FetchMode::Assoc).len(), 2);
    }
}

/// # Test Utilities Module
///
/// Fixtures for exercising the reconnect-and-retry engine:
/// - Temporary on-disk databases that survive a forced reconnect
/// - `FlakyDriver`, a SQLite driver wrapper that injects `HY000` failures
///   ("server has gone away") and counts connects and closes

use crate::config::Config;
use crate::core::db::{
    Driver, DriverConnection, ErrorInfo, ParamType, SqliteConnection, SqliteDriver, Statement, Value,
};
use crate::core::{Result, SteadyError};
use std::cell::RefCell;
use std::rc::Rc;
use tempfile::TempDir;

/// Creates a configuration pointing at a fresh database file.
///
/// The `TempDir` must be kept alive for as long as the database is used.
pub fn temp_database(lazy: bool) -> (TempDir, Config) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("test.db");
    let config = Config::new(path.to_string_lossy().into_owned()).with_lazy(lazy);
    (dir, config)
}

#[derive(Debug, Default)]
struct FaultState {
    /// Remaining driver calls that fail with HY000
    pending_failures: u32,
    /// Calls that got an injected failure so far
    injected: u32,
    connects: u32,
    closes: u32,
    refuse_connections: bool,
}

/// Shared handle for scripting and inspecting a [`FlakyDriver`].
#[derive(Debug, Clone, Default)]
pub struct Faults {
    state: Rc<RefCell<FaultState>>,
}

impl Faults {
    /// Makes the next `count` retryable driver calls fail with HY000.
    pub fn fail_next(&self, count: u32) {
        self.state.borrow_mut().pending_failures = count;
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.state.borrow_mut().refuse_connections = refuse;
    }

    pub fn connects(&self) -> u32 {
        self.state.borrow().connects
    }

    pub fn closes(&self) -> u32 {
        self.state.borrow().closes
    }

    pub fn injected(&self) -> u32 {
        self.state.borrow().injected
    }

    fn take_failure(&self) -> bool {
        let mut state = self.state.borrow_mut();
        if state.pending_failures == 0 {
            return false;
        }
        state.pending_failures -= 1;
        state.injected += 1;
        true
    }
}

/// Driver that behaves like [`SqliteDriver`] except for scripted failures.
#[derive(Debug, Default)]
pub struct FlakyDriver {
    inner: SqliteDriver,
    faults: Faults,
}

impl FlakyDriver {
    pub fn new() -> Self {
        FlakyDriver::default()
    }

    pub fn faults(&self) -> Faults {
        self.faults.clone()
    }
}

impl Driver for FlakyDriver {
    type Connection = FlakyConnection;

    fn connect(&self, config: &Config) -> Result<FlakyConnection> {
        if self.faults.state.borrow().refuse_connections {
            return Err(SteadyError::Connection("Connection refused".to_string()));
        }
        let inner = self.inner.connect(config)?;
        self.faults.state.borrow_mut().connects += 1;
        Ok(FlakyConnection {
            inner,
            faults: self.faults.clone(),
            injected: None,
        })
    }
}

#[derive(Debug)]
pub struct FlakyConnection {
    inner: SqliteConnection,
    faults: Faults,
    injected: Option<ErrorInfo>,
}

impl FlakyConnection {
    /// Returns true when this call should fail, recording the failure.
    fn inject(&mut self) -> bool {
        self.injected = None;
        if self.faults.take_failure() {
            self.injected = Some(ErrorInfo::new(
                "HY000",
                Some(2006),
                Some("MySQL server has gone away".to_string()),
            ));
            return true;
        }
        false
    }
}

impl DriverConnection for FlakyConnection {
    fn query(&mut self, sql: &str) -> Option<Statement> {
        if self.inject() {
            return None;
        }
        self.inner.query(sql)
    }

    fn exec(&mut self, sql: &str) -> Option<u64> {
        if self.inject() {
            return None;
        }
        self.inner.exec(sql)
    }

    fn prepare(&mut self, sql: &str) -> Option<Statement> {
        if self.inject() {
            return None;
        }
        self.inner.prepare(sql)
    }

    fn execute(&mut self, statement: &mut Statement, params: &[Value]) -> bool {
        self.injected = None;
        self.inner.execute(statement, params)
    }

    fn quote(&mut self, value: &Value, param_type: ParamType) -> Option<String> {
        self.injected = None;
        self.inner.quote(value, param_type)
    }

    fn last_insert_id(&mut self) -> String {
        self.injected = None;
        self.inner.last_insert_id()
    }

    fn begin_transaction(&mut self) -> bool {
        if self.inject() {
            return false;
        }
        self.inner.begin_transaction()
    }

    fn commit(&mut self) -> bool {
        self.injected = None;
        self.inner.commit()
    }

    fn roll_back(&mut self) -> bool {
        self.injected = None;
        self.inner.roll_back()
    }

    fn error_info(&self) -> ErrorInfo {
        self.injected.clone().unwrap_or_else(|| self.inner.error_info())
    }

    fn close(self) -> Result<()> {
        self.faults.state.borrow_mut().closes += 1;
        self.inner.close()
    }
}

/// Command Proxy Module
///
/// Forwards an enumerated driver command to the live connection and applies
/// the reconnect-and-retry policy: while the call reports the generic `HY000`
/// status, the connection is replaced and the same command is sent again, at
/// most [`MAX_RETRIES`] times.

use super::connection::ConnectionManager;
use super::driver::{Driver, DriverConnection, Statement};
use super::error_state::ErrorInfo;
use super::value::{ParamType, Value};
use crate::config::Config;
use tracing::{debug, error, warn};

/// Upper bound on reconnect-and-retry attempts per command.
pub const MAX_RETRIES: u32 = 10;

/// The driver capabilities the client forwards.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Query { sql: String },
    Exec { sql: String },
    /// Prepare and execute with bound parameters
    Prepared { sql: String, params: Vec<Value> },
    Quote { value: Value, param_type: ParamType },
    LastInsertId,
    BeginTransaction,
    Commit,
    RollBack,
}

impl Command {
    /// Resolves a named operation and its arguments.
    ///
    /// Accepts camelCase and snake_case names. Returns `None` for unknown
    /// names and for arguments the operation cannot take.
    pub fn from_name(name: &str, args: &[Value]) -> Option<Command> {
        let normalized = name.replace('_', "").to_ascii_lowercase();
        let sql = || args.first().and_then(Value::as_str).map(str::to_string);

        match normalized.as_str() {
            "query" if args.len() == 1 => Some(Command::Query { sql: sql()? }),
            "exec" if args.len() == 1 => Some(Command::Exec { sql: sql()? }),
            "prepare" | "execute" | "execprepared" if !args.is_empty() => Some(Command::Prepared {
                sql: sql()?,
                params: args[1..].to_vec(),
            }),
            "quote" if args.len() == 1 => Some(Command::Quote {
                value: args[0].clone(),
                param_type: ParamType::default(),
            }),
            "lastinsertid" if args.is_empty() => Some(Command::LastInsertId),
            "begintransaction" | "begin" if args.is_empty() => Some(Command::BeginTransaction),
            "commit" if args.is_empty() => Some(Command::Commit),
            "rollback" if args.is_empty() => Some(Command::RollBack),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Query { .. } => "query",
            Command::Exec { .. } => "exec",
            Command::Prepared { .. } => "prepare",
            Command::Quote { .. } => "quote",
            Command::LastInsertId => "lastInsertId",
            Command::BeginTransaction => "beginTransaction",
            Command::Commit => "commit",
            Command::RollBack => "rollBack",
        }
    }

    /// Whether a fresh connection can make a failed call succeed.
    ///
    /// Commit and rollback belong to a transaction that a reconnect discards;
    /// quoting and reading the last insert id cannot fail transiently.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Command::Query { .. } | Command::Exec { .. } | Command::Prepared { .. } | Command::BeginTransaction
        )
    }
}

/// What a forwarded command produced.
#[derive(Debug, Clone)]
pub enum CommandOutput {
    /// No result: unknown operation or no usable connection
    None,
    Statement(Option<Statement>),
    Affected(Option<u64>),
    Quoted(Option<String>),
    Id(String),
    Flag(bool),
}

impl CommandOutput {
    pub fn is_none(&self) -> bool {
        matches!(self, CommandOutput::None)
    }

    pub fn into_statement(self) -> Option<Statement> {
        match self {
            CommandOutput::Statement(statement) => statement,
            _ => None,
        }
    }

    pub fn into_affected(self) -> Option<u64> {
        match self {
            CommandOutput::Affected(count) => count,
            _ => None,
        }
    }

    pub fn into_quoted(self) -> Option<String> {
        match self {
            CommandOutput::Quoted(quoted) => quoted,
            _ => None,
        }
    }

    pub fn into_flag(self) -> bool {
        matches!(self, CommandOutput::Flag(true))
    }
}

/// Sends a command once and captures the normalized error tuple.
fn dispatch<C: DriverConnection>(conn: &mut C, command: &Command) -> (CommandOutput, ErrorInfo) {
    match command {
        Command::Query { sql } => match conn.query(sql) {
            Some(statement) => {
                let error = ErrorInfo::merge(conn.error_info(), Some(statement.error_info()));
                (CommandOutput::Statement(Some(statement)), error)
            }
            None => (CommandOutput::Statement(None), conn.error_info()),
        },
        Command::Exec { sql } => {
            let affected = conn.exec(sql);
            (CommandOutput::Affected(affected), conn.error_info())
        }
        Command::Prepared { sql, params } => match conn.prepare(sql) {
            Some(mut statement) => {
                conn.execute(&mut statement, params);
                let error = ErrorInfo::merge(conn.error_info(), Some(statement.error_info()));
                (CommandOutput::Statement(Some(statement)), error)
            }
            None => (CommandOutput::Statement(None), conn.error_info()),
        },
        Command::Quote { value, param_type } => {
            let quoted = conn.quote(value, *param_type);
            (CommandOutput::Quoted(quoted), conn.error_info())
        }
        Command::LastInsertId => {
            let id = conn.last_insert_id();
            (CommandOutput::Id(id), conn.error_info())
        }
        Command::BeginTransaction => {
            let ok = conn.begin_transaction();
            (CommandOutput::Flag(ok), conn.error_info())
        }
        Command::Commit => {
            let ok = conn.commit();
            (CommandOutput::Flag(ok), conn.error_info())
        }
        Command::RollBack => {
            let ok = conn.roll_back();
            (CommandOutput::Flag(ok), conn.error_info())
        }
    }
}

/// Forwards commands to the managed connection with bounded retry.
pub struct CommandProxy<D: Driver> {
    manager: ConnectionManager<D>,
    max_retries: u32,
}

impl<D: Driver> CommandProxy<D> {
    pub fn new(manager: ConnectionManager<D>) -> Self {
        CommandProxy {
            manager,
            max_retries: MAX_RETRIES,
        }
    }

    pub fn manager(&self) -> &ConnectionManager<D> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ConnectionManager<D> {
        &mut self.manager
    }

    pub fn config(&self) -> &Config {
        self.manager.config()
    }

    /// Connects if there is no live connection yet.
    ///
    /// Returns the `08001` tuple when the connection cannot be established.
    pub fn ensure_connected(&mut self) -> std::result::Result<(), ErrorInfo> {
        self.manager.connect(false).map_err(|e| {
            error!(dsn = %self.manager.config().dsn(), error = %e, "unable to connect");
            ErrorInfo::connection_failed(e)
        })
    }

    /// Invokes `command`, reconnecting and retrying on transient failures.
    ///
    /// Returns the last output obtained and the final error tuple.
    pub fn invoke(&mut self, command: &Command) -> (CommandOutput, ErrorInfo) {
        if let Err(info) = self.ensure_connected() {
            return (CommandOutput::None, info);
        }

        let (mut output, mut info) = self.send(command);
        let mut attempts = 0;
        while info.is_transient() && command.is_retryable() && attempts < self.max_retries {
            attempts += 1;
            warn!(
                command = command.name(),
                attempt = attempts,
                error = %info,
                "transient failure, reconnecting"
            );

            if let Err(e) = self.manager.connect(true) {
                error!(command = command.name(), attempt = attempts, error = %e, "reconnect failed");
                return (output, ErrorInfo::connection_failed(e));
            }
            (output, info) = self.send(command);
        }

        if attempts > 0 {
            debug!(command = command.name(), attempts, success = info.is_success(), "retry loop finished");
        }
        (output, info)
    }

    /// Connects if needed, then resolves a named operation and invokes it.
    ///
    /// Unknown operations are logged and produce [`CommandOutput::None`]
    /// with the success tuple.
    pub fn invoke_named(&mut self, name: &str, args: &[Value]) -> (CommandOutput, ErrorInfo) {
        if let Err(info) = self.ensure_connected() {
            return (CommandOutput::None, info);
        }
        match Command::from_name(name, args) {
            Some(command) => self.invoke(&command),
            None => {
                warn!(operation = name, args = args.len(), "unsupported operation");
                (CommandOutput::None, ErrorInfo::success())
            }
        }
    }

    fn send(&mut self, command: &Command) -> (CommandOutput, ErrorInfo) {
        match self.manager.connection_mut() {
            Some(conn) => dispatch(conn, command),
            None => (CommandOutput::None, ErrorInfo::connection_failed("not connected")),
        }
    }
}

use crate::core::db::{Client, Driver, FetchMode, ParamType, Value};
use crate::core::Result;
use std::io::{BufRead, Write};

/// Represents a parsed REPL command.
#[derive(Debug, PartialEq)]
pub enum Command {
    Row(String),
    Insert(String),
    Update(String),
    Quote(String),
    Begin,
    Commit,
    Rollback,
    Error,
    Reconnect,
    Call { name: String, args: Vec<String> },
    Help,
    Quit,
    Sql(String),
    Unknown(String),
}

/// Parses a user input string into a corresponding `Command`.
///
/// If the input starts with a colon (`:`), it is interpreted as a command.
/// Otherwise, it is treated as a SQL query.
pub fn parse_command(input: &str) -> Command {
    let input = input.trim();
    let Some(trimmed) = input.strip_prefix(':') else {
        return Command::Sql(input.to_string());
    };
    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (trimmed, ""),
    };
    let with_arg = |build: fn(String) -> Command| {
        if rest.is_empty() {
            Command::Unknown(input.to_string())
        } else {
            build(rest.to_string())
        }
    };

    match name {
        "row" => with_arg(Command::Row),
        "insert" => with_arg(Command::Insert),
        "update" | "delete" => with_arg(Command::Update),
        "quote" => with_arg(Command::Quote),
        "begin" => Command::Begin,
        "commit" => Command::Commit,
        "rollback" => Command::Rollback,
        "error" => Command::Error,
        "reconnect" => Command::Reconnect,
        "call" => {
            let mut parts = rest.split_whitespace().map(String::from);
            match parts.next() {
                Some(name) => Command::Call {
                    name,
                    args: parts.collect(),
                },
                None => Command::Unknown(input.to_string()),
            }
        }
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(input.to_string()),
    }
}

/// Turns a REPL argument into a value: integers stay integers, `null` is NULL.
fn parse_value(arg: &str) -> Value {
    if arg.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    arg.parse::<i64>().map(Value::Integer).unwrap_or_else(|_| Value::from(arg))
}

const HELP: &str = "Available commands:
  <sql>               - Run a query and print all rows as JSON
  :row <sql>          - Print the first row only
  :insert <sql>       - Run an insert and print the generated id
  :update <sql>       - Run an update/delete and print the affected rows
  :quote <text>       - Quote text for literal use in SQL
  :begin | :commit | :rollback - Transaction control
  :error              - Show the error state of the last operation
  :reconnect          - Force a fresh connection
  :call <op> [args]   - Forward a named driver operation
  :help               - Show this help
  :quit               - Exit";

/// Runs the REPL over `input`, writing results to `output`, until `:quit` or EOF.
pub fn run_repl<D: Driver, R: BufRead, W: Write>(client: &mut Client<D>, input: R, mut output: W) -> Result<()> {
    writeln!(output, "Welcome to the steadyql REPL! Type :help for commands, :quit to exit.")?;

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let touches_database = match parse_command(&line) {
            Command::Quit => break,
            Command::Help => {
                writeln!(output, "{}", HELP)?;
                false
            }
            Command::Unknown(text) => {
                writeln!(output, "unknown command: {} (try :help)", text)?;
                false
            }
            Command::Sql(sql) => {
                let rows = client.get_rows(&sql, FetchMode::Assoc);
                for row in &rows {
                    writeln!(output, "{}", serde_json::to_string(row)?)?;
                }
                writeln!(output, "({} rows)", rows.len())?;
                true
            }
            Command::Row(sql) => {
                let row = client.get_row(&sql, FetchMode::Assoc);
                writeln!(output, "{}", serde_json::to_string(&row)?)?;
                true
            }
            Command::Insert(sql) => {
                let id = client.insert(&sql);
                writeln!(output, "last insert id: {}", id)?;
                true
            }
            Command::Update(sql) => {
                let affected = client.update(&sql);
                writeln!(output, "affected rows: {}", affected)?;
                true
            }
            Command::Quote(text) => {
                match client.quote(text, ParamType::Str) {
                    Some(quoted) => writeln!(output, "{}", quoted)?,
                    None => writeln!(output, "(no connection)")?,
                }
                true
            }
            Command::Begin => {
                writeln!(output, "{}", client.transaction("BEGIN"))?;
                true
            }
            Command::Commit => {
                writeln!(output, "{}", client.transaction("COMMIT"))?;
                true
            }
            Command::Rollback => {
                writeln!(output, "{}", client.transaction("ROLLBACK"))?;
                true
            }
            Command::Error => {
                writeln!(output, "{}", serde_json::to_string(&client.current_error())?)?;
                false
            }
            Command::Reconnect => {
                match client.connect(true) {
                    Ok(()) => writeln!(output, "reconnected")?,
                    Err(e) => writeln!(output, "reconnect failed: {}", e)?,
                }
                false
            }
            Command::Call { name, args } => {
                let args: Vec<Value> = args.iter().map(|arg| parse_value(arg)).collect();
                let result = client.call(&name, &args);
                writeln!(output, "{:?}", result)?;
                true
            }
        };

        let error = client.current_error();
        if touches_database && !error.is_success() {
            writeln!(output, "error: {}", error)?;
        }
    }

    Ok(())
}

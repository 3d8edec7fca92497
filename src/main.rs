use std::io;
use std::process::ExitCode;
use steadyql::config::{default_settings_path, load_settings, Config, Settings};
use steadyql::core::db::Client;
use steadyql::repl;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Resolves the settings from the first CLI argument: a `.toml` settings
/// file, a database path, or nothing (the default settings file).
fn resolve_settings(arg: Option<&str>) -> steadyql::Result<(Config, Option<String>)> {
    let settings = match arg {
        Some(path) if path.ends_with(".toml") => load_settings(path)?,
        Some(database) => return Ok((Config::new(database).with_lazy(true), None)),
        None => match default_settings_path().filter(|p| p.exists()) {
            Some(path) => load_settings(&path)?,
            None => Settings::from_toml_str("[connection]\ndatabase = \":memory:\"\n")?,
        },
    };
    let filter = settings.log_filter().map(str::to_string);
    Ok((settings.connection, filter))
}

fn init_logging(filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter.unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let (config, filter) = match resolve_settings(args.get(1).map(String::as_str)) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("Failed to load settings: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(filter.as_deref());

    info!(dsn = %config.dsn(), lazy = config.lazy, "starting steadyql");

    let mut client = match Client::new(config) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "failed to connect");
            eprintln!("Failed to connect to database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let stdin = io::stdin();
    match repl::run_repl(&mut client, stdin.lock(), io::stdout()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

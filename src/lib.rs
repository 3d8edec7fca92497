// Core infrastructure modules
pub mod config;
pub mod core;

// Command-line front end
pub mod repl;

#[cfg(test)]
mod test_utils;

pub use crate::config::Config;
pub use crate::core::db::{Client, ErrorInfo, FetchMode, ParamType, Row, Value};
pub use crate::core::{Result, SteadyError};

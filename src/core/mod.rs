/// Core Module for steadyql
///
/// This module contains the connection, retry and error-normalization engine
/// together with the crate-wide error type.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{Result, SteadyError};

/// Database Module
///
/// The resilient client engine, organized leaves first:
///
/// - **Values** (`value.rs`): column values, rows, fetch modes and quote hints
/// - **Error State** (`error_state.rs`): the normalized error tuple and its merge rule
/// - **Driver** (`driver.rs`): the transport traits and the statement object
/// - **SQLite** (`sqlite.rs`): the bundled `rusqlite` driver
/// - **Connection Management** (`connection.rs`): lazy connect and forced reconnect
/// - **Command Proxy** (`proxy.rs`): command forwarding with bounded reconnect-and-retry
/// - **Client** (`client.rs`): the public operation set
///
/// ## Error Handling
///
/// Only construction and explicit reconnects return `Err`. Every other
/// operation reports through `Client::current_error`.
pub mod client;
pub mod connection;
pub mod driver;
pub mod error_state;
pub mod proxy;
pub mod sqlite;
pub mod value;

pub use client::*;
pub use connection::*;
pub use driver::*;
pub use error_state::*;
pub use proxy::*;
pub use sqlite::*;
pub use value::*;

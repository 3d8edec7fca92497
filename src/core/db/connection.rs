/// Connection Management Module
///
/// Owns the single driver connection of a client: establishes it on demand,
/// replaces it on a forced reconnect and releases it on drop.

use super::driver::{Driver, DriverConnection};
use crate::config::Config;
use crate::core::Result;
use tracing::{debug, warn};

/// Connection manager for one logical connection
pub struct ConnectionManager<D: Driver> {
    driver: D,
    config: Config,
    /// Active connection (None before the first connect or after a failed reconnect)
    connection: Option<D::Connection>,
    /// Number of connections successfully established so far
    connects: u64,
}

impl<D: Driver> ConnectionManager<D> {
    /// Creates a manager without connecting.
    pub fn new(driver: D, config: Config) -> Self {
        ConnectionManager {
            driver,
            config,
            connection: None,
            connects: 0,
        }
    }

    /// Establishes the connection.
    ///
    /// Without `force` this is a no-op when a connection already exists. With
    /// `force` the current handle is closed first and a new one is opened.
    ///
    /// # Errors
    ///
    /// Returns the driver's error when the connection cannot be established.
    /// The manager is left disconnected in that case.
    pub fn connect(&mut self, force: bool) -> Result<()> {
        if self.connection.is_some() && !force {
            return Ok(());
        }

        self.disconnect();
        let connection = self.driver.connect(&self.config)?;
        self.connection = Some(connection);
        self.connects += 1;
        debug!(dsn = %self.config.dsn(), force, connects = self.connects, "connection established");
        Ok(())
    }

    /// Closes the current connection, if any.
    pub fn disconnect(&mut self) {
        if let Some(old) = self.connection.take() {
            if let Err(e) = old.close() {
                warn!(dsn = %self.config.dsn(), error = %e, "failed to close connection cleanly");
            }
        }
    }

    /// Checks if there's an active connection
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connection(&self) -> Option<&D::Connection> {
        self.connection.as_ref()
    }

    pub fn connection_mut(&mut self) -> Option<&mut D::Connection> {
        self.connection.as_mut()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connect_count(&self) -> u64 {
        self.connects
    }
}

impl<D: Driver> Drop for ConnectionManager<D> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

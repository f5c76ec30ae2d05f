//! Lifecycle and availability policy around a [`GraphDriver`].
//!
//! Reads degrade to empty results whenever storage is disabled, disconnected or
//! failing. Writes never pretend to succeed: they fail with
//! [`ConvographError::StorageUnavailable`] when storage cannot take them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::DatabaseSettings;
use crate::errors::{ConvographError, Result};
use crate::types::Row;

use super::{create_driver, Dialect, GraphDriver, Statement};

pub struct GraphDatabaseManager {
    driver: Arc<dyn GraphDriver>,
    enabled: bool,
    connected: AtomicBool,
}

impl GraphDatabaseManager {
    pub fn with_driver(driver: Arc<dyn GraphDriver>, enabled: bool) -> Self {
        Self {
            driver,
            enabled,
            connected: AtomicBool::new(false),
        }
    }

    pub fn from_settings(settings: &DatabaseSettings, enabled: bool) -> Result<Self> {
        Ok(Self::with_driver(create_driver(settings)?, enabled))
    }

    pub fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Connect the driver. A disabled manager logs and does nothing.
    pub async fn initialize(&self) -> Result<()> {
        if !self.enabled {
            info!("graph storage disabled; skipping connection");
            return Ok(());
        }
        if self.is_connected() {
            return Ok(());
        }
        self.driver.connect().await?;
        self.connected.store(true, Ordering::SeqCst);
        info!(dialect = ?self.dialect(), "graph storage connected");
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.driver.disconnect().await?;
            info!("graph storage disconnected");
        }
        Ok(())
    }

    fn available(&self) -> bool {
        self.enabled && self.is_connected()
    }

    fn require_available(&self) -> Result<()> {
        if !self.enabled {
            return Err(ConvographError::StorageUnavailable(
                "graph storage is disabled".to_string(),
            ));
        }
        if !self.is_connected() {
            return Err(ConvographError::StorageUnavailable(
                "graph storage is not connected".to_string(),
            ));
        }
        Ok(())
    }

    /// Run a read. Unavailable storage or a failing driver yields no rows.
    pub async fn execute_read(&self, statement: &Statement) -> Vec<Row> {
        if !self.available() {
            return Vec::new();
        }
        match self.driver.execute_read(statement).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "graph read failed; returning no rows");
                Vec::new()
            }
        }
    }

    pub async fn execute_write(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.require_available()?;
        self.driver.execute_write(statement).await
    }

    pub async fn execute_batch(&self, statements: &[Statement]) -> Result<Vec<Row>> {
        self.require_available()?;
        if statements.is_empty() {
            return Ok(Vec::new());
        }
        self.driver.execute_batch(statements).await
    }
}

//! Graph database driver abstraction.
//!
//! Defines the [`GraphDriver`] trait every backend implements, the [`Statement`]
//! unit they execute, and the config-keyed [`create_driver`] factory.
//!
//! Backends:
//! - [`neo4j::Neo4jDriver`]: Bolt via `neo4rs`, Cypher dialect
//! - [`arangodb::ArangoDriver`]: HTTP cursor API via `reqwest`, AQL dialect
//! - [`memory::MemoryDriver`]: in-process store for development and tests

pub mod arangodb;
pub mod manager;
pub mod memory;
pub mod neo4j;
pub mod statements;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{DatabaseSettings, GraphBackend};
use crate::errors::Result;
use crate::types::{Params, Row};

pub use arangodb::ArangoDriver;
pub use manager::GraphDatabaseManager;
pub use memory::MemoryDriver;
pub use neo4j::Neo4jDriver;

/// Query language a driver understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Cypher,
    Aql,
    /// Named commands interpreted by [`MemoryDriver`].
    Memory,
}

/// A query plus its named parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub query: String,
    pub params: Params,
}

impl Statement {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            params: Params::new(),
        }
    }

    /// Add a parameter, builder style.
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

/// Trait representing a graph database backend.
///
/// Implementations must be safe to share across concurrently running jobs; the
/// connection pool is the only state that crosses runs.
#[async_trait]
pub trait GraphDriver: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Open the connection pool and verify connectivity.
    async fn connect(&self) -> Result<()>;

    /// Close the connection pool.
    async fn disconnect(&self) -> Result<()>;

    async fn execute_read(&self, statement: &Statement) -> Result<Vec<Row>>;

    async fn execute_write(&self, statement: &Statement) -> Result<Vec<Row>>;

    /// Run statements in order as one unit where the backend supports it,
    /// returning the concatenated rows.
    async fn execute_batch(&self, statements: &[Statement]) -> Result<Vec<Row>>;
}

/// Build the configured backend. Nothing connects until [`GraphDriver::connect`].
pub fn create_driver(settings: &DatabaseSettings) -> Result<Arc<dyn GraphDriver>> {
    let driver: Arc<dyn GraphDriver> = match settings.backend {
        GraphBackend::Neo4j => Arc::new(Neo4jDriver::new(settings.clone())),
        GraphBackend::ArangoDb => Arc::new(ArangoDriver::new(settings.clone())?),
        GraphBackend::Memory => Arc::new(MemoryDriver::new()),
    };
    Ok(driver)
}

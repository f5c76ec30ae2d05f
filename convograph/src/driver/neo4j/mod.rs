//! Neo4j graph driver.
//!
//! Uses `neo4rs` 0.8 for async, pooled Bolt connections. Statement parameters
//! arrive as JSON and are converted to [`BoltType`] on the way out; rows come
//! back deserialized into JSON maps keyed by column name.

use std::collections::HashMap;

use async_trait::async_trait;
use neo4rs::{query, BoltNull, BoltType, ConfigBuilder, Graph, Query, Txn};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::DatabaseSettings;
use crate::errors::{ConvographError, Result};
use crate::types::Row;

use super::{Dialect, GraphDriver, Statement};

pub struct Neo4jDriver {
    settings: DatabaseSettings,
    graph: RwLock<Option<Graph>>,
}

impl Neo4jDriver {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self {
            settings,
            graph: RwLock::new(None),
        }
    }

    async fn graph(&self) -> Result<Graph> {
        self.graph.read().await.clone().ok_or_else(|| {
            ConvographError::StorageUnavailable("neo4j driver is not connected".to_string())
        })
    }

    async fn run(&self, statement: &Statement) -> Result<Vec<Row>> {
        let graph = self.graph().await?;
        let mut stream = graph
            .execute(to_query(statement))
            .await
            .map_err(ConvographError::storage)?;

        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.map_err(ConvographError::storage)? {
            rows.push(row.to::<Row>().map_err(ConvographError::storage)?);
        }
        Ok(rows)
    }
}

#[async_trait]
impl GraphDriver for Neo4jDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Cypher
    }

    async fn connect(&self) -> Result<()> {
        let config = ConfigBuilder::default()
            .uri(self.settings.url.as_str())
            .user(self.settings.username.as_str())
            .password(self.settings.password.as_str())
            .db(self.settings.name.as_str())
            .max_connections(self.settings.max_connection_pool_size)
            .build()
            .map_err(|e| ConvographError::Configuration(format!("neo4j config: {e}")))?;

        let graph = Graph::connect(config)
            .await
            .map_err(|e| ConvographError::StorageUnavailable(format!("neo4j connect: {e}")))?;

        // Verify the server answers before reporting success.
        let mut probe = graph
            .execute(query("RETURN 1 AS ok"))
            .await
            .map_err(|e| ConvographError::StorageUnavailable(format!("neo4j probe: {e}")))?;
        probe
            .next()
            .await
            .map_err(|e| ConvographError::StorageUnavailable(format!("neo4j probe: {e}")))?;

        *self.graph.write().await = Some(graph);
        info!(url = %self.settings.url, database = %self.settings.name, "connected to neo4j");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        // Dropping the last handle closes the pool.
        self.graph.write().await.take();
        Ok(())
    }

    async fn execute_read(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.run(statement).await
    }

    async fn execute_write(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.run(statement).await
    }

    /// Runs all statements in one explicit transaction; any failure rolls back.
    async fn execute_batch(&self, statements: &[Statement]) -> Result<Vec<Row>> {
        let graph = self.graph().await?;
        let mut txn = graph.start_txn().await.map_err(ConvographError::storage)?;

        match run_in_txn(&mut txn, statements).await {
            Ok(rows) => {
                txn.commit().await.map_err(ConvographError::storage)?;
                debug!(statements = statements.len(), rows = rows.len(), "neo4j batch committed");
                Ok(rows)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(error = %rollback_err, "failed to roll back neo4j transaction");
                }
                Err(e)
            }
        }
    }
}

async fn run_in_txn(txn: &mut Txn, statements: &[Statement]) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    for statement in statements {
        let mut stream = txn
            .execute(to_query(statement))
            .await
            .map_err(ConvographError::storage)?;
        while let Some(row) = stream
            .next(txn.handle())
            .await
            .map_err(ConvographError::storage)?
        {
            rows.push(row.to::<Row>().map_err(ConvographError::storage)?);
        }
    }
    Ok(rows)
}

fn to_query(statement: &Statement) -> Query {
    statement
        .params
        .iter()
        .fold(query(&statement.query), |q, (key, value)| {
            q.param(key, to_bolt(value))
        })
}

/// Convert a JSON parameter into its Bolt equivalent.
pub(crate) fn to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => (*b).into(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.into(),
            None => n.as_f64().unwrap_or_default().into(),
        },
        Value::String(s) => s.as_str().into(),
        Value::Array(items) => items.iter().map(to_bolt).collect::<Vec<BoltType>>().into(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), to_bolt(v)))
            .collect::<HashMap<String, BoltType>>()
            .into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_conversion() {
        assert!(matches!(to_bolt(&json!(null)), BoltType::Null(_)));
        assert!(matches!(to_bolt(&json!(true)), BoltType::Boolean(_)));
        assert!(matches!(to_bolt(&json!(3)), BoltType::Integer(_)));
        assert!(matches!(to_bolt(&json!(0.5)), BoltType::Float(_)));
        assert!(matches!(to_bolt(&json!("x")), BoltType::String(_)));
    }

    #[test]
    fn test_nested_conversion() {
        assert!(matches!(to_bolt(&json!([1, "a"])), BoltType::List(_)));
        assert!(matches!(to_bolt(&json!({"a": {"b": 1}})), BoltType::Map(_)));
    }

    #[tokio::test]
    async fn test_unconnected_driver_is_unavailable() {
        let driver = Neo4jDriver::new(DatabaseSettings::default());
        let err = driver
            .execute_read(&Statement::new("RETURN 1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvographError::StorageUnavailable(_)));
    }

    /// Needs a live server at `GRAPH_DATABASE_URL`.
    #[tokio::test]
    #[ignore]
    async fn test_failed_batch_rolls_back_earlier_statements() {
        let mut settings = DatabaseSettings::default();
        if let Ok(url) = std::env::var("GRAPH_DATABASE_URL") {
            settings.url = url;
        }
        let driver = Neo4jDriver::new(settings);
        driver.connect().await.unwrap();

        let marker = format!("rollback-{}", uuid::Uuid::new_v4());
        let err = driver
            .execute_batch(&[
                Statement::new("CREATE (:RollbackMarker {id: $id})").param("id", marker.as_str()),
                Statement::new("THIS IS NOT CYPHER"),
            ])
            .await;
        assert!(err.is_err());

        let rows = driver
            .execute_read(
                &Statement::new("MATCH (m:RollbackMarker {id: $id}) RETURN count(m) AS n")
                    .param("id", marker.as_str()),
            )
            .await
            .unwrap();
        assert_eq!(rows[0]["n"], 0);
        driver.disconnect().await.unwrap();
    }
}

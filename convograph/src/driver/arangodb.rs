//! ArangoDB graph driver over the HTTP API.
//!
//! Queries go through the cursor API (`/_api/cursor`), following `hasMore`
//! pages. Batches run inside a stream transaction so a failing statement aborts
//! everything before it. Node labels map to document collections and
//! relationship types to edge collections; `connect` creates any that are
//! missing.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::DatabaseSettings;
use crate::errors::{ConvographError, Result};
use crate::types::{Params, Row};

use super::statements::{document_collections, edge_collections};
use super::{Dialect, GraphDriver, Statement};

const DOCUMENT_COLLECTION: u8 = 2;
const EDGE_COLLECTION: u8 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const TRANSACTION_HEADER: &str = "x-arango-trx-id";

#[derive(Debug, Deserialize)]
struct CursorResponse {
    #[serde(default)]
    result: Vec<Value>,
    #[serde(default, rename = "hasMore")]
    has_more: bool,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionResponse {
    result: TransactionId,
}

#[derive(Debug, Deserialize)]
struct TransactionId {
    id: String,
}

pub struct ArangoDriver {
    settings: DatabaseSettings,
    client: Client,
    connected: RwLock<bool>,
}

impl ArangoDriver {
    pub fn new(settings: DatabaseSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(settings.max_connection_pool_size)
            .build()
            .map_err(|e| ConvographError::Configuration(format!("arangodb client: {e}")))?;
        Ok(Self {
            settings,
            client,
            connected: RwLock::new(false),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/_db/{}{}",
            self.settings.url.trim_end_matches('/'),
            self.settings.name,
            path
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.endpoint(path))
            .basic_auth(&self.settings.username, Some(&self.settings.password))
    }

    async fn ensure_connected(&self) -> Result<()> {
        if *self.connected.read().await {
            Ok(())
        } else {
            Err(ConvographError::StorageUnavailable(
                "arangodb driver is not connected".to_string(),
            ))
        }
    }

    /// Send a request and decode the JSON body, mapping non-2xx replies to
    /// storage errors carrying ArangoDB's `errorMessage`.
    async fn send<T: serde::de::DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(ConvographError::storage)?;
        let status = response.status();
        let body = response.text().await.map_err(ConvographError::storage)?;
        if !status.is_success() {
            return Err(ConvographError::Storage(error_message(status, &body)));
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn ensure_collection(&self, name: &str, kind: u8) -> Result<()> {
        let response = self
            .request(Method::POST, "/_api/collection")
            .json(&json!({ "name": name, "type": kind }))
            .send()
            .await
            .map_err(|e| ConvographError::StorageUnavailable(format!("arangodb: {e}")))?;

        match response.status() {
            status if status.is_success() => {
                debug!(collection = name, "created collection");
                Ok(())
            }
            StatusCode::CONFLICT => Ok(()),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ConvographError::StorageUnavailable(error_message(status, &body)))
            }
        }
    }

    async fn cursor(&self, statement: &Statement, transaction: Option<&str>) -> Result<Vec<Row>> {
        let body = json!({
            "query": statement.query,
            "bindVars": Value::Object(statement.params.clone()),
        });
        let mut request = self.request(Method::POST, "/_api/cursor").json(&body);
        if let Some(id) = transaction {
            request = request.header(TRANSACTION_HEADER, id);
        }
        let mut page: CursorResponse = self.send(request).await?;

        let mut rows: Vec<Row> = page.result.drain(..).map(into_row).collect();
        while page.has_more {
            let Some(cursor_id) = page.id.clone() else {
                break;
            };
            let mut request = self.request(Method::PUT, &format!("/_api/cursor/{cursor_id}"));
            if let Some(id) = transaction {
                request = request.header(TRANSACTION_HEADER, id);
            }
            page = self.send(request).await?;
            rows.extend(page.result.drain(..).map(into_row));
        }
        Ok(rows)
    }

    async fn run_batch(&self, statements: &[Statement], transaction: &str) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        for statement in statements {
            rows.extend(self.cursor(statement, Some(transaction)).await?);
        }
        Ok(rows)
    }
}

#[async_trait]
impl GraphDriver for ArangoDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Aql
    }

    async fn connect(&self) -> Result<()> {
        let version: Value = self
            .send(self.request(Method::GET, "/_api/version"))
            .await
            .map_err(|e| ConvographError::StorageUnavailable(e.to_string()))?;

        for name in document_collections() {
            self.ensure_collection(name, DOCUMENT_COLLECTION).await?;
        }
        for name in edge_collections() {
            self.ensure_collection(name, EDGE_COLLECTION).await?;
        }

        *self.connected.write().await = true;
        info!(
            url = %self.settings.url,
            database = %self.settings.name,
            version = %version["version"],
            "connected to arangodb"
        );
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.connected.write().await = false;
        Ok(())
    }

    async fn execute_read(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.ensure_connected().await?;
        self.cursor(statement, None).await
    }

    async fn execute_write(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.ensure_connected().await?;
        self.cursor(statement, None).await
    }

    async fn execute_batch(&self, statements: &[Statement]) -> Result<Vec<Row>> {
        self.ensure_connected().await?;

        let mut write: Vec<&str> = document_collections();
        write.extend(edge_collections());
        let begin = self
            .request(Method::POST, "/_api/transaction/begin")
            .json(&json!({ "collections": { "write": write } }));
        let TransactionResponse {
            result: TransactionId { id },
        } = self.send(begin).await?;

        match self.run_batch(statements, &id).await {
            Ok(rows) => {
                let _: Value = self
                    .send(self.request(Method::PUT, &format!("/_api/transaction/{id}")))
                    .await?;
                debug!(statements = statements.len(), rows = rows.len(), "arangodb batch committed");
                Ok(rows)
            }
            Err(e) => {
                let abort = self
                    .send::<Value>(self.request(Method::DELETE, &format!("/_api/transaction/{id}")))
                    .await;
                if let Err(abort_err) = abort {
                    warn!(transaction = %id, error = %abort_err, "failed to abort arangodb transaction");
                }
                Err(e)
            }
        }
    }
}

fn into_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => {
            let mut row = Params::new();
            row.insert("value".to_string(), other);
            row
        }
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["errorMessage"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string());
    format!("arangodb HTTP {}: {detail}", status.as_u16())
}

//! In-process graph store.
//!
//! Interprets the named commands rendered by [`super::statements`] for
//! [`Dialect::Memory`]. Upsert semantics match the real backends: merging the
//! same node or relationship twice leaves one copy with overwritten properties.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::{ConvographError, Result};
use crate::types::{object, Params, Properties, Row};

use super::statements::{IMPORTED_CONCEPT_LABEL, IMPORTED_NODE_LABEL, IMPORTED_RELATION_TYPE};
use super::{Dialect, GraphDriver, Statement};

#[derive(Default)]
struct State {
    /// `(label, id)` → properties
    nodes: BTreeMap<(String, String), Properties>,
    /// `(type, from_id, to_id)` → properties
    relationships: BTreeMap<(String, String, String), Properties>,
    /// `(key, job_id)` → properties
    imported_nodes: HashMap<(String, String), Properties>,
    /// `(source_key, relation_key, target_key, job_id)` → properties
    imported_edges: HashMap<(String, String, String, String), Properties>,
    /// `(key, job_id)` → properties
    imported_concepts: HashMap<(String, String), Properties>,
}

#[derive(Default)]
pub struct MemoryDriver {
    state: Mutex<State>,
    connected: AtomicBool,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ConvographError::StorageUnavailable(
                "memory driver is not connected".to_string(),
            ))
        }
    }

    async fn run(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.ensure_connected()?;
        let p = &statement.params;
        let mut state = self.state.lock().await;

        let rows = match statement.query.as_str() {
            "merge_node" => {
                let key = (text(p, "label")?, text(p, "id")?);
                let now = text(p, "now")?;
                let props = props(p);
                let id = key.1.clone();
                upsert(state.nodes.entry(key).or_default(), props, &now);
                vec![row(json!({ "id": id }))]
            }
            "merge_relationship" => {
                let from = (text(p, "from_label")?, text(p, "from_id")?);
                let to = (text(p, "to_label")?, text(p, "to_id")?);
                if !state.nodes.contains_key(&from) || !state.nodes.contains_key(&to) {
                    Vec::new()
                } else {
                    let rel_type = text(p, "type")?;
                    let now = text(p, "now")?;
                    let key = (rel_type.clone(), from.1, to.1);
                    upsert(state.relationships.entry(key).or_default(), props(p), &now);
                    vec![row(json!({ "type": rel_type }))]
                }
            }
            "import_nodes" => {
                let job_id = text(p, "job_id")?;
                let now = text(p, "now")?;
                let mut written = 0u64;
                for item in batch(p) {
                    let Some(key) = item.get("key").and_then(Value::as_str) else {
                        continue;
                    };
                    let entry = state
                        .imported_nodes
                        .entry((key.to_string(), job_id.clone()))
                        .or_default();
                    upsert(entry, imported(item, &job_id, key), &now);
                    written += 1;
                }
                vec![row(json!({ "written": written }))]
            }
            "import_edges" => {
                let job_id = text(p, "job_id")?;
                let now = text(p, "now")?;
                let mut written = 0u64;
                for item in batch(p) {
                    let field = |name: &str| {
                        item.get(name)
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string()
                    };
                    let (source_key, target_key) = (field("source_key"), field("target_key"));
                    let both_imported = state
                        .imported_nodes
                        .contains_key(&(source_key.clone(), job_id.clone()))
                        && state
                            .imported_nodes
                            .contains_key(&(target_key.clone(), job_id.clone()));
                    if !both_imported {
                        continue;
                    }
                    let key = (source_key, field("relation_key"), target_key, job_id.clone());
                    let mut edge_props = object(item.clone());
                    edge_props.insert("job_id".to_string(), job_id.clone().into());
                    upsert(state.imported_edges.entry(key).or_default(), edge_props, &now);
                    written += 1;
                }
                vec![row(json!({ "written": written }))]
            }
            "import_concepts" => {
                let job_id = text(p, "job_id")?;
                let now = text(p, "now")?;
                let mut written = 0u64;
                for item in batch(p) {
                    let Some(key) = item.get("key").and_then(Value::as_str) else {
                        continue;
                    };
                    let entry = state
                        .imported_concepts
                        .entry((key.to_string(), job_id.clone()))
                        .or_default();
                    upsert(entry, imported(item, &job_id, key), &now);
                    written += 1;
                }
                vec![row(json!({ "written": written }))]
            }
            "count_nodes" => {
                let label = text(p, "label")?;
                let job_id = p.get("job_id").and_then(Value::as_str);
                let count = match label.as_str() {
                    IMPORTED_NODE_LABEL => count_job(state.imported_nodes.keys().map(|k| &k.1), job_id),
                    IMPORTED_CONCEPT_LABEL => {
                        count_job(state.imported_concepts.keys().map(|k| &k.1), job_id)
                    }
                    _ => state
                        .nodes
                        .iter()
                        .filter(|((l, _), props)| *l == label && job_matches(props, job_id))
                        .count(),
                };
                vec![row(json!({ "count": count }))]
            }
            "count_relationships" => {
                let rel_type = text(p, "type")?;
                let job_id = p.get("job_id").and_then(Value::as_str);
                let count = if rel_type == IMPORTED_RELATION_TYPE {
                    count_job(state.imported_edges.keys().map(|k| &k.3), job_id)
                } else {
                    state
                        .relationships
                        .iter()
                        .filter(|((t, _, _), props)| *t == rel_type && job_matches(props, job_id))
                        .count()
                };
                vec![row(json!({ "count": count }))]
            }
            "delete_job" => {
                let job_id = text(p, "job_id")?;
                let before = state.imported_nodes.len()
                    + state.imported_edges.len()
                    + state.imported_concepts.len();
                state.imported_nodes.retain(|k, _| k.1 != job_id);
                state.imported_edges.retain(|k, _| k.3 != job_id);
                state.imported_concepts.retain(|k, _| k.1 != job_id);
                let after = state.imported_nodes.len()
                    + state.imported_edges.len()
                    + state.imported_concepts.len();
                vec![row(json!({ "deleted": before - after }))]
            }
            "node_by_id" => {
                let key = (text(p, "label")?, text(p, "id")?);
                state
                    .nodes
                    .get(&key)
                    .map(|props| vec![row(json!({ "node": props }))])
                    .unwrap_or_default()
            }
            "conversation_overview" => {
                let id = text(p, "conversation_id")?;
                match state.nodes.get(&("Conversation".to_string(), id.clone())) {
                    Some(conv) => {
                        let outgoing = |rel: &str| {
                            state
                                .relationships
                                .keys()
                                .filter(|(t, from, _)| t == rel && *from == id)
                                .count()
                        };
                        let incoming = |rel: &str| {
                            state
                                .relationships
                                .keys()
                                .filter(|(t, _, to)| t == rel && *to == id)
                                .count()
                        };
                        vec![row(json!({
                            "id": id,
                            "duration": conv.get("duration"),
                            "language": conv.get("language"),
                            "segments": outgoing("CONTAINS"),
                            "speakers": incoming("SPEAKS_IN"),
                            "topics": conv.get("topic_count"),
                            "entities": conv.get("entity_count"),
                        }))]
                    }
                    None => Vec::new(),
                }
            }
            other => {
                return Err(ConvographError::Storage(format!(
                    "unknown memory command {other:?}"
                )))
            }
        };
        Ok(rows)
    }
}

#[async_trait]
impl GraphDriver for MemoryDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Memory
    }

    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        debug!("memory graph store ready");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn execute_read(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.run(statement).await
    }

    async fn execute_write(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.run(statement).await
    }

    async fn execute_batch(&self, statements: &[Statement]) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        for statement in statements {
            rows.extend(self.run(statement).await?);
        }
        Ok(rows)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn text(params: &Params, key: &str) -> Result<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ConvographError::Storage(format!("missing string parameter {key:?}")))
}

fn props(params: &Params) -> Properties {
    params
        .get("props")
        .cloned()
        .map(object)
        .unwrap_or_default()
}

fn batch(params: &Params) -> Vec<&Value> {
    params
        .get("batch")
        .and_then(Value::as_array)
        .map(|items| items.iter().collect())
        .unwrap_or_default()
}

fn imported(item: &Value, job_id: &str, key: &str) -> Properties {
    let mut props = object(item.clone());
    props.insert("key".to_string(), key.into());
    props.insert("job_id".to_string(), job_id.into());
    props.insert("source".to_string(), "bulk_import".into());
    props
}

fn upsert(target: &mut Properties, props: Properties, now: &str) {
    if target.is_empty() {
        target.insert("created_at".to_string(), now.into());
    }
    target.extend(props);
    target.insert("updated_at".to_string(), now.into());
}

fn job_matches(props: &Properties, job_id: Option<&str>) -> bool {
    job_id.map_or(true, |job| {
        props.get("job_id").and_then(Value::as_str) == Some(job)
    })
}

fn count_job<'a>(jobs: impl Iterator<Item = &'a String>, job_id: Option<&str>) -> usize {
    jobs.filter(|j| job_id.map_or(true, |job| j.as_str() == job))
        .count()
}

fn row(value: Value) -> Row {
    object(value)
}

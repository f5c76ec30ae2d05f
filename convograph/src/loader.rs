//! Bulk import of externally produced node, edge and concept rows.
//!
//! Rows are split into fixed-size chunks, deduplicated inside each chunk and
//! written with one batched upsert per chunk. All data is scoped to a
//! caller-supplied job ID, so importing the same rows again for the same job
//! converges instead of accumulating. Chunks of one kind are written
//! concurrently; nodes always finish before edges start.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::LoaderSettings;
use crate::driver::statements::{
    self, IMPORTED_CONCEPT_LABEL, IMPORTED_NODE_LABEL, IMPORTED_RELATION_TYPE,
};
use crate::driver::{Dialect, GraphDatabaseManager, Statement};
use crate::errors::{ConvographError, Result};
use crate::identity::normalize;
use crate::types::row_count;
use crate::utils::storage_now;

const DEFAULT_NODE_TYPE: &str = "Entity";
const DEFAULT_RELATION: &str = "RELATED_TO";
const DEFAULT_CATEGORY: &str = "General";

const NODE_FILES: &[&str] = &["nodes.csv", "entity.csv"];
const EDGE_FILES: &[&str] = &["relations.csv", "edges.csv", "triples.csv"];
const CONCEPT_FILES: &[&str] = &["concepts.csv", "concept.csv"];

// ── Rows ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRow {
    pub text: String,
    pub node_type: String,
    pub confidence: f64,
}

impl NodeRow {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.trim().to_string(),
            node_type: DEFAULT_NODE_TYPE.to_string(),
            confidence: 1.0,
        }
    }

    fn dedup_key(&self) -> String {
        normalize(&self.text)
    }

    fn to_param(&self) -> Value {
        json!({
            "key": self.dedup_key(),
            "text": self.text,
            "type": self.node_type,
            "confidence": self.confidence,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub source: String,
    pub relation: String,
    pub target: String,
    pub confidence: f64,
}

impl EdgeRow {
    pub fn new(source: &str, relation: &str, target: &str) -> Self {
        Self {
            source: source.trim().to_string(),
            relation: relation.trim().to_string(),
            target: target.trim().to_string(),
            confidence: 1.0,
        }
    }

    fn dedup_key(&self) -> String {
        format!(
            "{}\u{1f}{}\u{1f}{}",
            normalize(&self.source),
            normalize(&self.relation),
            normalize(&self.target)
        )
    }

    fn to_param(&self) -> Value {
        json!({
            "source_key": normalize(&self.source),
            "target_key": normalize(&self.target),
            "source": self.source,
            "target": self.target,
            "relation_key": normalize(&self.relation),
            "relation": self.relation,
            "confidence": self.confidence,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptRow {
    pub name: String,
    pub description: String,
    pub category: String,
    pub confidence: f64,
}

impl ConceptRow {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            description: String::new(),
            category: DEFAULT_CATEGORY.to_string(),
            confidence: 1.0,
        }
    }

    fn dedup_key(&self) -> String {
        normalize(&self.name)
    }

    fn to_param(&self) -> Value {
        json!({
            "key": self.dedup_key(),
            "name": self.name,
            "description": self.description,
            "category": self.category,
            "confidence": self.confidence,
        })
    }
}

/// Everything to import for one job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportData {
    pub nodes: Vec<NodeRow>,
    pub edges: Vec<EdgeRow>,
    pub concepts: Vec<ConceptRow>,
}

// ── Reports ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub nodes_loaded: u64,
    pub relationships_loaded: u64,
    pub concepts_loaded: u64,
    /// Rows dropped as duplicates of an earlier row in the same chunk.
    pub duplicates_dropped: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatistics {
    pub job_id: String,
    pub nodes: u64,
    pub relationships: u64,
    pub concepts: u64,
}

// ── Loader ────────────────────────────────────────────────────────────────────

type Render = fn(Dialect, &str, Vec<Value>, &str) -> Statement;

#[derive(Clone)]
pub struct BatchLoader {
    manager: Arc<GraphDatabaseManager>,
    batch_size: usize,
    concurrency: usize,
}

impl BatchLoader {
    pub fn new(manager: Arc<GraphDatabaseManager>, settings: &LoaderSettings) -> Self {
        Self {
            manager,
            batch_size: settings.batch_size.max(1),
            concurrency: settings.concurrency.max(1),
        }
    }

    /// Import nodes, then edges, then concepts.
    pub async fn load(&self, job_id: &str, data: ImportData) -> Result<LoadReport> {
        validate_job_id(job_id)?;
        let mut report = LoadReport::default();

        let nodes: Vec<(String, Value)> = data
            .nodes
            .iter()
            .filter(|r| !r.text.is_empty())
            .map(|r| (r.dedup_key(), r.to_param()))
            .collect();
        let (written, dropped) = self
            .load_chunks(job_id, nodes, statements::import_nodes)
            .await?;
        report.nodes_loaded = written;
        report.duplicates_dropped += dropped;

        let edges: Vec<(String, Value)> = data
            .edges
            .iter()
            .filter(|r| !r.source.is_empty() && !r.target.is_empty())
            .map(|r| (r.dedup_key(), r.to_param()))
            .collect();
        let (written, dropped) = self
            .load_chunks(job_id, edges, statements::import_edges)
            .await?;
        report.relationships_loaded = written;
        report.duplicates_dropped += dropped;

        let concepts: Vec<(String, Value)> = data
            .concepts
            .iter()
            .filter(|r| !r.name.is_empty())
            .map(|r| (r.dedup_key(), r.to_param()))
            .collect();
        let (written, dropped) = self
            .load_chunks(job_id, concepts, statements::import_concepts)
            .await?;
        report.concepts_loaded = written;
        report.duplicates_dropped += dropped;

        info!(
            job_id,
            nodes = report.nodes_loaded,
            relationships = report.relationships_loaded,
            concepts = report.concepts_loaded,
            duplicates = report.duplicates_dropped,
            "bulk import finished"
        );
        Ok(report)
    }

    /// Read the CSV files found in `dir` and import them.
    pub async fn load_directory(&self, dir: &Path, job_id: &str) -> Result<LoadReport> {
        let dir = dir.to_path_buf();
        let data = tokio::task::spawn_blocking(move || read_directory(&dir))
            .await
            .map_err(|e| ConvographError::Io(std::io::Error::other(e)))??;
        self.load(job_id, data).await
    }

    /// Write `rows` chunk by chunk. Returns `(written, dropped)`.
    async fn load_chunks(
        &self,
        job_id: &str,
        rows: Vec<(String, Value)>,
        render: Render,
    ) -> Result<(u64, u64)> {
        if rows.is_empty() {
            return Ok((0, 0));
        }
        let dialect = self.manager.dialect();
        let now = storage_now();

        // Dedup happens per chunk, before any chunk is dispatched.
        let mut dropped = 0u64;
        let mut batches = Vec::new();
        for chunk in rows.chunks(self.batch_size) {
            let mut seen = HashSet::with_capacity(chunk.len());
            let mut batch = Vec::with_capacity(chunk.len());
            for (key, value) in chunk {
                if seen.insert(key.as_str()) {
                    batch.push(value.clone());
                } else {
                    dropped += 1;
                }
            }
            batches.push(render(dialect, job_id, batch, &now));
        }
        debug!(job_id, chunks = batches.len(), dropped, "import chunks prepared");

        let manager = &self.manager;
        let written: Vec<u64> = stream::iter(batches)
            .map(|statement| async move {
                let rows = manager.execute_write(&statement).await?;
                Ok::<u64, ConvographError>(rows.iter().map(|r| row_count(r, "written")).sum())
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        Ok((written.into_iter().sum(), dropped))
    }

    pub async fn job_statistics(&self, job_id: &str) -> JobStatistics {
        let dialect = self.manager.dialect();
        let count = |st: Statement| async move {
            self.manager
                .execute_read(&st)
                .await
                .first()
                .map(|row| row_count(row, "count"))
                .unwrap_or(0)
        };
        JobStatistics {
            job_id: job_id.to_string(),
            nodes: count(statements::count_nodes(dialect, IMPORTED_NODE_LABEL, Some(job_id))).await,
            relationships: count(statements::count_relationships(
                dialect,
                IMPORTED_RELATION_TYPE,
                Some(job_id),
            ))
            .await,
            concepts: count(statements::count_nodes(
                dialect,
                IMPORTED_CONCEPT_LABEL,
                Some(job_id),
            ))
            .await,
        }
    }

    /// Remove everything imported under `job_id`. Returns the number of deleted items.
    pub async fn delete_job_data(&self, job_id: &str) -> Result<u64> {
        validate_job_id(job_id)?;
        let batch = statements::delete_job(self.manager.dialect(), job_id);
        let rows = self.manager.execute_batch(&batch).await?;
        let deleted = rows.iter().map(|r| row_count(r, "deleted")).sum();
        info!(job_id, deleted, "job data deleted");
        Ok(deleted)
    }
}

fn validate_job_id(job_id: &str) -> Result<()> {
    if job_id.trim().is_empty() {
        return Err(ConvographError::Validation(
            "job id must not be empty".to_string(),
        ));
    }
    Ok(())
}

// ── CSV input ─────────────────────────────────────────────────────────────────

/// First file in `dir` whose name ends with one of `suffixes` (in suffix order).
fn find_file(dir: &Path, suffixes: &[&str]) -> Result<Option<PathBuf>> {
    let mut names: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    names.sort();
    Ok(suffixes.iter().find_map(|suffix| {
        names
            .iter()
            .find(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.to_lowercase().ends_with(suffix))
            })
            .cloned()
    }))
}

fn read_records(path: &Path) -> Result<Vec<HashMap<String, String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    let mut records = Vec::new();
    for record in reader.deserialize::<HashMap<String, String>>() {
        let record: HashMap<String, String> = record?
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        records.push(record);
    }
    Ok(records)
}

/// The first non-empty value among `columns`.
fn column<'a>(record: &'a HashMap<String, String>, columns: &[&str]) -> Option<&'a str> {
    columns
        .iter()
        .filter_map(|c| record.get(*c))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

fn confidence(record: &HashMap<String, String>) -> f64 {
    column(record, &["confidence"])
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(1.0)
}

pub fn read_directory(dir: &Path) -> Result<ImportData> {
    if !dir.is_dir() {
        return Err(ConvographError::Validation(format!(
            "import directory {} does not exist",
            dir.display()
        )));
    }
    let mut data = ImportData::default();

    if let Some(path) = find_file(dir, NODE_FILES)? {
        for record in read_records(&path)? {
            let Some(text) = column(&record, &["text", "name"]) else {
                continue;
            };
            data.nodes.push(NodeRow {
                text: text.to_string(),
                node_type: column(&record, &["type"])
                    .unwrap_or(DEFAULT_NODE_TYPE)
                    .to_string(),
                confidence: confidence(&record),
            });
        }
    }

    if let Some(path) = find_file(dir, EDGE_FILES)? {
        for record in read_records(&path)? {
            let source = column(&record, &["source", "head", "subject"]);
            let target = column(&record, &["target", "tail", "object"]);
            let (Some(source), Some(target)) = (source, target) else {
                continue;
            };
            data.edges.push(EdgeRow {
                source: source.to_string(),
                relation: column(&record, &["relation", "predicate"])
                    .unwrap_or(DEFAULT_RELATION)
                    .to_string(),
                target: target.to_string(),
                confidence: confidence(&record),
            });
        }
    }

    if let Some(path) = find_file(dir, CONCEPT_FILES)? {
        for record in read_records(&path)? {
            let Some(name) = column(&record, &["name", "concept"]) else {
                continue;
            };
            data.concepts.push(ConceptRow {
                name: name.to_string(),
                description: column(&record, &["description"])
                    .unwrap_or_default()
                    .to_string(),
                category: column(&record, &["category"])
                    .unwrap_or(DEFAULT_CATEGORY)
                    .to_string(),
                confidence: confidence(&record),
            });
        }
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MemoryDriver;

    async fn loader(batch_size: usize) -> BatchLoader {
        let manager = GraphDatabaseManager::with_driver(Arc::new(MemoryDriver::new()), true);
        manager.initialize().await.unwrap();
        BatchLoader::new(
            Arc::new(manager),
            &LoaderSettings {
                batch_size,
                concurrency: 2,
            },
        )
    }

    #[tokio::test]
    async fn test_duplicate_edge_rows_in_chunk_yield_one_edge() {
        let loader = loader(1000).await;
        let data = ImportData {
            nodes: vec![NodeRow::new("A"), NodeRow::new("B")],
            edges: vec![EdgeRow::new("A", "R", "B"), EdgeRow::new("a", "r", " B ")],
            concepts: vec![],
        };
        let report = loader.load("job", data).await.unwrap();
        assert_eq!(report.relationships_loaded, 1);
        assert_eq!(report.duplicates_dropped, 1);
        assert_eq!(loader.job_statistics("job").await.relationships, 1);
    }

    #[tokio::test]
    async fn test_edge_count_does_not_depend_on_batch_size() {
        let data = ImportData {
            nodes: vec![NodeRow::new("A"), NodeRow::new("B")],
            edges: vec![EdgeRow::new("A", "R", "B"), EdgeRow::new("a", " r ", "B")],
            concepts: vec![],
        };
        let mut counts = Vec::new();
        for batch_size in [1, 1000] {
            let loader = loader(batch_size).await;
            loader.load("job", data.clone()).await.unwrap();
            counts.push(loader.job_statistics("job").await.relationships);
        }
        assert_eq!(counts, vec![1, 1]);
    }

    #[tokio::test]
    async fn test_cross_chunk_duplicates_converge() {
        let loader = loader(1).await;
        let data = ImportData {
            nodes: vec![NodeRow::new("A"), NodeRow::new("A"), NodeRow::new("B")],
            ..ImportData::default()
        };
        let report = loader.load("job", data).await.unwrap();
        // Not deduplicated across chunks, but the upsert keeps one node.
        assert_eq!(report.duplicates_dropped, 0);
        assert_eq!(loader.job_statistics("job").await.nodes, 2);
    }

    #[tokio::test]
    async fn test_reimport_converges_and_jobs_are_isolated() {
        let loader = loader(10).await;
        let data = ImportData {
            nodes: vec![NodeRow::new("A")],
            concepts: vec![ConceptRow::new("Trust")],
            ..ImportData::default()
        };
        loader.load("one", data.clone()).await.unwrap();
        loader.load("one", data.clone()).await.unwrap();
        loader.load("two", data).await.unwrap();

        let one = loader.job_statistics("one").await;
        assert_eq!((one.nodes, one.concepts), (1, 1));

        assert_eq!(loader.delete_job_data("one").await.unwrap(), 2);
        assert_eq!(loader.job_statistics("one").await.nodes, 0);
        assert_eq!(loader.job_statistics("two").await.nodes, 1);
    }

    #[tokio::test]
    async fn test_empty_job_id_is_rejected() {
        let loader = loader(10).await;
        assert!(loader.load(" ", ImportData::default()).await.is_err());
    }

    #[test]
    fn test_read_directory_resolves_aliases() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("kg_nodes.csv"),
            "name,type\nAlice,Person\nBob,\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("triples.csv"),
            "head,predicate,tail,confidence\nAlice,knows,Bob,0.5\nAlice,,Bob,oops\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("concept.csv"), "concept\nfriendship\n").unwrap();

        let data = read_directory(dir.path()).unwrap();
        assert_eq!(data.nodes.len(), 2);
        assert_eq!(data.nodes[1].node_type, DEFAULT_NODE_TYPE);
        assert_eq!(data.edges[0].relation, "knows");
        assert_eq!(data.edges[0].confidence, 0.5);
        assert_eq!(data.edges[1].relation, DEFAULT_RELATION);
        assert_eq!(data.edges[1].confidence, 1.0);
        assert_eq!(data.concepts[0].category, DEFAULT_CATEGORY);
    }
}

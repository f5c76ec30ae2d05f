//! # convograph
//!
//! Post-processing for speech transcripts: turns diarized segments into a
//! formatted result document and, best-effort, an idempotent conversation
//! knowledge graph.
//!
//! ## Architecture
//!
//! - **Deterministic identity**: every graph node ID is derived from its content,
//!   so reprocessing a conversation upserts instead of duplicating
//! - **Pluggable extraction**: keyword tables, regex patterns, an LLM, or both
//! - **Backend-neutral storage**: Neo4j (Cypher), ArangoDB (AQL) or in-memory,
//!   behind one [`driver::GraphDriver`] trait
//! - **Staged pipeline**: transcribe, format, summarize, translate, graph build;
//!   graph failures never fail the job
//! - **Bulk import**: chunked, job-scoped loading of external node/edge/concept rows

pub mod config;
pub mod errors;
pub mod identity;
pub mod types;
pub mod utils;

pub mod edges;
pub mod nodes;
pub mod transcript;

pub mod driver;
pub mod llm_client;
pub mod prompts;

pub mod extraction;

pub mod builder;
pub mod graph_store;
pub mod processor;

pub mod jobs;
pub mod notifier;
pub mod pipeline;

pub mod loader;
pub mod runtime;

pub use config::Settings;
pub use errors::{ConvographError, Result};
pub use runtime::Runtime;

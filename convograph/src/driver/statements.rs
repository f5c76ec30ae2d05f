//! Every statement the engine issues, rendered for each [`Dialect`].
//!
//! All upserts return rows so written counts come from the backend:
//! one row per merged node or relationship, or a single `{written: n}` row for
//! the `UNWIND`-style bulk statements.

use serde_json::Value;

use crate::edges::{GraphRelationship, RelationshipType};
use crate::nodes::{GraphNode, NodeType};

use super::{Dialect, Statement};

/// Label of bulk-imported nodes.
pub const IMPORTED_NODE_LABEL: &str = "ImportedNode";
/// Label of bulk-imported concepts.
pub const IMPORTED_CONCEPT_LABEL: &str = "ImportedConcept";
/// Type of bulk-imported relationships.
pub const IMPORTED_RELATION_TYPE: &str = "IMPORTED_RELATION";

/// Document collections an AQL backend must provide.
pub fn document_collections() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = NodeType::ALL.iter().map(|t| t.label()).collect();
    names.push(IMPORTED_NODE_LABEL);
    names.push(IMPORTED_CONCEPT_LABEL);
    names
}

/// Edge collections an AQL backend must provide.
pub fn edge_collections() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = RelationshipType::ALL.iter().map(|t| t.as_str()).collect();
    names.push(IMPORTED_RELATION_TYPE);
    names
}

/// ArangoDB `_key` for a node ID. IDs made only of key-safe characters are used
/// as-is; anything else is hashed.
pub fn document_key(id: &str) -> String {
    let safe = !id.is_empty()
        && id.len() <= 254
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-:.@()+,=;$!*'%".contains(c));
    if safe {
        id.to_string()
    } else {
        use md5::{Digest, Md5};
        format!("k{:x}", Md5::digest(id.as_bytes()))
    }
}

// ── Conversation graph ────────────────────────────────────────────────────────

/// Upsert one node by `id`. Returns one `{id}` row.
pub fn merge_node(dialect: Dialect, node: &GraphNode, now: &str) -> Statement {
    let label = node.node_type().label();
    let props = node.to_storage_properties();
    match dialect {
        Dialect::Cypher => Statement::new(format!(
            "MERGE (n:{label} {{id: $id}})
             ON CREATE SET n = $props, n.created_at = $now
             ON MATCH SET n += $props
             SET n.updated_at = $now
             RETURN n.id AS id"
        ))
        .param("id", node.id())
        .param("props", props)
        .param("now", now),
        Dialect::Aql => Statement::new(
            "UPSERT { _key: @key }
             INSERT MERGE(@props, { _key: @key, created_at: @now, updated_at: @now })
             UPDATE MERGE(@props, { updated_at: @now })
             IN @@collection
             RETURN { id: NEW.id }",
        )
        .param("key", document_key(node.id()))
        .param("props", props)
        .param("now", now)
        .param("@collection", label),
        Dialect::Memory => Statement::new("merge_node")
            .param("label", label)
            .param("id", node.id())
            .param("props", props)
            .param("now", now),
    }
}

/// Upsert one relationship between two existing nodes. Returns one `{type}` row,
/// or none when an endpoint is missing.
pub fn merge_relationship(dialect: Dialect, rel: &GraphRelationship, now: &str) -> Statement {
    let rel_type = rel.relationship_type();
    let (from_type, to_type) = rel_type.endpoints();
    let props = rel.to_storage_properties();
    match dialect {
        Dialect::Cypher => Statement::new(format!(
            "MATCH (a:{from} {{id: $from_id}})
             MATCH (b:{to} {{id: $to_id}})
             MERGE (a)-[r:{ty}]->(b)
             ON CREATE SET r = $props, r.created_at = $now
             ON MATCH SET r += $props
             SET r.updated_at = $now
             RETURN type(r) AS type",
            from = from_type.label(),
            to = to_type.label(),
            ty = rel_type.as_str(),
        ))
        .param("from_id", rel.from_id())
        .param("to_id", rel.to_id())
        .param("props", props)
        .param("now", now),
        Dialect::Aql => Statement::new(
            "UPSERT { _from: @from, _to: @to }
             INSERT MERGE(@props, { _from: @from, _to: @to, created_at: @now, updated_at: @now })
             UPDATE MERGE(@props, { updated_at: @now })
             IN @@collection
             RETURN { type: @type }",
        )
        .param(
            "from",
            format!("{}/{}", from_type.label(), document_key(rel.from_id())),
        )
        .param(
            "to",
            format!("{}/{}", to_type.label(), document_key(rel.to_id())),
        )
        .param("props", props)
        .param("now", now)
        .param("type", rel_type.as_str())
        .param("@collection", rel_type.as_str()),
        Dialect::Memory => Statement::new("merge_relationship")
            .param("type", rel_type.as_str())
            .param("from_label", from_type.label())
            .param("from_id", rel.from_id())
            .param("to_label", to_type.label())
            .param("to_id", rel.to_id())
            .param("props", props)
            .param("now", now),
    }
}

// ── Bulk import ───────────────────────────────────────────────────────────────

/// Upsert a chunk of `{key, text, type, confidence}` rows keyed on `(key, job_id)`.
pub fn import_nodes(dialect: Dialect, job_id: &str, batch: Vec<Value>, now: &str) -> Statement {
    let query = match dialect {
        Dialect::Cypher => format!(
            "UNWIND $batch AS row
             MERGE (n:{IMPORTED_NODE_LABEL} {{key: row.key, job_id: $job_id}})
             ON CREATE SET n.created_at = $now
             SET n.text = row.text, n.type = row.type, n.confidence = row.confidence,
                 n.source = 'bulk_import', n.updated_at = $now
             RETURN count(n) AS written"
        ),
        Dialect::Aql => format!(
            "LET written = (
               FOR row IN @batch
                 UPSERT {{ key: row.key, job_id: @job_id }}
                 INSERT {{ key: row.key, job_id: @job_id, text: row.text, type: row.type,
                          confidence: row.confidence, source: 'bulk_import',
                          created_at: @now, updated_at: @now }}
                 UPDATE {{ text: row.text, type: row.type, confidence: row.confidence,
                          updated_at: @now }}
                 IN {IMPORTED_NODE_LABEL}
                 RETURN 1
             )
             RETURN {{ written: LENGTH(written) }}"
        ),
        Dialect::Memory => "import_nodes".to_string(),
    };
    bulk(query, job_id, batch, now)
}

/// Upsert a chunk of `{source_key, target_key, source, target, relation_key, relation,
/// confidence}` rows keyed on `(source_key, relation_key, target_key, job_id)`. Rows
/// whose endpoints were never imported for the job are skipped.
pub fn import_edges(dialect: Dialect, job_id: &str, batch: Vec<Value>, now: &str) -> Statement {
    let query = match dialect {
        Dialect::Cypher => format!(
            "UNWIND $batch AS row
             MATCH (s:{IMPORTED_NODE_LABEL} {{key: row.source_key, job_id: $job_id}})
             MATCH (t:{IMPORTED_NODE_LABEL} {{key: row.target_key, job_id: $job_id}})
             MERGE (s)-[r:{IMPORTED_RELATION_TYPE} {{relation_key: row.relation_key, job_id: $job_id}}]->(t)
             ON CREATE SET r.created_at = $now
             SET r.relation = row.relation, r.confidence = row.confidence, r.source_text = row.source,
                 r.target_text = row.target, r.updated_at = $now
             RETURN count(r) AS written"
        ),
        Dialect::Aql => format!(
            "LET written = (
               FOR row IN @batch
                 LET s = FIRST(FOR n IN {IMPORTED_NODE_LABEL}
                               FILTER n.key == row.source_key AND n.job_id == @job_id
                               RETURN n._id)
                 LET t = FIRST(FOR n IN {IMPORTED_NODE_LABEL}
                               FILTER n.key == row.target_key AND n.job_id == @job_id
                               RETURN n._id)
                 FILTER s != null AND t != null
                 UPSERT {{ _from: s, _to: t, relation_key: row.relation_key, job_id: @job_id }}
                 INSERT {{ _from: s, _to: t, relation_key: row.relation_key,
                          relation: row.relation, job_id: @job_id,
                          confidence: row.confidence, source_text: row.source,
                          target_text: row.target, created_at: @now, updated_at: @now }}
                 UPDATE {{ relation: row.relation, confidence: row.confidence,
                          updated_at: @now }}
                 IN {IMPORTED_RELATION_TYPE}
                 RETURN 1
             )
             RETURN {{ written: LENGTH(written) }}"
        ),
        Dialect::Memory => "import_edges".to_string(),
    };
    bulk(query, job_id, batch, now)
}

/// Upsert a chunk of `{key, name, description, category, confidence}` rows keyed
/// on `(key, job_id)`.
pub fn import_concepts(dialect: Dialect, job_id: &str, batch: Vec<Value>, now: &str) -> Statement {
    let query = match dialect {
        Dialect::Cypher => format!(
            "UNWIND $batch AS row
             MERGE (c:{IMPORTED_CONCEPT_LABEL} {{key: row.key, job_id: $job_id}})
             ON CREATE SET c.created_at = $now
             SET c.name = row.name, c.description = row.description,
                 c.category = row.category, c.confidence = row.confidence,
                 c.source = 'bulk_import', c.updated_at = $now
             RETURN count(c) AS written"
        ),
        Dialect::Aql => format!(
            "LET written = (
               FOR row IN @batch
                 UPSERT {{ key: row.key, job_id: @job_id }}
                 INSERT {{ key: row.key, job_id: @job_id, name: row.name,
                          description: row.description, category: row.category,
                          confidence: row.confidence, source: 'bulk_import',
                          created_at: @now, updated_at: @now }}
                 UPDATE {{ name: row.name, description: row.description,
                          category: row.category, confidence: row.confidence,
                          updated_at: @now }}
                 IN {IMPORTED_CONCEPT_LABEL}
                 RETURN 1
             )
             RETURN {{ written: LENGTH(written) }}"
        ),
        Dialect::Memory => "import_concepts".to_string(),
    };
    bulk(query, job_id, batch, now)
}

fn bulk(query: String, job_id: &str, batch: Vec<Value>, now: &str) -> Statement {
    Statement::new(query)
        .param("batch", Value::Array(batch))
        .param("job_id", job_id)
        .param("now", now)
}

/// Remove everything imported under `job_id`. Each statement returns `{deleted}`.
pub fn delete_job(dialect: Dialect, job_id: &str) -> Vec<Statement> {
    match dialect {
        Dialect::Cypher => [IMPORTED_NODE_LABEL, IMPORTED_CONCEPT_LABEL]
            .iter()
            .map(|label| {
                Statement::new(format!(
                    "MATCH (n:{label} {{job_id: $job_id}})
                     DETACH DELETE n
                     RETURN count(n) AS deleted"
                ))
                .param("job_id", job_id)
            })
            .collect(),
        Dialect::Aql => [
            IMPORTED_RELATION_TYPE,
            IMPORTED_NODE_LABEL,
            IMPORTED_CONCEPT_LABEL,
        ]
        .iter()
        .map(|collection| {
            Statement::new(
                "LET removed = (
                   FOR d IN @@collection FILTER d.job_id == @job_id
                   REMOVE d IN @@collection
                   RETURN 1
                 )
                 RETURN { deleted: LENGTH(removed) }",
            )
            .param("job_id", job_id)
            .param("@collection", *collection)
        })
        .collect(),
        Dialect::Memory => vec![Statement::new("delete_job").param("job_id", job_id)],
    }
}

// ── Reads ─────────────────────────────────────────────────────────────────────

/// Count nodes with `label`, optionally only those of one import job. Returns `{count}`.
pub fn count_nodes(dialect: Dialect, label: &str, job_id: Option<&str>) -> Statement {
    match dialect {
        Dialect::Cypher => Statement::new(format!(
            "MATCH (n:{label})
             WHERE $job_id IS NULL OR n.job_id = $job_id
             RETURN count(n) AS count"
        ))
        .param("job_id", job_id),
        Dialect::Aql => Statement::new(
            "RETURN { count: LENGTH(
               FOR d IN @@collection
               FILTER @job_id == null OR d.job_id == @job_id
               RETURN 1
             ) }",
        )
        .param("job_id", job_id)
        .param("@collection", label),
        Dialect::Memory => Statement::new("count_nodes")
            .param("label", label)
            .param("job_id", job_id),
    }
}

/// Count relationships of `rel_type`, optionally only one import job's. Returns `{count}`.
pub fn count_relationships(dialect: Dialect, rel_type: &str, job_id: Option<&str>) -> Statement {
    match dialect {
        Dialect::Cypher => Statement::new(format!(
            "MATCH ()-[r:{rel_type}]->()
             WHERE $job_id IS NULL OR r.job_id = $job_id
             RETURN count(r) AS count"
        ))
        .param("job_id", job_id),
        Dialect::Aql => Statement::new(
            "RETURN { count: LENGTH(
               FOR e IN @@collection
               FILTER @job_id == null OR e.job_id == @job_id
               RETURN 1
             ) }",
        )
        .param("job_id", job_id)
        .param("@collection", rel_type),
        Dialect::Memory => Statement::new("count_relationships")
            .param("type", rel_type)
            .param("job_id", job_id),
    }
}

/// One node's stored properties. Returns `{node}` or no rows.
pub fn node_by_id(dialect: Dialect, node_type: NodeType, id: &str) -> Statement {
    let label = node_type.label();
    match dialect {
        Dialect::Cypher => Statement::new(format!(
            "MATCH (n:{label} {{id: $id}}) RETURN properties(n) AS node LIMIT 1"
        ))
        .param("id", id),
        Dialect::Aql => Statement::new(
            "FOR d IN @@collection FILTER d.id == @id LIMIT 1
             RETURN { node: UNSET(d, '_key', '_id', '_rev') }",
        )
        .param("id", id)
        .param("@collection", label),
        Dialect::Memory => Statement::new("node_by_id")
            .param("label", label)
            .param("id", id),
    }
}

/// Summary of one stored conversation. Returns
/// `{id, duration, language, segments, speakers, topics, entities}` or no rows.
pub fn conversation_overview(dialect: Dialect, conversation_id: &str) -> Statement {
    match dialect {
        Dialect::Cypher => Statement::new(
            "MATCH (c:Conversation {id: $conversation_id})
             OPTIONAL MATCH (c)-[:CONTAINS]->(s:Segment)
             WITH c, count(DISTINCT s) AS segments
             OPTIONAL MATCH (sp:Speaker)-[:SPEAKS_IN]->(c)
             WITH c, segments, count(DISTINCT sp) AS speakers
             RETURN c.id AS id, c.duration AS duration, c.language AS language,
                    segments, speakers, c.topic_count AS topics, c.entity_count AS entities",
        )
        .param("conversation_id", conversation_id),
        Dialect::Aql => Statement::new(
            "FOR c IN Conversation FILTER c.id == @conversation_id LIMIT 1
               LET segments = LENGTH(FOR e IN CONTAINS FILTER e._from == c._id RETURN 1)
               LET speakers = LENGTH(FOR e IN SPEAKS_IN FILTER e._to == c._id RETURN 1)
               RETURN { id: c.id, duration: c.duration, language: c.language,
                        segments, speakers, topics: c.topic_count, entities: c.entity_count }",
        )
        .param("conversation_id", conversation_id),
        Dialect::Memory => {
            Statement::new("conversation_overview").param("conversation_id", conversation_id)
        }
    }
}

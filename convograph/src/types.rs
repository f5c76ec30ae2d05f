//! Shared value types passed between the model, the statements and the drivers.

use serde_json::{Map, Value};

/// Flat property map written onto a node or relationship.
pub type Properties = Map<String, Value>;

/// Named statement parameters.
pub type Params = Map<String, Value>;

/// One result row returned by a driver, keyed by column name.
pub type Row = Map<String, Value>;

/// Unwrap a `json!({...})` literal into its map. Non-object values yield an empty map.
pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Read an integer column (`count`, `written`, ...) from a row, defaulting to 0.
pub fn row_count(row: &Row, column: &str) -> u64 {
    row.get(column)
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64)))
        .unwrap_or(0)
}

//! Shared operation wrappers for the CLI and tests.
//!
//! Each `op_*` function is a pure, synchronous wrapper around the engine.
//! Input and output are `serde_json::Value`; errors are rendered to `String`.
//!
//! A row is either an array of integer feature ids, or an object whose
//! `field` holds such an array or a text string. Text is tokenized and turned
//! into character `n`-shingle feature ids.

use serde_json::{json, Value};

use crate::algo::neighborhood::QueryMode;
use crate::algo::sparse::SparseMatrix;
use crate::algo::tokenizer;
use crate::config::MinHashParams;
use crate::engine::{GraphMode, MinHash, Query};
use crate::error::MinHashError;

/// Character shingle length used for text rows.
pub const TEXT_SHINGLE_SIZE: usize = 3;

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Feature ids of one JSON row.
pub fn row_features(row: &Value, field: &str) -> Result<Vec<u64>, String> {
    match row {
        Value::Array(ids) => id_array(ids),
        Value::String(text) => Ok(tokenizer::text_features(text, TEXT_SHINGLE_SIZE)),
        Value::Object(obj) => match obj.get(field) {
            Some(Value::Array(ids)) => id_array(ids),
            Some(Value::String(text)) => Ok(tokenizer::text_features(text, TEXT_SHINGLE_SIZE)),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(invalid(format!(
                "field '{field}' must be an id array or text, got {other}"
            ))),
        },
        other => Err(invalid(format!(
            "row must be an id array or an object, got {other}"
        ))),
    }
}

/// Convert JSON rows into a sparse matrix, row `i` becoming instance `i`.
pub fn rows_to_matrix(rows: &[Value], field: &str) -> Result<SparseMatrix, String> {
    let features = rows
        .iter()
        .map(|r| row_features(r, field))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SparseMatrix::from_rows(features))
}

fn id_array(ids: &[Value]) -> Result<Vec<u64>, String> {
    ids.iter()
        .map(|v| {
            v.as_u64()
                .ok_or_else(|| invalid(format!("feature id must be a non-negative integer, got {v}")))
        })
        .collect()
}

fn invalid(message: String) -> String {
    MinHashError::InvalidInput(message).to_string()
}

fn parse_mode(mode: &str) -> Result<QueryMode, String> {
    QueryMode::from_str(mode)
        .ok_or_else(|| format!("Unknown query mode '{mode}'. Use: fast, candidates, refined"))
}

fn fitted(rows: &[Value], field: &str, params: &MinHashParams) -> Result<MinHash, String> {
    let data = rows_to_matrix(rows, field)?;
    let mut engine = MinHash::with_params(params.clone()).map_err(|e| e.to_string())?;
    engine.fit(data).map_err(|e| e.to_string())?;
    Ok(engine)
}

fn resolve_k(k: Option<usize>, params: &MinHashParams) -> usize {
    k.unwrap_or(params.n_neighbors)
}

// ── Operations ───────────────────────────────────────────────────────────────

/// Index `rows` and return the neighbors of every row, excluding itself.
pub fn op_neighbors(
    rows: &[Value],
    field: &str,
    params: &MinHashParams,
    k: Option<usize>,
    mode: &str,
) -> Result<Value, String> {
    let mode = parse_mode(mode)?;
    let engine = fitted(rows, field, params)?;
    let k = resolve_k(k, params);
    let output: Vec<Value> = engine
        .neighbors_of_indexed(k, mode)
        .map_err(|e| e.to_string())?
        .into_iter()
        .enumerate()
        .map(|(id, r)| json!({"id": id, "neighbors": r.ids, "scores": r.scores}))
        .collect();
    Ok(Value::Array(output))
}

/// Index `index_rows`, then look up every row of `queries` against it.
pub fn op_query(
    index_rows: &[Value],
    queries: &[Value],
    field: &str,
    params: &MinHashParams,
    k: Option<usize>,
    mode: &str,
) -> Result<Value, String> {
    let mode = parse_mode(mode)?;
    let engine = fitted(index_rows, field, params)?;
    let k = resolve_k(k, params);
    let features = queries
        .iter()
        .map(|q| row_features(q, field))
        .collect::<Result<Vec<_>, _>>()?;
    let batch: Vec<Query<'_>> = features.iter().map(|f| Query::Features(f)).collect();
    let results = engine
        .neighbors_batch(&batch, k, mode)
        .map_err(|e| e.to_string())?;
    let output: Vec<Value> = results
        .into_iter()
        .enumerate()
        .map(|(query, r)| json!({"query": query, "neighbors": r.ids, "scores": r.scores}))
        .collect();
    Ok(Value::Array(output))
}

/// Sparse k-neighbor graph over `rows` as `{row, col, weight}` edges.
pub fn op_graph(
    rows: &[Value],
    field: &str,
    params: &MinHashParams,
    k: Option<usize>,
    graph_mode: &str,
    symmetric: bool,
    mode: &str,
) -> Result<Value, String> {
    let graph_mode = GraphMode::from_str(graph_mode).ok_or_else(|| {
        format!("Unknown graph mode '{graph_mode}'. Use: connectivity, distance")
    })?;
    let mode = parse_mode(mode)?;
    let engine = fitted(rows, field, params)?;
    let edges = engine
        .kneighbors_graph(resolve_k(k, params), graph_mode, symmetric, mode)
        .map_err(|e| e.to_string())?;
    Ok(json!({
        "nodes": engine.len(),
        "edges": edges,
    }))
}

/// Bucket statistics of the index built from `rows`, optionally after one
/// explicit pruning pass.
pub fn op_distribution(
    rows: &[Value],
    field: &str,
    params: &MinHashParams,
    prune: bool,
) -> Result<Value, String> {
    let mut engine = fitted(rows, field, params)?;
    let report = prune.then(|| engine.prune());
    Ok(json!({
        "instances": engine.len(),
        "number_of_blocks": engine.config().number_of_blocks(),
        "distribution": engine.get_distribution_of_inverse_index(),
        "pruned": report,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_shapes() {
        assert_eq!(row_features(&json!([3, 1, 2]), "f").unwrap(), vec![3, 1, 2]);
        assert_eq!(row_features(&json!({"f": [7]}), "f").unwrap(), vec![7]);
        assert!(row_features(&json!({"other": [7]}), "f").unwrap().is_empty());
        assert!(!row_features(&json!({"f": "some text"}), "f").unwrap().is_empty());
    }

    #[test]
    fn bad_rows_rejected() {
        assert!(row_features(&json!([1, -2]), "f").is_err());
        assert!(row_features(&json!(42), "f").is_err());
        let err = row_features(&json!({"f": true}), "f").unwrap_err();
        assert!(err.starts_with("invalid input"), "{err}");
    }

    #[test]
    fn matrix_rows_normalized() {
        let m = rows_to_matrix(&[json!([3, 1, 3]), json!([])], "f").unwrap();
        assert_eq!(m.row(0), Some(&[1u64, 3][..]));
        assert_eq!(m.len(), 2);
    }
}

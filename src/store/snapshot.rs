// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON snapshot of a store.
//!
//! ```text
//! {
//!   "documents": [ "<chunk text>", ... ],
//!   "vectors":   [ [f0, f1, ..., fD-1], ... ],
//!   "metadata":  [ { "type": "...", ... }, ... ]
//! }
//! ```
//!
//! The three arrays are index-aligned. The whole store is rewritten on every
//! save; there is no incremental log.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::record::{Record, RecordMetadata};
use crate::errors::{Result, StoreError};

#[derive(Serialize)]
struct SnapshotRef<'a> {
    documents: Vec<&'a str>,
    vectors: Vec<&'a [f32]>,
    metadata: Vec<&'a RecordMetadata>,
}

/// Writes all records to `path`.
///
/// The JSON goes to a sibling temp file first and is renamed into place, so
/// readers never see a half-written snapshot.
pub fn write(path: &Path, records: &[Record]) -> Result<()> {
    let snapshot = SnapshotRef {
        documents: records.iter().map(|r| r.text.as_str()).collect(),
        vectors: records.iter().map(|r| r.vector.as_slice()).collect(),
        metadata: records.iter().map(|r| &r.metadata).collect(),
    };
    let bytes = serde_json::to_vec(&snapshot)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::persistence(parent, e))?;
    }

    let tmp = temp_path(path);
    fs::write(&tmp, &bytes).map_err(|e| StoreError::persistence(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::persistence(path, e));
    }

    info!(
        path = %path.display(),
        records = records.len(),
        bytes = bytes.len(),
        "snapshot written"
    );
    Ok(())
}

/// Reads records from `path`. A missing file is an empty store.
///
/// A top-level key that is absent or not an array counts as empty. The three
/// arrays must still line up: a length mismatch is rejected, never truncated.
pub fn read(path: &Path) -> Result<Vec<Record>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path).map_err(|e| StoreError::persistence(path, e))?;
    let root: Value = serde_json::from_str(&content)
        .map_err(|e| StoreError::corrupt(path, format!("invalid JSON: {}", e)))?;
    let root = root
        .as_object()
        .ok_or_else(|| StoreError::corrupt(path, "top-level value is not an object"))?;

    let documents = array(root, "documents", path);
    let vectors = array(root, "vectors", path);
    let metadata = array(root, "metadata", path);

    if documents.len() != vectors.len() || documents.len() != metadata.len() {
        return Err(StoreError::corrupt(
            path,
            format!(
                "length mismatch: {} documents, {} vectors, {} metadata",
                documents.len(),
                vectors.len(),
                metadata.len()
            ),
        ));
    }

    documents
        .iter()
        .zip(vectors)
        .zip(metadata)
        .enumerate()
        .map(|(i, ((text, vector), meta))| -> Result<Record> {
            let text = text
                .as_str()
                .ok_or_else(|| {
                    StoreError::corrupt(path, format!("documents[{}] is not a string", i))
                })?
                .to_string();
            let vector = parse_vector(vector).ok_or_else(|| {
                StoreError::corrupt(path, format!("vectors[{}] is not a numeric array", i))
            })?;
            let metadata = parse_metadata(meta)
                .map_err(|e| StoreError::corrupt(path, format!("metadata[{}]: {}", i, e)))?;
            Ok(Record {
                text,
                vector,
                metadata,
            })
        })
        .collect()
}

fn array<'a>(root: &'a Map<String, Value>, key: &str, path: &Path) -> &'a [Value] {
    match root.get(key) {
        Some(Value::Array(items)) => items.as_slice(),
        Some(_) => {
            warn!(path = %path.display(), key, "snapshot key is not an array, treating as empty");
            &[]
        }
        None => &[],
    }
}

fn parse_vector(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn parse_metadata(value: &Value) -> serde_json::Result<RecordMetadata> {
    match value {
        Value::Object(map) => RecordMetadata::from_map(map.clone()),
        other => Err(serde::de::Error::custom(format!(
            "expected an object, found {}",
            other
        ))),
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

use semstore::embedding::{chunker, HashingProvider, TaskType};
use semstore::store::{
    LegalDocumentMeta, RecordMetadata, SemanticStore, StoreOptions, DEFAULT_LEGAL_K,
    DEFAULT_SEARCH_K, DEFAULT_THRESHOLD,
};
use semstore::StoreError;

fn open(dir: &TempDir) -> SemanticStore {
    SemanticStore::open(dir.path().join("vector_store.json"), Box::new(HashingProvider::new(64)))
        .expect("open store")
}

#[test]
fn chunks_reconstruct_long_documents() {
    let text: String = (0..2600)
        .map(|i| char::from(b'a' + (i % 26) as u8))
        .collect();
    let chunks = chunker::split(&text, 1000, 200).unwrap();
    assert_eq!(chunks.len(), 3);

    let mut rebuilt = chunks[0].clone();
    for chunk in &chunks[1..] {
        rebuilt.extend(chunk.chars().skip(200));
    }
    assert_eq!(rebuilt, text);
    assert!(chunks.iter().all(|c| c.chars().count() <= 1000));
}

#[test]
fn reopened_store_ranks_identically() {
    let dir = TempDir::new().unwrap();
    let queries = ["data protection", "payments fraud", "export controls"];

    let before: Vec<Vec<(String, f32)>> = {
        let mut store = open(&dir);
        store
            .add_legal_document(
                "Controllers must protect personal data.",
                LegalDocumentMeta::new(Some("EU")),
            )
            .unwrap();
        store
            .add_business_analysis(
                "Card payments fraud detection service",
                json!({"risk": "medium"}),
            )
            .unwrap();
        store
            .add_legal_document(
                "Export controls apply to dual use goods.",
                LegalDocumentMeta::new(Some("US")),
            )
            .unwrap();
        store.add_risk_profile("fintech", "US", json!({"level": "high"})).unwrap();
        queries
            .iter()
            .map(|q| {
                store
                    .similarity_search(q, DEFAULT_SEARCH_K)
                    .unwrap()
                    .into_iter()
                    .map(|h| (h.document.page_content, h.score))
                    .collect()
            })
            .collect()
    };

    let mut reopened = open(&dir);
    assert_eq!(reopened.len(), 4);
    for (query, expected) in queries.iter().zip(&before) {
        let hits: Vec<(String, f32)> = reopened
            .similarity_search(query, DEFAULT_SEARCH_K)
            .unwrap()
            .into_iter()
            .map(|h| (h.document.page_content, h.score))
            .collect();
        assert_eq!(hits.len(), expected.len());
        for ((text, score), (expected_text, expected_score)) in hits.iter().zip(expected) {
            assert_eq!(text, expected_text);
            assert!((score - expected_score).abs() < 1e-6);
        }
    }

    assert_eq!(
        reopened
            .find_similar_risk_profile("fintech", "US", DEFAULT_THRESHOLD)
            .unwrap(),
        Some(json!({"level": "high"}))
    );
    let us_only = reopened
        .search_legal_documents("export controls", Some("US"), DEFAULT_LEGAL_K)
        .unwrap();
    assert_eq!(us_only.len(), 1);
    assert_eq!(us_only[0].metadata.jurisdiction(), Some("US"));
}

#[test]
fn foreign_snapshot_loads_and_survives_persist() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vector_store.json");
    let mut vector = vec![0.0_f64; 64];
    vector[3] = 0.25;
    fs::write(
        &path,
        json!({
            "documents": ["What is 2 + 2?"],
            "vectors": [vector],
            "metadata": [{"type": "quiz", "answer": 4}]
        })
        .to_string(),
    )
    .unwrap();

    let mut store = open(&dir);
    assert_eq!(store.len(), 1);
    assert_eq!(store.dimension(), Some(64));
    assert!(matches!(store.records()[0].metadata, RecordMetadata::Other(_)));

    store.add_risk_profile("edtech", "IN", json!({})).unwrap();

    let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["metadata"][0], json!({"type": "quiz", "answer": 4}));
    assert_eq!(raw["metadata"][1]["type"], "risk_profile");
    assert_eq!(raw["documents"][1], "edtech_IN");
}

#[test]
fn dimension_change_between_sessions_is_rejected() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = open(&dir);
        store.add_risk_profile("fintech", "US", json!({})).unwrap();
    }

    let mut store = SemanticStore::open(
        dir.path().join("vector_store.json"),
        Box::new(HashingProvider::new(32)),
    )
    .unwrap();
    let err = store.add_risk_profile("agritech", "BR", json!({})).unwrap_err();
    assert!(matches!(err, StoreError::EmbeddingFailure(_)));
    assert_eq!(store.len(), 1);
}

#[test]
fn query_task_is_configurable() {
    let dir = TempDir::new().unwrap();
    let options = StoreOptions {
        query_task: TaskType::RetrievalQuery,
        ..Default::default()
    };
    let mut store = SemanticStore::open_with(
        dir.path().join("s.json"),
        Box::new(HashingProvider::new(64)),
        options,
    )
    .unwrap();
    store
        .add_business_analysis("organic farm supply marketplace", json!({"ok": true}))
        .unwrap();
    // The hashing provider ignores task hints, so an identical description still matches.
    assert!(store
        .find_similar_business("organic farm supply marketplace", DEFAULT_THRESHOLD)
        .unwrap()
        .is_some());
}

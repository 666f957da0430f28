// SPDX-License-Identifier: MIT OR Apache-2.0

//! semstore - Semantic document store library
//!
//! Text is chunked into overlapping windows, embedded through an
//! [`embedding::EmbeddingProvider`], and kept as (text, vector, metadata)
//! records mirrored to one JSON snapshot. Queries are ranked against every
//! record by cosine similarity.
//!
//! ```no_run
//! use semstore::embedding::HashingProvider;
//! use semstore::store::{SemanticStore, DEFAULT_THRESHOLD};
//! use serde_json::json;
//!
//! let mut store = SemanticStore::open("vector_store.json", Box::new(HashingProvider::default()))?;
//! store.add_risk_profile("fintech", "US", json!({"level": "high"}))?;
//! let cached = store.find_similar_risk_profile("fintech", "US", DEFAULT_THRESHOLD)?;
//! assert!(cached.is_some());
//! # Ok::<(), semstore::errors::StoreError>(())
//! ```

pub mod config;
pub mod embedding;
pub mod errors;
pub mod ingest;
pub mod output;
pub mod store;

pub use errors::{Result, StoreError};
pub use store::SemanticStore;

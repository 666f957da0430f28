// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding module - chunking and the embedding service boundary
//!
//! The chunker cuts text into overlapping windows; providers turn each window
//! into a fixed-length vector.

pub mod chunker;
pub mod gemini;
pub mod provider;

pub use chunker::{ChunkConfig, TextChunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use gemini::{GeminiConfig, GeminiProvider, RetryPolicy};
#[cfg(feature = "builtin")]
pub use provider::FastEmbedder;
pub use provider::{
    CommandProvider, DummyProvider, EmbeddingProvider, HashingProvider, TaskType,
    DEFAULT_HASHING_DIM,
};

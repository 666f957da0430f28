// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text chunker for embedding generation.
//!
//! Splits text into overlapping character windows so each embedding sees local
//! context without exceeding the embedding model's input limit. Sizes are
//! counted in characters (Unicode scalar values), never bytes.

use crate::errors::{Result, StoreError};

/// Default number of characters per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between consecutive chunks, in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Configuration for the text chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Number of characters per chunk.
    pub chunk_size: usize,
    /// Number of characters shared by consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkConfig {
    /// Creates a new ChunkConfig, rejecting windows that would not advance.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(StoreError::invalid_config(
                "chunk_size must be greater than 0",
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(StoreError::invalid_config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Distance the window moves between chunks.
    pub fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

/// Splits text into overlapping chunks for embedding generation.
#[derive(Debug, Clone, Default)]
pub struct TextChunker {
    config: ChunkConfig,
}

impl TextChunker {
    /// Creates a new chunker with the given configuration.
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// Creates a chunker with default configuration (1000 / 200).
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Splits text into overlapping chunks.
    ///
    /// Algorithm:
    /// ```text
    /// start = 0
    /// step = chunk_size - chunk_overlap
    /// loop:
    ///   end = min(start + chunk_size, total_chars)
    ///   emit chars[start..end]
    ///   if end == total_chars: stop
    ///   start += step
    /// ```
    ///
    /// Stopping as soon as a window reaches the end means the last chunk always
    /// contributes at least one character that no earlier chunk holds.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, plus the end of the string.
        let mut boundaries: Vec<usize> = text.char_indices().map(|(idx, _)| idx).collect();
        let total_chars = boundaries.len();
        boundaries.push(text.len());

        if total_chars <= self.config.chunk_size {
            return vec![text.to_string()];
        }

        let step = self.config.step();
        let mut chunks = Vec::with_capacity(total_chars / step + 1);
        let mut start = 0_usize;

        loop {
            let end = (start + self.config.chunk_size).min(total_chars);
            chunks.push(text[boundaries[start]..boundaries[end]].to_string());
            if end == total_chars {
                break;
            }
            start += step;
        }

        chunks
    }
}

/// Splits `text` with the given window parameters.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    let config = ChunkConfig::new(chunk_size, overlap)?;
    Ok(TextChunker::new(config).split(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(chunk);
            } else {
                out.extend(chunk.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_default_config() {
        let config = ChunkConfig::default();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.step(), 800);
    }

    #[test]
    fn test_config_validation() {
        assert!(ChunkConfig::new(1000, 200).is_ok());
        assert!(ChunkConfig::new(10, 0).is_ok());

        // Invalid: overlap >= size
        assert!(matches!(
            ChunkConfig::new(20, 20),
            Err(StoreError::InvalidConfiguration(_))
        ));
        assert!(ChunkConfig::new(20, 30).is_err());

        // Invalid: zero size
        assert!(ChunkConfig::new(0, 0).is_err());
    }

    #[test]
    fn test_empty_content() {
        let chunker = TextChunker::with_defaults();
        assert!(chunker.split("").is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunker = TextChunker::new(ChunkConfig::new(10, 3).unwrap());
        assert_eq!(chunker.split("hello"), vec!["hello".to_string()]);
        assert_eq!(chunker.split("0123456789"), vec!["0123456789".to_string()]);
    }

    #[test]
    fn test_multiple_chunks() {
        let chunker = TextChunker::new(ChunkConfig::new(4, 1).unwrap());

        // 10 chars, size=4, overlap=1, step=3
        // Windows: [0-4], [3-7], [6-10]
        let chunks = chunker.split("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn test_final_chunk_may_be_shorter() {
        let chunker = TextChunker::new(ChunkConfig::new(4, 1).unwrap());
        let chunks = chunker.split("abcdefghijk");
        assert_eq!(chunks, vec!["abcd", "defg", "ghij", "jk"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
    }

    #[test]
    fn test_multibyte_boundaries() {
        let text = "héllo wörld ✓ ünïcode";
        let chunker = TextChunker::new(ChunkConfig::new(5, 2).unwrap());
        let chunks = chunker.split(text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 5));
        assert_eq!(reconstruct(&chunks, 2), text);
    }

    #[test]
    fn test_reconstruction_across_parameters() {
        let text: String = (0..257).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        for size in 1..40 {
            for overlap in 0..size {
                let chunks = split(&text, size, overlap).unwrap();
                assert_eq!(reconstruct(&chunks, overlap), text, "size={size} overlap={overlap}");
                assert!(chunks.iter().all(|c| c.chars().count() <= size));
            }
        }
    }

    #[test]
    fn test_split_rejects_bad_overlap() {
        assert!(split("anything", 5, 5).is_err());
    }
}

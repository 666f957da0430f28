// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider interface and local implementations.
//!
//! The store only sees the [`EmbeddingProvider`] trait. The hosted provider
//! lives in [`super::gemini`]; this module holds the command, hashing, dummy
//! and (behind the `builtin` feature) fastembed providers.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};
use std::str::FromStr;

const DEFAULT_COMMAND_BATCH_SIZE: usize = 64;
const DEFAULT_LOCAL_BATCH_SIZE: usize = 512;

/// Default dimension of the hashing provider.
pub const DEFAULT_HASHING_DIM: usize = 256;

/// Hint telling the embedding service how the vector will be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    RetrievalDocument,
    RetrievalQuery,
    SemanticSimilarity,
}

impl TaskType {
    /// Name used by the hosted embedding API.
    pub fn api_name(&self) -> &'static str {
        match self {
            TaskType::RetrievalDocument => "RETRIEVAL_DOCUMENT",
            TaskType::RetrievalQuery => "RETRIEVAL_QUERY",
            TaskType::SemanticSimilarity => "SEMANTIC_SIMILARITY",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::RetrievalDocument => write!(f, "retrieval_document"),
            TaskType::RetrievalQuery => write!(f, "retrieval_query"),
            TaskType::SemanticSimilarity => write!(f, "semantic_similarity"),
        }
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "retrieval_document" | "document" => Ok(TaskType::RetrievalDocument),
            "retrieval_query" | "query" => Ok(TaskType::RetrievalQuery),
            "semantic_similarity" | "similarity" => Ok(TaskType::SemanticSimilarity),
            _ => Err(format!("Unknown task type: {}", s)),
        }
    }
}

/// Trait for embedding providers.
pub trait EmbeddingProvider: Send {
    /// Returns the model identifier.
    fn model_id(&self) -> &str;

    /// Returns the batch size used by the provider.
    fn batch_size(&self) -> usize;

    /// Generates embeddings for the given texts, one vector per text.
    fn embed_texts(&mut self, texts: &[String], task: TaskType) -> Result<Vec<Vec<f32>>>;

    /// Generates an embedding for a single text.
    fn embed_one(&mut self, text: &str, task: TaskType) -> Result<Vec<f32>> {
        let mut result = self.embed_texts(&[text.to_string()], task)?;
        result
            .pop()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))
    }
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Box<P> {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn batch_size(&self) -> usize {
        (**self).batch_size()
    }

    fn embed_texts(&mut self, texts: &[String], task: TaskType) -> Result<Vec<Vec<f32>>> {
        (**self).embed_texts(texts, task)
    }
}

/// Command provider that shells out to an external process.
///
/// The command receives `{"model", "texts", "task_type"}` on stdin and must
/// print a JSON array of vectors, or an object holding one under
/// `embeddings`, `vectors` or `data`.
pub struct CommandProvider {
    command: String,
    model: String,
    batch_size: usize,
}

impl CommandProvider {
    pub fn new(command: String, model: String) -> Self {
        Self {
            command,
            model,
            batch_size: DEFAULT_COMMAND_BATCH_SIZE,
        }
    }

    fn run_command(&self, texts: &[String], task: TaskType) -> Result<Vec<Vec<f32>>> {
        let payload = serde_json::json!({
            "model": self.model,
            "texts": texts,
            "task_type": task.to_string(),
        });

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn embedding command: {}", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload.to_string().as_bytes())
                .context("Failed to write embeddings payload to stdin")?;
        }

        let output = child
            .wait_with_output()
            .context("Failed to read embeddings command output")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "Embedding command failed (status {}): {}",
                output.status,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_vectors(stdout.trim())
    }
}

impl EmbeddingProvider for CommandProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn embed_texts(&mut self, texts: &[String], task: TaskType) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.run_command(batch, task)?);
        }
        Ok(vectors)
    }
}

/// Parses embedding command output into vectors.
fn parse_vectors(raw: &str) -> Result<Vec<Vec<f32>>> {
    let parsed: Value = serde_json::from_str(raw)
        .with_context(|| "Failed to parse embeddings command output as JSON")?;

    let embeddings_value = match parsed {
        Value::Array(arr) => Value::Array(arr),
        Value::Object(ref obj) => {
            if let Some(value) = obj.get("embeddings") {
                value.clone()
            } else if let Some(value) = obj.get("vectors") {
                value.clone()
            } else if let Some(value) = obj.get("data") {
                value.clone()
            } else {
                bail!("Embeddings command output missing 'embeddings' field");
            }
        }
        _ => bail!("Embeddings command output must be JSON array or object"),
    };

    embeddings_value
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Embeddings output must be a JSON array"))?
        .iter()
        .map(|row| {
            row.as_array()
                .ok_or_else(|| anyhow::anyhow!("Embedding row must be an array"))?
                .iter()
                .map(|value| {
                    value
                        .as_f64()
                        .ok_or_else(|| anyhow::anyhow!("Embedding value must be a number"))
                        .map(|v| v as f32)
                })
                .collect::<Result<Vec<f32>>>()
        })
        .collect()
}

/// Deterministic offline provider.
///
/// Lowercased alphanumeric tokens are hashed with blake3 into `dimension`
/// signed buckets and the result is L2 normalized. Identical texts always
/// produce identical vectors, and texts sharing words score above zero.
pub struct HashingProvider {
    model: String,
    dimension: usize,
}

impl HashingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            model: format!("hashing-{}", dimension),
            dimension: dimension.max(1),
        }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        let lowered = text.to_lowercase();
        let mut tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        let trimmed = lowered.trim();
        if tokens.is_empty() && !trimmed.is_empty() {
            tokens.push(trimmed);
        }

        for token in tokens {
            let hash = blake3::hash(token.as_bytes());
            let bytes = hash.as_bytes();
            let mut index_bytes = [0u8; 8];
            index_bytes.copy_from_slice(&bytes[..8]);
            let bucket = (u64::from_le_bytes(index_bytes) % self.dimension as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        l2_normalize(&mut vector);
        vector
    }
}

impl Default for HashingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIM)
    }
}

impl EmbeddingProvider for HashingProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn batch_size(&self) -> usize {
        DEFAULT_LOCAL_BATCH_SIZE
    }

    fn embed_texts(&mut self, texts: &[String], _task: TaskType) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}

/// Dummy provider that returns zero vectors (for testing/fallback).
pub struct DummyProvider {
    model: String,
    dimension: usize,
}

impl DummyProvider {
    /// Creates a new dummy provider with specified dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            model: "dummy".to_string(),
            dimension,
        }
    }
}

impl EmbeddingProvider for DummyProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn batch_size(&self) -> usize {
        DEFAULT_LOCAL_BATCH_SIZE
    }

    fn embed_texts(&mut self, texts: &[String], _task: TaskType) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.0; self.dimension]).collect())
    }
}

/// FastEmbed provider using sentence-transformers/all-MiniLM-L6-v2.
#[cfg(feature = "builtin")]
pub struct FastEmbedder {
    embedder: fastembed::TextEmbedding,
    model_id: String,
    batch_size: usize,
    max_chars: usize,
}

#[cfg(feature = "builtin")]
impl FastEmbedder {
    const MAX_CHARS: usize = 2000;

    pub fn new() -> Result<Self> {
        let model = fastembed::EmbeddingModel::AllMiniLML6V2;
        let model_id = model.to_string();
        let init = fastembed::InitOptions::new(model);
        let embedder = fastembed::TextEmbedding::try_new(init)
            .context("Failed to initialize fastembed model")?;

        Ok(Self {
            embedder,
            model_id,
            batch_size: DEFAULT_LOCAL_BATCH_SIZE,
            max_chars: Self::MAX_CHARS,
        })
    }
}

#[cfg(feature = "builtin")]
impl EmbeddingProvider for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn embed_texts(&mut self, texts: &[String], _task: TaskType) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prepared = truncate_texts(texts, self.max_chars);
        let mut embeddings = self.embedder.embed(&prepared, Some(self.batch_size))?;
        for embedding in embeddings.iter_mut() {
            l2_normalize(embedding);
        }
        Ok(embeddings)
    }
}

#[cfg_attr(not(feature = "builtin"), allow(dead_code))]
fn truncate_texts<'a>(texts: &'a [String], max_chars: usize) -> Vec<Cow<'a, str>> {
    texts
        .iter()
        .map(|text| truncate_to_chars(text.as_str(), max_chars))
        .collect()
}

#[cfg_attr(not(feature = "builtin"), allow(dead_code))]
fn truncate_to_chars(input: &str, max_chars: usize) -> Cow<'_, str> {
    if max_chars == 0 {
        return Cow::Borrowed("");
    }

    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(input[..idx].to_string()),
        None => Cow::Borrowed(input),
    }
}

pub(crate) fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_dummy_provider() {
        let mut provider = DummyProvider::new(384);
        assert_eq!(provider.model_id(), "dummy");

        let result = provider
            .embed_texts(
                &["hello".to_string(), "world".to_string()],
                TaskType::RetrievalDocument,
            )
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].len(), 384);
        assert!(result[0].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_embed_one() {
        let mut provider = DummyProvider::new(128);
        let vector = provider.embed_one("test", TaskType::RetrievalQuery).unwrap();
        assert_eq!(vector.len(), 128);
    }

    #[test]
    fn test_hashing_provider_is_deterministic() {
        let mut provider = HashingProvider::new(64);
        let a = provider
            .embed_one("fintech_US", TaskType::RetrievalDocument)
            .unwrap();
        let b = provider
            .embed_one("fintech_US", TaskType::RetrievalQuery)
            .unwrap();
        assert_eq!(a, b);
        assert!((dot(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_provider_shared_words_score_higher() {
        let mut provider = HashingProvider::default();
        let base = provider
            .embed_one("data privacy regulation", TaskType::RetrievalDocument)
            .unwrap();
        let related = provider
            .embed_one("privacy regulation overview", TaskType::RetrievalDocument)
            .unwrap();
        let unrelated = provider
            .embed_one("banana smoothie recipe", TaskType::RetrievalDocument)
            .unwrap();
        assert!(dot(&base, &related) > dot(&base, &unrelated));
    }

    #[test]
    fn test_hashing_provider_symbol_only_text() {
        let mut provider = HashingProvider::new(16);
        let vector = provider.embed_one("___", TaskType::RetrievalDocument).unwrap();
        assert!(vector.iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_parse_vectors_shapes() {
        assert_eq!(parse_vectors("[[1, 2], [3, 4]]").unwrap().len(), 2);
        assert_eq!(
            parse_vectors(r#"{"embeddings": [[0.5]]}"#).unwrap(),
            vec![vec![0.5]]
        );
        assert_eq!(parse_vectors(r#"{"data": []}"#).unwrap().len(), 0);
        assert!(parse_vectors(r#"{"other": []}"#).is_err());
        assert!(parse_vectors(r#"[["x"]]"#).is_err());
        assert!(parse_vectors("not json").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_provider_round_trip() {
        let mut provider = CommandProvider::new(
            "cat > /dev/null; echo '{\"vectors\": [[1.0, 0.0]]}'".to_string(),
            "fixture".to_string(),
        );
        let vector = provider
            .embed_one("anything", TaskType::RetrievalDocument)
            .unwrap();
        assert_eq!(vector, vec![1.0, 0.0]);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_provider_failure() {
        let mut provider = CommandProvider::new(
            "cat > /dev/null; exit 3".to_string(),
            "fixture".to_string(),
        );
        let err = provider
            .embed_one("anything", TaskType::RetrievalDocument)
            .unwrap_err();
        assert!(err.to_string().contains("Embedding command failed"));
    }

    #[test]
    fn test_task_type_parsing() {
        assert_eq!("query".parse::<TaskType>().unwrap(), TaskType::RetrievalQuery);
        assert_eq!(
            "retrieval_document".parse::<TaskType>().unwrap(),
            TaskType::RetrievalDocument
        );
        assert!("nope".parse::<TaskType>().is_err());
        assert_eq!(TaskType::RetrievalQuery.api_name(), "RETRIEVAL_QUERY");
    }

    #[test]
    fn test_truncate_to_chars() {
        let input = "héllo";
        assert_eq!(
            truncate_to_chars(input, 2),
            Cow::<str>::Owned("hé".to_string())
        );
        assert_eq!(truncate_to_chars(input, 5), Cow::Borrowed(input));
        assert_eq!(truncate_texts(&["abc".to_string()], 1), vec![Cow::Borrowed("a")]);
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }
}

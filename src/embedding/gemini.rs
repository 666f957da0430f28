// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hosted embedding provider for the Gemini `embedContent` endpoint.
//!
//! The store API is synchronous, so the async HTTP client runs on a private
//! current-thread tokio runtime owned by the provider. Do not call it from
//! inside another tokio runtime.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::provider::{EmbeddingProvider, TaskType};

/// Default API base URL.
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default embedding model.
pub const DEFAULT_GEMINI_MODEL: &str = "models/embedding-001";

/// Title attached to documents embedded for retrieval.
const DOCUMENT_TITLE: &str = "Document";

/// Exponential backoff policy for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each later attempt.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-indexed).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << exponent)
    }
}

/// Explicit configuration for the hosted provider. Nothing is read from the
/// environment here; the caller resolves the key.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    fn url(&self) -> String {
        let model = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };
        format!("{}/{}:embedContent", self.endpoint.trim_end_matches('/'), model)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'static str>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl<'a> EmbedContentRequest<'a> {
    fn new(model: &'a str, text: &'a str, task: TaskType) -> Self {
        let title = match task {
            TaskType::RetrievalDocument => Some(DOCUMENT_TITLE),
            _ => None,
        };
        Self {
            model,
            content: Content {
                parts: [Part { text }],
            },
            task_type: task.api_name(),
            title,
        }
    }
}

enum RequestError {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

/// Gemini embedding provider.
pub struct GeminiProvider {
    config: GeminiConfig,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Self::with_client(config, client)
    }

    /// Builds the provider around a preconfigured HTTP client.
    pub fn with_client(config: GeminiConfig, client: reqwest::Client) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            bail!("Gemini provider requires an API key");
        }
        if config.retry.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start embedding runtime")?;

        Ok(Self {
            config,
            client,
            runtime,
        })
    }

    async fn embed_with_retry(
        client: &reqwest::Client,
        config: &GeminiConfig,
        text: &str,
        task: TaskType,
    ) -> Result<Vec<f32>> {
        let mut attempt = 1;
        loop {
            match Self::request_once(client, config, text, task).await {
                Ok(vector) => return Ok(vector),
                Err(RequestError::Retryable(err)) if attempt < config.retry.max_attempts => {
                    let delay = config.retry.backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts = config.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "embedding request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(RequestError::Retryable(err)) | Err(RequestError::Fatal(err)) => {
                    return Err(err.context(format!(
                        "embedContent failed after {} attempt(s)",
                        attempt
                    )));
                }
            }
        }
    }

    async fn request_once(
        client: &reqwest::Client,
        config: &GeminiConfig,
        text: &str,
        task: TaskType,
    ) -> std::result::Result<Vec<f32>, RequestError> {
        let body = EmbedContentRequest::new(&config.model, text, task);
        let response = client
            .post(config.url())
            .header("x-goog-api-key", &config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RequestError::Retryable(anyhow!(e).context("request failed")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let err = anyhow!("HTTP {}: {}", status, detail.trim());
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(RequestError::Retryable(err))
            } else {
                Err(RequestError::Fatal(err))
            };
        }

        let parsed: EmbedContentResponse = response
            .json()
            .await
            .map_err(|e| {
                RequestError::Fatal(anyhow!(e).context("malformed embedContent response"))
            })?;
        Ok(parsed.embedding.values)
    }
}

impl EmbeddingProvider for GeminiProvider {
    fn model_id(&self) -> &str {
        &self.config.model
    }

    fn batch_size(&self) -> usize {
        1
    }

    fn embed_texts(&mut self, texts: &[String], task: TaskType) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            debug!(chars = text.chars().count(), %task, "embedding text");
            let vector = self.runtime.block_on(Self::embed_with_retry(
                &self.client,
                &self.config,
                text,
                task,
            ))?;
            vectors.push(vector);
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::thread;

    /// Serves one canned HTTP response per incoming connection and records
    /// request bodies.
    fn serve(responses: Vec<String>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&bodies);

        thread::spawn(move || {
            for response in responses {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream);
                let mut content_length = 0usize;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    let lower = line.to_ascii_lowercase();
                    if let Some(value) = lower.strip_prefix("content-length:") {
                        content_length = value.trim().parse().unwrap();
                    }
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                }
                let mut body = vec![0u8; content_length];
                reader.read_exact(&mut body).unwrap();
                recorded
                    .lock()
                    .unwrap()
                    .push(String::from_utf8_lossy(&body).to_string());

                let mut stream = reader.into_inner();
                stream.write_all(response.as_bytes()).unwrap();
                stream.flush().unwrap();
            }
        });

        (format!("http://{}", addr), bodies)
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }

    fn local_provider(endpoint: String) -> GeminiProvider {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        GeminiProvider::with_client(test_config(endpoint), client).unwrap()
    }

    fn test_config(endpoint: String) -> GeminiConfig {
        GeminiConfig {
            endpoint,
            timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
            },
            ..GeminiConfig::new("test-key")
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_requires_api_key() {
        assert!(GeminiProvider::new(GeminiConfig::new("  ")).is_err());
    }

    #[test]
    fn test_url_normalizes_model() {
        let mut config = GeminiConfig::new("k");
        config.endpoint = "http://localhost/v1beta/".to_string();
        config.model = "embedding-001".to_string();
        assert_eq!(
            config.url(),
            "http://localhost/v1beta/models/embedding-001:embedContent"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let doc = serde_json::to_value(EmbedContentRequest::new(
            "models/embedding-001",
            "hello",
            TaskType::RetrievalDocument,
        ))
        .unwrap();
        assert_eq!(doc["taskType"], "RETRIEVAL_DOCUMENT");
        assert_eq!(doc["title"], "Document");
        assert_eq!(doc["content"]["parts"][0]["text"], "hello");

        let query = serde_json::to_value(EmbedContentRequest::new(
            "models/embedding-001",
            "hello",
            TaskType::RetrievalQuery,
        ))
        .unwrap();
        assert!(query.get("title").is_none());
    }

    #[test]
    fn test_retries_transient_failure() {
        let (endpoint, bodies) = serve(vec![
            http_response("503 Service Unavailable", "{}"),
            http_response("200 OK", r#"{"embedding": {"values": [0.25, 0.5]}}"#),
        ]);
        let mut provider = local_provider(endpoint);

        let vector = provider
            .embed_one("fintech_US", TaskType::RetrievalDocument)
            .unwrap();
        assert_eq!(vector, vec![0.25, 0.5]);

        let bodies = bodies.lock().unwrap();
        assert_eq!(bodies.len(), 2);
        assert!(bodies[1].contains("fintech_US"));
    }

    #[test]
    fn test_client_error_is_not_retried() {
        let (endpoint, bodies) = serve(vec![http_response(
            "400 Bad Request",
            r#"{"error": "bad"}"#,
        )]);
        let mut provider = local_provider(endpoint);

        let err = provider
            .embed_one("text", TaskType::RetrievalDocument)
            .unwrap_err();
        assert!(format!("{:#}", err).contains("400"));
        assert_eq!(bodies.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_response_fails() {
        let (endpoint, _) = serve(vec![http_response("200 OK", r#"{"unexpected": true}"#)]);
        let mut provider = local_provider(endpoint);
        assert!(provider
            .embed_one("text", TaskType::RetrievalQuery)
            .is_err());
    }
}

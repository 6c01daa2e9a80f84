//! OpenAI-compatible embeddings client (OpenAI, Ollama `/v1`, vLLM, ...).

use std::thread;
use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::EmbeddingProvider;

/// Connection settings for [`OpenAiEmbedder`].
#[derive(Debug, Clone)]
pub struct OpenAiEmbedderConfig {
    /// API key. Local servers such as Ollama accept an empty key.
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Dimension the model produces; responses of any other size are rejected.
    pub dimension: usize,
    pub timeout: Duration,
    pub max_retries: usize,
    /// Maximum inputs per HTTP request.
    pub batch_size: usize,
}

/// Blocking embeddings client that talks to OpenAI-compatible endpoints.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
    max_retries: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiEmbedderConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(!config.model.trim().is_empty(), "missing embedding model name");
        anyhow::ensure!(config.dimension > 0, "embedding dimension must be positive");
        let mut headers = HeaderMap::new();
        if !config.api_key.trim().is_empty() {
            let auth = format!("Bearer {}", config.api_key.trim());
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth).context("invalid embeddings API key")?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .context("failed to build embeddings HTTP client")?;
        let endpoint = format!("{}/embeddings", config.base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            model: config.model,
            dimension: config.dimension,
            max_retries: config.max_retries.max(1),
            batch_size: config.batch_size.max(1),
        })
    }

    /// Sends one request (at most `batch_size` inputs) with retries.
    fn request_batch(&self, inputs: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut attempt = 0usize;
        loop {
            let request = EmbeddingRequest {
                model: &self.model,
                input: inputs,
            };
            match self.client.post(&self.endpoint).json(&request).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let parsed: EmbeddingResponse = resp
                            .json()
                            .context("failed to parse embeddings response")?;
                        return parsed.into_aligned(inputs.len());
                    }

                    let body = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(%status, attempt, "Retrying embeddings request");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    anyhow::bail!("embeddings request failed ({status}): {body}");
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(error = %err, attempt, "Retrying embeddings request");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(err).context("embeddings request failed");
                }
            }
        }
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let vectors = self.request_batch(batch)?;
            for vector in &vectors {
                anyhow::ensure!(
                    vector.len() == self.dimension,
                    "embedding model {} returned dimension {}, expected {}",
                    self.model,
                    vector.len(),
                    self.dimension
                );
            }
            out.extend(vectors);
        }
        debug!(count = out.len(), model = %self.model, "Embedded texts remotely");
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

pub(crate) fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

pub(crate) fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body() || err.is_request()
}

/// Exponential backoff: 500ms, 1s, 2s, ... capped at 8s.
pub(crate) fn retry_backoff(attempt: usize) -> Duration {
    let capped = u32::try_from(attempt.min(5)).unwrap_or(5);
    Duration::from_millis(500 * (1 << capped) / 2)
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    #[serde(borrow)]
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl EmbeddingResponse {
    /// Vectors in input order. The response must carry exactly one entry for
    /// each index `0..expected`.
    fn into_aligned(mut self, expected: usize) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::ensure!(
            self.data.len() == expected,
            "embeddings endpoint returned {} vectors for {expected} inputs",
            self.data.len()
        );
        self.data.sort_by_key(|entry| entry.index);
        for (position, entry) in self.data.iter().enumerate() {
            anyhow::ensure!(
                entry.index == position,
                "embeddings endpoint returned index {} at position {position}",
                entry.index
            );
        }
        Ok(self.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OpenAiEmbedderConfig {
        OpenAiEmbedderConfig {
            api_key: String::new(),
            base_url: "http://localhost:11434/v1/".to_string(),
            model: "all-minilm".to_string(),
            dimension: 384,
            timeout: Duration::from_secs(5),
            max_retries: 0,
            batch_size: 0,
        }
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let embedder = OpenAiEmbedder::new(config()).unwrap();
        assert_eq!(embedder.endpoint, "http://localhost:11434/v1/embeddings");
        assert_eq!(embedder.max_retries, 1);
        assert_eq!(embedder.batch_size, 1);
        assert_eq!(embedder.dimension(), 384);
    }

    #[test]
    fn rejects_empty_model() {
        let mut cfg = config();
        cfg.model = "  ".to_string();
        assert!(OpenAiEmbedder::new(cfg).is_err());
    }

    #[test]
    fn empty_input_makes_no_request() {
        let embedder = OpenAiEmbedder::new(config()).unwrap();
        assert!(embedder.embed_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn response_is_reordered_by_index() {
        let body = r#"{"data":[{"embedding":[0.0,1.0],"index":1},{"embedding":[1.0,0.0],"index":0}]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        let vectors = parsed.into_aligned(2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn duplicate_or_skipped_indices_are_rejected() {
        let body = r#"{"data":[
            {"embedding":[1.0],"index":0},
            {"embedding":[2.0],"index":0},
            {"embedding":[3.0],"index":2}
        ]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        let err = parsed.into_aligned(3).unwrap_err();
        assert_eq!(
            err.to_string(),
            "embeddings endpoint returned index 0 at position 1"
        );
    }

    #[test]
    fn short_response_is_rejected() {
        let body = r#"{"data":[{"embedding":[1.0],"index":0}]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        let err = parsed.into_aligned(2).unwrap_err();
        assert!(err.to_string().contains("returned 1 vectors for 2 inputs"));
    }

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(retry_backoff(1), Duration::from_millis(500));
        assert_eq!(retry_backoff(2), Duration::from_millis(1000));
        assert_eq!(retry_backoff(9), retry_backoff(5));
    }

    #[test]
    fn retry_on_throttle_and_server_errors() {
        assert!(should_retry(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry(StatusCode::BAD_GATEWAY));
        assert!(!should_retry(StatusCode::UNAUTHORIZED));
    }
}

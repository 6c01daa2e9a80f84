use std::thread;
use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::GenerationProvider;
use crate::embedding::openai::{is_retryable_error, retry_backoff, should_retry};

/// Connection settings for [`ChatCompletionsClient`].
#[derive(Debug, Clone)]
pub struct ChatCompletionsConfig {
    pub api_key: String,
    /// OpenAI-compatible base URL, e.g. `https://api.groq.com/openai/v1`.
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: usize,
}

/// Blocking client for OpenAI-compatible `/chat/completions` endpoints.
pub struct ChatCompletionsClient {
    client: Client,
    endpoint: String,
    model: String,
    max_retries: usize,
}

impl ChatCompletionsClient {
    pub fn new(config: ChatCompletionsConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !config.api_key.trim().is_empty(),
            "missing generation API key (set DWIGHT_LLM_API_KEY)"
        );
        anyhow::ensure!(!config.model.trim().is_empty(), "missing generation model name");
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid generation API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .context("failed to build generation HTTP client")?;
        let endpoint = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        Ok(Self {
            client,
            endpoint,
            model: config.model,
            max_retries: config.max_retries.max(1),
        })
    }
}

impl GenerationProvider for ChatCompletionsClient {
    fn complete(
        &self,
        system_prompt: &str,
        user_query: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> anyhow::Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature,
            max_tokens,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_query,
                },
            ],
        };

        let mut attempt = 0usize;
        let parsed: ChatResponse = loop {
            match self.client.post(&self.endpoint).json(&body).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        break resp.json().context("failed to parse chat completion")?;
                    }
                    let text = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(%status, attempt, "Retrying chat completion");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    anyhow::bail!("chat completion failed ({status}): {text}");
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(error = %err, attempt, "Retrying chat completion");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(err).context("chat completion request failed");
                }
            }
        };

        info!(
            model = %self.model,
            tokens_used = parsed.usage.as_ref().map(|u| u.total_tokens),
            "Response generated"
        );
        extract_answer(parsed)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn extract_answer(parsed: ChatResponse) -> anyhow::Result<String> {
    let content = parsed
        .choices
        .into_iter()
        .find_map(|choice| choice.message.content)
        .context("chat completion returned no message content")?;
    Ok(content.trim().to_string())
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u64,
}

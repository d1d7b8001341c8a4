//! HTTP embedding providers: OpenAI and Ollama.
//!
//! Both send the whole batch in one request, split into `batch_size`
//! slices, and retry with exponential backoff:
//! - HTTP 429 or 5xx: retry
//! - other 4xx: fail immediately
//! - network error: retry

use anyhow::{anyhow, bail, Result};
use std::thread;
use std::time::Duration;

use super::{normalize_l2, EmbeddingProvider};
use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;

const OPENAI_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Shared request settings for the remote providers.
struct RemoteSettings {
    model: String,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
    client: reqwest::blocking::Client,
}

impl RemoteSettings {
    fn from_config(config: &EmbeddingConfig, provider: &str) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for {} provider", provider))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for {} provider", provider))?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model,
            dims,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            client,
        })
    }

    /// POSTs `body` with retry/backoff and hands a successful JSON reply to
    /// `parse`.
    fn post_with_retry<F>(
        &self,
        label: &str,
        build: impl Fn() -> reqwest::blocking::RequestBuilder,
        parse: F,
    ) -> Result<Vec<Vec<f32>>>
    where
        F: Fn(&serde_json::Value) -> Result<Vec<Vec<f32>>>,
    {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(attempt, ?delay, "{} embedding retry", label);
                thread::sleep(delay);
            }

            match build().send() {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let json: serde_json::Value = response.json()?;
                        return parse(&json);
                    }

                    let body_text = response.text().unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("{} API error {}: {}", label, status, body_text));
                        continue;
                    }
                    bail!("{} API error {}: {}", label, status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow!("{} connection error: {}", label, e));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("{} embedding failed after retries", label)))
    }

    fn embed_batched<F>(&self, texts: &[String], mut call: F) -> Result<Vec<Vec<f32>>, EmbeddingError>
    where
        F: FnMut(&[String]) -> Result<Vec<Vec<f32>>>,
    {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let mut vectors = call(batch).map_err(|e| EmbeddingError::Provider(e.to_string()))?;
            if vectors.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    actual: vectors.len(),
                });
            }
            for v in vectors.iter_mut() {
                normalize_l2(v);
            }
            out.extend(vectors);
        }
        Ok(out)
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI embeddings API.
///
/// Requires `OPENAI_API_KEY` in the environment.
pub struct OpenAIProvider {
    settings: RemoteSettings,
    api_key: String,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let settings = RemoteSettings::from_config(config, "OpenAI")?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self { settings, api_key })
    }
}

impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.settings.model
    }
    fn dims(&self) -> usize {
        self.settings.dims
    }
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let s = &self.settings;
        s.embed_batched(texts, |batch| {
            let body = serde_json::json!({ "model": s.model, "input": batch });
            s.post_with_retry(
                "OpenAI",
                || {
                    s.client
                        .post(OPENAI_URL)
                        .header("Authorization", format!("Bearer {}", self.api_key))
                        .json(&body)
                },
                parse_openai_response,
            )
        })
    }
}

/// Extracts `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, to_f32(embedding)));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance (`POST /api/embed`).
pub struct OllamaProvider {
    settings: RemoteSettings,
    url: String,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let settings = RemoteSettings::from_config(config, "Ollama")?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        Ok(Self { settings, url })
    }
}

impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.settings.model
    }
    fn dims(&self) -> usize {
        self.settings.dims
    }
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let s = &self.settings;
        let endpoint = format!("{}/api/embed", self.url.trim_end_matches('/'));
        s.embed_batched(texts, |batch| {
            let body = serde_json::json!({ "model": s.model, "input": batch });
            s.post_with_retry(
                "Ollama",
                || s.client.post(&endpoint).json(&body),
                parse_ollama_response,
            )
        })
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|e| {
            e.as_array()
                .map(|values| to_f32(values))
                .ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not an array"))
        })
        .collect()
}

fn to_f32(values: &[serde_json::Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn openai_response_is_reordered_by_index() {
        let body = json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let v = parse_openai_response(&body).unwrap();
        assert_eq!(v, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn openai_response_without_data_is_rejected() {
        assert!(parse_openai_response(&json!({ "object": "list" })).is_err());
    }

    #[test]
    fn ollama_response_parses_embeddings() {
        let body = json!({ "embeddings": [[0.5, 0.5], [1.0, 0.0]] });
        let v = parse_ollama_response(&body).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v[1], vec![1.0, 0.0]);
    }

    #[test]
    fn ollama_requires_model_and_dims() {
        let config = EmbeddingConfig {
            provider: "ollama".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(OllamaProvider::new(&config).is_err());
    }
}

//! Ollama-compatible HTTP model client.
//!
//! Implements [`EmbeddingService`] via `POST /api/embeddings` and
//! [`TextModel`] via `POST /api/generate`. Every call is bounded by the
//! configured timeout; transient transport failures get exactly one retry,
//! while malformed response bodies are surfaced without retrying.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use stockist_core::config::ModelConfig;
use stockist_core::error::{Result, StockistError};

use crate::service::{EmbeddingService, TextModel};

/// HTTP client for an Ollama-compatible model server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    embedding_model: String,
    generation_model: String,
    embedding_dim: usize,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    /// Build a client from the model configuration.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StockistError::Transport(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            embedding_model: config.embedding_model.clone(),
            generation_model: config.generation_model.clone(),
            embedding_dim: config.embedding_dim,
        })
    }

    /// POST a JSON body, with one retry on transient transport errors.
    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        match self.send_once(&url, body).await {
            Err(e) if e.is_transient() => {
                warn!(error = %e, url = %url, "Transient transport error, retrying once");
                self.send_once(&url, body).await
            }
            other => other,
        }
    }

    async fn send_once(&self, url: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| StockistError::Transport(format!("request to {} failed: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(StockistError::Transport(format!(
                "{} returned {}: {}",
                url, status, text
            )));
        }

        resp.json::<serde_json::Value>().await.map_err(|e| {
            StockistError::MalformedOutput(format!("{} returned invalid JSON: {}", url, e))
        })
    }
}

impl EmbeddingService for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(StockistError::MalformedOutput(
                "cannot embed empty text".to_string(),
            ));
        }

        let body = json!({
            "model": self.embedding_model,
            "prompt": text,
        });
        let value = self.post_json("/api/embeddings", &body).await?;

        let parsed: EmbeddingsResponse = serde_json::from_value(value).map_err(|e| {
            StockistError::MalformedOutput(format!("embeddings response: {}", e))
        })?;

        if parsed.embedding.len() != self.embedding_dim {
            return Err(StockistError::DimensionMismatch {
                expected: self.embedding_dim,
                actual: parsed.embedding.len(),
            });
        }

        debug!(model = %self.embedding_model, dim = self.embedding_dim, "Embedded text");
        Ok(parsed.embedding)
    }

    fn dimensions(&self) -> usize {
        self.embedding_dim
    }
}

impl TextModel for OllamaClient {
    async fn generate(&self, prompt: &str, format: &serde_json::Value) -> Result<String> {
        let body = json!({
            "model": self.generation_model,
            "prompt": prompt,
            "format": format,
            "stream": false,
        });
        let value = self.post_json("/api/generate", &body).await?;

        let parsed: GenerateResponse = serde_json::from_value(value)
            .map_err(|e| StockistError::MalformedOutput(format!("generate response: {}", e)))?;

        debug!(model = %self.generation_model, "Generated completion");
        Ok(parsed.response)
    }
}

//! Deterministic mock model implementations for testing.
//!
//! `MockEmbedding` derives vectors from a hash of the input text, so
//! identical inputs always produce identical outputs. `MockTextModel`
//! replays a scripted queue of responses, allowing failure injection.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use stockist_core::error::{Result, StockistError};

use crate::service::{EmbeddingService, TextModel};

/// Mock embedding service that returns deterministic hash-based vectors.
///
/// The output is derived from a hash of the input text, so identical inputs
/// always produce identical outputs. Vectors are L2-normalized. Every
/// embedded text is recorded so tests can assert on the exact requests sent.
#[derive(Debug, Clone)]
pub struct MockEmbedding {
    dimensions: usize,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new(768)
    }
}

impl MockEmbedding {
    /// Create a mock producing vectors of the given dimension.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Texts embedded so far, in call order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn hash_to_vector(text: &str, dimensions: usize) -> Vec<f32> {
        let mut result = Vec::with_capacity(dimensions);
        for i in 0..dimensions {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let h = hasher.finish();
            let val = ((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0;
            result.push(val as f32);
        }

        // L2-normalize to produce unit vectors (matching real embedding models).
        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }

        result
    }
}

impl EmbeddingService for MockEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(StockistError::MalformedOutput(
                "cannot embed empty text".to_string(),
            ));
        }
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(text.to_string());
        }
        Ok(Self::hash_to_vector(text, self.dimensions))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Mock text model that replays a scripted queue of responses.
///
/// Each `generate` call pops the next scripted entry; errors can be queued
/// to exercise failure paths. Prompts are recorded for assertions.
#[derive(Debug, Default)]
pub struct MockTextModel {
    responses: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockTextModel {
    /// Create a mock that replays the given responses in order.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|s| Ok(s.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue an additional successful response.
    pub fn push_response(&self, response: impl Into<String>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(Ok(response.into()));
        }
    }

    /// Queue a failure for the next call.
    pub fn push_error(&self, error: StockistError) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(Err(error));
        }
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl TextModel for MockTextModel {
    async fn generate(&self, prompt: &str, _format: &serde_json::Value) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let next = self
            .responses
            .lock()
            .map_err(|e| StockistError::Transport(format!("mock lock poisoned: {}", e)))?
            .pop_front();
        match next {
            Some(result) => result,
            None => Err(StockistError::Transport(
                "mock text model has no scripted response".to_string(),
            )),
        }
    }
}

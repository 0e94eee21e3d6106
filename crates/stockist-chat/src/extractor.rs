//! Intent & query extraction.
//!
//! Classifies the latest user message against the full history and, for
//! product searches, extracts the semantic query and accumulated filters.
//! The model reply is decoded and validated before use; violations surface
//! as `MalformedOutput` and are not retried here (transport-level retries
//! live in the model client).

use std::sync::Arc;

use tracing::debug;

use stockist_core::error::Result;
use stockist_core::types::{ConversationHistory, IntentClassification};

use stockist_model::service::DynTextModel;

use crate::decode::decode_structured;
use crate::prompt::{classification_format, classification_prompt};

/// LLM-backed intent classifier and query extractor.
pub struct IntentExtractor {
    model: Arc<dyn DynTextModel>,
}

impl IntentExtractor {
    pub fn new(model: Arc<dyn DynTextModel>) -> Self {
        Self { model }
    }

    /// Classify a user message and extract its search query and filters.
    pub async fn extract(
        &self,
        message: &str,
        history: &ConversationHistory,
    ) -> Result<IntentClassification> {
        let prompt = classification_prompt(message, history);
        let raw = self
            .model
            .generate_boxed(&prompt, &classification_format())
            .await?;

        let classification: IntentClassification = decode_structured(&raw)?;
        classification.validate()?;

        debug!(
            intent = ?classification.intent,
            query = %classification.query,
            filters = classification.filters.len(),
            "Classified user message"
        );
        Ok(classification)
    }
}

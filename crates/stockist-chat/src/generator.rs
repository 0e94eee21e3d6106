//! Grounded response generation.
//!
//! Calls the generative model with the candidate set and history, then
//! applies the post-generation validation layer: referenced names are
//! resolved against the supplied candidates (never fabricated), rejected
//! categories stay excluded, a turn is never both a question and a
//! recommendation, and greeting text appears only on the first assistant
//! turn.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use stockist_core::error::Result;
use stockist_core::types::{
    CatalogItem, ConversationHistory, GenerationResult, IntentClassification, QueryIntent,
};

use stockist_model::service::DynTextModel;

use crate::decode::decode_structured;
use crate::prompt::{generation_format, generation_prompt, is_topic_reset};

/// A validated reply ready to become a bot turn.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedReply {
    pub message: String,
    pub has_recommendations: bool,
    /// Referenced items, resolved against the candidate set, deduplicated.
    pub items: Vec<CatalogItem>,
}

/// LLM-backed reply generator with structural invariant enforcement.
pub struct ResponseGenerator {
    model: Arc<dyn DynTextModel>,
}

static GREETING_PREFIXES: &[&str] = &["hi", "hello", "hey"];

impl ResponseGenerator {
    pub fn new(model: Arc<dyn DynTextModel>) -> Self {
        Self { model }
    }

    /// Generate and validate a reply for the current turn.
    ///
    /// `message` is the latest user message, used for topic-reset detection.
    pub async fn generate(
        &self,
        classification: &IntentClassification,
        candidates: &[CatalogItem],
        history: &ConversationHistory,
        message: &str,
    ) -> Result<GeneratedReply> {
        let is_first = !history.has_bot_turn();
        let topic_reset = is_topic_reset(message);

        let prompt = generation_prompt(classification, candidates, history, is_first);
        let raw = self
            .model
            .generate_boxed(&prompt, &generation_format())
            .await?;

        let result: GenerationResult = decode_structured(&raw)?;
        Ok(self.validate(result, classification, candidates, is_first, topic_reset))
    }

    /// Enforce the data-model invariants on a decoded generation result.
    ///
    /// The model is untrusted: every prompt rule is re-checked here, and a
    /// violation narrows the output rather than failing the turn.
    fn validate(
        &self,
        result: GenerationResult,
        classification: &IntentClassification,
        candidates: &[CatalogItem],
        is_first: bool,
        topic_reset: bool,
    ) -> GeneratedReply {
        let mut message = result.message;
        let mut items = resolve_names(&result.referenced_names, candidates);

        if classification.intent == QueryIntent::OffTopic {
            items.clear();
        }

        // Rejected categories stay excluded until a topic reset clears them.
        if !topic_reset {
            let exclusions = classification.exclusions();
            if !exclusions.is_empty() {
                items.retain(|item| {
                    let rejected = exclusions.iter().any(|term| item.matches_category(term));
                    if rejected {
                        debug!(item = %item.title, "Dropping item from a rejected category");
                    }
                    !rejected
                });
            }
        }

        // Single-purpose turns: a reply cannot both ask a clarifying question
        // and recommend products. The question wins; dropping items only
        // narrows the output.
        if message.contains('?') && !items.is_empty() {
            debug!("Doubly-purposed turn; keeping the question and dropping items");
            items.clear();
        }

        // Greeting text iff this is the first assistant turn.
        if is_first {
            if !starts_with_greeting(&message) {
                message = format!("Hi! {}", message);
            }
        } else if starts_with_greeting(&message) {
            message = strip_greeting(&message);
        }

        GeneratedReply {
            has_recommendations: !items.is_empty(),
            message,
            items,
        }
    }
}

/// Resolve model-emitted names against the candidate set.
///
/// Matching is by trimmed, case-insensitive title. Unresolved names are
/// dropped silently; duplicate resolutions (by item ID) are dropped too.
fn resolve_names(names: &[String], candidates: &[CatalogItem]) -> Vec<CatalogItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for name in names {
        let normalized = name.trim().to_lowercase();
        match candidates
            .iter()
            .find(|c| c.title.trim().to_lowercase() == normalized)
        {
            Some(candidate) => {
                if seen.insert(candidate.id) {
                    items.push(candidate.clone());
                }
            }
            None => {
                debug!(name = %name, "Dropping referenced name not in the candidate set");
            }
        }
    }
    items
}

fn starts_with_greeting(message: &str) -> bool {
    let lower = message.trim_start().to_lowercase();
    GREETING_PREFIXES.iter().any(|g| {
        lower
            .strip_prefix(g)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '!', ',', '.']))
    })
}

/// Remove a leading greeting word and its trailing punctuation.
fn strip_greeting(message: &str) -> String {
    let trimmed = message.trim_start();
    let lower = trimmed.to_lowercase();
    for g in GREETING_PREFIXES {
        if let Some(rest) = lower.strip_prefix(g) {
            if rest.is_empty() {
                return String::new();
            }
            if rest.starts_with([' ', '!', ',', '.']) {
                return trimmed[g.len()..]
                    .trim_start_matches(['!', ',', '.', ' '])
                    .to_string();
            }
        }
    }
    message.to_string()
}

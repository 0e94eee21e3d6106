use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StockistError};

// =============================================================================
// Catalog
// =============================================================================

/// A single product in the catalog.
///
/// Immutable once embedded; the stored embedding is recomputed only by the
/// offline backfill job. `score` is populated only on items returned from a
/// vector search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: Uuid,
    pub title: String,
    pub brand: String,
    pub product_type: String,
    /// Category tags the item belongs to.
    pub collections: Vec<String>,
    pub description: String,
    /// Embedding vector; empty until the backfill job has run.
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// Similarity score, present only on search results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl CatalogItem {
    /// Derive the canonical embedding-input text for this item.
    ///
    /// The field order is fixed so that identical items always produce
    /// byte-identical text, keeping embedding requests deterministic.
    pub fn embedding_text(&self) -> String {
        format!(
            "{}. Brand: {}. Type: {}. Description: {}. Categories: {}",
            self.title,
            self.brand,
            self.product_type,
            self.description,
            self.collections.join(", ")
        )
    }

    /// Whether this item belongs to the given category or attribute term.
    ///
    /// Matches case-insensitively against collection tags and the product
    /// type. Used to enforce hard rejections across turns.
    pub fn matches_category(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return false;
        }
        self.collections
            .iter()
            .any(|c| c.to_lowercase().contains(&term))
            || self.product_type.to_lowercase().contains(&term)
    }
}

// =============================================================================
// Conversation
// =============================================================================

/// One exchange unit within a session.
///
/// User and assistant turns carry distinct payloads, so they are distinct
/// variants rather than one record with optional fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ConversationTurn {
    User {
        text: String,
        at: DateTime<Utc>,
    },
    Bot {
        text: String,
        /// Catalog items this reply references, in reply order.
        referenced_items: Vec<CatalogItem>,
        at: DateTime<Utc>,
    },
}

impl ConversationTurn {
    /// Create a user turn stamped with the current time.
    pub fn user(text: impl Into<String>) -> Self {
        ConversationTurn::User {
            text: text.into(),
            at: Utc::now(),
        }
    }

    /// Create an assistant turn stamped with the current time.
    pub fn bot(text: impl Into<String>, referenced_items: Vec<CatalogItem>) -> Self {
        ConversationTurn::Bot {
            text: text.into(),
            referenced_items,
            at: Utc::now(),
        }
    }

    /// The message text, regardless of role.
    pub fn text(&self) -> &str {
        match self {
            ConversationTurn::User { text, .. } => text,
            ConversationTurn::Bot { text, .. } => text,
        }
    }

    /// Whether this is an assistant turn.
    pub fn is_bot(&self) -> bool {
        matches!(self, ConversationTurn::Bot { .. })
    }

    /// Items referenced by this turn (empty for user turns).
    pub fn referenced_items(&self) -> &[CatalogItem] {
        match self {
            ConversationTurn::User { .. } => &[],
            ConversationTurn::Bot {
                referenced_items, ..
            } => referenced_items,
        }
    }
}

/// Append-only ordered sequence of conversation turns.
///
/// Insertion order is semantically significant: it defines the first
/// assistant turn, the latest user message, and the recency of rejections.
/// There is deliberately no API to remove or reorder turns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationHistory(Vec<ConversationTurn>);

impl ConversationHistory {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a turn to the end of the history.
    pub fn push(&mut self, turn: ConversationTurn) {
        self.0.push(turn);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConversationTurn> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any assistant turn exists yet.
    pub fn has_bot_turn(&self) -> bool {
        self.0.iter().any(ConversationTurn::is_bot)
    }

    /// Text of the most recent user turn, if any.
    pub fn last_user_text(&self) -> Option<&str> {
        self.0.iter().rev().find_map(|t| match t {
            ConversationTurn::User { text, .. } => Some(text.as_str()),
            ConversationTurn::Bot { .. } => None,
        })
    }
}

impl<'a> IntoIterator for &'a ConversationHistory {
    type Item = &'a ConversationTurn;
    type IntoIter = std::slice::Iter<'a, ConversationTurn>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// =============================================================================
// Model output records
// =============================================================================

/// Classification of a user message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryIntent {
    #[serde(rename = "PRODUCT_SEARCH")]
    ProductSearch,
    #[serde(rename = "OFF_TOPIC")]
    OffTopic,
}

/// Structured output of the intent & query extraction stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentClassification {
    pub intent: QueryIntent,
    /// Semantic search query; empty iff the intent is OFF_TOPIC.
    pub query: String,
    /// User-stated preferences and exclusions, e.g. "red", "cheap",
    /// "NOT vegan". Empty iff the intent is OFF_TOPIC.
    pub filters: Vec<String>,
}

impl IntentClassification {
    /// Enforce the OFF_TOPIC invariant: off-topic classifications must carry
    /// no query and no filters. Violations count as malformed model output.
    pub fn validate(&self) -> Result<()> {
        if self.intent == QueryIntent::OffTopic
            && (!self.query.is_empty() || !self.filters.is_empty())
        {
            return Err(StockistError::MalformedOutput(
                "OFF_TOPIC classification with non-empty query or filters".to_string(),
            ));
        }
        Ok(())
    }

    /// Hard-exclusion terms from negated filters ("NOT vegan" -> "vegan").
    pub fn exclusions(&self) -> Vec<String> {
        self.filters
            .iter()
            .filter_map(|f| {
                let trimmed = f.trim();
                let lower = trimmed.to_lowercase();
                lower
                    .strip_prefix("not ")
                    .map(|rest| rest.trim().to_string())
                    .filter(|rest| !rest.is_empty())
            })
            .collect()
    }
}

/// Structured output of the grounded response generation stage.
///
/// `referenced_names` are raw item names as emitted by the model; they are
/// resolved against the candidate set before a bot turn is produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub message: String,
    #[serde(rename = "related_products")]
    pub has_recommendations: bool,
    #[serde(rename = "related_products_names", default)]
    pub referenced_names: Vec<String>,
}

//! Conversation orchestrator: drives the per-turn pipeline.
//!
//! One incoming user message flows through classify -> (skip | search) ->
//! generate, producing exactly one new bot turn. The orchestrator is the
//! failure containment point: every typed error from any stage is logged
//! and converted into the fixed fallback reply, so no error ever crosses
//! the public boundary and the conversation stays usable on the next turn.

use std::sync::Arc;

use tracing::{info, warn};

use stockist_core::config::ChatConfig;
use stockist_core::types::{ConversationHistory, ConversationTurn, QueryIntent};

use stockist_model::service::DynTextModel;
use stockist_vector::search::CandidateSearch;

use crate::error::ChatError;
use crate::extractor::IntentExtractor;
use crate::generator::ResponseGenerator;
use crate::prompt::is_topic_reset;

/// Central orchestrator coordinating extraction, retrieval, and generation.
///
/// Holds explicitly injected resource handles; construct once at startup and
/// share via `Arc`. History is read-only here: the caller owns the session
/// and appends both the user turn and the returned bot turn.
pub struct ChatOrchestrator {
    extractor: IntentExtractor,
    generator: ResponseGenerator,
    search: CandidateSearch,
    config: ChatConfig,
}

impl ChatOrchestrator {
    /// Create a new orchestrator from a shared text model, a candidate
    /// search engine, and the chat configuration.
    pub fn new(model: Arc<dyn DynTextModel>, search: CandidateSearch, config: ChatConfig) -> Self {
        Self {
            extractor: IntentExtractor::new(model.clone()),
            generator: ResponseGenerator::new(model),
            search,
            config,
        }
    }

    /// Handle one user message and produce the assistant's turn.
    ///
    /// Never fails: any pipeline error resolves to the configured fallback
    /// reply with no referenced items.
    pub async fn respond(&self, message: &str, history: &ConversationHistory) -> ConversationTurn {
        match self.try_respond(message, history).await {
            Ok(turn) => turn,
            Err(e) => {
                warn!(error = %e, "Turn failed; returning fallback reply");
                ConversationTurn::bot(self.config.fallback_message.clone(), vec![])
            }
        }
    }

    async fn try_respond(
        &self,
        message: &str,
        history: &ConversationHistory,
    ) -> Result<ConversationTurn, ChatError> {
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.len() > self.config.max_message_length {
            return Err(ChatError::MessageTooLong(self.config.max_message_length));
        }

        let classification = self.extractor.extract(message, history).await?;

        let candidates = match classification.intent {
            QueryIntent::ProductSearch => {
                let composite = composite_query(&classification.query, &classification.filters);
                let mut found = self.search.search(&composite).await?;

                // Hard rejections also constrain retrieval, not only the
                // final reply, unless this turn resets the topic.
                if !is_topic_reset(message) {
                    let exclusions = classification.exclusions();
                    if !exclusions.is_empty() {
                        found.retain(|item| {
                            !exclusions.iter().any(|term| item.matches_category(term))
                        });
                    }
                }
                found
            }
            QueryIntent::OffTopic => Vec::new(),
        };

        let reply = self
            .generator
            .generate(&classification, &candidates, history, message)
            .await?;

        info!(
            intent = ?classification.intent,
            candidates = candidates.len(),
            referenced = reply.items.len(),
            "Turn complete"
        );
        Ok(ConversationTurn::bot(reply.message, reply.items))
    }
}

/// Build the composite query string sent to the embedding model.
fn composite_query(query: &str, filters: &[String]) -> String {
    format!("Query: {}\nFilters: {}", query, filters.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockist_core::config::SearchConfig;
    use stockist_core::error::StockistError;
    use stockist_core::types::CatalogItem;
    use stockist_model::mock::{MockEmbedding, MockTextModel};
    use stockist_model::service::EmbeddingService;
    use uuid::Uuid;

    const DIM: usize = 32;

    async fn embedded_item(title: &str, collections: &[&str]) -> CatalogItem {
        let embedder = MockEmbedding::new(DIM);
        let mut item = CatalogItem {
            id: Uuid::new_v4(),
            title: title.to_string(),
            brand: "Acme".to_string(),
            product_type: "Food".to_string(),
            collections: collections.iter().map(|s| s.to_string()).collect(),
            description: format!("{} description", title),
            embedding: vec![],
            score: None,
        };
        item.embedding = embedder.embed(&item.embedding_text()).await.unwrap();
        item
    }

    fn orchestrator_with(
        catalog: Vec<CatalogItem>,
        responses: &[&str],
    ) -> (ChatOrchestrator, Arc<MockTextModel>) {
        let mock = Arc::new(MockTextModel::with_responses(responses.iter().copied()));
        let search = CandidateSearch::new(
            catalog,
            MockEmbedding::new(DIM),
            &SearchConfig::default(),
        );
        let orch = ChatOrchestrator::new(mock.clone(), search, ChatConfig::default());
        (orch, mock)
    }

    fn fallback() -> String {
        ChatConfig::default().fallback_message
    }

    // ---- Product search scenario ----

    #[tokio::test]
    async fn test_hungry_scenario_end_to_end() {
        let catalog = vec![
            embedded_item("Tomato Soup", &["soup"]).await,
            embedded_item("Granola Bar", &["snacks"]).await,
            embedded_item("Trail Mix", &["snacks"]).await,
        ];
        let (orch, mock) = orchestrator_with(
            catalog,
            &[
                r#"{"intent": "PRODUCT_SEARCH", "query": "quick food snacks", "filters": []}"#,
                r#"{"message": "Hi! Tomato Soup and a Granola Bar should hit the spot.", "related_products": true, "related_products_names": ["Tomato Soup", "Granola Bar"]}"#,
            ],
        );

        let turn = orch.respond("I'm hungry", &ConversationHistory::new()).await;

        assert!(turn.is_bot());
        let items = turn.referenced_items();
        assert!(items.len() <= 5);
        assert_eq!(items.len(), 2);

        // No duplicate identifiers.
        let mut ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), items.len());

        // Both model calls happened: classify, then generate.
        assert_eq!(mock.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_composite_query_reaches_generation_stage() {
        let catalog = vec![embedded_item("Tomato Soup", &["soup"]).await];
        let (orch, mock) = orchestrator_with(
            catalog,
            &[
                r#"{"intent": "PRODUCT_SEARCH", "query": "soup", "filters": ["warm"]}"#,
                r#"{"message": "Hi! Tomato Soup it is.", "related_products": true, "related_products_names": ["Tomato Soup"]}"#,
            ],
        );

        orch.respond("something warm", &ConversationHistory::new())
            .await;

        // The generation prompt carries the extracted query and filters.
        let prompts = mock.prompts();
        assert!(prompts[1].contains("User query:\nsoup"));
        assert!(prompts[1].contains("Filters:\nwarm"));
        assert!(prompts[1].contains("- Tomato Soup: Tomato Soup description"));
    }

    // ---- Off-topic scenario ----

    #[tokio::test]
    async fn test_off_topic_skips_retrieval() {
        let catalog = vec![embedded_item("Tomato Soup", &["soup"]).await];
        let (orch, mock) = orchestrator_with(
            catalog,
            &[
                r#"{"intent": "OFF_TOPIC", "query": "", "filters": []}"#,
                r#"{"message": "Hi! I'm best at helping you find products.", "related_products": false, "related_products_names": []}"#,
            ],
        );

        let turn = orch
            .respond("what's the capital of France?", &ConversationHistory::new())
            .await;

        assert!(turn.referenced_items().is_empty());
        // Generation saw an empty candidate set.
        assert!(mock.prompts()[1].contains("Products:\nNo products"));
    }

    // ---- Rejection persistence scenario ----

    #[tokio::test]
    async fn test_not_red_scenario_excludes_rejected_category() {
        let red = embedded_item("Red Dress", &["red", "dresses"]).await;
        let blue = embedded_item("Blue Dress", &["blue", "dresses"]).await;
        let blue_id = blue.id;

        let mut history = ConversationHistory::new();
        history.push(ConversationTurn::user("I want a dress"));
        history.push(ConversationTurn::bot(
            "How about these?",
            vec![red.clone(), blue.clone()],
        ));

        let (orch, mock) = orchestrator_with(
            vec![red, blue],
            &[
                r#"{"intent": "PRODUCT_SEARCH", "query": "dress", "filters": ["NOT red"]}"#,
                r#"{"message": "The Blue Dress avoids red entirely.", "related_products": true, "related_products_names": ["Blue Dress"]}"#,
            ],
        );

        let turn = orch.respond("not red", &history).await;

        let items = turn.referenced_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, blue_id);

        // The rejected category never reached the generation candidate list.
        assert!(!mock.prompts()[1].contains("- Red Dress:"));
    }

    // ---- Failure containment ----

    #[tokio::test]
    async fn test_extractor_failure_yields_fallback() {
        let (orch, _) = orchestrator_with(vec![], &[]);
        // No scripted responses: the first model call fails.

        let turn = orch.respond("I'm hungry", &ConversationHistory::new()).await;

        assert!(turn.is_bot());
        assert_eq!(turn.text(), fallback());
        assert!(turn.referenced_items().is_empty());
    }

    #[tokio::test]
    async fn test_extractor_timeout_yields_fallback() {
        let mock = Arc::new(MockTextModel::default());
        mock.push_error(StockistError::Transport("deadline exceeded".to_string()));
        let search =
            CandidateSearch::new(vec![], MockEmbedding::new(DIM), &SearchConfig::default());
        let orch = ChatOrchestrator::new(mock, search, ChatConfig::default());

        let turn = orch.respond("I'm hungry", &ConversationHistory::new()).await;
        assert_eq!(turn.text(), fallback());
        assert!(turn.referenced_items().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_generation_yields_fallback() {
        let catalog = vec![embedded_item("Tomato Soup", &["soup"]).await];
        let (orch, _) = orchestrator_with(
            catalog,
            &[
                r#"{"intent": "PRODUCT_SEARCH", "query": "soup", "filters": []}"#,
                "here is some prose instead of JSON",
            ],
        );

        let turn = orch.respond("soup please", &ConversationHistory::new()).await;
        assert_eq!(turn.text(), fallback());
    }

    #[tokio::test]
    async fn test_off_topic_invariant_violation_yields_fallback() {
        let (orch, _) = orchestrator_with(
            vec![],
            &[r#"{"intent": "OFF_TOPIC", "query": "sneaky query", "filters": []}"#],
        );

        let turn = orch.respond("hello", &ConversationHistory::new()).await;
        assert_eq!(turn.text(), fallback());
    }

    #[tokio::test]
    async fn test_empty_message_yields_fallback_without_model_calls() {
        let (orch, mock) = orchestrator_with(vec![], &[]);

        let turn = orch.respond("", &ConversationHistory::new()).await;
        assert_eq!(turn.text(), fallback());
        assert!(mock.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_message_yields_fallback() {
        let (orch, mock) = orchestrator_with(vec![], &[]);
        let long = "a".repeat(ChatConfig::default().max_message_length + 1);

        let turn = orch.respond(&long, &ConversationHistory::new()).await;
        assert_eq!(turn.text(), fallback());
        assert!(mock.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_not_sticky() {
        let catalog = vec![embedded_item("Tomato Soup", &["soup"]).await];
        let (orch, mock) = orchestrator_with(catalog, &[]);

        // First turn fails (no scripted response).
        let failed = orch.respond("soup", &ConversationHistory::new()).await;
        assert_eq!(failed.text(), fallback());

        // Script the next turn; it succeeds on the same orchestrator.
        mock.push_response(r#"{"intent": "PRODUCT_SEARCH", "query": "soup", "filters": []}"#);
        mock.push_response(
            r#"{"message": "Hi! Tomato Soup is ready.", "related_products": true, "related_products_names": ["Tomato Soup"]}"#,
        );

        let mut history = ConversationHistory::new();
        history.push(ConversationTurn::user("soup"));
        history.push(failed);

        let turn = orch.respond("soup again", &history).await;
        assert_ne!(turn.text(), fallback());
        assert_eq!(turn.referenced_items().len(), 1);
    }

    // ---- Greeting across turns ----

    #[tokio::test]
    async fn test_greeting_only_on_first_assistant_turn() {
        let catalog = vec![embedded_item("Tomato Soup", &["soup"]).await];
        let (orch, _) = orchestrator_with(
            catalog,
            &[
                r#"{"intent": "PRODUCT_SEARCH", "query": "soup", "filters": []}"#,
                r#"{"message": "Tomato Soup is a solid pick.", "related_products": true, "related_products_names": ["Tomato Soup"]}"#,
                r#"{"intent": "PRODUCT_SEARCH", "query": "soup", "filters": []}"#,
                r#"{"message": "Hello! Tomato Soup again.", "related_products": true, "related_products_names": ["Tomato Soup"]}"#,
            ],
        );

        let mut history = ConversationHistory::new();

        let first = orch.respond("soup", &history).await;
        assert!(first.text().starts_with("Hi! "));

        history.push(ConversationTurn::user("soup"));
        history.push(first);

        let second = orch.respond("more soup", &history).await;
        assert!(!second.text().to_lowercase().starts_with("hello"));
        assert!(!second.text().to_lowercase().starts_with("hi"));
    }

    // ---- Subset invariant ----

    #[tokio::test]
    async fn test_referenced_items_always_subset_of_candidates() {
        let catalog = vec![
            embedded_item("Tomato Soup", &["soup"]).await,
            embedded_item("Granola Bar", &["snacks"]).await,
        ];
        let catalog_ids: Vec<Uuid> = catalog.iter().map(|i| i.id).collect();

        let (orch, _) = orchestrator_with(
            catalog,
            &[
                r#"{"intent": "PRODUCT_SEARCH", "query": "food", "filters": []}"#,
                r#"{"message": "Hi! Tomato Soup, plus an Imaginary Feast.", "related_products": true, "related_products_names": ["Tomato Soup", "Imaginary Feast"]}"#,
            ],
        );

        let turn = orch.respond("food", &ConversationHistory::new()).await;
        for item in turn.referenced_items() {
            assert!(catalog_ids.contains(&item.id));
        }
        assert_eq!(turn.referenced_items().len(), 1);
    }

    // ---- Composite query helper ----

    #[test]
    fn test_composite_query_format() {
        let q = composite_query("summer dress", &["red".to_string(), "cheap".to_string()]);
        assert_eq!(q, "Query: summer dress\nFilters: red, cheap");
    }

    #[test]
    fn test_composite_query_no_filters() {
        let q = composite_query("summer dress", &[]);
        assert_eq!(q, "Query: summer dress\nFilters: ");
    }
}

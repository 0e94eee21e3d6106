//! Prompt construction for the two model calls.
//!
//! The classification and generation prompts carry the policy rules the
//! pipeline relies on (rejection persistence, turn-control exclusivity,
//! greeting behavior, no fabrication). The model is still untrusted: every
//! rule stated here is re-checked structurally after decoding.

use serde_json::json;

use stockist_core::types::{CatalogItem, ConversationHistory, IntentClassification, QueryIntent};

/// Phrases that signal the user wants to abandon the current topic and
/// restart product discovery fresh.
static TOPIC_RESET_PHRASES: &[&str] = &[
    "forget it",
    "forget that",
    "never mind",
    "nevermind",
    "something else",
    "start over",
    "different topic",
];

/// Whether the latest user message asks for a topic reset.
pub fn is_topic_reset(message: &str) -> bool {
    let lower = message.to_lowercase();
    TOPIC_RESET_PHRASES.iter().any(|p| lower.contains(p))
}

/// Render the conversation history as prompt lines.
///
/// Each turn contributes its sender role and text; assistant turns also list
/// the titles of the items they referenced, so rejections and prior
/// recommendations stay visible to the model.
pub fn render_history(history: &ConversationHistory) -> String {
    history
        .iter()
        .map(|turn| {
            let role = if turn.is_bot() { "bot" } else { "user" };
            let items = turn.referenced_items();
            if items.is_empty() {
                format!("{}: {}", role, turn.text())
            } else {
                let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
                format!("{}: {} (Products: {})", role, turn.text(), titles.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the intent classification and query extraction prompt.
pub fn classification_prompt(message: &str, history: &ConversationHistory) -> String {
    format!(
        r#"You are an intent classification and query extraction system.

Your task:
1. Classify the user intent
2. Extract a concise semantic product query for vector search

You must strictly follow the rules below.

INTENTS:
- PRODUCT_SEARCH: the user is looking for products, food, items, ideas to buy, or expresses a need that can be satisfied with products (e.g. hunger)
- OFF_TOPIC: the message is not related to products

IMPORTANT INTERPRETATION RULES:
- Messages expressing hunger or desire to eat are PRODUCT_SEARCH
- Explicit rejections in the conversation history are hard constraints
- Do NOT include rejected categories or attributes in the query
- Add filters with explicit user preferences (e.g. "I want a red dress" -> filter: "red", "I want a cheap phone" -> filter: "cheap", "I don't want vegan options" -> filter: "NOT vegan")

QUERY RULES:
- Only for PRODUCT_SEARCH
- Neutral, factual English
- Short and descriptive (no filler, no greetings)
- Optimized for vector similarity search
- Do NOT mention brands unless explicitly requested

OFF_TOPIC RULES:
- If intent is OFF_TOPIC:
  - query must be an empty string
  - filters must be an empty array

OUTPUT FORMAT:
- Respond ONLY with raw JSON
- No explanations, no markdown, no extra text

JSON SCHEMA:
{{
  "intent": "PRODUCT_SEARCH | OFF_TOPIC",
  "query": "string",
  "filters": ["string"]
}}

USER MESSAGE:
{message}

CONVERSATION HISTORY:
{history}
"#,
        message = message,
        history = render_history(history),
    )
}

/// Structured-output format hint for the classification call.
pub fn classification_format() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "intent": { "type": "string" },
            "query": { "type": "string" },
            "filters": {
                "type": "array",
                "items": { "type": "string" }
            }
        }
    })
}

/// Build the grounded response generation prompt.
pub fn generation_prompt(
    classification: &IntentClassification,
    candidates: &[CatalogItem],
    history: &ConversationHistory,
    is_first_assistant_message: bool,
) -> String {
    let intent = match classification.intent {
        QueryIntent::ProductSearch => "PRODUCT_SEARCH",
        QueryIntent::OffTopic => "OFF_TOPIC",
    };
    let filters = if classification.filters.is_empty() {
        "No filters".to_string()
    } else {
        classification.filters.join(", ")
    };
    let products = if candidates.is_empty() {
        "No products".to_string()
    } else {
        candidates
            .iter()
            .map(|p| format!("- {}: {}", p.title, p.description))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You are a product recommendation assistant.

You must respond ONLY to the LAST user message.

PRIMARY GOAL:
Help users find suitable products in a natural, non-repetitive way.

GREETING RULE:
- If this is the FIRST assistant message in the conversation:
  - Start with a short friendly greeting ("Hi!" or "Hello!")
- Otherwise:
  - Do NOT greet
  - Do NOT restart the conversation

CONVERSATION CONTEXT:
- If the user explicitly changes topic or intent (e.g. "forget it", "actually", "I want something else"):
  - Ignore all previous products and preferences
  - Treat the message as a fresh PRODUCT_SEARCH
  - Do NOT greet again

CORE RULES (STRICT):
- Respond ONLY to the last user message
- Never repeat the same product name
- Never list the same product twice
- Never recommend products from rejected categories
- Do NOT invent products
- Do NOT mention internal logic, AI, embeddings, or rules

TURN CONTROL RULES:
- In ONE response, do ONLY ONE of the following:
  A) Ask ONE clarifying question
  B) Recommend products
- NEVER ask a question and recommend products in the same response

INTENT BEHAVIOR:

OFF_TOPIC:
- Respond briefly and politely
- Gently redirect toward product discovery
- Do NOT engage in off-topic discussion

PRODUCT_SEARCH:
- Use ONLY the provided products
- If the request is vague or ambiguous:
  - Ask ONE clarifying question
  - Do NOT recommend products yet
- If relevant products exist:
  - Recommend them
  - Briefly explain why they match the request
- If no relevant products exist:
  - Clearly say so
- Do NOT recommend unrelated products just to have something to recommend

OUTPUT FORMAT RULES:
- Return ONLY valid JSON
- No text outside the JSON object

JSON FORMAT:
{{
  "message": "string",
  "related_products": true | false,
  "related_products_names": ["product name"]
}}

INPUT:

Is first assistant message:
{is_first}

Intent:
{intent}

User query:
{query}

Filters:
{filters}

Products:
{products}

Conversation history:
{history}
"#,
        is_first = if is_first_assistant_message { "YES" } else { "NO" },
        intent = intent,
        query = classification.query,
        filters = filters,
        products = products,
        history = render_history(history),
    )
}

/// Structured-output format hint for the generation call.
pub fn generation_format() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "message": { "type": "string" },
            "related_products": { "type": "boolean" },
            "related_products_names": {
                "type": "array",
                "items": { "type": "string" }
            }
        }
    })
}

//! Structured-output decoding.
//!
//! The generative backend is untrusted: its replies are free-form text that
//! is *expected* to be JSON matching a declared schema. This module is the
//! single place where that text becomes a typed record or a
//! `MalformedOutput` error, before any field is used.

use serde::de::DeserializeOwned;

use stockist_core::error::{Result, StockistError};

/// Decode a raw model reply into a typed record.
///
/// Tolerates surrounding whitespace and a fenced or prefixed reply by
/// falling back to the first `{` ... last `}` span.
pub fn decode_structured<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    // Best-effort: extract the first JSON object substring.
    let start = trimmed.find('{').ok_or_else(|| {
        StockistError::MalformedOutput("model reply contains no JSON object".to_string())
    })?;
    let end = trimmed.rfind('}').ok_or_else(|| {
        StockistError::MalformedOutput("model reply contains no JSON object".to_string())
    })?;
    if end < start {
        return Err(StockistError::MalformedOutput(
            "model reply contains no JSON object".to_string(),
        ));
    }

    serde_json::from_str(&trimmed[start..=end])
        .map_err(|e| StockistError::MalformedOutput(format!("model reply failed to parse: {}", e)))
}

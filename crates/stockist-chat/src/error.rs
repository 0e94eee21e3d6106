//! Error types for the conversational pipeline.

use stockist_core::error::StockistError;

/// Errors from the chat pipeline.
///
/// These never cross the orchestrator's public boundary; `respond` converts
/// every variant into the fixed fallback reply and logs the typed cause.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("pipeline stage failed: {0}")]
    Stage(#[from] StockistError),
}

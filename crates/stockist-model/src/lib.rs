//! Stockist model crate - transport layer for the embedding and
//! text-generation collaborators.
//!
//! Provides the capability traits used across the workspace, an HTTP client
//! for an Ollama-compatible backend, and deterministic mocks for testing.

pub mod client;
pub mod mock;
pub mod service;

pub use client::OllamaClient;
pub use mock::{MockEmbedding, MockTextModel};
pub use service::{DynEmbeddingService, DynTextModel, EmbeddingService, TextModel};

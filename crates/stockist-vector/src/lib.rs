//! Stockist vector crate - in-memory index, candidate search, catalog store
//! interface, and the offline embedding backfill.
//!
//! Provides brute-force cosine similarity search over catalog embeddings
//! with a fixed dimension and deterministic tie-breaking, plus the batch
//! job that keeps stored embeddings in sync with catalog text.

pub mod backfill;
pub mod index;
pub mod search;
pub mod store;

pub use backfill::{BackfillReport, EmbeddingBackfill};
pub use index::{SearchHit, VectorIndex};
pub use search::CandidateSearch;
pub use store::{CatalogStore, MemoryCatalogStore};

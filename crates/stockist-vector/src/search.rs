//! Candidate retrieval combining vector search with embedding generation.
//!
//! `CandidateSearch` embeds the composite query, scans an oversampled pool
//! of catalog candidates, and returns the top `limit` items ranked by
//! similarity. Pool and limit sizes are configuration, not protocol.

use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use stockist_core::config::SearchConfig;
use stockist_core::error::Result;
use stockist_core::types::CatalogItem;

use stockist_model::service::{DynEmbeddingService, EmbeddingService};

use crate::index::VectorIndex;

/// Vector-backed candidate retrieval over a catalog snapshot.
///
/// Uses dynamic dispatch (`Box<dyn DynEmbeddingService>`) so that production
/// code can supply the HTTP client while tests use `MockEmbedding`. Items
/// with missing or wrong-dimension embeddings are excluded from the pool at
/// construction time, before any query runs.
pub struct CandidateSearch {
    items: HashMap<Uuid, CatalogItem>,
    index: VectorIndex,
    embedder: Box<dyn DynEmbeddingService>,
    num_candidates: usize,
    limit: usize,
}

impl CandidateSearch {
    /// Build a search engine over the given catalog snapshot.
    pub fn new(
        catalog: Vec<CatalogItem>,
        embedder: impl EmbeddingService + 'static,
        config: &SearchConfig,
    ) -> Self {
        Self::new_dyn(catalog, Box::new(embedder), config)
    }

    /// Build from a pre-boxed dynamic embedding service.
    pub fn new_dyn(
        catalog: Vec<CatalogItem>,
        embedder: Box<dyn DynEmbeddingService>,
        config: &SearchConfig,
    ) -> Self {
        let dimensions = embedder.dimensions();
        let index = VectorIndex::new(dimensions);
        let mut items = HashMap::with_capacity(catalog.len());

        for item in catalog {
            if item.embedding.is_empty() {
                debug!(item = %item.title, "Excluding item without embedding from pool");
                continue;
            }
            if let Err(e) = index.insert(item.id, item.embedding.clone()) {
                warn!(item = %item.title, error = %e, "Excluding item from pool");
                continue;
            }
            items.insert(item.id, item);
        }

        Self {
            items,
            index,
            embedder,
            num_candidates: config.num_candidates,
            limit: config.limit,
        }
    }

    /// Number of items in the searchable pool.
    pub fn pool_size(&self) -> usize {
        self.items.len()
    }

    /// Retrieve the candidate set for a composite query string.
    ///
    /// Scans up to `num_candidates` pool entries and returns the top `limit`
    /// items ranked by descending similarity, each carrying its score.
    pub async fn search(&self, composite_query: &str) -> Result<Vec<CatalogItem>> {
        let query_vec = self.embedder.embed_boxed(composite_query).await?;

        let mut hits = self.index.search(&query_vec, self.num_candidates)?;
        hits.truncate(self.limit);

        let candidates: Vec<CatalogItem> = hits
            .into_iter()
            .filter_map(|hit| {
                self.items.get(&hit.id).map(|item| {
                    let mut item = item.clone();
                    item.score = Some(hit.score);
                    item
                })
            })
            .collect();

        debug!(
            query = composite_query,
            candidates = candidates.len(),
            "Candidate search complete"
        );
        Ok(candidates)
    }
}

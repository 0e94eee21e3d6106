//! Offline embedding backfill job.
//!
//! Reads the full catalog, derives the canonical embedding text per item,
//! fans out embedding requests with bounded concurrency, and bulk-replaces
//! the stored embeddings in a single write. Not part of the live
//! conversational path.

use futures::stream::{self, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use stockist_core::error::{Result, StockistError};

use stockist_model::service::EmbeddingService;

use crate::store::CatalogStore;

/// Outcome of a backfill run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    /// Items whose embeddings were written back.
    pub embedded: usize,
    /// Items rejected for a wrong-dimension embedding.
    pub skipped: usize,
}

/// Batch job that recomputes catalog embeddings.
pub struct EmbeddingBackfill<S, E> {
    store: S,
    embedder: E,
    concurrency: usize,
}

impl<S, E> EmbeddingBackfill<S, E>
where
    S: CatalogStore,
    E: EmbeddingService,
{
    /// Create a backfill job with the given fan-out bound.
    pub fn new(store: S, embedder: E, concurrency: usize) -> Self {
        Self {
            store,
            embedder,
            concurrency: concurrency.max(1),
        }
    }

    /// Run the backfill: embed every catalog item and write the results back.
    ///
    /// Items whose returned vector fails the dimension check are skipped and
    /// logged; transport or store failures abort the whole run.
    pub async fn run(&self) -> Result<BackfillReport> {
        let items = self.store.get_all().await?;
        let expected_dim = self.embedder.dimensions();
        let total = items.len();

        let results: Vec<(Uuid, String, Result<Vec<f32>>)> = stream::iter(items)
            .map(|item| {
                let text = item.embedding_text();
                let id = item.id;
                let title = item.title.clone();
                async move {
                    let embedding = self.embedder.embed(&text).await;
                    (id, title, embedding)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut updates: Vec<(Uuid, Vec<f32>)> = Vec::with_capacity(results.len());
        let mut skipped = 0;
        for (id, title, result) in results {
            match result {
                Ok(embedding) if embedding.len() == expected_dim => {
                    updates.push((id, embedding));
                }
                Ok(embedding) => {
                    warn!(
                        item = %title,
                        expected = expected_dim,
                        actual = embedding.len(),
                        "Skipping item with wrong-dimension embedding"
                    );
                    skipped += 1;
                }
                Err(StockistError::DimensionMismatch { expected, actual }) => {
                    warn!(
                        item = %title,
                        expected,
                        actual,
                        "Skipping item with wrong-dimension embedding"
                    );
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let embedded = self.store.bulk_replace_embeddings(updates).await?;
        info!(total, embedded, skipped, "Embedding backfill complete");

        Ok(BackfillReport { embedded, skipped })
    }
}

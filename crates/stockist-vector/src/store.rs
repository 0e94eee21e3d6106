//! Catalog store interface.
//!
//! The conversational core reads the catalog in bulk and writes back
//! computed embeddings; everything else about persistence belongs to the
//! embedding application. `MemoryCatalogStore` is the in-process
//! implementation used by tests and embedded deployments.

use std::sync::{Arc, RwLock};

use uuid::Uuid;

use stockist_core::error::{Result, StockistError};
use stockist_core::types::CatalogItem;

/// Bulk read/write access to the product catalog.
pub trait CatalogStore: Send + Sync {
    /// Fetch every catalog item, in catalog insertion order.
    fn get_all(&self) -> impl std::future::Future<Output = Result<Vec<CatalogItem>>> + Send;

    /// Replace the stored embedding of each listed item.
    ///
    /// Returns the number of items actually updated; unknown IDs are
    /// ignored.
    fn bulk_replace_embeddings(
        &self,
        updates: Vec<(Uuid, Vec<f32>)>,
    ) -> impl std::future::Future<Output = Result<usize>> + Send;
}

/// In-memory catalog store preserving insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalogStore {
    items: Arc<RwLock<Vec<CatalogItem>>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with the given items.
    pub fn with_items(items: Vec<CatalogItem>) -> Self {
        Self {
            items: Arc::new(RwLock::new(items)),
        }
    }

    /// Append an item to the catalog.
    pub fn add(&self, item: CatalogItem) -> Result<()> {
        let mut items = self
            .items
            .write()
            .map_err(|e| StockistError::StoreUnavailable(format!("Lock poisoned: {}", e)))?;
        items.push(item);
        Ok(())
    }
}

impl CatalogStore for MemoryCatalogStore {
    async fn get_all(&self) -> Result<Vec<CatalogItem>> {
        let items = self
            .items
            .read()
            .map_err(|e| StockistError::StoreUnavailable(format!("Lock poisoned: {}", e)))?;
        Ok(items.clone())
    }

    async fn bulk_replace_embeddings(&self, updates: Vec<(Uuid, Vec<f32>)>) -> Result<usize> {
        let mut items = self
            .items
            .write()
            .map_err(|e| StockistError::StoreUnavailable(format!("Lock poisoned: {}", e)))?;

        let mut updated = 0;
        for (id, embedding) in updates {
            if let Some(item) = items.iter_mut().find(|i| i.id == id) {
                item.embedding = embedding;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

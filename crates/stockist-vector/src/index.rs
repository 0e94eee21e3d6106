//! In-memory vector index with brute-force cosine similarity search.
//!
//! Simple but correct: all operations are O(n) for search, which is
//! acceptable for catalog-sized datasets. The index enforces a fixed vector
//! dimension and breaks score ties by insertion order, so results are
//! deterministic across runs.

use std::sync::{Arc, RwLock};

use uuid::Uuid;

use stockist_core::error::{Result, StockistError};

/// A single hit returned from a vector search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// The ID of the matching vector entry.
    pub id: Uuid,
    /// Cosine similarity score.
    pub score: f64,
}

#[derive(Debug, Clone)]
struct VectorEntry {
    id: Uuid,
    embedding: Vec<f32>,
}

/// In-memory vector index using brute-force cosine similarity.
///
/// Thread-safe via interior RwLock. Entries keep their insertion order,
/// which is used as the deterministic tie-breaker when scores are equal.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Arc<RwLock<Vec<VectorEntry>>>,
    dimensions: usize,
}

impl VectorIndex {
    /// Create a new empty index for vectors of the given dimension.
    pub fn new(dimensions: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            dimensions,
        }
    }

    /// The fixed vector dimension this index accepts.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Insert a vector into the index.
    ///
    /// Rejects vectors whose length differs from the index dimension.
    /// Overwrites any existing entry with the same ID in place, preserving
    /// its original insertion position.
    pub fn insert(&self, id: Uuid, embedding: Vec<f32>) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(StockistError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            });
        }

        let mut entries = self
            .entries
            .write()
            .map_err(|e| StockistError::Search(format!("Lock poisoned: {}", e)))?;
        match entries.iter_mut().find(|e| e.id == id) {
            Some(existing) => existing.embedding = embedding,
            None => entries.push(VectorEntry { id, embedding }),
        }
        Ok(())
    }

    /// Search for the k nearest neighbors to the query vector.
    ///
    /// Returns hits sorted by descending similarity score; equal scores are
    /// ordered by insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimensions {
            return Err(StockistError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }

        let entries = self
            .entries
            .read()
            .map_err(|e| StockistError::Search(format!("Lock poisoned: {}", e)))?;

        let mut scored: Vec<(usize, SearchHit)> = entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| {
                let score = cosine_similarity(query, &entry.embedding);
                (pos, SearchHit { id: entry.id, score })
            })
            .collect();

        scored.sort_by(|(pos_a, a), (pos_b, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(pos_a.cmp(pos_b))
        });
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, hit)| hit).collect())
    }

    /// Delete an entry from the index by ID.
    ///
    /// Returns Ok(()) regardless of whether the entry existed.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StockistError::Search(format!("Lock poisoned: {}", e)))?;
        entries.retain(|e| e.id != id);
        Ok(())
    }

    /// Return the number of vectors currently stored in the index.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Return true if the index contains no vectors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

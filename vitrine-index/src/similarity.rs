//! Exact inner-product search over an immutable catalog

use crate::error::IndexError;
use std::collections::HashMap;
use tracing::{debug, info};
use vitrine_core::math::dot;
use vitrine_core::{CatalogEntry, Embedding, Match};

/// Flat index over unit-norm product embeddings.
///
/// Built once and never mutated; share it behind an `Arc`. Scores are raw
/// inner products, which equal cosine similarity for unit vectors.
#[derive(Debug)]
pub struct SimilarityIndex {
    dimension: usize,
    entries: Vec<CatalogEntry>,
    by_id: HashMap<u64, usize>,
}

impl SimilarityIndex {
    /// Validate and freeze a catalog. Every embedding must have `dimension`
    /// components and product ids must be unique.
    pub fn build(entries: Vec<CatalogEntry>, dimension: usize) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::InvalidDimension(dimension));
        }

        let mut by_id = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            if entry.embedding.dimension() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    actual: entry.embedding.dimension(),
                });
            }
            if by_id.insert(entry.product_id, position).is_some() {
                return Err(IndexError::DuplicateProductId(entry.product_id));
            }
        }

        info!(
            "Similarity index built with {} products (dimension {})",
            entries.len(),
            dimension
        );
        Ok(Self {
            dimension,
            entries,
            by_id,
        })
    }

    /// Top `k` products by inner product with `query`, best first. Ties keep
    /// catalog order. Returns `min(k, len)` matches.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Match>, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidK);
        }
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if query.iter().any(|v| !v.is_finite()) {
            return Err(IndexError::InvalidQuery);
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                // + 0.0 folds -0.0 into 0.0 so equal scores compare equal
                (position, dot(query, entry.embedding.as_slice()) + 0.0)
            })
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        debug!("Search returned {} of {} products", scored.len(), self.entries.len());

        Ok(scored
            .into_iter()
            .map(|(position, score)| {
                let entry = &self.entries[position];
                Match {
                    product_id: Some(entry.product_id),
                    name: entry.name.clone(),
                    image_url: entry.image_url.clone(),
                    similarity_score: score,
                }
            })
            .collect())
    }

    pub fn search_embedding(&self, query: &Embedding, k: usize) -> Result<Vec<Match>, IndexError> {
        self.search(query.as_slice(), k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn get(&self, product_id: u64) -> Option<&CatalogEntry> {
        self.by_id.get(&product_id).map(|&position| &self.entries[position])
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }
}

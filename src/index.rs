//! Flat inner-product index over L2-normalised vectors.
//!
//! Built once when a document is loaded and read-only afterwards. Search is
//! brute force: every stored vector is scored against the query, which is
//! plenty for the few hundred chunks a document produces.

use crate::embedding::{dot, normalize_l2};

/// One search hit: the position of the vector in insertion order and its
/// inner product with the query (cosine, since both sides are unit length).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    pub position: usize,
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct EmbeddingIndex {
    dims: usize,
    vectors: Vec<Vec<f32>>,
}

impl EmbeddingIndex {
    /// Builds an index, normalising every vector. Vectors whose length
    /// differs from the first one's are zeroed so they never match.
    pub fn build(vectors: Vec<Vec<f32>>) -> Self {
        let dims = vectors.first().map(Vec::len).unwrap_or(0);
        let vectors = vectors
            .into_iter()
            .map(|mut v| {
                if v.len() != dims {
                    tracing::warn!(expected = dims, actual = v.len(), "embedding dimension mismatch");
                    return vec![0.0; dims];
                }
                normalize_l2(&mut v);
                v
            })
            .collect();
        Self { dims, vectors }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Returns up to `k` hits, best first. Equal scores keep insertion
    /// order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<IndexHit> {
        if k == 0 || query.len() != self.dims {
            return Vec::new();
        }
        let mut q = query.to_vec();
        normalize_l2(&mut q);

        let mut hits: Vec<IndexHit> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, v)| IndexHit {
                position,
                score: dot(&q, v),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        hits
    }
}

//! Cross-document retrieval.
//!
//! Every document owns its own [`EmbeddingIndex`](crate::index::EmbeddingIndex).
//! A search asks each index for its top `k` chunks, pools the candidates,
//! sorts them by score (stable, so earlier documents win ties), and keeps
//! the best `k` overall.

use crate::models::{Chunk, Document};

/// A retrieved chunk together with its owning document.
#[derive(Debug, Clone, Copy)]
pub struct ScoredChunk<'a> {
    pub document: &'a Document,
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// Result of a pooled search.
#[derive(Debug)]
pub struct Retrieval<'a> {
    /// The best `k` hits across all searched documents, best first.
    pub hits: Vec<ScoredChunk<'a>>,
    /// Candidates pooled before truncation.
    pub candidates: usize,
}

/// Searches `documents` with an embedded query.
pub fn retrieve<'a, I>(documents: I, query: &[f32], k: usize) -> Retrieval<'a>
where
    I: IntoIterator<Item = &'a Document>,
{
    let mut pooled: Vec<ScoredChunk<'a>> = Vec::new();

    for doc in documents {
        for hit in doc.index.search(query, k) {
            // Positions past the chunk list cannot be mapped back.
            let Some(chunk) = doc.chunks.get(hit.position) else {
                continue;
            };
            pooled.push(ScoredChunk {
                document: doc,
                chunk,
                score: hit.score,
            });
        }
    }

    let candidates = pooled.len();
    pooled.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    pooled.truncate(k);

    tracing::debug!(candidates, kept = pooled.len(), "retrieval complete");
    Retrieval {
        hits: pooled,
        candidates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::EmbeddingIndex;
    use crate::models::DocumentMetadata;

    fn doc(name: &str, vectors: Vec<Vec<f32>>) -> Document {
        let chunks: Vec<Chunk> = (0..vectors.len())
            .map(|i| Chunk {
                chunk_id: i,
                text: format!("{} chunk {}", name, i),
                sentence_count: 1,
                first_sentence: i,
                overlap: 0,
            })
            .collect();
        Document {
            name: name.to_string(),
            title: String::new(),
            full_text: String::new(),
            metadata: DocumentMetadata {
                word_count: 0,
                sentence_count: chunks.len(),
                total_pages: 1,
                chunk_count: chunks.len(),
            },
            chunks,
            summary: String::new(),
            keywords: Vec::new(),
            index: EmbeddingIndex::build(vectors),
        }
    }

    #[test]
    fn pools_per_document_hits_and_truncates() {
        let a = doc("a", vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let b = doc("b", vec![vec![0.9, 0.1], vec![0.5, 0.5]]);
        let r = retrieve([&a, &b], &[1.0, 0.0], 2);
        assert_eq!(r.candidates, 4);
        assert_eq!(r.hits.len(), 2);
        assert_eq!(r.hits[0].document.name, "a");
        assert_eq!(r.hits[0].chunk.chunk_id, 0);
        assert_eq!(r.hits[1].document.name, "b");
        assert!(r.hits[0].score >= r.hits[1].score);
    }

    #[test]
    fn ties_prefer_earlier_documents() {
        let a = doc("a", vec![vec![1.0, 0.0]]);
        let b = doc("b", vec![vec![1.0, 0.0]]);
        let r = retrieve([&b, &a], &[1.0, 0.0], 1);
        assert_eq!(r.hits[0].document.name, "b");
    }

    #[test]
    fn index_positions_without_chunks_are_skipped() {
        let mut d = doc("a", vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        d.chunks.truncate(1);
        let r = retrieve([&d], &[0.0, 1.0], 5);
        assert_eq!(r.candidates, 1);
        assert_eq!(r.hits[0].chunk.chunk_id, 0);
    }
}

//! Core document data models.
//!
//! These types represent the processed documents and chunks that flow
//! through the document pipeline. Tabular types live in [`crate::tabular`].

use serde::Serialize;

use crate::index::EmbeddingIndex;

/// A contiguous, overlapping span of a document's sentences.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    /// Sequence number, stable for the life of the document.
    pub chunk_id: usize,
    pub text: String,
    pub sentence_count: usize,
    /// Index of the chunk's first sentence in the document.
    #[serde(skip)]
    pub first_sentence: usize,
    /// Leading sentences repeated from the previous chunk.
    #[serde(skip)]
    pub overlap: usize,
}

/// Counts computed once at load time.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub word_count: usize,
    pub sentence_count: usize,
    pub total_pages: usize,
    pub chunk_count: usize,
}

/// A processed document. Owns its chunks and their index.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub title: String,
    pub full_text: String,
    pub chunks: Vec<Chunk>,
    pub summary: String,
    pub keywords: Vec<String>,
    pub metadata: DocumentMetadata,
    pub index: EmbeddingIndex,
}

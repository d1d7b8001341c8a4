//! Error taxonomy for the analyzers.
//!
//! Each operation family has its own enum so callers can match
//! exhaustively. Every variant carries a stable machine-readable
//! [`code`](TabularError::code) that the HTTP layer and the query
//! response envelope expose verbatim.

use thiserror::Error;

use crate::extract::ExtractError;

/// Failures from loading or querying datasets.
#[derive(Debug, Error)]
pub enum TabularError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to load file: {0}")]
    Load(String),

    #[error("No dataset loaded. Please upload a file first.")]
    NoDataset,

    #[error("Dataset {0} not found")]
    DatasetNotFound(String),

    #[error("{0}")]
    ColumnResolution(String),

    #[error("No datetime columns found for trend analysis")]
    NoTemporalColumn,

    #[error("No numeric columns found for trend analysis")]
    NoNumericColumn,
}

impl TabularError {
    pub fn code(&self) -> &'static str {
        match self {
            TabularError::UnsupportedFormat(_) | TabularError::Load(_) => "load_error",
            TabularError::NoDataset => "no_dataset",
            TabularError::DatasetNotFound(_) => "dataset_not_found",
            TabularError::ColumnResolution(_) => "column_resolution",
            TabularError::NoTemporalColumn => "no_temporal_column",
            TabularError::NoNumericColumn => "no_numeric_column",
        }
    }
}

/// Failures from loading, indexing, or querying documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read file: {0}")]
    Io(String),

    #[error(transparent)]
    Extraction(#[from] ExtractError),

    #[error("No text content found in {0}")]
    EmptyDocument(String),

    #[error("No documents loaded")]
    NoDocuments,

    #[error("Document {0} not found")]
    DocumentNotFound(String),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
}

impl DocumentError {
    pub fn code(&self) -> &'static str {
        match self {
            DocumentError::UnsupportedFormat(_) | DocumentError::Io(_) => "load_error",
            DocumentError::Extraction(_) => "extraction_error",
            DocumentError::EmptyDocument(_) => "empty_document",
            DocumentError::NoDocuments => "no_documents",
            DocumentError::DocumentNotFound(_) => "not_found",
            DocumentError::Embedding(_) => "embedding_error",
        }
    }
}

/// Failures from upload intake, which dispatches on the file extension.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Unsupported file type: {0}. Upload CSV/Excel files or PDF documents.")]
    UnsupportedType(String),

    #[error(transparent)]
    Tabular(#[from] TabularError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl IntakeError {
    pub fn code(&self) -> &'static str {
        match self {
            IntakeError::UnsupportedType(_) => "load_error",
            IntakeError::Tabular(e) => e.code(),
            IntakeError::Document(e) => e.code(),
        }
    }
}

/// Failures from an embedding provider.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("{0}")]
    Provider(String),

    #[error("expected {expected} embeddings, provider returned {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(TabularError::NoDataset.code(), "no_dataset");
        assert_eq!(
            TabularError::DatasetNotFound("x".into()).code(),
            "dataset_not_found"
        );
        assert_eq!(DocumentError::NoDocuments.code(), "no_documents");
        assert_eq!(
            DocumentError::EmptyDocument("a.pdf".into()).code(),
            "empty_document"
        );
    }

    #[test]
    fn messages_name_the_missing_thing() {
        let e = DocumentError::DocumentNotFound("paper.pdf".into());
        assert_eq!(e.to_string(), "Document paper.pdf not found");
        assert!(TabularError::NoDataset.to_string().contains("upload"));
    }

    #[test]
    fn intake_errors_keep_the_inner_code() {
        let e: IntakeError = DocumentError::NoDocuments.into();
        assert_eq!(e.code(), "no_documents");
        assert_eq!(IntakeError::UnsupportedType(".docx".into()).code(), "load_error");
    }
}

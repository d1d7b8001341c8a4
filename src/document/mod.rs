//! Document analyzer: extract, clean, chunk, embed, and query documents.
//!
//! # Pipeline
//!
//! ```text
//! bytes ─► extract ─► clean ─► sentences ─┬─► chunks ─► embed ─► index
//!                                         ├─► summary
//!                                         └─► keywords
//! ```
//!
//! Processing happens outside the store lock; the finished [`Document`]
//! (with its chunks and index) is inserted under the write lock in one step.

pub mod answer;
pub mod summary;

use std::path::Path;
use std::sync::RwLock;

use serde::Serialize;

use crate::chunk::chunk_sentences;
use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{DocumentError, EmbeddingError};
use crate::extract::{extract_pdf_text, PAGE_BREAK};
use crate::index::EmbeddingIndex;
use crate::models::{Document, DocumentMetadata};
use crate::search::{retrieve, ScoredChunk};
use crate::store::{self, NamedStore};
use crate::text::{clean_text, preview, split_sentences, truncate_chars};

/// Extensions routed to the document analyzer by upload intake.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf"];

const TITLE_MIN_CHARS: usize = 10;
const TITLE_MAX_CHARS: usize = 100;
const LOAD_SUMMARY_PREVIEW: usize = 200;
const SAMPLE_CHUNKS: usize = 3;
const SAMPLE_CHUNK_CHARS: usize = 100;
const LISTING_KEYWORDS: usize = 5;

/// Tunables copied out of [`Config`] at construction.
#[derive(Debug, Clone)]
pub struct DocumentSettings {
    pub target_chars: usize,
    pub overlap_chars: usize,
    pub max_sentences: usize,
    pub keyword_top_k: usize,
    pub answer_top_k: usize,
    pub search_top_k: usize,
    pub snippet_chars: usize,
}

impl From<&Config> for DocumentSettings {
    fn from(config: &Config) -> Self {
        Self {
            target_chars: config.chunking.target_chars,
            overlap_chars: config.chunking.overlap_chars,
            max_sentences: config.summary.max_sentences,
            keyword_top_k: config.summary.keyword_top_k,
            answer_top_k: config.retrieval.answer_top_k,
            search_top_k: config.retrieval.search_top_k,
            snippet_chars: config.retrieval.snippet_chars,
        }
    }
}

// ============ Responses ============

#[derive(Debug, Clone, Serialize)]
pub struct LoadedDocument {
    pub message: String,
    pub info: LoadInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadInfo {
    pub file_name: String,
    pub total_pages: usize,
    pub total_chunks: usize,
    pub word_count: usize,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub document_name: String,
    pub title: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelevantChunk {
    pub text: String,
    pub score: f32,
    pub chunk_id: usize,
    pub document: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub answer: String,
    pub relevant_chunks: Vec<RelevantChunk>,
    pub question: String,
    pub documents_searched: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub document: String,
    pub title: String,
    pub text: String,
    pub score: f32,
    pub chunk_id: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub total_results: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentListing {
    pub name: String,
    pub title: String,
    pub word_count: usize,
    pub chunk_count: usize,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub name: String,
    pub title: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub metadata: DocumentMetadata,
    pub sample_chunks: Vec<String>,
}

/// Result of a document-routed query, tagged by the sub-operation that ran.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "query_type", rename_all = "snake_case")]
pub enum DocumentAnswer {
    Summary(DocumentSummary),
    Answer(AnswerResult),
    Search(SearchResults),
}

impl DocumentAnswer {
    pub fn message(&self) -> String {
        match self {
            DocumentAnswer::Summary(s) => format!("Summary of {}", s.document_name),
            DocumentAnswer::Answer(a) => a.answer.clone(),
            DocumentAnswer::Search(s) => {
                format!("Found {} results for '{}'", s.results.len(), s.query)
            }
        }
    }
}

// ============ Analyzer ============

pub struct DocumentAnalyzer {
    documents: RwLock<NamedStore<Document>>,
    embedder: Box<dyn EmbeddingProvider>,
    settings: DocumentSettings,
}

impl DocumentAnalyzer {
    /// Builds an analyzer with the embedding provider named in `config`.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let embedder = embedding::create_provider(&config.embedding)?;
        tracing::info!(
            provider = %config.embedding.provider,
            model = embedder.model_name(),
            dims = embedder.dims(),
            "embedding provider ready"
        );
        Ok(Self::with_provider(config, embedder))
    }

    pub fn with_provider(config: &Config, embedder: Box<dyn EmbeddingProvider>) -> Self {
        Self {
            documents: RwLock::new(NamedStore::new()),
            embedder,
            settings: DocumentSettings::from(config),
        }
    }

    /// Loads a PDF, or a UTF-8 `.txt`/`.md` file, from disk under its file
    /// name.
    pub fn load_file(&self, path: &Path) -> Result<LoadedDocument, DocumentError> {
        self.load_file_as(path, &crate::tabular::file_name(path))
    }

    /// Loads a file from disk under an explicit name; the format follows
    /// `name`'s extension.
    pub fn load_file_as(&self, path: &Path, name: &str) -> Result<LoadedDocument, DocumentError> {
        let bytes = std::fs::read(path)
            .map_err(|e| DocumentError::Io(format!("{}: {}", path.display(), e)))?;
        match crate::tabular::extension(name).as_str() {
            "txt" | "md" => self.load_text(&String::from_utf8_lossy(&bytes), name),
            _ => self.load_bytes(&bytes, name),
        }
    }

    /// Loads PDF bytes under `name`.
    pub fn load_bytes(&self, bytes: &[u8], name: &str) -> Result<LoadedDocument, DocumentError> {
        let ext = crate::tabular::extension(name);
        if !DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            return Err(DocumentError::UnsupportedFormat(format!(".{}", ext)));
        }
        let raw = extract_pdf_text(bytes)?;
        self.load_text(&raw, name)
    }

    /// Processes already-extracted text under `name`. Reloading a name
    /// replaces the document.
    pub fn load_text(&self, raw: &str, name: &str) -> Result<LoadedDocument, DocumentError> {
        let doc = self.process(raw, name)?;
        let info = LoadInfo {
            file_name: name.to_string(),
            total_pages: doc.metadata.total_pages,
            total_chunks: doc.chunks.len(),
            word_count: doc.metadata.word_count,
            summary: preview(&doc.summary, LOAD_SUMMARY_PREVIEW),
        };
        tracing::info!(
            document = name,
            pages = info.total_pages,
            chunks = info.total_chunks,
            words = info.word_count,
            "document loaded"
        );
        store::write(&self.documents).insert(name, doc);

        Ok(LoadedDocument {
            message: format!("Successfully processed {}", name),
            info,
        })
    }

    fn process(&self, raw: &str, name: &str) -> Result<Document, DocumentError> {
        if raw.trim().is_empty() {
            return Err(DocumentError::EmptyDocument(name.to_string()));
        }
        let cleaned = clean_text(raw);
        if cleaned.is_empty() {
            return Err(DocumentError::EmptyDocument(name.to_string()));
        }

        let s = &self.settings;
        let sentences = split_sentences(&cleaned);
        let chunks = chunk_sentences(&sentences, s.target_chars, s.overlap_chars);
        let summary = summary::summarize(&cleaned, &sentences, s.max_sentences);
        let keywords = summary::extract_keywords(&cleaned, s.keyword_top_k);

        let title = raw
            .lines()
            .map(str::trim)
            .find(|line| line.chars().count() > TITLE_MIN_CHARS)
            .map(|line| truncate_chars(line, TITLE_MAX_CHARS).to_string())
            .unwrap_or_default();

        let metadata = DocumentMetadata {
            word_count: cleaned.split_whitespace().count(),
            sentence_count: sentences.len(),
            total_pages: raw.matches(PAGE_BREAK).count() + 1,
            chunk_count: chunks.len(),
        };

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts)?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            }
            .into());
        }

        Ok(Document {
            name: name.to_string(),
            title,
            full_text: cleaned,
            chunks,
            summary,
            keywords,
            metadata,
            index: EmbeddingIndex::build(vectors),
        })
    }

    pub fn summarize(&self, name: &str) -> Result<DocumentSummary, DocumentError> {
        let store = store::read(&self.documents);
        let doc = store
            .get(name)
            .ok_or_else(|| DocumentError::DocumentNotFound(name.to_string()))?;
        Ok(DocumentSummary {
            document_name: name.to_string(),
            title: doc.title.clone(),
            summary: doc.summary.clone(),
            keywords: doc.keywords.clone(),
            metadata: doc.metadata.clone(),
        })
    }

    /// Answers from the named document, or from every document when the
    /// name is absent or unknown.
    pub fn answer_question(
        &self,
        question: &str,
        document: Option<&str>,
        top_k: Option<usize>,
    ) -> Result<AnswerResult, DocumentError> {
        let store = store::read(&self.documents);
        if store.is_empty() {
            return Err(DocumentError::NoDocuments);
        }
        let k = top_k.unwrap_or(self.settings.answer_top_k);

        let targets: Vec<&Document> = match document {
            Some(name) if store.contains(name) => store.get(name).into_iter().collect(),
            other => {
                if let Some(name) = other {
                    tracing::warn!(document = name, "unknown document, searching all");
                }
                store.iter().map(|(_, d)| d).collect()
            }
        };
        let documents_searched = targets.iter().map(|d| d.name.clone()).collect();

        let query = embedding::embed_query(self.embedder.as_ref(), question)?;
        let retrieval = retrieve(targets, &query, k);

        let context = retrieval
            .hits
            .iter()
            .map(|h| h.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let answer = answer::select_answer(question, &context);

        Ok(AnswerResult {
            answer,
            relevant_chunks: retrieval.hits.iter().map(relevant_chunk).collect(),
            question: question.to_string(),
            documents_searched,
        })
    }

    pub fn search(&self, query: &str, top_k: Option<usize>) -> Result<SearchResults, DocumentError> {
        let store = store::read(&self.documents);
        if store.is_empty() {
            return Err(DocumentError::NoDocuments);
        }
        let k = top_k.unwrap_or(self.settings.search_top_k);

        let embedded = embedding::embed_query(self.embedder.as_ref(), query)?;
        let retrieval = retrieve(store.iter().map(|(_, d)| d), &embedded, k);

        let results = retrieval
            .hits
            .iter()
            .map(|h| SearchHit {
                document: h.document.name.clone(),
                title: h.document.title.clone(),
                text: preview(&h.chunk.text, self.settings.snippet_chars),
                score: h.score,
                chunk_id: h.chunk.chunk_id,
            })
            .collect();

        Ok(SearchResults {
            query: query.to_string(),
            results,
            total_results: retrieval.candidates,
        })
    }

    pub fn list(&self) -> Vec<DocumentListing> {
        store::read(&self.documents)
            .iter()
            .map(|(name, doc)| DocumentListing {
                name: name.to_string(),
                title: doc.title.clone(),
                word_count: doc.metadata.word_count,
                chunk_count: doc.metadata.chunk_count,
                keywords: doc.keywords.iter().take(LISTING_KEYWORDS).cloned().collect(),
            })
            .collect()
    }

    pub fn info(&self, name: &str) -> Result<DocumentInfo, DocumentError> {
        let store = store::read(&self.documents);
        let doc = store
            .get(name)
            .ok_or_else(|| DocumentError::DocumentNotFound(name.to_string()))?;
        Ok(DocumentInfo {
            name: name.to_string(),
            title: doc.title.clone(),
            summary: doc.summary.clone(),
            keywords: doc.keywords.clone(),
            metadata: doc.metadata.clone(),
            sample_chunks: doc
                .chunks
                .iter()
                .take(SAMPLE_CHUNKS)
                .map(|c| preview(&c.text, SAMPLE_CHUNK_CHARS))
                .collect(),
        })
    }

    pub fn names(&self) -> Vec<String> {
        store::read(&self.documents).names()
    }

    /// Name of the earliest loaded document still present.
    pub fn first_name(&self) -> Option<String> {
        store::read(&self.documents)
            .first()
            .map(|(name, _)| name.to_string())
    }

    pub fn is_empty(&self) -> bool {
        store::read(&self.documents).is_empty()
    }

    pub fn remove(&self, name: &str) -> Result<(), DocumentError> {
        let removed = store::write(&self.documents).remove(name);
        match removed {
            Some(_) => {
                tracing::info!(document = name, "document removed");
                Ok(())
            }
            None => Err(DocumentError::DocumentNotFound(name.to_string())),
        }
    }

    pub fn clear(&self) {
        store::write(&self.documents).clear();
    }

    /// The store lock, for callers that must clear several stores at once.
    pub(crate) fn lock(&self) -> &RwLock<NamedStore<Document>> {
        &self.documents
    }
}

fn relevant_chunk(hit: &ScoredChunk<'_>) -> RelevantChunk {
    RelevantChunk {
        text: hit.chunk.text.clone(),
        score: hit.score,
        chunk_id: hit.chunk.chunk_id,
        document: hit.document.name.clone(),
    }
}

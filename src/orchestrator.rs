//! Query orchestration over both analyzers.
//!
//! The [`Orchestrator`] owns the tabular and document analyzers, classifies
//! each query with [`router::classify`], dispatches it, and wraps every
//! outcome (including failures) in a [`QueryResponse`] carrying routing
//! metadata. It also handles upload intake, listings, status and bulk clear.
//!
//! All methods are synchronous. Embedding may block on network I/O for remote
//! providers, so async callers should run them on a blocking thread.

use std::path::Path;

use serde::Serialize;

use crate::config::Config;
use crate::document::{
    DocumentAnalyzer, DocumentAnswer, DocumentListing, LoadInfo, DOCUMENT_EXTENSIONS,
};
use crate::error::{DocumentError, IntakeError, TabularError};
use crate::router::{self, Classification, QueryContext, QueryType};
use crate::store;
use crate::tabular::{self, DatasetProfile, TabularAnalyzer, TabularAnswer, TABULAR_EXTENSIONS};

pub const TABULAR_AGENT: &str = "Tabular Analyzer";
pub const DOCUMENT_AGENT: &str = "Document Analyzer";
pub const ORCHESTRATOR_AGENT: &str = "Orchestrator";

const SUMMARY_TRIGGERS: &[&str] = &["summarize", "summary", "abstract"];
const SEARCH_TRIGGERS: &[&str] = &["search", "find", "locate"];
const HELP_TRIGGERS: &[&str] = &["help", "what can you do", "capabilities"];
const STATUS_TRIGGERS: &[&str] = &["status", "what is loaded", "files"];

// ============ Responses ============

/// Which analyzer a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Dataset,
    Document,
}

impl FileKind {
    /// Classifies a file name by extension.
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = tabular::extension(name);
        if TABULAR_EXTENSIONS.contains(&ext.as_str()) {
            Some(FileKind::Dataset)
        } else if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            Some(FileKind::Document)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FileInfo {
    Dataset(DatasetProfile),
    Document(LoadInfo),
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub kind: FileKind,
    pub file_info: FileInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub loaded_datasets: Vec<String>,
    pub loaded_documents: Vec<String>,
    pub tabular_ready: bool,
    pub document_ready: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadedFiles {
    pub datasets: Vec<String>,
    pub documents: Vec<DocumentListing>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Routing {
    pub query_type: QueryType,
    pub confidence: f64,
    pub reasoning: String,
    pub agent_used: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Successful payload of a query, tagged by the handler that produced it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryOutcome {
    Tabular(TabularAnswer),
    Document(DocumentAnswer),
    Clarification {
        message: String,
        suggestions: Vec<String>,
        available_datasets: Vec<String>,
        available_documents: Vec<String>,
    },
    Help {
        message: String,
        capabilities: Vec<String>,
        examples: Vec<String>,
    },
    Status(SystemStatus),
    Guidance {
        message: String,
        suggestions: Vec<String>,
    },
}

impl QueryOutcome {
    pub fn message(&self) -> String {
        match self {
            QueryOutcome::Tabular(a) => a.message().to_string(),
            QueryOutcome::Document(a) => a.message(),
            QueryOutcome::Clarification { message, .. }
            | QueryOutcome::Help { message, .. }
            | QueryOutcome::Guidance { message, .. } => message.clone(),
            QueryOutcome::Status(_) => "System status".to_string(),
        }
    }
}

/// The envelope every query produces.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    pub message: String,
    pub query_type: QueryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub routing: Routing,
}

/// Outcome of one dispatch step, before the envelope is attached.
struct Handled {
    agent: &'static str,
    outcome: Result<QueryOutcome, ErrorInfo>,
}

impl Handled {
    fn ok(agent: &'static str, outcome: QueryOutcome) -> Self {
        Self {
            agent,
            outcome: Ok(outcome),
        }
    }

    fn err(agent: &'static str, code: &str, message: impl Into<String>) -> Self {
        Self {
            agent,
            outcome: Err(ErrorInfo {
                code: code.to_string(),
                message: message.into(),
                suggestion: None,
            }),
        }
    }
}

impl From<&TabularError> for ErrorInfo {
    fn from(e: &TabularError) -> Self {
        ErrorInfo {
            code: e.code().to_string(),
            message: e.to_string(),
            suggestion: None,
        }
    }
}

impl From<&DocumentError> for ErrorInfo {
    fn from(e: &DocumentError) -> Self {
        ErrorInfo {
            code: e.code().to_string(),
            message: e.to_string(),
            suggestion: None,
        }
    }
}

// ============ Orchestrator ============

pub struct Orchestrator {
    tabular: TabularAnalyzer,
    documents: DocumentAnalyzer,
}

impl Orchestrator {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::with_analyzers(
            TabularAnalyzer::new(),
            DocumentAnalyzer::new(config)?,
        ))
    }

    pub fn with_analyzers(tabular: TabularAnalyzer, documents: DocumentAnalyzer) -> Self {
        Self { tabular, documents }
    }

    pub fn tabular(&self) -> &TabularAnalyzer {
        &self.tabular
    }

    pub fn documents(&self) -> &DocumentAnalyzer {
        &self.documents
    }

    /// A context naming everything currently loaded, for callers that do
    /// not track loaded files themselves.
    pub fn current_context(&self) -> QueryContext {
        QueryContext {
            loaded_datasets: self.tabular.list(),
            loaded_documents: self.documents.names(),
            ..Default::default()
        }
    }

    /// Classifies, dispatches and answers `query`. Failures are reported in
    /// the response, never returned.
    pub fn process_query(&self, query: &str, context: Option<&QueryContext>) -> QueryResponse {
        let empty = QueryContext::default();
        let context = context.unwrap_or(&empty);
        let classification = router::classify(query, context);

        let handled = match classification.query_type {
            QueryType::Tabular => self.route_tabular(query, context),
            QueryType::Document => self.route_document(query, context),
            QueryType::Ambiguous => self.resolve_ambiguous(query, context),
            QueryType::General => self.handle_general(query),
        };

        tracing::info!(
            query_type = classification.query_type.as_str(),
            confidence = classification.confidence,
            agent = handled.agent,
            success = handled.outcome.is_ok(),
            "query processed"
        );
        envelope(classification, handled)
    }

    fn route_tabular(&self, query: &str, context: &QueryContext) -> Handled {
        if self.tabular.is_empty() {
            if let Some(pending) = &context.pending_data_file {
                if let Err(e) = self.tabular.load_file_as(&pending.path, &pending.name) {
                    tracing::warn!(file = %pending.name, error = %e, "pending dataset failed to load");
                    return Handled {
                        agent: TABULAR_AGENT,
                        outcome: Err((&e).into()),
                    };
                }
            }
        }

        match self.tabular.query(query, None) {
            Ok(answer) => Handled::ok(TABULAR_AGENT, QueryOutcome::Tabular(answer)),
            Err(e) => Handled {
                agent: TABULAR_AGENT,
                outcome: Err((&e).into()),
            },
        }
    }

    fn route_document(&self, query: &str, context: &QueryContext) -> Handled {
        if self.documents.is_empty() {
            if let Some(pending) = &context.pending_pdf_file {
                if let Err(e) = self.documents.load_file_as(&pending.path, &pending.name) {
                    tracing::warn!(file = %pending.name, error = %e, "pending document failed to load");
                    return Handled {
                        agent: DOCUMENT_AGENT,
                        outcome: Err((&e).into()),
                    };
                }
            }
        }

        let lower = query.to_lowercase();
        let result = if SUMMARY_TRIGGERS.iter().any(|t| lower.contains(t)) {
            self.documents
                .first_name()
                .ok_or(DocumentError::NoDocuments)
                .and_then(|name| self.documents.summarize(&name))
                .map(DocumentAnswer::Summary)
        } else if SEARCH_TRIGGERS.iter().any(|t| lower.contains(t)) {
            self.documents.search(query, None).map(DocumentAnswer::Search)
        } else {
            self.documents
                .answer_question(query, None, None)
                .map(DocumentAnswer::Answer)
        };

        match result {
            Ok(answer) => Handled::ok(DOCUMENT_AGENT, QueryOutcome::Document(answer)),
            Err(e) => Handled {
                agent: DOCUMENT_AGENT,
                outcome: Err((&e).into()),
            },
        }
    }

    fn resolve_ambiguous(&self, query: &str, context: &QueryContext) -> Handled {
        let datasets = self.tabular.list();
        let documents = self.documents.names();

        match (datasets.is_empty(), documents.is_empty()) {
            (false, true) => self.route_tabular(query, context),
            (true, false) => self.route_document(query, context),
            (false, false) => Handled::ok(
                ORCHESTRATOR_AGENT,
                QueryOutcome::Clarification {
                    message: "Your query could apply to both data analysis and research \
                              documents. Please specify which you're interested in."
                        .to_string(),
                    suggestions: vec![
                        format!("For data analysis: {} (from data files)", query),
                        format!("For research: {} (from documents)", query),
                    ],
                    available_datasets: datasets,
                    available_documents: documents,
                },
            ),
            (true, true) => {
                let mut handled = Handled::err(
                    ORCHESTRATOR_AGENT,
                    "nothing_loaded",
                    "No data files or documents loaded. Please upload files first.",
                );
                if let Err(info) = &mut handled.outcome {
                    info.suggestion = Some(
                        "Upload CSV/Excel files for data analysis or PDF files for research queries"
                            .to_string(),
                    );
                }
                handled
            }
        }
    }

    fn handle_general(&self, query: &str) -> Handled {
        let lower = query.to_lowercase();

        let outcome = if HELP_TRIGGERS.iter().any(|t| lower.contains(t)) {
            QueryOutcome::Help {
                message: "I can help with:".to_string(),
                capabilities: vec![
                    "Data analysis: upload CSV/Excel files and ask questions like 'What was \
                     the total sales?' or 'Plot revenue trends'"
                        .to_string(),
                    "Research assistant: upload PDF documents for summarization, keyword \
                     extraction, and Q&A"
                        .to_string(),
                    "Smart routing: each query is sent to the analyzer that fits it".to_string(),
                ],
                examples: vec![
                    "Data: 'Show me the top 5 customers by revenue'".to_string(),
                    "Research: 'Summarize the paper on machine learning'".to_string(),
                    "Research: 'What methodology was used in the study?'".to_string(),
                ],
            }
        } else if STATUS_TRIGGERS.iter().any(|t| lower.contains(t)) {
            QueryOutcome::Status(self.status())
        } else {
            QueryOutcome::Guidance {
                message: "I'm not sure how to help with that. Try asking about data analysis, \
                          research documents, or type 'help' for more information."
                    .to_string(),
                suggestions: vec![
                    "Upload a CSV/Excel file and ask data questions".to_string(),
                    "Upload a PDF document and ask research questions".to_string(),
                    "Type 'help' to see what I can do".to_string(),
                ],
            }
        };
        Handled::ok(ORCHESTRATOR_AGENT, outcome)
    }

    /// Loads an uploaded file from memory, dispatching on its extension.
    pub fn ingest_upload(&self, bytes: &[u8], filename: &str) -> Result<UploadResponse, IntakeError> {
        let kind = FileKind::from_name(filename).ok_or_else(|| {
            IntakeError::UnsupportedType(format!(".{}", tabular::extension(filename)))
        })?;
        tracing::info!(file = filename, bytes = bytes.len(), ?kind, "upload received");

        match kind {
            FileKind::Dataset => {
                let loaded = self.tabular.load_bytes(bytes, filename)?;
                Ok(UploadResponse {
                    success: true,
                    message: loaded.message,
                    kind,
                    file_info: FileInfo::Dataset(loaded.info),
                })
            }
            FileKind::Document => {
                let loaded = self.documents.load_bytes(bytes, filename)?;
                Ok(UploadResponse {
                    success: true,
                    message: loaded.message,
                    kind,
                    file_info: FileInfo::Document(loaded.info),
                })
            }
        }
    }

    /// Loads a file from disk under its file name. Plain-text documents
    /// (`.txt`, `.md`) are accepted here as well as the upload types.
    pub fn load_file(&self, path: &Path) -> Result<UploadResponse, IntakeError> {
        let name = tabular::file_name(path);
        match tabular::extension(&name).as_str() {
            "txt" | "md" => {
                let loaded = self.documents.load_file(path)?;
                Ok(UploadResponse {
                    success: true,
                    message: loaded.message,
                    kind: FileKind::Document,
                    file_info: FileInfo::Document(loaded.info),
                })
            }
            _ => {
                let bytes = std::fs::read(path).map_err(|e| {
                    IntakeError::Document(DocumentError::Io(format!("{}: {}", path.display(), e)))
                })?;
                self.ingest_upload(&bytes, &name)
            }
        }
    }

    pub fn status(&self) -> SystemStatus {
        let loaded_datasets = self.tabular.list();
        let loaded_documents = self.documents.names();
        SystemStatus {
            tabular_ready: !loaded_datasets.is_empty(),
            document_ready: !loaded_documents.is_empty(),
            loaded_datasets,
            loaded_documents,
        }
    }

    pub fn loaded_files(&self) -> LoadedFiles {
        LoadedFiles {
            datasets: self.tabular.list(),
            documents: self.documents.list(),
        }
    }

    /// Empties both stores while holding both write locks, so no reader
    /// observes one cleared without the other.
    pub fn clear_all(&self) -> ClearResponse {
        let mut datasets = store::write(self.tabular.lock());
        let mut documents = store::write(self.documents.lock());
        let (n_datasets, n_documents) = (datasets.len(), documents.len());
        datasets.clear();
        documents.clear();
        tracing::info!(datasets = n_datasets, documents = n_documents, "all stores cleared");

        ClearResponse {
            success: true,
            message: "All data and documents cleared".to_string(),
        }
    }
}

fn envelope(classification: Classification, handled: Handled) -> QueryResponse {
    let routing = Routing {
        query_type: classification.query_type,
        confidence: classification.confidence,
        reasoning: classification.reasoning,
        agent_used: handled.agent.to_string(),
    };
    match handled.outcome {
        Ok(outcome) => QueryResponse {
            success: true,
            message: outcome.message(),
            query_type: classification.query_type,
            result: Some(outcome),
            error: None,
            routing,
        },
        Err(info) => QueryResponse {
            success: false,
            message: info.message.clone(),
            query_type: classification.query_type,
            result: None,
            error: Some(info),
            routing,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALES: &str = "Date,Region,Revenue\n2024-01-01,North,1200\n2024-01-02,South,75\n\
                         2024-01-03,North,400\n2024-01-04,East,1200\n2024-01-05,South,80\n";

    const NOTES: &str = "Field Notes On Graph Storage.\n\
                         Graph databases store nodes and edges. \
                         A graph is a set of vertices joined by edges. \
                         We evaluated the method on three workloads.";

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(&Config::minimal()).unwrap()
    }

    fn both_loaded() -> QueryContext {
        QueryContext {
            loaded_datasets: vec!["sales.csv".into()],
            loaded_documents: vec!["notes.txt".into()],
            ..Default::default()
        }
    }

    #[test]
    fn tabular_fast_path_answers_aggregation() {
        let o = orchestrator();
        o.ingest_upload(SALES.as_bytes(), "sales.csv").unwrap();
        let r = o.process_query("what is the total Revenue in sales.csv", None);
        assert!(r.success);
        assert_eq!(r.message, "The sum of Revenue is 2,955.00");
        assert_eq!(r.query_type, QueryType::Tabular);
        assert_eq!(r.routing.agent_used, TABULAR_AGENT);
        assert_eq!(r.routing.confidence, 0.9);
    }

    #[test]
    fn tabular_route_without_data_reports_error() {
        let o = orchestrator();
        let r = o.process_query("open the spreadsheet", None);
        assert!(!r.success);
        let err = r.error.unwrap();
        assert_eq!(err.code, "no_dataset");
        assert_eq!(r.routing.agent_used, TABULAR_AGENT);
    }

    #[test]
    fn ambiguous_with_only_datasets_goes_tabular() {
        let o = orchestrator();
        o.ingest_upload(SALES.as_bytes(), "sales.csv").unwrap();
        let r = o.process_query("what is the total", Some(&both_loaded()));
        assert_eq!(r.query_type, QueryType::Ambiguous);
        assert_eq!(r.routing.agent_used, TABULAR_AGENT);
        assert!(r.success);
    }

    #[test]
    fn ambiguous_with_only_documents_goes_document() {
        let o = orchestrator();
        o.documents().load_text(NOTES, "notes.txt").unwrap();
        let r = o.process_query("what is the total", Some(&both_loaded()));
        assert_eq!(r.query_type, QueryType::Ambiguous);
        assert_eq!(r.routing.agent_used, DOCUMENT_AGENT);
        assert!(r.success);
        match r.result.unwrap() {
            QueryOutcome::Document(DocumentAnswer::Answer(a)) => {
                assert_eq!(a.answer, "A graph is a set of vertices joined by edges.");
                assert_eq!(a.documents_searched, vec!["notes.txt"]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn ambiguous_with_both_loaded_asks_for_clarification() {
        let o = orchestrator();
        o.ingest_upload(SALES.as_bytes(), "sales.csv").unwrap();
        o.documents().load_text(NOTES, "notes.txt").unwrap();
        let r = o.process_query("what is the total", Some(&both_loaded()));
        assert!(r.success);
        match r.result.unwrap() {
            QueryOutcome::Clarification {
                suggestions,
                available_datasets,
                available_documents,
                ..
            } => {
                assert_eq!(suggestions.len(), 2);
                assert_eq!(available_datasets, vec!["sales.csv"]);
                assert_eq!(available_documents, vec!["notes.txt"]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(r.routing.agent_used, ORCHESTRATOR_AGENT);
    }

    #[test]
    fn ambiguous_with_nothing_loaded_is_an_error() {
        let o = orchestrator();
        let r = o.process_query("what is the total", Some(&both_loaded()));
        assert!(!r.success);
        let err = r.error.unwrap();
        assert_eq!(err.code, "nothing_loaded");
        assert!(err.suggestion.is_some());
    }

    #[test]
    fn document_route_dispatches_by_keyword() {
        let o = orchestrator();
        o.documents().load_text(NOTES, "notes.txt").unwrap();

        let r = o.process_query("summarize the document", None);
        assert!(matches!(
            r.result,
            Some(QueryOutcome::Document(DocumentAnswer::Summary(_)))
        ));

        let r = o.process_query("find edges in the paper", None);
        assert!(matches!(
            r.result,
            Some(QueryOutcome::Document(DocumentAnswer::Search(_)))
        ));

        let r = o.process_query("What is a graph in this paper?", None);
        assert_eq!(r.message, "A graph is a set of vertices joined by edges.");
        assert_eq!(r.routing.agent_used, DOCUMENT_AGENT);
    }

    #[test]
    fn pending_dataset_is_loaded_before_querying() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload-123.tmp");
        std::fs::write(&path, SALES).unwrap();

        let o = orchestrator();
        let ctx = QueryContext {
            pending_data_file: Some(router::PendingFile {
                path,
                name: "sales.csv".into(),
            }),
            ..Default::default()
        };
        let r = o.process_query("count the records in the excel data", Some(&ctx));
        assert!(r.success, "{:?}", r.error);
        assert_eq!(r.message, "Total number of records: 5");
        assert_eq!(o.tabular().list(), vec!["sales.csv"]);
    }

    #[test]
    fn pending_load_failure_becomes_the_response() {
        let o = orchestrator();
        let ctx = QueryContext {
            pending_pdf_file: Some(router::PendingFile {
                path: "/nonexistent/a.pdf".into(),
                name: "a.pdf".into(),
            }),
            ..Default::default()
        };
        let r = o.process_query("summarize the paper", Some(&ctx));
        assert!(!r.success);
        assert_eq!(r.error.unwrap().code, "load_error");
    }

    #[test]
    fn general_queries() {
        let o = orchestrator();
        let r = o.process_query("help", None);
        assert!(matches!(r.result, Some(QueryOutcome::Help { .. })));
        assert_eq!(r.query_type, QueryType::General);

        o.ingest_upload(SALES.as_bytes(), "sales.csv").unwrap();
        let r = o.process_query("status", None);
        match r.result.unwrap() {
            QueryOutcome::Status(s) => {
                assert!(s.tabular_ready);
                assert!(!s.document_ready);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let r = o.process_query("hello there", None);
        assert!(matches!(r.result, Some(QueryOutcome::Guidance { .. })));
    }

    #[test]
    fn upload_rejects_unknown_extensions() {
        let o = orchestrator();
        let err = o.ingest_upload(b"hi", "notes.docx").unwrap_err();
        assert_eq!(err.code(), "load_error");
        assert!(err.to_string().contains(".docx"));
    }

    #[test]
    fn clear_all_empties_both_stores() {
        let o = orchestrator();
        o.ingest_upload(SALES.as_bytes(), "sales.csv").unwrap();
        o.documents().load_text(NOTES, "notes.txt").unwrap();
        let files = o.loaded_files();
        assert_eq!(files.datasets.len(), 1);
        assert_eq!(files.documents.len(), 1);

        o.clear_all();
        let status = o.status();
        assert!(status.loaded_datasets.is_empty());
        assert!(status.loaded_documents.is_empty());
    }

    #[test]
    fn response_serializes_with_nested_tags() {
        let o = orchestrator();
        o.ingest_upload(SALES.as_bytes(), "sales.csv").unwrap();
        let r = o.process_query("count rows in sales.csv", None);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["query_type"], "tabular");
        assert_eq!(v["result"]["kind"], "tabular");
        assert_eq!(v["result"]["query_type"], "count");
        assert_eq!(v["routing"]["agent_used"], TABULAR_AGENT);
        assert!(v.get("error").is_none());
    }
}

//! Intent routing: decide which analyzer a free-text query belongs to.
//!
//! Classification is keyword-frequency scoring over two lexicons, each split
//! into named sub-categories. It is a pure function of the query and the
//! caller-supplied [`QueryContext`].
//!
//! # Algorithm
//!
//! 1. **Fast path**: file-format and document tokens in the lowercased query
//!    short-circuit to Tabular or Document at 0.9 (tabular tokens first).
//! 2. **Scoring**: per sub-category, the summed weight of keywords present as
//!    substrings, divided by the sub-category size. A lexicon's score is the
//!    mean over its sub-categories.
//! 3. **Bias**: +0.2 to a side whose context list is non-empty.
//! 4. **Decision**: see [`decide`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const FAST_PATH_CONFIDENCE: f64 = 0.9;
const CONTEXT_BIAS: f64 = 0.2;
const ROUTE_THRESHOLD: f64 = 0.3;
const MAX_SCORED_CONFIDENCE: f64 = 0.8;
const AMBIGUITY_MARGIN: f64 = 0.1;
const AMBIGUITY_FLOOR: f64 = 0.2;
const AMBIGUOUS_CONFIDENCE: f64 = 0.5;
const GENERAL_CONFIDENCE: f64 = 0.3;

const TABULAR_FAST_PATH: &[&str] = &[".csv", ".xlsx", ".xls", "spreadsheet", "excel"];
const DOCUMENT_FAST_PATH: &[&str] = &[".pdf", "paper", "document", "research"];

type Lexicon = &'static [(&'static str, &'static [&'static str])];

const TABULAR_LEXICON: Lexicon = &[
    (
        "analysis",
        &[
            "total", "sum", "average", "mean", "count", "maximum", "minimum", "plot", "chart",
            "graph", "visualize", "trend", "sales", "revenue", "profit", "expense", "customer",
            "product", "data", "csv", "excel", "table", "column", "row", "filter", "sort",
            "group", "aggregate",
        ],
    ),
    ("operations", &["load", "upload", "import", "export", "save", "delete"]),
    (
        "visualization",
        &[
            "show", "display", "plot", "chart", "graph", "visualize", "bar", "line", "pie",
            "scatter", "histogram",
        ],
    ),
];

const DOCUMENT_LEXICON: Lexicon = &[
    (
        "document",
        &[
            "paper", "document", "pdf", "research", "study", "article", "publication", "journal",
            "abstract", "summary",
        ],
    ),
    (
        "analysis",
        &[
            "summarize", "extract", "keyword", "topic", "theme", "content", "methodology",
            "conclusion", "finding", "result",
        ],
    ),
    ("search", &["find", "search", "locate", "identify", "discover", "lookup"]),
    (
        "questions",
        &["what", "how", "why", "when", "where", "who", "explain", "describe"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Tabular,
    Document,
    Ambiguous,
    General,
}

impl QueryType {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryType::Tabular => "tabular",
            QueryType::Document => "document",
            QueryType::Ambiguous => "ambiguous",
            QueryType::General => "general",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub query_type: QueryType,
    pub confidence: f64,
    pub reasoning: String,
}

/// A file the caller has staged but not loaded yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingFile {
    pub path: PathBuf,
    pub name: String,
}

/// Caller-side state that biases routing. Every field is optional on the
/// wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryContext {
    #[serde(default)]
    pub loaded_datasets: Vec<String>,
    #[serde(default)]
    pub loaded_documents: Vec<String>,
    #[serde(default)]
    pub pending_data_file: Option<PendingFile>,
    #[serde(default)]
    pub pending_pdf_file: Option<PendingFile>,
}

/// Classifies `query`.
pub fn classify(query: &str, context: &QueryContext) -> Classification {
    let lower = query.to_lowercase();

    if TABULAR_FAST_PATH.iter().any(|t| lower.contains(t)) {
        return Classification {
            query_type: QueryType::Tabular,
            confidence: FAST_PATH_CONFIDENCE,
            reasoning: "Query mentions data file formats".to_string(),
        };
    }
    if DOCUMENT_FAST_PATH.iter().any(|t| lower.contains(t)) {
        return Classification {
            query_type: QueryType::Document,
            confidence: FAST_PATH_CONFIDENCE,
            reasoning: "Query mentions research documents".to_string(),
        };
    }

    let mut tabular = lexicon_score(&lower, TABULAR_LEXICON);
    let mut document = lexicon_score(&lower, DOCUMENT_LEXICON);
    if !context.loaded_datasets.is_empty() {
        tabular += CONTEXT_BIAS;
    }
    if !context.loaded_documents.is_empty() {
        document += CONTEXT_BIAS;
    }

    let classification = decide(tabular, document);
    tracing::debug!(
        tabular,
        document,
        query_type = classification.query_type.as_str(),
        "query classified"
    );
    classification
}

/// Applies the fixed thresholds to the two biased scores.
pub fn decide(tabular: f64, document: f64) -> Classification {
    if tabular > document && tabular > ROUTE_THRESHOLD {
        Classification {
            query_type: QueryType::Tabular,
            confidence: tabular.min(MAX_SCORED_CONFIDENCE),
            reasoning: format!("Tabular keywords score: {:.2}", tabular),
        }
    } else if document > tabular && document > ROUTE_THRESHOLD {
        Classification {
            query_type: QueryType::Document,
            confidence: document.min(MAX_SCORED_CONFIDENCE),
            reasoning: format!("Document keywords score: {:.2}", document),
        }
    } else if (tabular - document).abs() < AMBIGUITY_MARGIN
        && tabular.max(document) > AMBIGUITY_FLOOR
    {
        Classification {
            query_type: QueryType::Ambiguous,
            confidence: AMBIGUOUS_CONFIDENCE,
            reasoning: "Similar scores for both analyzers".to_string(),
        }
    } else {
        Classification {
            query_type: QueryType::General,
            confidence: GENERAL_CONFIDENCE,
            reasoning: "No clear category match".to_string(),
        }
    }
}

fn lexicon_score(lower: &str, lexicon: Lexicon) -> f64 {
    let scores: Vec<f64> = lexicon
        .iter()
        .filter(|(_, keywords)| !keywords.is_empty())
        .map(|(_, keywords)| {
            let hits: usize = keywords
                .iter()
                .filter(|k| lower.contains(*k))
                .map(|k| k.split_whitespace().count())
                .sum();
            hits as f64 / keywords.len() as f64
        })
        .collect();

    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

//! JSON HTTP API over the [`Orchestrator`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/upload/{filename}` | Raw file body; loaded as a dataset or document by extension |
//! | `POST` | `/query` | `{query, context?}` → routed query response |
//! | `GET`  | `/status` | Loaded names and analyzer readiness |
//! | `GET`  | `/files` | Dataset names and document listings |
//! | `DELETE` | `/files/clear` | Empty both stores |
//! | `GET`  | `/data/datasets` | Dataset names |
//! | `GET`  | `/data/summary/{name}` | Dataset profile |
//! | `DELETE` | `/data/datasets/{name}` | Remove one dataset |
//! | `GET`  | `/research/documents` | Document listing |
//! | `GET`  | `/research/document/{name}` | Document info |
//! | `POST` | `/research/search` | `{query, top_k?}` → ranked chunks |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "dataset_not_found", "message": "Dataset q3.csv not found" } }
//! ```
//!
//! Codes come from the domain errors' `code()`; `bad_request` and
//! `internal` are added here. Query failures are not HTTP errors: `/query`
//! always answers 200 with `success: false` in the body.
//!
//! # Threading
//!
//! Analyzer calls are synchronous and may block on embedding requests, so
//! every handler that touches the orchestrator runs it on tokio's blocking
//! pool.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::document::{DocumentInfo, DocumentListing, SearchResults};
use crate::error::{DocumentError, IntakeError, TabularError};
use crate::orchestrator::{
    ClearResponse, LoadedFiles, Orchestrator, QueryResponse, SystemStatus, UploadResponse,
};
use crate::router::QueryContext;
use crate::tabular::DatasetProfile;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
}

/// Starts the HTTP server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(config: &Config, orchestrator: Arc<Orchestrator>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = build_router(orchestrator, config.server.max_upload_bytes);

    tracing::info!(bind = %bind_addr, "analyst server listening");
    println!("Analyst server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the router with all endpoints, CORS, and the upload size limit.
pub fn build_router(orchestrator: Arc<Orchestrator>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/upload/{filename}", post(handle_upload))
        .route("/query", post(handle_query))
        .route("/status", get(handle_status))
        .route("/files", get(handle_files))
        .route("/files/clear", delete(handle_clear))
        .route("/data/datasets", get(handle_datasets))
        .route("/data/summary/{name}", get(handle_dataset_summary))
        .route("/data/datasets/{name}", delete(handle_remove_dataset))
        .route("/research/documents", get(handle_documents))
        .route("/research/document/{name}", get(handle_document_info))
        .route("/research/search", post(handle_search))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(AppState { orchestrator })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Maps a domain error code to its HTTP status.
fn status_for(code: &str) -> StatusCode {
    match code {
        "not_found" | "dataset_not_found" => StatusCode::NOT_FOUND,
        "embedding_error" => StatusCode::BAD_GATEWAY,
        "internal" => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn domain_error(code: &'static str, message: String) -> AppError {
    AppError {
        status: status_for(code),
        code: code.to_string(),
        message,
    }
}

impl From<TabularError> for AppError {
    fn from(e: TabularError) -> Self {
        domain_error(e.code(), e.to_string())
    }
}

impl From<DocumentError> for AppError {
    fn from(e: DocumentError) -> Self {
        domain_error(e.code(), e.to_string())
    }
}

impl From<IntakeError> for AppError {
    fn from(e: IntakeError) -> Self {
        domain_error(e.code(), e.to_string())
    }
}

/// Runs `f` against the orchestrator on the blocking pool.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&Orchestrator) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let orchestrator = state.orchestrator.clone();
    tokio::task::spawn_blocking(move || f(&orchestrator))
        .await
        .map_err(|e| internal(format!("worker task failed: {}", e)))?
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /upload/{filename} ============

/// Loads the raw request body. The file never touches disk.
async fn handle_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    body: Bytes,
) -> Result<Json<UploadResponse>, AppError> {
    if body.is_empty() {
        return Err(bad_request("upload body must not be empty"));
    }
    let response = blocking(&state, move |o| {
        o.ingest_upload(&body, &filename).map_err(AppError::from)
    })
    .await?;
    Ok(Json(response))
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    context: Option<QueryContext>,
}

async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let context = req.context.map(without_pending_files);
    let response = blocking(&state, move |o| {
        Ok(o.process_query(&req.query, context.as_ref()))
    })
    .await?;
    Ok(Json(response))
}

/// Pending files name server-side paths. Over HTTP, files arrive through
/// `/upload` only, so client-supplied paths are never opened.
fn without_pending_files(context: QueryContext) -> QueryContext {
    if context.pending_data_file.is_some() || context.pending_pdf_file.is_some() {
        tracing::warn!("ignoring pending file paths supplied in a /query body");
    }
    QueryContext {
        pending_data_file: None,
        pending_pdf_file: None,
        ..context
    }
}

// ============ Status and listings ============

async fn handle_status(State(state): State<AppState>) -> Result<Json<SystemStatus>, AppError> {
    Ok(Json(blocking(&state, |o| Ok(o.status())).await?))
}

#[derive(Serialize)]
struct FilesResponse {
    success: bool,
    files: LoadedFiles,
}

async fn handle_files(State(state): State<AppState>) -> Result<Json<FilesResponse>, AppError> {
    let files = blocking(&state, |o| Ok(o.loaded_files())).await?;
    Ok(Json(FilesResponse {
        success: true,
        files,
    }))
}

async fn handle_clear(State(state): State<AppState>) -> Result<Json<ClearResponse>, AppError> {
    Ok(Json(blocking(&state, |o| Ok(o.clear_all())).await?))
}

// ============ /data ============

#[derive(Serialize)]
struct DatasetsResponse {
    success: bool,
    datasets: Vec<String>,
}

async fn handle_datasets(State(state): State<AppState>) -> Result<Json<DatasetsResponse>, AppError> {
    let datasets = blocking(&state, |o| Ok(o.tabular().list())).await?;
    Ok(Json(DatasetsResponse {
        success: true,
        datasets,
    }))
}

#[derive(Serialize)]
struct DatasetSummaryResponse {
    success: bool,
    summary: DatasetProfile,
}

async fn handle_dataset_summary(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DatasetSummaryResponse>, AppError> {
    let summary = blocking(&state, move |o| {
        o.tabular().summary(Some(&name)).map_err(AppError::from)
    })
    .await?;
    Ok(Json(DatasetSummaryResponse {
        success: true,
        summary,
    }))
}

async fn handle_remove_dataset(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ClearResponse>, AppError> {
    let message = format!("Removed {}", name);
    blocking(&state, move |o| o.tabular().remove(&name).map_err(AppError::from)).await?;
    Ok(Json(ClearResponse {
        success: true,
        message,
    }))
}

// ============ /research ============

#[derive(Serialize)]
struct DocumentsResponse {
    success: bool,
    documents: Vec<DocumentListing>,
}

async fn handle_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentsResponse>, AppError> {
    let documents = blocking(&state, |o| Ok(o.documents().list())).await?;
    Ok(Json(DocumentsResponse {
        success: true,
        documents,
    }))
}

async fn handle_document_info(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DocumentInfo>, AppError> {
    let info = blocking(&state, move |o| {
        o.documents().info(&name).map_err(AppError::from)
    })
    .await?;
    Ok(Json(info))
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResults>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    if req.top_k == Some(0) {
        return Err(bad_request("top_k must be >= 1"));
    }
    let results = blocking(&state, move |o| {
        o.documents()
            .search(&req.query, req.top_k)
            .map_err(AppError::from)
    })
    .await?;
    Ok(Json(results))
}

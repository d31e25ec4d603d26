use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use pdf_rag_core::{
    loader, IngestionPipeline, LoaderKind, QueryError, ResponseMode, RetrievalEngine,
    SemanticChunkerConfig, StoreError, TranslationStage, VectorCollectionStore,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn VectorCollectionStore>,
    pub pipeline: Arc<IngestionPipeline>,
    pub engine: Arc<RetrievalEngine>,
    pub translator: Arc<TranslationStage>,
    pub semantic_chunker: SemanticChunkerConfig,
    pub upload_timeout: Duration,
    pub api_token: Option<String>,
    pub default_target_language: String,
}

/// Error envelope mirroring the service's error taxonomy: bad input 400,
/// auth 401, missing collection 404, processing failures 500. Bodies carry a
/// single `detail` string with stage and cause.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Auth(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::Validation(detail) => (StatusCode::BAD_REQUEST, detail),
            Self::Auth(detail) => (StatusCode::UNAUTHORIZED, detail),
            Self::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            Self::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/rag/upload", post(upload_document))
        .route("/v1/rag/query", get(query_documents))
        .route("/v1/rag/info", get(service_info))
        .route("/v1/rag/collections", get(list_collections))
        .route("/v1/rag/collections/{name}", delete(delete_collection))
        .route("/v1/translate", post(translate_text))
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = &state.api_token else {
        return Ok(next.run(request).await);
    };

    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == expected => Ok(next.run(request).await),
        Some(_) => Err(ApiError::Auth("invalid token".to_string())),
        None => Err(ApiError::Auth("missing bearer token".to_string())),
    }
}

fn default_collection() -> String {
    "default_collection".to_string()
}

fn default_doc_type() -> String {
    "GENERIC".to_string()
}

fn default_loader() -> String {
    LoaderKind::Structural.as_tag().to_string()
}

fn default_response_mode() -> String {
    ResponseMode::Compact.value().to_string()
}

#[derive(Debug, Deserialize)]
struct UploadParams {
    #[serde(default = "default_collection")]
    collection_name: String,
    #[serde(default = "default_doc_type")]
    doc_type: String,
    #[serde(default = "default_loader")]
    loader: String,
}

async fn upload_document(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let kind = LoaderKind::parse(&params.loader)
        .ok_or_else(|| ApiError::Validation(format!("unknown loader '{}'", params.loader)))?;

    let mut pdf_bytes = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::Validation(format!("malformed multipart body: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if field.content_type() != Some("application/pdf") {
            return Err(ApiError::Validation(
                "Only PDF files are accepted".to_string(),
            ));
        }
        pdf_bytes = Some(field.bytes().await.map_err(|err| {
            ApiError::Validation(format!("failed to read uploaded file: {err}"))
        })?);
    }

    let pdf_bytes =
        pdf_bytes.ok_or_else(|| ApiError::Validation("no file field in upload".to_string()))?;

    // Dropped on every exit path, which removes the file.
    let mut temp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|err| ApiError::Internal(format!("failed to save file: {err}")))?;
    temp.write_all(&pdf_bytes)
        .map_err(|err| ApiError::Internal(format!("failed to save file: {err}")))?;

    info!(
        collection = %params.collection_name,
        doc_type = %params.doc_type,
        loader = %params.loader,
        bytes = pdf_bytes.len(),
        "upload received"
    );

    let ingestion = async {
        let fragments = loader::load(temp.path(), kind, &state.semantic_chunker)
            .await
            .map_err(|err| ApiError::Internal(format!("Error processing PDF: {err}")))?;
        let collection = state
            .store
            .get_or_create_collection(&params.collection_name)
            .await
            .map_err(|err| ApiError::Internal(format!("Error processing PDF: {err}")))?;
        state
            .pipeline
            .ingest(&fragments, &collection, &params.doc_type)
            .await
            .map_err(|err| ApiError::Internal(format!("Error processing PDF: {err}")))
    };

    let documents_size = tokio::time::timeout(state.upload_timeout, ingestion)
        .await
        .map_err(|_| {
            error!(
                timeout_secs = state.upload_timeout.as_secs(),
                "upload processing timed out"
            );
            ApiError::Internal(format!(
                "upload timed out after {}s",
                state.upload_timeout.as_secs()
            ))
        })??;

    Ok(Json(json!({
        "message": format!(
            "File uploaded and processed into collection '{}' using loader '{}'.",
            params.collection_name, params.loader
        ),
        "status": "success",
        "documents_size": documents_size,
    })))
}

#[derive(Debug, Deserialize)]
struct QueryParams {
    q: String,
    doc_type: Option<String>,
    #[serde(default = "default_collection")]
    collection_name: String,
    #[serde(default = "default_response_mode")]
    response_mode: String,
}

async fn query_documents(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .engine
        .query(
            &params.q,
            params.doc_type.as_deref(),
            &params.collection_name,
            &params.response_mode,
        )
        .await
        .map_err(|err| match err {
            QueryError::UnknownResponseMode(mode) => {
                ApiError::Validation(format!("unknown response mode '{mode}'"))
            }
            other => ApiError::Internal(format!("Query failed: {other}")),
        })?;

    Ok(Json(json!({
        "question": result.question,
        "answer": result.answer,
        "metadata": result.source_nodes,
    })))
}

async fn service_info() -> Json<Value> {
    let mut modes = serde_json::Map::new();
    for entry in ResponseMode::catalog() {
        modes.insert(
            entry.name.to_string(),
            json!({ "value": entry.value, "description": entry.description }),
        );
    }

    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "description": "RAG API",
        "supported_response_modes": modes,
    }))
}

async fn list_collections(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let collections = state
        .store
        .list_collections()
        .await
        .map_err(|err| ApiError::Internal(format!("Failed to list collections: {err}")))?;

    Ok(Json(json!({ "collections": collections })))
}

async fn delete_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .store
        .delete_collection(&name)
        .await
        .map_err(|err| match err {
            StoreError::CollectionNotFound(name) => {
                ApiError::NotFound(format!("collection '{name}' does not exist"))
            }
            other => ApiError::Internal(format!("Failed to delete collection: {other}")),
        })?;

    Ok(Json(json!({
        "message": format!("Collection '{name}' deleted."),
        "status": "success",
    })))
}

#[derive(Debug, Deserialize)]
struct TranslateRequest {
    text: String,
    target_language: Option<String>,
}

async fn translate_text(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<Value>, ApiError> {
    let target_language = request
        .target_language
        .unwrap_or_else(|| state.default_target_language.clone());

    let outcome = state
        .translator
        .translate(&request.text, &target_language)
        .await
        .map_err(|err| ApiError::Internal(format!("Translation failed: {err}")))?;

    Ok(Json(json!({
        "original": outcome.original,
        "translated": outcome.translated,
        "target_language": outcome.target_language,
    })))
}

//! HTTP front end over a built seekr index.

use anyhow::Result;
use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path as UrlPath, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use parking_lot::RwLock;
use seekr_core::{DocId, Error as IndexError, IndexBuilder, IndexPaths, QueryEngine, SearchOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// Per-query budget; `None` lets queries run to completion.
    pub search_timeout: Option<Duration>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self { search_timeout: Some(Duration::from_secs(2)) }
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub url: String,
    pub title: Option<String>,
}

#[derive(Serialize)]
pub struct DocResponse {
    pub doc_id: DocId,
    pub url: String,
    pub title: Option<String>,
    pub duplicate: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<RwLock<IndexBuilder>>,
    pub options: ServerOptions,
}

/// Error body returned by every endpoint.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

/// Engine failures are server faults, except for an expired search budget.
/// Handlers that treat some engine errors as client errors map them first.
impl From<IndexError> for ApiError {
    fn from(e: IndexError) -> Self {
        if matches!(e, IndexError::DeadlineExceeded) {
            return Self::new(StatusCode::GATEWAY_TIMEOUT, e.to_string());
        }
        tracing::error!(error = %e, "index error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

/// Loads the index under `index_dir` and wires the routes. Fails if the
/// directory does not hold a built index.
pub fn build_app<P: AsRef<Path>>(index_dir: P, options: ServerOptions) -> Result<Router> {
    let index = IndexBuilder::load(IndexPaths::new(index_dir.as_ref()))?;
    tracing::info!(documents = index.num_docs(), terms = index.storage().len()?, "index loaded");
    let state = AppState { index: Arc::new(RwLock::new(index)), options };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

/// CORS_ALLOW_ORIGIN holds a comma-separated origin list; unset or empty
/// allows any origin.
fn cors_layer() -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let origins: Vec<_> = std::env::var("CORS_ALLOW_ORIGIN")
        .map(|val| val.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();
    if origins.is_empty() {
        base.allow_origin(Any)
    } else {
        base.allow_origin(AllowOrigin::list(origins))
    }
}

pub async fn search_handler(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Query(params) = params?;
    let start = Instant::now();
    let k = params.k.clamp(1, MAX_K);
    let options = SearchOptions { limit: Some(k), timeout: state.options.search_timeout };
    let index = Arc::clone(&state.index);
    let query = params.q.clone();

    // Posting lists are read from disk, so keep them off the async workers.
    let (total_hits, results) = tokio::task::spawn_blocking(move || -> Result<_, IndexError> {
        let index = index.read();
        let found = QueryEngine::new(&index).search_hits(&query, &options)?;
        let hits = found
            .hits
            .into_iter()
            .map(|hit| -> Result<SearchHit, IndexError> {
                let title = index.document(hit.doc_id)?.title.clone();
                Ok(SearchHit { doc_id: hit.doc_id, score: hit.score, url: hit.url, title })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((found.total_hits, hits))
    })
    .await
    .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;

    let took_s = start.elapsed().as_secs_f64();
    tracing::debug!(query = %params.q, total_hits, took_s, "search served");
    Ok(Json(SearchResponse { query: params.q, took_s, total_hits, results }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    doc_id: Result<UrlPath<DocId>, PathRejection>,
) -> Result<Json<DocResponse>, ApiError> {
    let UrlPath(doc_id) = doc_id?;
    let index = state.index.read();
    let meta = index.document(doc_id).map_err(|e| match e {
        IndexError::UnknownDocument(_) => ApiError::new(StatusCode::NOT_FOUND, e.to_string()),
        other => other.into(),
    })?;
    Ok(Json(DocResponse { doc_id, url: meta.url.clone(), title: meta.title.clone(), duplicate: meta.duplicate }))
}

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use quire_core::{
    attach_snippets, build, lookup_documents, query, BodyProvider, DirectoryStore, IndexStorage, Layout, QueryOutcome,
    QuireError, Storage, UnknownTermPolicy,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub index: PathBuf,
    pub layout: Layout,
    pub policy: UnknownTermPolicy,
    pub documents: PathBuf,
    pub admin_token: Option<String>,
    /// Comma separated origins; any origin when unset or empty.
    pub cors_allow_origin: Option<String>,
    /// Rebuild from `documents` on this period, starting right away; manual only when unset.
    pub rebuild_interval: Option<Duration>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
}

#[derive(Serialize)]
pub struct RebuildResponse {
    pub indexed: usize,
    pub skipped: usize,
    pub terms: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub documents: Arc<DirectoryStore>,
    pub policy: UnknownTermPolicy,
    pub admin_token: Option<String>,
    rebuild: Arc<Mutex<()>>,
}

/// Error body `{"error": ...}` with a status chosen from the core error kind.
pub struct ApiError(StatusCode, String);

impl From<QuireError> for ApiError {
    fn from(err: QuireError) -> Self {
        let status = match &err {
            QuireError::IndexNotFound(_) => StatusCode::SERVICE_UNAVAILABLE,
            e if e.is_storage_fault() => StatusCode::INTERNAL_SERVER_ERROR,
            QuireError::MissingQuery | QuireError::DocumentBuildFailure { .. } => StatusCode::BAD_REQUEST,
            QuireError::DocumentUnreadable { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if err.is_storage_fault() {
            tracing::error!(error = %err, "index on disk is unusable until the next rebuild");
        } else if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        ApiError(status, err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!(error = %err, "could not encode response");
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

fn cors_layer(allow: Option<&str>) -> CorsLayer {
    let origins: Vec<_> = allow
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    if origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
    }
}

impl AppState {
    /// Rebuild from the document directory and atomically replace the persisted index.
    /// Refuses with 409 while another rebuild is running.
    pub fn rebuild(&self) -> Result<RebuildResponse, ApiError> {
        let Some(_guard) = self.rebuild.try_lock() else {
            return Err(ApiError(StatusCode::CONFLICT, "a rebuild is already running".into()));
        };
        let outcome = build(self.documents.documents());
        self.storage.export(&outcome.index)?;
        let resp = RebuildResponse { indexed: outcome.indexed, skipped: outcome.skipped, terms: outcome.index.len() };
        tracing::info!(indexed = resp.indexed, skipped = resp.skipped, terms = resp.terms, "index rebuilt");
        Ok(resp)
    }
}

/// Run [`AppState::rebuild`] now and then once every `every`, on the blocking pool.
/// A failed or overlapping cycle is logged and the schedule continues.
pub fn spawn_periodic_rebuild(state: AppState, every: Duration) -> Result<tokio::task::JoinHandle<()>> {
    anyhow::ensure!(!every.is_zero(), "rebuild interval must be positive");
    let runtime = tokio::runtime::Handle::try_current().context("periodic rebuild needs a tokio runtime")?;
    Ok(runtime.spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let state = state.clone();
            match tokio::task::spawn_blocking(move || state.rebuild()).await {
                Ok(Ok(_)) => {}
                Ok(Err(ApiError(status, msg))) => tracing::warn!(%status, error = %msg, "scheduled rebuild skipped"),
                Err(err) => tracing::error!(error = %err, "scheduled rebuild aborted"),
            }
        }
    }))
}

pub fn build_app(config: ServerConfig) -> Result<Router> {
    anyhow::ensure!(config.documents.is_dir(), "document directory {} does not exist", config.documents.display());
    let app_state = AppState {
        storage: Arc::new(Storage::open(config.layout, &config.index)),
        documents: Arc::new(DirectoryStore::new(&config.documents)),
        policy: config.policy,
        admin_token: config.admin_token,
        rebuild: Arc::new(Mutex::new(())),
    };
    tracing::info!(index = %config.index.display(), layout = %config.layout, policy = %config.policy, "serving index");
    if let Some(every) = config.rebuild_interval {
        spawn_periodic_rebuild(app_state.clone(), every)?;
        tracing::info!(every_s = every.as_secs_f64(), "periodic rebuild enabled");
    }

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search/word_level", get(search_handler))
        .route("/search/record_level", get(record_level_handler))
        .route("/documents/*doc_id", get(document_handler))
        .route("/index/rebuild", post(rebuild_handler))
        .with_state(app_state)
        .layer(cors_layer(config.cors_allow_origin.as_deref()))
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

fn require_query(params: &SearchParams) -> Result<String, ApiError> {
    let q = params.query.trim();
    if q.is_empty() {
        return Err(ApiError(StatusCode::BAD_REQUEST, "No search query provided".into()));
    }
    Ok(q.to_string())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let q = require_query(&params)?;
    let start = std::time::Instant::now();
    let json = tokio::task::spawn_blocking(move || -> Result<serde_json::Value, ApiError> {
        match query(&q, state.storage.as_ref(), state.policy)? {
            QueryOutcome::Matches(result) => {
                let result = attach_snippets(result, state.documents.as_ref());
                Ok(serde_json::to_value(result)?)
            }
            other => Ok(serde_json::json!({ "message": other.message() })),
        }
    })
    .await??;
    tracing::debug!(took_s = start.elapsed().as_secs_f64(), "search served");
    Ok(Json(json))
}

pub async fn record_level_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let q = require_query(&params)?;
    let found = tokio::task::spawn_blocking(move || lookup_documents(&q, state.storage.as_ref())).await??;
    Ok(Json(serde_json::json!(found)))
}

pub async fn document_handler(State(state): State<AppState>, Path(doc_id): Path<String>) -> Result<Response, ApiError> {
    let body = tokio::task::spawn_blocking(move || state.documents.body(&doc_id)).await??;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response())
}

async fn rebuild_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<RebuildResponse>, ApiError> {
    authorize(&state, &headers)?;
    let resp = tokio::task::spawn_blocking(move || state.rebuild()).await??;
    Ok(Json(resp))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(ApiError(StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(ApiError(StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_failures_are_server_errors() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let resp = ApiError::from(err).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn storage_faults_map_to_server_errors() {
        let status = |e: QuireError| ApiError::from(e).0;
        assert_eq!(status(QuireError::IndexNotFound("idx".into())), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status(QuireError::ShardNotFound { shard: 'c', path: "c/c_words.json".into() }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status(QuireError::MissingQuery), StatusCode::BAD_REQUEST);
    }
}

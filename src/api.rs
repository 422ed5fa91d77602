use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::error::{IngestError, StoreError, UnknownSource, UnknownStatus};
use crate::ingest::types::SourceId;
use crate::ingest::{IngestRequest, Ingestor, SourceSelector};
use crate::store::{OpportunityQuery, OpportunityStatus, OpportunityStore, OpportunityUpdate, SortBy};

const DEFAULT_SOURCE: &str = "github";

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<Ingestor>,
    pub store: Arc<dyn OpportunityStore>,
    pub default_limit: u32,
}

impl AppState {
    pub fn new(ingestor: Arc<Ingestor>, default_limit: u32) -> Self {
        let store = Arc::clone(ingestor.store());
        Self {
            ingestor,
            store,
            default_limit: default_limit.max(1),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/ingest", post(ingest))
        .route(
            "/api/opportunities",
            get(list_opportunities).patch(update_opportunity_by_query),
        )
        .route("/api/opportunities/{id}", patch(update_opportunity))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Error body shared by every endpoint: `{ "error": "..." }`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": msg }))).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        let msg = e.to_string();
        match e {
            IngestError::EmptyResult => ApiError::BadRequest(msg),
            IngestError::Persistence(_) => ApiError::Internal(msg),
        }
    }
}

impl From<UnknownSource> for ApiError {
    fn from(e: UnknownSource) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<UnknownStatus> for ApiError {
    fn from(e: UnknownStatus) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let msg = e.to_string();
        match e {
            StoreError::NotFound(_) => ApiError::NotFound(msg),
            _ => ApiError::Internal(msg),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct IngestBody {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
}

async fn ingest(
    State(state): State<AppState>,
    Json(body): Json<IngestBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let source = body.source.as_deref().unwrap_or(DEFAULT_SOURCE);
    let limit = match body.limit {
        None => state.default_limit,
        Some(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
        Some(_) => return Err(ApiError::BadRequest("limit must be a positive integer".into())),
    };

    tracing::info!(target: "ingest", source, limit, "ingest requested");
    let req = IngestRequest::new(SourceSelector::parse(source), limit);
    let report = state.ingestor.run(&req).await?;

    Ok(Json(json!({
        "success": true,
        "sources": report.sources,
        "count": report.count,
        "opportunities": report.opportunities,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    status: Option<String>,
    source: Option<String>,
    min_score: Option<f64>,
    max_score: Option<f64>,
    sort_by: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl ListParams {
    fn into_query(self) -> Result<OpportunityQuery, ApiError> {
        let defaults = OpportunityQuery::default();
        let status = self
            .status
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<OpportunityStatus>())
            .transpose()?;
        let source = self
            .source
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<SourceId>())
            .transpose()?;
        let sort_by = match self.sort_by.as_deref() {
            Some("date") => SortBy::Date,
            Some("source") => SortBy::Source,
            _ => SortBy::Score,
        };
        Ok(OpportunityQuery {
            status,
            source,
            min_score: self.min_score.unwrap_or(defaults.min_score),
            max_score: self.max_score.unwrap_or(defaults.max_score),
            sort_by,
            limit: self.limit.unwrap_or(defaults.limit),
            offset: self.offset.unwrap_or(defaults.offset),
        })
    }
}

async fn list_opportunities(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let q = params.into_query()?;
    let page = state.store.list(&q).await?;
    Ok(Json(json!({
        "success": true,
        "opportunities": page.items,
        "total": page.total,
        "limit": q.limit,
        "offset": q.offset,
    })))
}

fn validate_update(update: &OpportunityUpdate) -> Result<(), ApiError> {
    if let Some(score) = update.override_score {
        if !score.is_finite() || !(0.0..=100.0).contains(&score) {
            return Err(ApiError::BadRequest(
                "override_score must be between 0 and 100".into(),
            ));
        }
    }
    Ok(())
}

async fn apply_update(
    state: &AppState,
    id: Uuid,
    update: OpportunityUpdate,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_update(&update)?;
    let row = state.store.update(id, update).await?;
    Ok(Json(json!({ "success": true, "opportunity": row })))
}

async fn update_opportunity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<OpportunityUpdate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    apply_update(&state, id, update).await
}

#[derive(Debug, Deserialize)]
struct IdParam {
    id: Option<String>,
}

/// `PATCH /api/opportunities?id=...`, the form the dashboard sends.
async fn update_opportunity_by_query(
    State(state): State<AppState>,
    Query(q): Query<IdParam>,
    Json(update): Json<OpportunityUpdate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let raw = q
        .id
        .ok_or_else(|| ApiError::BadRequest("ID required".into()))?;
    let id = Uuid::parse_str(raw.trim())
        .map_err(|e| ApiError::BadRequest(format!("invalid id: {e}")))?;
    apply_update(&state, id, update).await
}

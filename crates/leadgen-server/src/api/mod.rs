mod analytics;
mod campaigns;
mod jobs;
mod leads;
mod webhooks;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use leadgen_pipeline::{JobRunner, PipelineError, Store, StoreError, WebhookIngestor};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub runner: Arc<JobRunner>,
    pub ingestor: Arc<WebhookIngestor>,
    /// Set when the store is Postgres; used by the health check.
    pub pool: Option<PgPool>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(request_id: String, data: T) -> Json<Self> {
        Json(Self {
            data,
            meta: ResponseMeta::new(request_id),
        })
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn normalize_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

pub(super) fn map_store_error(request_id: &str, error: &StoreError) -> ApiError {
    match error {
        StoreError::NotFound => ApiError::new(request_id, "not_found", "record not found"),
        StoreError::InvalidJobTransition { .. } => {
            ApiError::new(request_id, "conflict", error.to_string())
        }
        StoreError::Db(e) => {
            tracing::error!(error = %e, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

pub(super) fn map_pipeline_error(request_id: &str, error: &PipelineError) -> ApiError {
    match error {
        PipelineError::CampaignNotFound(_) | PipelineError::JobNotFound(_) => {
            ApiError::new(request_id, "not_found", error.to_string())
        }
        PipelineError::PlatformNotInCampaign { .. }
        | PipelineError::JobNotInCampaign { .. }
        | PipelineError::InvalidLead { .. } => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        PipelineError::JobNotRunning { .. } => {
            ApiError::new(request_id, "conflict", error.to_string())
        }
        PipelineError::Store(e) => map_store_error(request_id, e),
    }
}

/// Deserializes a JSON body, turning schema errors into `validation_error`.
pub(super) fn parse_body<T: DeserializeOwned>(
    request_id: &str,
    body: serde_json::Value,
) -> Result<T, ApiError> {
    serde_json::from_value(body)
        .map_err(|e| ApiError::new(request_id, "validation_error", e.to_string()))
}

/// Parses an optional query value; `all` and empty mean "no filter".
pub(super) fn parse_filter<T>(request_id: &str, value: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value.map(str::trim) {
        None | Some("" | "all") => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ApiError::new(request_id, "validation_error", e.to_string())),
    }
}

/// Runs a job on a background task; failures are logged.
pub(crate) fn spawn_job_run(runner: Arc<JobRunner>, job_id: Uuid) {
    tokio::spawn(async move {
        if let Err(e) = runner.run(job_id).await {
            tracing::error!(job_id = %job_id, error = %e, "background job run failed");
        }
    });
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/campaigns",
            get(campaigns::list_campaigns).post(campaigns::create_campaign),
        )
        .route("/api/v1/campaigns/quick", post(campaigns::quick_scrape))
        .route(
            "/api/v1/campaigns/{id}",
            get(campaigns::get_campaign).patch(campaigns::update_campaign_status),
        )
        .route(
            "/api/v1/campaigns/{id}/jobs",
            get(jobs::list_campaign_jobs).post(jobs::trigger_job),
        )
        .route("/api/v1/jobs/{id}", get(jobs::get_job))
        .route("/api/v1/jobs/{id}/cancel", post(jobs::cancel_job))
        .route(
            "/api/v1/leads",
            get(leads::list_leads).post(leads::bulk_insert_leads),
        )
        .route("/api/v1/leads/export", get(leads::export_leads))
        .route("/api/v1/analytics", get(analytics::get_analytics))
        .route(
            "/api/v1/leads/{id}",
            get(leads::get_lead).patch(leads::update_lead),
        )
        .route(
            "/api/v1/webhooks",
            get(webhooks::list_webhooks).post(webhooks::create_webhook),
        )
        .route(
            "/api/v1/webhooks/{id}/deliveries",
            get(webhooks::list_deliveries),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    // The crawler authenticates with its HMAC signature, not a bearer key.
    let public_routes = Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/webhooks/crawler", post(webhooks::crawler_webhook));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    let Some(pool) = &state.pool else {
        return (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "not_configured",
                },
                meta,
            }),
        );
    };

    match leadgen_db::health_check(pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

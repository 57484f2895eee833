use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use leadgen_core::{CrawlerEventType, WebhookConfig, WebhookDelivery};
use leadgen_pipeline::{IngestError, WebhookStore};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_store_error, normalize_limit, parse_body, ApiError, ApiResponse, AppState};

const SIGNATURE_HEADER: &str = "x-signature";

// ---------------------------------------------------------------------------
// Crawler events
// ---------------------------------------------------------------------------

/// Receives a signed event from the external crawler.
pub(super) async fn crawler_webhook(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.ingestor.ingest(signature, &body).await {
        Ok(outcome) => {
            tracing::debug!(
                job_id = %outcome.job_id,
                event = %outcome.event_type,
                leads = outcome.leads_stored,
                "crawler event accepted"
            );
            Ok(Json(json!({ "success": true })))
        }
        Err(e) => Err(map_ingest_error(&req_id.0, &e)),
    }
}

fn map_ingest_error(request_id: &str, error: &IngestError) -> ApiError {
    match error {
        IngestError::MissingSecret | IngestError::InvalidSignature => {
            tracing::warn!(error = %error, "crawler webhook rejected");
            ApiError::new(request_id, "unauthorized", "invalid webhook signature")
        }
        IngestError::Malformed(_) | IngestError::MissingJobId => {
            ApiError::new(request_id, "bad_request", error.to_string())
        }
        IngestError::JobNotFound(_) => ApiError::new(request_id, "not_found", error.to_string()),
        IngestError::Store(e) => map_store_error(request_id, e),
    }
}

// ---------------------------------------------------------------------------
// User webhooks
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateWebhookRequest {
    user_id: String,
    url: String,
    secret: String,
    events: Vec<CrawlerEventType>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

/// A registered webhook as returned by the API; the secret never leaves the server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WebhookView {
    id: Uuid,
    user_id: String,
    url: String,
    events: Vec<CrawlerEventType>,
    header_names: Vec<String>,
    is_active: bool,
}

impl From<WebhookConfig> for WebhookView {
    fn from(hook: WebhookConfig) -> Self {
        Self {
            id: hook.id,
            user_id: hook.user_id,
            url: hook.url,
            events: hook.events,
            header_names: hook.headers.into_keys().collect(),
            is_active: hook.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WebhookListQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct DeliveryListQuery {
    pub limit: Option<i64>,
}

fn validate_webhook(req_id: &str, body: &CreateWebhookRequest) -> Result<(), ApiError> {
    let problem = if body.user_id.trim().is_empty() {
        Some("userId is required")
    } else if !(body.url.starts_with("https://") || body.url.starts_with("http://")) {
        Some("url must be an http(s) URL")
    } else if body.secret.trim().is_empty() {
        Some("secret is required")
    } else if body.events.is_empty() {
        Some("events must not be empty")
    } else {
        None
    };
    match problem {
        Some(message) => Err(ApiError::new(req_id, "validation_error", message)),
        None => Ok(()),
    }
}

pub(super) async fn create_webhook(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<ApiResponse<WebhookView>>), ApiError> {
    let body: CreateWebhookRequest = parse_body(&req_id.0, body)?;
    validate_webhook(&req_id.0, &body)?;

    let mut events: Vec<CrawlerEventType> = Vec::with_capacity(body.events.len());
    for event in body.events {
        if !events.contains(&event) {
            events.push(event);
        }
    }
    let hook = WebhookConfig {
        id: Uuid::new_v4(),
        user_id: body.user_id.trim().to_string(),
        url: body.url,
        secret: body.secret,
        events,
        headers: body.headers,
        is_active: true,
    };
    state
        .store
        .create_webhook(&hook)
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;
    tracing::info!(webhook_id = %hook.id, user_id = %hook.user_id, "webhook registered");

    Ok((StatusCode::CREATED, ApiResponse::new(req_id.0, hook.into())))
}

pub(super) async fn list_webhooks(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<WebhookListQuery>,
) -> Result<Json<ApiResponse<Vec<WebhookView>>>, ApiError> {
    let Some(user_id) = query
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
    else {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "userId is required",
        ));
    };

    let hooks = state
        .store
        .list_webhooks(user_id)
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(
        req_id.0,
        hooks.into_iter().map(WebhookView::from).collect(),
    ))
}

pub(super) async fn list_deliveries(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeliveryListQuery>,
) -> Result<Json<ApiResponse<Vec<WebhookDelivery>>>, ApiError> {
    state
        .store
        .get_webhook(id)
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;
    let deliveries = state
        .store
        .list_deliveries(id, normalize_limit(query.limit))
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(req_id.0, deliveries))
}

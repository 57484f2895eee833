use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use leadgen_core::{EnrichmentStatus, Lead, LeadFilter, LeadStatus, LeadUpdate, Platform};
use leadgen_pipeline::{
    campaign_leads, insert_bulk, render_leads, BulkInsert, CampaignStore, ExportFormat, LeadInput,
    LeadStore,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    map_pipeline_error, map_store_error, normalize_limit, normalize_offset, parse_body,
    parse_filter, ApiError, ApiResponse, AppState,
};

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct LeadListQuery {
    #[serde(rename = "campaignId")]
    pub campaign_id: Option<Uuid>,
    pub platform: Option<String>,
    pub status: Option<String>,
    pub enrichment_status: Option<String>,
    pub has_email: Option<bool>,
    pub has_phone: Option<bool>,
    pub min_score: Option<f64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LeadPage {
    leads: Vec<Lead>,
    total: i64,
    has_more: bool,
}

pub(super) async fn list_leads(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<LeadListQuery>,
) -> Result<Json<ApiResponse<LeadPage>>, ApiError> {
    let platform: Option<Platform> = parse_filter(&req_id.0, query.platform.as_deref())?;
    let status: Option<LeadStatus> = parse_filter(&req_id.0, query.status.as_deref())?;
    let enrichment_status: Option<EnrichmentStatus> =
        parse_filter(&req_id.0, query.enrichment_status.as_deref())?;
    if let Some(min) = query.min_score.filter(|m| !(0.0..=1.0).contains(m)) {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            format!("min_score {min} is outside [0, 1]"),
        ));
    }

    let filter = LeadFilter {
        campaign_id: query.campaign_id,
        platform,
        status,
        enrichment_status,
        has_email: query.has_email,
        has_phone: query.has_phone,
        min_score: query.min_score,
        limit: normalize_limit(query.limit),
        offset: normalize_offset(query.offset),
    };
    let (leads, total) = state
        .store
        .query_leads(&filter)
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;

    let shown = i64::try_from(leads.len()).unwrap_or(i64::MAX);
    let has_more = filter.offset + shown < total;
    Ok(ApiResponse::new(
        req_id.0,
        LeadPage {
            leads,
            total,
            has_more,
        },
    ))
}

pub(super) async fn get_lead(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Lead>>, ApiError> {
    let lead = state
        .store
        .get_lead(id)
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(req_id.0, lead))
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

pub(super) async fn update_lead(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<Json<ApiResponse<Lead>>, ApiError> {
    let update: LeadUpdate = parse_body(&req_id.0, body)?;
    if update.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "no updatable fields provided",
        ));
    }
    update
        .validate()
        .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?;

    let lead = state
        .store
        .update_lead(id, &update)
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(req_id.0, lead))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BulkRequest {
    campaign_id: Uuid,
    #[serde(default)]
    job_id: Option<Uuid>,
    platform: Platform,
    leads: Vec<LeadInput>,
}

#[derive(Debug, Serialize)]
pub(super) struct BulkResult {
    inserted: i64,
    unique: i64,
}

pub(super) async fn bulk_insert_leads(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<ApiResponse<BulkResult>>), ApiError> {
    let body: BulkRequest = parse_body(&req_id.0, body)?;
    if body.leads.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "leads must not be empty",
        ));
    }

    let summary = insert_bulk(
        &*state.store,
        &**state.runner.scorer(),
        BulkInsert {
            campaign_id: body.campaign_id,
            job_id: body.job_id,
            platform: body.platform,
            leads: body.leads,
        },
        Utc::now(),
    )
    .await
    .map_err(|e| map_pipeline_error(&req_id.0, &e))?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::new(
            req_id.0,
            BulkResult {
                inserted: summary.inserted,
                unique: summary.unique,
            },
        ),
    ))
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct ExportQuery {
    #[serde(rename = "campaignId")]
    pub campaign_id: Option<Uuid>,
    pub format: Option<String>,
}

pub(super) async fn export_leads(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let Some(campaign_id) = query.campaign_id else {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "campaignId is required",
        ));
    };
    let format: ExportFormat =
        parse_filter(&req_id.0, query.format.as_deref())?.unwrap_or_default();

    let campaign = state
        .store
        .get_campaign(campaign_id)
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;
    let leads = campaign_leads(&*state.store, campaign_id)
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;
    let body = render_leads(format, &leads, &campaign.name).map_err(|e| {
        tracing::error!(error = %e, "lead export serialization failed");
        ApiError::new(req_id.0.clone(), "internal_error", "export failed")
    })?;
    tracing::info!(campaign_id = %campaign_id, leads = leads.len(), "leads exported");

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", format.file_name()),
            ),
        ],
        body,
    )
        .into_response())
}

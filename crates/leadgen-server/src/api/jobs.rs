use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use leadgen_core::{Job, JobType, Platform};
use leadgen_pipeline::{CampaignStore, JobStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    map_pipeline_error, map_store_error, normalize_limit, parse_body, spawn_job_run, ApiError,
    ApiResponse, AppState,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct TriggerRequest {
    job_type: Option<JobType>,
    platforms: Vec<Platform>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TriggeredJob {
    job_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub(super) struct JobListQuery {
    pub limit: Option<i64>,
}

/// Creates a job and runs it in the background. Answers before the run ends.
pub(super) async fn trigger_job(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(campaign_id): Path<Uuid>,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<TriggeredJob>>), ApiError> {
    // The body is optional; an empty one triggers every platform manually.
    let request: TriggerRequest = if body.is_empty() {
        TriggerRequest::default()
    } else {
        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| ApiError::new(req_id.0.clone(), "bad_request", e.to_string()))?;
        parse_body(&req_id.0, value)?
    };
    if !state.runner.has_adapters() {
        return Err(ApiError::new(
            req_id.0,
            "configuration_error",
            "scraping is not configured: FIRECRAWL_API_KEY is missing",
        ));
    }

    let job = state
        .runner
        .trigger(
            campaign_id,
            request.job_type.unwrap_or(JobType::Manual),
            &request.platforms,
        )
        .await
        .map_err(|e| map_pipeline_error(&req_id.0, &e))?;
    spawn_job_run(state.runner.clone(), job.id);

    Ok((
        StatusCode::ACCEPTED,
        ApiResponse::new(req_id.0, TriggeredJob { job_id: job.id }),
    ))
}

pub(super) async fn list_campaign_jobs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(campaign_id): Path<Uuid>,
    Query(query): Query<JobListQuery>,
) -> Result<Json<ApiResponse<Vec<Job>>>, ApiError> {
    state
        .store
        .get_campaign(campaign_id)
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;
    let jobs = state
        .store
        .list_jobs(campaign_id, normalize_limit(query.limit))
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(req_id.0, jobs))
}

pub(super) async fn get_job(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Job>>, ApiError> {
    let job = state
        .store
        .get_job(id)
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(req_id.0, job))
}

/// Cancels a pending or running job. A finished job answers `409`.
pub(super) async fn cancel_job(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Job>>, ApiError> {
    state
        .store
        .cancel_job(id)
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;
    let job = state
        .store
        .get_job(id)
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;
    tracing::info!(job_id = %id, "job cancelled");
    Ok(ApiResponse::new(req_id.0, job))
}

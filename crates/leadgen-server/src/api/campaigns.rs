use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use leadgen_core::{
    Campaign, CampaignStatus, Frequency, JobType, Platform, PlatformConfig, TargetCriteria,
};
use leadgen_pipeline::CampaignStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    map_pipeline_error, map_store_error, normalize_limit, normalize_offset, parse_body,
    parse_filter, spawn_job_run, ApiError, ApiResponse, AppState,
};

const MAX_NAME_LEN: usize = 200;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateCampaignRequest {
    user_id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    platforms: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    negative_keywords: Vec<String>,
    #[serde(default)]
    target_criteria: TargetCriteria,
    frequency: String,
    /// Keyed by platform name.
    #[serde(default)]
    platform_configs: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct QuickScrapeRequest {
    user_id: String,
    search_term: String,
    platforms: Vec<String>,
    /// Sites to crawl when `platforms` includes `website`.
    #[serde(default)]
    website_urls: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreatedCampaign {
    campaign: Campaign,
    initial_job_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ConfigItem {
    id: Uuid,
    platform: Platform,
    config: Value,
    is_active: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CampaignDetail {
    campaign: Campaign,
    platform_configs: Vec<ConfigItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CampaignListQuery {
    pub user_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct StatusUpdate {
    status: CampaignStatus,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validation(req_id: &str, message: impl Into<String>) -> ApiError {
    ApiError::new(req_id, "validation_error", message)
}

fn trimmed_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Turns a create request into a campaign plus its parsed platform configs.
fn build_campaign(
    req_id: &str,
    body: CreateCampaignRequest,
) -> Result<(Campaign, Vec<PlatformConfig>), ApiError> {
    let name = body.name.trim().to_string();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(validation(
            req_id,
            format!("name must be 1-{MAX_NAME_LEN} characters"),
        ));
    }
    let user_id = body.user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(validation(req_id, "userId is required"));
    }
    let frequency: Frequency = body
        .frequency
        .parse()
        .map_err(|e: leadgen_core::CoreError| validation(req_id, e.to_string()))?;

    let mut platforms: Vec<Platform> = Vec::with_capacity(body.platforms.len());
    for raw in &body.platforms {
        let platform: Platform = raw
            .parse()
            .map_err(|e: leadgen_core::CoreError| validation(req_id, e.to_string()))?;
        if !platforms.contains(&platform) {
            platforms.push(platform);
        }
    }

    let mut configs = Vec::with_capacity(body.platform_configs.len());
    for (key, value) in body.platform_configs {
        let platform: Platform = key
            .parse()
            .map_err(|e: leadgen_core::CoreError| validation(req_id, e.to_string()))?;
        if !platforms.contains(&platform) {
            return Err(validation(
                req_id,
                format!("platformConfigs.{key} is not one of the campaign's platforms"),
            ));
        }
        let config = PlatformConfig::from_json(platform, value)
            .map_err(|e| validation(req_id, format!("platformConfigs.{key}: {e}")))?;
        configs.push(config);
    }

    let campaign = Campaign {
        id: Uuid::new_v4(),
        user_id,
        name,
        description: body
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        platforms,
        keywords: trimmed_list(body.keywords),
        negative_keywords: trimmed_list(body.negative_keywords),
        target: body.target_criteria,
        frequency,
        status: CampaignStatus::Active,
        total_leads_found: 0,
        last_run_at: None,
        next_run_at: None,
        created_at: Utc::now(),
    };
    campaign
        .validate()
        .map_err(|e| validation(req_id, e.to_string()))?;
    Ok((campaign, configs))
}

/// Expands a quick scrape into a one-off campaign with default configs.
fn build_quick_campaign(
    req_id: &str,
    body: QuickScrapeRequest,
) -> Result<(Campaign, Vec<PlatformConfig>), ApiError> {
    let search_term = body.search_term.trim();
    if search_term.is_empty() {
        return Err(validation(req_id, "searchTerm is required"));
    }
    if body.platforms.is_empty() {
        return Err(validation(req_id, "at least one platform is required"));
    }

    let website_urls = trimmed_list(body.website_urls);
    let mut platform_configs = Map::new();
    for raw in &body.platforms {
        let platform: Platform = raw
            .parse()
            .map_err(|e: leadgen_core::CoreError| validation(req_id, e.to_string()))?;
        let config = PlatformConfig::quick_scrape(platform, search_term, &website_urls)
            .map_err(|e| validation(req_id, e.to_string()))?;
        platform_configs.insert(platform.as_str().to_string(), config.to_json());
    }

    build_campaign(
        req_id,
        CreateCampaignRequest {
            user_id: body.user_id,
            name: format!("Quick Scrape: {search_term}"),
            description: Some(format!(
                "Quick scrape for \"{search_term}\" on {}",
                body.platforms.join(", ")
            )),
            platforms: body.platforms,
            keywords: vec![search_term.to_string()],
            negative_keywords: vec![],
            target_criteria: TargetCriteria::default(),
            frequency: Frequency::Once.as_str().to_string(),
            platform_configs,
        },
    )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Queues and spawns the single run of a `once` campaign.
///
/// Returns `None` when scraping is disabled or the campaign recurs.
async fn start_initial_job(
    state: &AppState,
    req_id: &str,
    campaign: &Campaign,
) -> Result<Option<Uuid>, ApiError> {
    if campaign.frequency != Frequency::Once {
        return Ok(None);
    }
    if !state.runner.has_adapters() {
        tracing::warn!(campaign_id = %campaign.id, "scraping disabled; one-off campaign not started");
        return Ok(None);
    }
    let job = state
        .runner
        .trigger(campaign.id, JobType::Manual, &[])
        .await
        .map_err(|e| map_pipeline_error(req_id, &e))?;
    spawn_job_run(state.runner.clone(), job.id);
    Ok(Some(job.id))
}

pub(super) async fn create_campaign(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedCampaign>>), ApiError> {
    let body: CreateCampaignRequest = parse_body(&req_id.0, body)?;
    let (campaign, configs) = build_campaign(&req_id.0, body)?;

    let campaign = state
        .store
        .create_campaign(&campaign, &configs)
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;
    tracing::info!(campaign_id = %campaign.id, user_id = %campaign.user_id, "campaign created");

    let initial_job_id = start_initial_job(&state, &req_id.0, &campaign).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::new(
            req_id.0,
            CreatedCampaign {
                campaign,
                initial_job_id,
            },
        ),
    ))
}

pub(super) async fn quick_scrape(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedCampaign>>), ApiError> {
    let body: QuickScrapeRequest = parse_body(&req_id.0, body)?;
    let (campaign, configs) = build_quick_campaign(&req_id.0, body)?;

    let campaign = state
        .store
        .create_campaign(&campaign, &configs)
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;
    tracing::info!(
        campaign_id = %campaign.id,
        user_id = %campaign.user_id,
        platforms = campaign.platforms.len(),
        "quick scrape campaign created"
    );

    let initial_job_id = start_initial_job(&state, &req_id.0, &campaign).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::new(
            req_id.0,
            CreatedCampaign {
                campaign,
                initial_job_id,
            },
        ),
    ))
}

pub(super) async fn list_campaigns(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CampaignListQuery>,
) -> Result<Json<ApiResponse<Vec<Campaign>>>, ApiError> {
    let status: Option<CampaignStatus> = parse_filter(&req_id.0, query.status.as_deref())?;
    let user_id = query
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());

    let campaigns = state
        .store
        .list_campaigns(
            user_id,
            status,
            normalize_limit(query.limit),
            normalize_offset(query.offset),
        )
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;

    Ok(ApiResponse::new(req_id.0, campaigns))
}

pub(super) async fn get_campaign(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CampaignDetail>>, ApiError> {
    let campaign = state
        .store
        .get_campaign(id)
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;
    let platform_configs = state
        .store
        .platform_configs(id)
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?
        .into_iter()
        .map(|c| ConfigItem {
            id: c.id,
            platform: c.platform(),
            config: c.config.to_json(),
            is_active: c.is_active,
        })
        .collect();

    Ok(ApiResponse::new(
        req_id.0,
        CampaignDetail {
            campaign,
            platform_configs,
        },
    ))
}

pub(super) async fn update_campaign_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<Json<ApiResponse<Campaign>>, ApiError> {
    let update: StatusUpdate = parse_body(&req_id.0, body)?;
    let campaign = state
        .store
        .set_campaign_status(id, update.status)
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;
    tracing::info!(campaign_id = %id, status = %campaign.status, "campaign status updated");
    Ok(ApiResponse::new(req_id.0, campaign))
}

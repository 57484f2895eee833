use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{Duration, Utc};
use leadgen_core::{LeadAnalytics, ANALYTICS_WINDOW_DAYS};
use leadgen_pipeline::LeadStore;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_store_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AnalyticsQuery {
    pub user_id: Option<String>,
}

/// Lead totals, conversion rate, the last 30 days of new leads and the
/// platform split for one user.
pub(super) async fn get_analytics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<ApiResponse<LeadAnalytics>>, ApiError> {
    let Some(user_id) = query
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
    else {
        return Err(ApiError::new(req_id.0, "validation_error", "userId is required"));
    };

    let since = Utc::now() - Duration::days(ANALYTICS_WINDOW_DAYS);
    let analytics = state
        .store
        .lead_analytics(user_id, since)
        .await
        .map_err(|e| map_store_error(&req_id.0, &e))?;

    Ok(ApiResponse::new(req_id.0, analytics))
}

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Extension, Query, State};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::api_keys::ApiPrincipal;
use crate::cache::CacheStats;
use crate::infra::http::api::error::ApiError;

use super::{AdminState, require_admin};

#[derive(Debug, Deserialize)]
pub(super) struct ClearQuery {
    pub pattern: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct ClearResponse {
    message: String,
    pattern: String,
    cleared: u64,
}

pub(super) async fn cache_stats(
    State(state): State<AdminState>,
    Extension(principal): Extension<ApiPrincipal>,
) -> Result<Json<CacheStats>, ApiError> {
    require_admin(&principal)?;
    Ok(Json(state.cache.stats().await))
}

pub(super) async fn clear_cache(
    State(state): State<AdminState>,
    Extension(principal): Extension<ApiPrincipal>,
    query: Result<Query<ClearQuery>, QueryRejection>,
) -> Result<Json<ClearResponse>, ApiError> {
    require_admin(&principal)?;
    let Query(query) = query?;

    let pattern = query
        .pattern
        .map(|pattern| pattern.trim().to_string())
        .filter(|pattern| !pattern.is_empty())
        .unwrap_or_else(|| "*".to_string());
    let cleared = state.cache.flush(&pattern).await;

    info!(
        target = "scorecast::admin::cache",
        api_key = %principal.name,
        pattern = %pattern,
        cleared,
        "cache entries cleared"
    );

    Ok(Json(ClearResponse {
        message: format!("Cleared {cleared} cache entries"),
        pattern,
        cleared,
    }))
}

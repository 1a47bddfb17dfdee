mod cache;
mod health;
mod metrics;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get},
};

use metrics_exporter_prometheus::PrometheusHandle;

use crate::application::api_keys::ApiPrincipal;
use crate::cache::PredictionCache;
use crate::domain::api_keys::ApiScope;

use super::api::error::ApiError;
use super::api::middleware::{api_auth, api_rate_limit};
use super::api::ApiGuard;
use super::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct AdminState {
    pub cache: Arc<PredictionCache>,
    pub model_kind: &'static str,
    pub cluster_model: bool,
    pub metrics: PrometheusHandle,
}

pub fn build_admin_router(state: AdminState, guard: ApiGuard) -> Router {
    Router::new()
        .route("/health", get(health::admin_health))
        .route("/cache/stats", get(cache::cache_stats))
        .route("/cache/clear", delete(cache::clear_cache))
        .route("/metrics", get(metrics::render_metrics))
        .route_layer(middleware::from_fn_with_state(guard.clone(), api_rate_limit))
        .route_layer(middleware::from_fn_with_state(guard, api_auth))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

fn require_admin(principal: &ApiPrincipal) -> Result<(), ApiError> {
    principal
        .requires(ApiScope::Admin)
        .map_err(|_| ApiError::forbidden())
}

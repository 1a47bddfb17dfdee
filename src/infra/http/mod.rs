mod admin;
pub mod api;
mod middleware;

pub use admin::{AdminState, build_admin_router};
pub use api::rate_limit::ApiRateLimiter;
pub use api::{ApiGuard, ApiState, build_api_router};
pub use middleware::{REQUEST_ID_HEADER, RequestContext, with_cors};

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::warn;

use crate::cache::{CacheHealth, PredictionCache};

pub const SERVICE_NAME: &str = "scorecast";

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub cache: &'static str,
    pub model: &'static str,
    pub cluster_model: bool,
}

/// Liveness report shared by both listeners. A lost cache degrades the
/// service without failing it, so the status code stays 200.
async fn health_response(
    cache: &PredictionCache,
    model: &'static str,
    cluster_model: bool,
) -> Response {
    let cache_health = cache.health().await;
    let status = match cache_health {
        CacheHealth::Unavailable => {
            warn!(
                target = "scorecast::http::health",
                backend = cache.backend(),
                "cache unreachable; serving without it"
            );
            "degraded"
        }
        CacheHealth::Connected | CacheHealth::Disabled => "healthy",
    };

    Json(HealthBody {
        status,
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        cache: cache_health.as_str(),
        model,
        cluster_model,
    })
    .into_response()
}

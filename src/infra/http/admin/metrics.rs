use axum::extract::{Extension, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};

use crate::application::api_keys::ApiPrincipal;
use crate::infra::http::api::error::ApiError;

use super::{AdminState, require_admin};

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Prometheus text exposition of every `scorecast_*` series.
pub(super) async fn render_metrics(
    State(state): State<AdminState>,
    Extension(principal): Extension<ApiPrincipal>,
) -> Result<Response, ApiError> {
    require_admin(&principal)?;
    Ok(([(CONTENT_TYPE, PROMETHEUS_TEXT)], state.metrics.render()).into_response())
}

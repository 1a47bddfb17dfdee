use axum::extract::{Extension, State};
use axum::response::Response;

use crate::application::api_keys::ApiPrincipal;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::health_response;

use super::{AdminState, require_admin};

pub(super) async fn admin_health(
    State(state): State<AdminState>,
    Extension(principal): Extension<ApiPrincipal>,
) -> Result<Response, ApiError> {
    require_admin(&principal)?;
    Ok(health_response(&state.cache, state.model_kind, state.cluster_model).await)
}

use std::time::Instant;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};

use crate::application::api_keys::{ApiPrincipal, Credential};
use crate::application::model::{ClusterModel, Persona};
use crate::application::orchestrator::BatchOrchestrator;
use crate::domain::api_keys::ApiScope;
use crate::domain::features::FeatureVector;
use crate::infra::http::{SERVICE_NAME, health_response};

use super::error::ApiError;
use super::models::*;
use crate::application::tokens::TokenIssuer;

use super::state::ApiState;

const PUBLIC_ENDPOINTS: [&str; 7] = [
    "GET /",
    "GET /health",
    "POST /predict",
    "POST /predict/batch",
    "POST /cluster",
    "POST /cluster/batch",
    "GET /personas",
];

pub async fn root(State(state): State<ApiState>) -> impl IntoResponse {
    Json(ServiceInfo {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        model: state.model_kind(),
        cluster_model: state.clusters.is_some(),
        endpoints: PUBLIC_ENDPOINTS.to_vec(),
    })
}

pub async fn health(State(state): State<ApiState>) -> Response {
    health_response(&state.cache, state.model_kind(), state.clusters.is_some()).await
}

pub async fn predict(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    payload: Result<Json<FeatureVector>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    require_predict(&principal)?;
    let Json(features) = payload?;

    let prediction = state.scores.predict_one(&features).await?;
    Ok(Json(PredictResponse {
        predicted_score: prediction.value,
        cached: prediction.cached,
    }))
}

pub async fn predict_batch(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchPredictResponse>, ApiError> {
    require_predict(&principal)?;
    let Json(request) = payload?;

    let started = Instant::now();
    let outcome = state.scores.predict_batch(&request.students).await?;
    Ok(Json(BatchPredictResponse::new(
        outcome,
        elapsed_ms(started),
    )))
}

pub async fn cluster(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    payload: Result<Json<FeatureVector>, JsonRejection>,
) -> Result<Json<ClusterResponse>, ApiError> {
    require_predict(&principal)?;
    let clusters = cluster_orchestrator(&state)?;
    let Json(features) = payload?;

    let prediction = clusters.predict_one(&features).await?;
    Ok(Json(ClusterResponse {
        cluster_label: prediction.value.cluster_label,
        persona_name: prediction.value.persona_name,
        confidence: prediction.value.confidence,
        cached: prediction.cached,
    }))
}

pub async fn cluster_batch(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchClusterResponse>, ApiError> {
    require_predict(&principal)?;
    let clusters = cluster_orchestrator(&state)?;
    let Json(request) = payload?;

    let started = Instant::now();
    let outcome = clusters.predict_batch(&request.students).await?;
    let available_personas = clusters
        .predictor()
        .personas()
        .into_iter()
        .map(|persona: Persona| persona.persona_name)
        .collect();

    Ok(Json(BatchClusterResponse {
        total_processed: outcome.len(),
        cache_hits: outcome.cache_hits,
        predictions: outcome.items.into_iter().map(ClusterItem::from).collect(),
        processing_time_ms: elapsed_ms(started),
        available_personas,
    }))
}

pub async fn personas(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
) -> Result<Json<PersonasResponse>, ApiError> {
    require_predict(&principal)?;
    let clusters = cluster_orchestrator(&state)?;
    Ok(Json(PersonasResponse::new(clusters.predictor().personas())))
}

/// Exchange an API key for a short-lived bearer token carrying its scopes.
pub async fn issue_token(
    State(tokens): State<TokenIssuer>,
    Extension(principal): Extension<ApiPrincipal>,
) -> Result<Json<TokenResponse>, ApiError> {
    if principal.credential != Credential::ApiKey {
        return Err(ApiError::token_exchange_forbidden());
    }

    let issued = tokens.issue(&principal)?;
    Ok(Json(TokenResponse {
        access_token: issued.access_token,
        token_type: "bearer",
        expires_in: issued.expires_in,
    }))
}

fn require_predict(principal: &ApiPrincipal) -> Result<(), ApiError> {
    principal
        .requires(ApiScope::Predict)
        .map_err(|_| ApiError::forbidden())
}

fn cluster_orchestrator(state: &ApiState) -> Result<&BatchOrchestrator<ClusterModel>, ApiError> {
    state.clusters.as_ref().ok_or_else(ApiError::model_unavailable)
}

fn elapsed_ms(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0
}

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod state;

pub use state::{ApiGuard, ApiState};

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::middleware::{log_responses, set_request_context};

pub fn build_api_router(state: ApiState, guard: ApiGuard) -> Router {
    // route_layer: the last layer added runs first, so auth precedes the limiter
    let mut protected = Router::new()
        .route("/predict", post(handlers::predict))
        .route("/predict/batch", post(handlers::predict_batch))
        .route("/cluster", post(handlers::cluster))
        .route("/cluster/batch", post(handlers::cluster_batch))
        .route("/personas", get(handlers::personas))
        .route_layer(axum_middleware::from_fn_with_state(
            guard.clone(),
            middleware::api_rate_limit,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            guard.clone(),
            middleware::api_auth,
        ));

    if let Some(tokens) = guard.tokens.clone() {
        let exchange = Router::new()
            .route("/auth/token", post(handlers::issue_token))
            .route_layer(axum_middleware::from_fn_with_state(
                guard.clone(),
                middleware::api_rate_limit,
            ))
            .route_layer(axum_middleware::from_fn_with_state(
                guard.clone(),
                middleware::api_auth,
            ))
            .with_state(tokens);
        protected = protected.merge(exchange);
    }

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(protected)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

use std::sync::Arc;

use crate::application::api_keys::ApiKeyRegistry;
use crate::application::model::{ClusterModel, ScoreModel};
use crate::application::tokens::TokenIssuer;
use crate::application::orchestrator::BatchOrchestrator;
use crate::cache::PredictionCache;

use super::rate_limit::ApiRateLimiter;

/// Authentication and throttling shared by the public and admin listeners.
#[derive(Clone)]
pub struct ApiGuard {
    pub api_keys: ApiKeyRegistry,
    pub rate_limiter: Arc<ApiRateLimiter>,
    /// Present when token exchange is configured.
    pub tokens: Option<TokenIssuer>,
}

#[derive(Clone)]
pub struct ApiState {
    pub scores: BatchOrchestrator<ScoreModel>,
    pub clusters: Option<BatchOrchestrator<ClusterModel>>,
    pub cache: Arc<PredictionCache>,
}

impl ApiState {
    pub fn model_kind(&self) -> &'static str {
        self.scores.predictor().kind()
    }
}

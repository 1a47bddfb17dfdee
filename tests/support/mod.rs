//! Shared fixture: baseline models, an in-process cache and two API keys.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, Response};
use scorecast::application::api_keys::{ApiKeyRegistry, hash_secret};
use scorecast::application::model::baseline::{self, BaselineKind};
use scorecast::application::model::{ClusterModel, ScoreModel};
use scorecast::application::orchestrator::{BatchLimits, BatchOrchestrator};
use scorecast::application::tokens::TokenIssuer;
use scorecast::cache::{CacheBackend, CacheConfig, PredictionCache};
use scorecast::config::CorsSettings;
use scorecast::domain::api_keys::{ApiKeyRecord, ApiScope};
use scorecast::infra::http::{
    AdminState, ApiGuard, ApiRateLimiter, ApiState, build_admin_router, build_api_router,
    with_cors,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde_json::Value;

pub const PREDICT_KEY: &str = "predict-secret";
pub const ADMIN_KEY: &str = "admin-secret";

pub struct Harness {
    pub api: Router,
    pub admin: Router,
    pub cache: Arc<PredictionCache>,
}

pub struct HarnessOptions {
    pub with_clusters: bool,
    pub rate_limit: u32,
    pub limits: BatchLimits,
    pub cache: CacheConfig,
    /// Detached recorder unless a test installs the global one.
    pub metrics: Option<PrometheusHandle>,
    pub tokens: Option<TokenIssuer>,
    pub cors: Option<CorsSettings>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            with_clusters: true,
            rate_limit: 1_000,
            limits: BatchLimits::default(),
            cache: memory_cache_config(),
            metrics: None,
            tokens: None,
            cors: None,
        }
    }
}

pub fn memory_cache_config() -> CacheConfig {
    CacheConfig {
        backend: CacheBackend::Memory,
        ..CacheConfig::default()
    }
}

pub fn api_keys() -> ApiKeyRegistry {
    ApiKeyRegistry::new(vec![
        ApiKeyRecord {
            name: "frontend".into(),
            hashed_secret: hash_secret(PREDICT_KEY),
            scopes: vec![ApiScope::Predict],
        },
        ApiKeyRecord {
            name: "ops".into(),
            hashed_secret: hash_secret(ADMIN_KEY),
            scopes: vec![ApiScope::Predict, ApiScope::Admin],
        },
    ])
}

pub fn harness() -> Harness {
    harness_with(HarnessOptions::default())
}

pub fn harness_with(options: HarnessOptions) -> Harness {
    let cache = Arc::new(PredictionCache::from_config(options.cache).expect("cache builds"));
    let score_model = ScoreModel::from_artifact(&baseline::score_artifact(BaselineKind::Linear))
        .expect("baseline score model");
    let scores = BatchOrchestrator::new(Arc::new(score_model), cache.clone(), options.limits);
    let clusters = options.with_clusters.then(|| {
        let model = ClusterModel::from_artifact(&baseline::cluster_artifact())
            .expect("baseline cluster model");
        BatchOrchestrator::new(Arc::new(model), cache.clone(), options.limits)
    });

    let guard = ApiGuard {
        api_keys: api_keys(),
        rate_limiter: Arc::new(ApiRateLimiter::new(
            Duration::from_secs(60),
            options.rate_limit,
        )),
        tokens: options.tokens,
    };

    let admin = build_admin_router(
        AdminState {
            cache: cache.clone(),
            model_kind: scores.predictor().kind(),
            cluster_model: clusters.is_some(),
            metrics: options
                .metrics
                .unwrap_or_else(|| PrometheusBuilder::new().build_recorder().handle()),
        },
        guard.clone(),
    );
    let mut api = build_api_router(
        ApiState {
            scores,
            clusters,
            cache: cache.clone(),
        },
        guard,
    );
    if let Some(cors) = options.cors.as_ref() {
        api = with_cors(api, cors);
    }

    Harness { api, admin, cache }
}

pub fn request(method: Method, uri: &str, key: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header("authorization", format!("Bearer {key}"));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn reference_student() -> Value {
    serde_json::json!({
        "comprehension": 75.5,
        "attention": 82.0,
        "focus": 78.3,
        "retention": 80.1,
        "engagement_time": 120.0
    })
}

pub fn student(seed: u32) -> Value {
    let base = f64::from(seed % 90);
    serde_json::json!({
        "comprehension": base + 1.0,
        "attention": base + 2.5,
        "focus": base + 3.0,
        "retention": base + 4.25,
        "engagement_time": f64::from(seed % 280) + 10.0
    })
}

use serde::{Deserialize, Serialize};

use crate::application::model::{ClusterAssignment, Confidence, Persona};
use crate::application::orchestrator::{BatchItem, BatchOutcome};
use crate::domain::features::FeatureVector;

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BatchRequest {
    pub students: Vec<FeatureVector>,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub model: &'static str,
    pub cluster_model: bool,
    pub endpoints: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predicted_score: f64,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct ScoreItem {
    pub index: usize,
    pub predicted_score: f64,
    pub cached: bool,
}

impl From<BatchItem<f64>> for ScoreItem {
    fn from(item: BatchItem<f64>) -> Self {
        Self {
            index: item.index,
            predicted_score: item.value,
            cached: item.cached,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchPredictResponse {
    pub predictions: Vec<ScoreItem>,
    pub total_processed: usize,
    pub cache_hits: usize,
    pub processing_time_ms: f64,
}

impl BatchPredictResponse {
    pub fn new(outcome: BatchOutcome<f64>, processing_time_ms: f64) -> Self {
        Self {
            total_processed: outcome.len(),
            cache_hits: outcome.cache_hits,
            predictions: outcome.items.into_iter().map(ScoreItem::from).collect(),
            processing_time_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClusterResponse {
    pub cluster_label: usize,
    pub persona_name: String,
    pub confidence: Confidence,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct ClusterItem {
    pub index: usize,
    pub cluster_label: usize,
    pub persona_name: String,
    pub confidence: Confidence,
    pub cached: bool,
}

impl From<BatchItem<ClusterAssignment>> for ClusterItem {
    fn from(item: BatchItem<ClusterAssignment>) -> Self {
        Self {
            index: item.index,
            cluster_label: item.value.cluster_label,
            persona_name: item.value.persona_name,
            confidence: item.value.confidence,
            cached: item.cached,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchClusterResponse {
    pub predictions: Vec<ClusterItem>,
    pub total_processed: usize,
    pub cache_hits: usize,
    pub processing_time_ms: f64,
    pub available_personas: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PersonasResponse {
    pub personas: Vec<String>,
    pub cluster_mapping: Vec<Persona>,
    pub total_clusters: usize,
}

impl PersonasResponse {
    pub fn new(cluster_mapping: Vec<Persona>) -> Self {
        Self {
            personas: cluster_mapping
                .iter()
                .map(|persona| persona.persona_name.clone())
                .collect(),
            total_clusters: cluster_mapping.len(),
            cluster_mapping,
        }
    }
}

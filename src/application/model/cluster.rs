use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::Namespace;
use crate::domain::features::{FEATURE_COUNT, FeatureVector};

use super::{
    ClusterModelArtifact, ModelLoadError, PredictError, Predictor, Scaler, fixed_arity,
    read_artifact,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub cluster_label: usize,
    pub persona_name: String,
    pub confidence: Confidence,
}

/// How clearly the nearest centroid beats the runner-up.
///
/// Graded on the ratio of the squared distances to the two closest
/// centroids: below 0.5 is `high`, below 0.8 is `medium`, anything closer
/// (including ties) is `low`. A single-centroid model is always `high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    const HIGH_BELOW: f64 = 0.5;
    const MEDIUM_BELOW: f64 = 0.8;

    fn from_distances(nearest: f64, runner_up: f64) -> Self {
        if runner_up.is_infinite() {
            return Self::High;
        }
        if runner_up == 0.0 {
            return Self::Low;
        }
        let ratio = nearest / runner_up;
        if ratio < Self::HIGH_BELOW {
            Self::High
        } else if ratio < Self::MEDIUM_BELOW {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Persona {
    pub cluster_label: usize,
    pub persona_name: String,
}

/// Nearest-centroid assignment of students to named personas.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterModel {
    scaler: Scaler,
    centroids: Vec<[f64; FEATURE_COUNT]>,
    personas: Vec<String>,
}

impl ClusterModel {
    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let artifact: ClusterModelArtifact = read_artifact(path)?;
        Self::from_artifact(&artifact)
    }

    pub fn from_artifact(artifact: &ClusterModelArtifact) -> Result<Self, ModelLoadError> {
        let scaler = Scaler::from_artifact(&artifact.scaler)?;
        if artifact.centroids.is_empty() {
            return Err(ModelLoadError::invalid("cluster model has no centroids"));
        }
        if artifact.personas.len() != artifact.centroids.len() {
            return Err(ModelLoadError::invalid(format!(
                "{} personas for {} centroids",
                artifact.personas.len(),
                artifact.centroids.len()
            )));
        }
        if let Some(label) = artifact
            .personas
            .iter()
            .position(|name| name.trim().is_empty())
        {
            return Err(ModelLoadError::invalid(format!(
                "persona for cluster {label} has an empty name"
            )));
        }

        let centroids = artifact
            .centroids
            .iter()
            .enumerate()
            .map(|(label, centroid)| fixed_arity(&format!("centroids[{label}]"), centroid))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            scaler,
            centroids,
            personas: artifact.personas.clone(),
        })
    }

    pub fn personas(&self) -> Vec<Persona> {
        self.personas
            .iter()
            .enumerate()
            .map(|(cluster_label, name)| Persona {
                cluster_label,
                persona_name: name.clone(),
            })
            .collect()
    }

    /// Returns the nearest label with its squared distance and the
    /// runner-up distance. Lowest label wins ties.
    fn nearest(&self, scaled: &[f64; FEATURE_COUNT]) -> (usize, f64, f64) {
        let mut best = (0, f64::INFINITY);
        let mut runner_up = f64::INFINITY;
        for (label, centroid) in self.centroids.iter().enumerate() {
            let distance: f64 = centroid
                .iter()
                .zip(scaled)
                .map(|(c, x)| (c - x) * (c - x))
                .sum();
            if distance < best.1 {
                runner_up = best.1;
                best = (label, distance);
            } else if distance < runner_up {
                runner_up = distance;
            }
        }
        (best.0, best.1, runner_up)
    }
}

impl Predictor for ClusterModel {
    type Output = ClusterAssignment;

    const NAMESPACE: Namespace = Namespace::Cluster;
    const NAME: &'static str = "cluster";

    fn predict_many(
        &self,
        items: &[FeatureVector],
    ) -> Result<Vec<ClusterAssignment>, PredictError> {
        items
            .iter()
            .enumerate()
            .map(|(index, features)| {
                let scaled = self.scaler.transform(features.as_array());
                let (label, distance, runner_up) = self.nearest(&scaled);
                if !distance.is_finite() {
                    return Err(PredictError::NonFinite {
                        index,
                        value: distance,
                    });
                }
                Ok(ClusterAssignment {
                    cluster_label: label,
                    persona_name: self.personas[label].clone(),
                    confidence: Confidence::from_distances(distance, runner_up),
                })
            })
            .collect()
    }
}

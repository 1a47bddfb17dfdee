//! Loaded models and the `Predictor` seam used by the batch orchestrator.

mod artifact;
pub mod baseline;
mod cluster;
mod score;

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::cache::Namespace;
use crate::domain::features::{FEATURE_COUNT, FeatureVector};

pub use artifact::{
    ClipArtifact, ClusterModelArtifact, NodeArtifact, RegressorArtifact, ScalerArtifact,
    ScoreModelArtifact, TreeArtifact,
};
pub use cluster::{ClusterAssignment, ClusterModel, Confidence, Persona};
pub use score::ScoreModel;

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to read model artifact `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model artifact `{path}` is not valid JSON")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid model artifact: {reason}")]
    Invalid { reason: String },
}

impl ModelLoadError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PredictError {
    #[error("model produced a non-finite value {value} for item {index}")]
    NonFinite { index: usize, value: f64 },
    #[error("model returned {actual} outputs for {expected} inputs")]
    OutputCount { expected: usize, actual: usize },
}

/// Maps feature vectors to model outputs.
///
/// Implementations are immutable after load and shared across requests.
pub trait Predictor: Send + Sync {
    type Output: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Cache partition holding this predictor's results.
    const NAMESPACE: Namespace;

    /// Label used in metrics and logs.
    const NAME: &'static str;

    fn predict_many(&self, items: &[FeatureVector]) -> Result<Vec<Self::Output>, PredictError>;

    fn predict(&self, features: &FeatureVector) -> Result<Self::Output, PredictError> {
        let mut outputs = self.predict_many(std::slice::from_ref(features))?;
        match outputs.pop() {
            Some(output) if outputs.is_empty() => Ok(output),
            _ => Err(PredictError::OutputCount {
                expected: 1,
                actual: outputs.len() + 1,
            }),
        }
    }
}

/// Standardisation applied before a model sees the features.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    mean: [f64; FEATURE_COUNT],
    scale: [f64; FEATURE_COUNT],
}

impl Scaler {
    pub(crate) fn from_artifact(artifact: &ScalerArtifact) -> Result<Self, ModelLoadError> {
        let mean = fixed_arity("scaler.mean", &artifact.mean)?;
        let scale = fixed_arity("scaler.scale", &artifact.scale)?;
        if let Some(position) = scale.iter().position(|value| *value == 0.0) {
            return Err(ModelLoadError::invalid(format!(
                "scaler.scale[{position}] must be non-zero"
            )));
        }
        Ok(Self { mean, scale })
    }

    pub fn transform(&self, raw: [f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut scaled = [0.0; FEATURE_COUNT];
        for (index, value) in raw.into_iter().enumerate() {
            scaled[index] = (value - self.mean[index]) / self.scale[index];
        }
        scaled
    }
}

pub(crate) fn fixed_arity(
    field: &str,
    values: &[f64],
) -> Result<[f64; FEATURE_COUNT], ModelLoadError> {
    let array: [f64; FEATURE_COUNT] = values.try_into().map_err(|_| {
        ModelLoadError::invalid(format!(
            "{field} must have {FEATURE_COUNT} entries, found {}",
            values.len()
        ))
    })?;
    ensure_finite(field, &array)?;
    Ok(array)
}

pub(crate) fn ensure_finite(field: &str, values: &[f64]) -> Result<(), ModelLoadError> {
    match values.iter().position(|value| !value.is_finite()) {
        Some(position) => Err(ModelLoadError::invalid(format!(
            "{field}[{position}] must be finite"
        ))),
        None => Ok(()),
    }
}

pub(crate) fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, ModelLoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ModelLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaler_standardises_each_feature() {
        let scaler = Scaler::from_artifact(&ScalerArtifact {
            mean: vec![50.0, 50.0, 50.0, 50.0, 150.0],
            scale: vec![10.0, 10.0, 10.0, 10.0, 50.0],
        })
        .expect("valid scaler");

        assert_eq!(
            scaler.transform([60.0, 40.0, 50.0, 70.0, 100.0]),
            [1.0, -1.0, 0.0, 2.0, -1.0]
        );
    }

    #[test]
    fn scaler_rejects_zero_scale() {
        let err = Scaler::from_artifact(&ScalerArtifact {
            mean: vec![0.0; 5],
            scale: vec![1.0, 1.0, 0.0, 1.0, 1.0],
        })
        .expect_err("zero scale");
        assert_eq!(err.to_string(), "invalid model artifact: scaler.scale[2] must be non-zero");
    }

    #[test]
    fn scaler_rejects_wrong_arity() {
        let err = Scaler::from_artifact(&ScalerArtifact {
            mean: vec![0.0; 4],
            scale: vec![1.0; 5],
        })
        .expect_err("short mean");
        assert!(err.to_string().contains("scaler.mean must have 5 entries, found 4"));
    }

    #[test]
    fn missing_artifact_reports_path() {
        let err = read_artifact::<ScoreModelArtifact>(Path::new("/nonexistent/model.json"))
            .expect_err("missing file");
        assert!(matches!(err, ModelLoadError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/model.json"));
    }
}

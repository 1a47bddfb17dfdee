use std::path::Path;

use crate::cache::Namespace;
use crate::domain::features::{FEATURE_COUNT, FeatureVector};

use super::{
    ModelLoadError, PredictError, Predictor, RegressorArtifact, Scaler, ScoreModelArtifact,
    TreeArtifact, artifact::NodeArtifact, ensure_finite, fixed_arity, read_artifact,
};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_artifact(position: usize, artifact: &TreeArtifact) -> Result<Self, ModelLoadError> {
        let count = artifact.nodes.len();
        if count == 0 {
            return Err(ModelLoadError::invalid(format!(
                "trees[{position}] has no nodes"
            )));
        }

        let mut nodes = Vec::with_capacity(count);
        for (index, node) in artifact.nodes.iter().enumerate() {
            let at = format!("trees[{position}].nodes[{index}]");
            let node = match *node {
                NodeArtifact::Leaf { leaf } => {
                    ensure_finite(&at, &[leaf])?;
                    Node::Leaf(leaf)
                }
                NodeArtifact::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= FEATURE_COUNT {
                        return Err(ModelLoadError::invalid(format!(
                            "{at} splits on feature {feature}; only {FEATURE_COUNT} exist"
                        )));
                    }
                    ensure_finite(&at, &[threshold])?;
                    // children must point forward so evaluation always terminates
                    for child in [left, right] {
                        if child <= index || child >= count {
                            return Err(ModelLoadError::invalid(format!(
                                "{at} has child {child} outside {}..{count}",
                                index + 1
                            )));
                        }
                    }
                    Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    }
                }
            };
            nodes.push(node);
        }

        Ok(Self { nodes })
    }

    fn evaluate(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let mut current = 0;
        loop {
            match self.nodes[current] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    current = if x[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Regressor {
    Linear {
        coefficients: [f64; FEATURE_COUNT],
        intercept: f64,
    },
    Forest(Vec<Tree>),
}

impl Regressor {
    fn from_artifact(artifact: &RegressorArtifact) -> Result<Self, ModelLoadError> {
        match artifact {
            RegressorArtifact::Linear {
                coefficients,
                intercept,
            } => {
                let coefficients = fixed_arity("coefficients", coefficients)?;
                ensure_finite("intercept", &[*intercept])?;
                Ok(Self::Linear {
                    coefficients,
                    intercept: *intercept,
                })
            }
            RegressorArtifact::Forest { trees } => {
                if trees.is_empty() {
                    return Err(ModelLoadError::invalid("forest has no trees"));
                }
                let trees = trees
                    .iter()
                    .enumerate()
                    .map(|(position, tree)| Tree::from_artifact(position, tree))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Forest(trees))
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Linear { .. } => "linear",
            Self::Forest(_) => "forest",
        }
    }

    fn evaluate(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        match self {
            Self::Linear {
                coefficients,
                intercept,
            } => {
                intercept
                    + coefficients
                        .iter()
                        .zip(x)
                        .map(|(weight, value)| weight * value)
                        .sum::<f64>()
            }
            Self::Forest(trees) => {
                trees.iter().map(|tree| tree.evaluate(x)).sum::<f64>() / trees.len() as f64
            }
        }
    }
}

/// Regression model producing an assignment score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreModel {
    scaler: Scaler,
    regressor: Regressor,
    clip: Option<(f64, f64)>,
}

impl ScoreModel {
    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let artifact: ScoreModelArtifact = read_artifact(path)?;
        Self::from_artifact(&artifact)
    }

    pub fn from_json(raw: &str) -> Result<Self, ModelLoadError> {
        let artifact: ScoreModelArtifact = serde_json::from_str(raw).map_err(|source| {
            ModelLoadError::invalid(format!("artifact is not valid JSON: {source}"))
        })?;
        Self::from_artifact(&artifact)
    }

    pub fn from_artifact(artifact: &ScoreModelArtifact) -> Result<Self, ModelLoadError> {
        let scaler = Scaler::from_artifact(&artifact.scaler)?;
        let regressor = Regressor::from_artifact(&artifact.regressor)?;
        let clip = match &artifact.clip {
            Some(clip) => {
                ensure_finite("clip", &[clip.min, clip.max])?;
                if clip.min > clip.max {
                    return Err(ModelLoadError::invalid(format!(
                        "clip.min {} exceeds clip.max {}",
                        clip.min, clip.max
                    )));
                }
                Some((clip.min, clip.max))
            }
            None => None,
        };

        Ok(Self {
            scaler,
            regressor,
            clip,
        })
    }

    /// `linear` or `forest`.
    pub fn kind(&self) -> &'static str {
        self.regressor.kind()
    }

    fn score(&self, features: &FeatureVector) -> f64 {
        let scaled = self.scaler.transform(features.as_array());
        let raw = self.regressor.evaluate(&scaled);
        match self.clip {
            Some((min, max)) if raw.is_finite() => raw.clamp(min, max),
            _ => raw,
        }
    }
}

impl Predictor for ScoreModel {
    type Output = f64;

    const NAMESPACE: Namespace = Namespace::Score;
    const NAME: &'static str = "score";

    fn predict_many(&self, items: &[FeatureVector]) -> Result<Vec<f64>, PredictError> {
        items
            .iter()
            .enumerate()
            .map(|(index, features)| {
                let value = self.score(features);
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(PredictError::NonFinite { index, value })
                }
            })
            .collect()
    }
}

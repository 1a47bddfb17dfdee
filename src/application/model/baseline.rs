//! Baseline artifacts for development deployments that ship without trained
//! models. The parameters are hand-picked so that scores rise with every
//! feature and stay inside 0..=100.

use crate::domain::features::FeatureVector;

use super::{
    ClipArtifact, ClusterModelArtifact, NodeArtifact, RegressorArtifact, ScalerArtifact,
    ScoreModelArtifact, TreeArtifact,
};

/// Student used by `check-model` and the smoke tests.
pub const REFERENCE_FEATURES: FeatureVector = FeatureVector {
    comprehension: 75.5,
    attention: 82.0,
    focus: 78.3,
    retention: 80.1,
    engagement_time: 120.0,
};

pub const PERSONAS: [&str; 4] = [
    "Consistent Learner",
    "Highly Engaged High Performer",
    "Low Engagement Risk",
    "Developing Performer",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineKind {
    Linear,
    Forest,
}

fn scaler() -> ScalerArtifact {
    // mean and standard deviation of a uniform draw over each feature's range
    ScalerArtifact {
        mean: vec![50.0, 50.0, 50.0, 50.0, 150.0],
        scale: vec![28.8675, 28.8675, 28.8675, 28.8675, 86.6025],
    }
}

pub fn score_artifact(kind: BaselineKind) -> ScoreModelArtifact {
    let regressor = match kind {
        BaselineKind::Linear => RegressorArtifact::Linear {
            coefficients: vec![7.0, 5.0, 4.5, 6.0, 2.5],
            intercept: 62.0,
        },
        BaselineKind::Forest => RegressorArtifact::Forest {
            trees: (0..4).map(stump_tree).collect(),
        },
    };

    ScoreModelArtifact {
        scaler: scaler(),
        regressor,
        clip: Some(ClipArtifact {
            min: 0.0,
            max: 100.0,
        }),
    }
}

/// Two-level tree splitting on `feature` then on engagement time.
fn stump_tree(feature: usize) -> TreeArtifact {
    TreeArtifact {
        nodes: vec![
            NodeArtifact::Split {
                feature,
                threshold: 0.0,
                left: 1,
                right: 2,
            },
            NodeArtifact::Split {
                feature: 4,
                threshold: 0.0,
                left: 3,
                right: 4,
            },
            NodeArtifact::Split {
                feature: 4,
                threshold: 0.0,
                left: 5,
                right: 6,
            },
            NodeArtifact::Leaf { leaf: 48.0 },
            NodeArtifact::Leaf { leaf: 58.0 },
            NodeArtifact::Leaf { leaf: 72.0 },
            NodeArtifact::Leaf { leaf: 86.0 },
        ],
    }
}

pub fn cluster_artifact() -> ClusterModelArtifact {
    ClusterModelArtifact {
        scaler: scaler(),
        centroids: vec![
            vec![0.3, 0.3, 0.3, 0.3, 0.0],
            vec![1.2, 1.2, 1.2, 1.2, 1.2],
            vec![-1.0, -1.2, -1.2, -1.0, -1.2],
            vec![-0.4, 0.0, -0.2, -0.4, 0.3],
        ],
        personas: PERSONAS.iter().map(|name| name.to_string()).collect(),
    }
}

//! Student feature vectors and their boundary validation.

use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Number of features every model consumes.
pub const FEATURE_COUNT: usize = 5;

/// Feature names in canonical order. Models, cache keys and artifacts all
/// index features by this order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "comprehension",
    "attention",
    "focus",
    "retention",
    "engagement_time",
];

const SCORE_RANGE: (f64, f64) = (0.0, 100.0);
const ENGAGEMENT_RANGE: (f64, f64) = (0.0, 300.0);

/// Measured attributes of one student.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureVector {
    pub comprehension: f64,
    pub attention: f64,
    pub focus: f64,
    pub retention: f64,
    /// Engagement time in minutes.
    pub engagement_time: f64,
}

impl FeatureVector {
    /// Values in canonical order.
    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.comprehension,
            self.attention,
            self.focus,
            self.retention,
            self.engagement_time,
        ]
    }

    /// Inclusive valid range for the feature at `index`.
    pub fn range_of(index: usize) -> (f64, f64) {
        if index == FEATURE_COUNT - 1 {
            ENGAGEMENT_RANGE
        } else {
            SCORE_RANGE
        }
    }

    /// Check every field is finite and inside its documented range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (index, value) in self.as_array().into_iter().enumerate() {
            let field = FEATURE_NAMES[index];
            if !value.is_finite() {
                return Err(ValidationError::NotFinite { field });
            }
            let (min, max) = Self::range_of(index);
            if value < min || value > max {
                return Err(ValidationError::OutOfRange {
                    field,
                    value,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }
}

/// Validate a batch under the whole-batch policy: the first invalid item
/// rejects the batch and is reported by index.
pub fn validate_batch(items: &[FeatureVector], max_size: usize) -> Result<(), ValidationError> {
    if items.len() > max_size {
        return Err(ValidationError::BatchTooLarge {
            size: items.len(),
            max: max_size,
        });
    }

    for (index, item) in items.iter().enumerate() {
        item.validate().map_err(|source| ValidationError::Item {
            index,
            source: Box::new(source),
        })?;
    }

    Ok(())
}

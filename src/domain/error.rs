use thiserror::Error;

/// Rejection of malformed input. Always client-facing, never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("`{field}` must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("`{field}` must be a finite number")]
    NotFinite { field: &'static str },
    #[error("batch of {size} items exceeds the maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },
    #[error("item {index} is invalid: {source}")]
    Item {
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },
}

impl ValidationError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BatchTooLarge { .. } => "batch_too_large",
            Self::OutOfRange { .. } | Self::NotFinite { .. } | Self::Item { .. } => "invalid_input",
        }
    }
}

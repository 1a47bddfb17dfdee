//! Cache key derivation.
//!
//! A key is a namespace tag plus the first 128 bits of a SHA-256 digest over
//! the canonical form of a feature vector. The canonical form fixes field
//! order and formats every value to four decimals, so `82`, `82.0` and
//! `82.00001` all map to the same key.

use std::fmt::{self, Display, Formatter};

use sha2::{Digest, Sha256};

use crate::domain::features::{FEATURE_NAMES, FeatureVector};

const DIGEST_BYTES: usize = 16;
const DECIMALS: usize = 4;

/// Logical partition of cached predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Score,
    Cluster,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Score => "score",
            Self::Cluster => "cluster",
        }
    }
}

/// Opaque fixed-length cache key, e.g. `score:0f3a…` (32 hex digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: Namespace,
    value: String,
}

impl CacheKey {
    /// Derive the key of `features` within `namespace`.
    pub fn for_features(namespace: Namespace, features: &FeatureVector) -> Self {
        let canonical = canonical_form(features);
        let digest = Sha256::digest(canonical.as_bytes());
        Self {
            namespace,
            value: format!(
                "{}:{}",
                namespace.as_str(),
                hex::encode(&digest[..DIGEST_BYTES])
            ),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Canonical serialization hashed into cache keys.
pub fn canonical_form(features: &FeatureVector) -> String {
    FEATURE_NAMES
        .iter()
        .zip(features.as_array())
        .map(|(name, value)| format!("{name}={}", format_value(value)))
        .collect::<Vec<_>>()
        .join("|")
}

fn format_value(value: f64) -> String {
    let formatted = format!("{value:.prec$}", prec = DECIMALS);
    // -0.0 and tiny negatives that round to zero print as "-0.0000"
    match formatted.strip_prefix('-') {
        Some(rest) if rest.bytes().all(|b| b == b'0' || b == b'.') => rest.to_string(),
        _ => formatted,
    }
}

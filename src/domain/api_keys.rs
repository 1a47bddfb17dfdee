//! Domain types for API keys and scopes.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// API permission scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiScope {
    /// Score and cluster predictions.
    Predict,
    /// Cache statistics and flushing.
    Admin,
}

impl ApiScope {
    /// Returns the slug used in configuration and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Predict => "predict",
            Self::Admin => "admin",
        }
    }

    /// Returns all scope variants for iteration.
    pub fn all() -> &'static [ApiScope] {
        &[Self::Predict, Self::Admin]
    }
}

impl Display for ApiScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiScope {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "predict" => Ok(Self::Predict),
            "admin" => Ok(Self::Admin),
            _ => Err(()),
        }
    }
}

/// A configured API key. Only the SHA-256 digest of the secret is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyRecord {
    pub name: String,
    pub hashed_secret: Vec<u8>,
    pub scopes: Vec<ApiScope>,
}

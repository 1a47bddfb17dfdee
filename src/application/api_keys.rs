use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::{Choice, ConstantTimeEq};
use thiserror::Error;

use crate::domain::api_keys::{ApiKeyRecord, ApiScope};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiAuthError {
    #[error("missing api key")]
    Missing,
    #[error("invalid api key")]
    Invalid,
    #[error("api key lacks the `{0}` scope")]
    MissingScope(ApiScope),
}

/// How the caller proved its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    ApiKey,
    Token,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPrincipal {
    pub name: String,
    pub scopes: Vec<ApiScope>,
    pub credential: Credential,
}

impl ApiPrincipal {
    pub fn requires(&self, needed: ApiScope) -> Result<(), ApiAuthError> {
        if self.scopes.contains(&needed) {
            Ok(())
        } else {
            Err(ApiAuthError::MissingScope(needed))
        }
    }
}

/// Keys loaded from configuration at startup; immutable afterwards.
#[derive(Clone, Default)]
pub struct ApiKeyRegistry {
    records: Arc<Vec<ApiKeyRecord>>,
}

impl ApiKeyRegistry {
    pub fn new(records: Vec<ApiKeyRecord>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Resolve `token` to its principal.
    ///
    /// Every configured digest is compared so the time taken does not depend
    /// on which key (if any) matched.
    pub fn authenticate(&self, token: &str) -> Result<ApiPrincipal, ApiAuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ApiAuthError::Missing);
        }

        let hashed_input = hash_secret(token);
        let mut matched: Option<&ApiKeyRecord> = None;
        for record in self.records.iter() {
            let equal: Choice = record.hashed_secret.ct_eq(&hashed_input);
            if bool::from(equal) && matched.is_none() {
                matched = Some(record);
            }
        }

        let record = matched.ok_or(ApiAuthError::Invalid)?;
        Ok(ApiPrincipal {
            name: record.name.clone(),
            scopes: record.scopes.clone(),
            credential: Credential::ApiKey,
        })
    }
}

pub fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

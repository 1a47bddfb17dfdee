//! Short-lived bearer tokens exchanged for an API key.
//!
//! Tokens are HS256 JWTs carrying the key name and its scopes. They let a
//! browser client hold a credential that expires instead of the key itself.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    get_current_timestamp,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::api_keys::ApiScope;

use super::api_keys::{ApiPrincipal, Credential};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),
    #[error("token is invalid or expired")]
    Rejected(#[source] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    scopes: Vec<ApiScope>,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: u64,
}

#[derive(Clone)]
pub struct TokenIssuer {
    keys: Arc<(EncodingKey, DecodingKey)>,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            keys: Arc::new((
                EncodingKey::from_secret(secret.as_bytes()),
                DecodingKey::from_secret(secret.as_bytes()),
            )),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, principal: &ApiPrincipal) -> Result<IssuedToken, TokenError> {
        self.issue_at(principal, get_current_timestamp())
    }

    fn issue_at(&self, principal: &ApiPrincipal, now: u64) -> Result<IssuedToken, TokenError> {
        let expires_in = self.ttl.as_secs();
        let claims = Claims {
            sub: principal.name.clone(),
            scopes: principal.scopes.clone(),
            iat: now,
            exp: now.saturating_add(expires_in),
        };
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.keys.0)
            .map_err(TokenError::Sign)?;
        Ok(IssuedToken {
            access_token,
            expires_in,
        })
    }

    pub fn verify(&self, token: &str) -> Result<ApiPrincipal, TokenError> {
        let data = decode::<Claims>(token.trim(), &self.keys.1, &self.validation)
            .map_err(TokenError::Rejected)?;
        Ok(ApiPrincipal {
            name: data.claims.sub,
            scopes: data.claims.scopes,
            credential: Credential::Token,
        })
    }
}

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::application::api_keys::{ApiAuthError, ApiPrincipal};

use super::error::ApiError;
use super::state::ApiGuard;

pub const API_KEY_HEADER: &str = "x-api-key";
pub(crate) const RATE_LIMIT_REMAINING: HeaderName =
    HeaderName::from_static("x-ratelimit-remaining");
pub(crate) const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");

pub async fn api_auth(
    State(guard): State<ApiGuard>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token =
        extract_token(request.headers().get(axum::http::header::AUTHORIZATION)).or_else(|| {
            request
                .headers()
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok().map(|s| s.to_string()))
        });

    let token = match token {
        Some(value) => value,
        None => return ApiError::unauthorized().into_response(),
    };

    let principal = match guard.api_keys.authenticate(&token) {
        Ok(principal) => principal,
        Err(ApiAuthError::Missing) => return ApiError::unauthorized().into_response(),
        Err(ApiAuthError::Invalid) | Err(ApiAuthError::MissingScope(_)) => {
            match guard.tokens.as_ref().map(|tokens| tokens.verify(&token)) {
                Some(Ok(principal)) => principal,
                Some(Err(err)) => {
                    debug!(target = "scorecast::api::auth", error = %err, "bearer token rejected");
                    return ApiError::invalid_key().into_response();
                }
                None => return ApiError::invalid_key().into_response(),
            }
        }
    };

    request.extensions_mut().insert(principal.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(principal);
    response
}

pub async fn api_rate_limit(
    State(guard): State<ApiGuard>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let principal = match request.extensions().get::<ApiPrincipal>() {
        Some(p) => p,
        None => {
            warn!(
                target = "scorecast::api::ratelimit",
                "missing principal in rate limit middleware"
            );
            return ApiError::unauthorized().into_response();
        }
    };

    let (allowed, remaining) = guard.rate_limiter.allow(&principal.name, &path);
    if !allowed {
        warn!(
            target = "scorecast::api::ratelimit",
            api_key = %principal.name,
            path = %path,
            limit = guard.rate_limiter.limit(),
            "rate limit exceeded"
        );
        return ApiError::rate_limited(guard.rate_limiter.retry_after_secs());
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(guard.rate_limiter.limit()));
    response
}

fn extract_token(header: Option<&axum::http::HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let bearer = raw.strip_prefix("Bearer ")?;
    Some(bearer.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_prefix_is_required() {
        let bearer = HeaderValue::from_static("Bearer s3cret");
        let basic = HeaderValue::from_static("Basic czNjcmV0");

        assert_eq!(extract_token(Some(&bearer)).as_deref(), Some("s3cret"));
        assert_eq!(extract_token(Some(&basic)), None);
        assert_eq!(extract_token(None), None);
    }
}

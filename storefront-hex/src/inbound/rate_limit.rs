//! Rate limiting middleware using Governor.
//!
//! Implements per-user rate limiting with a token bucket algorithm. Runs
//! after the auth middleware and keys on the resolved [`Caller`], so only
//! signed-in users get a bucket of their own; everything else, including
//! requests with unknown tokens, shares the "anonymous" bucket.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde_json::json;
use std::{num::NonZeroU32, sync::Arc};

use super::auth::Caller;

/// Default requests per minute per client.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 100;

const ANONYMOUS: &str = "anonymous";

/// Rate limiter state shared across requests.
pub struct RateLimiterState {
    /// Per-client rate limiters
    limiters: DashMap<String, Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>>,
    /// Quota for new clients
    quota: Quota,
}

impl Default for RateLimiterState {
    fn default() -> Self {
        Self::per_minute(DEFAULT_REQUESTS_PER_MINUTE)
    }
}

impl RateLimiterState {
    /// Allows `requests` per minute per client, all of which may burst at once.
    /// Zero is treated as one.
    pub fn per_minute(requests: u32) -> Self {
        let requests = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);

        Self {
            limiters: DashMap::new(),
            quota: Quota::per_minute(requests),
        }
    }

    /// Checks if a request should be rate limited.
    /// Returns true if the request is allowed, false if rate limited.
    pub fn check(&self, key: &str) -> bool {
        let limiter = self
            .limiters
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::direct(self.quota)))
            .clone();

        limiter.check().is_ok()
    }
}

/// Bucket key for a request.
fn client_key(caller: Option<&Caller>) -> String {
    match caller {
        Some(Caller::User(user_id)) => format!("user:{}", user_id),
        _ => ANONYMOUS.to_string(),
    }
}

/// Rate limiting middleware keyed by the authenticated user.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // Skip rate limiting for health endpoint
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let key = client_key(request.extensions().get::<Caller>());

    if !limiter.check(&key) {
        tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Rate limit exceeded. Please try again later.",
                "retry_after_seconds": 60
            })),
        )
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_is_per_client() {
        let limiter = RateLimiterState::per_minute(2);

        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        assert!(limiter.check("b"));
    }

    #[test]
    fn test_client_key() {
        let user = storefront_types::UserId::new();

        assert_eq!(
            client_key(Some(&Caller::User(user))),
            format!("user:{}", user)
        );
        assert_eq!(client_key(Some(&Caller::Anonymous)), ANONYMOUS);
        assert_eq!(client_key(Some(&Caller::Unresolved)), ANONYMOUS);
        assert_eq!(client_key(None), ANONYMOUS);
    }

    #[test]
    fn test_zero_quota_allows_one() {
        let limiter = RateLimiterState::per_minute(0);

        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
    }
}

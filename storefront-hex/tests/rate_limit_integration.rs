//! Integration tests for rate limiting middleware.
//!
//! These tests verify the HTTP-level behavior of rate limiting,
//! including 429 responses and proper integration with the middleware stack.
//!
//! This test requires the `sqlite` feature flag.

#![cfg(feature = "sqlite")]

mod common;

use axum::http::StatusCode;
use tower::ServiceExt;

use common::{get, harness, json_body};

const RATES: &str = "/api/prices/rates?base=toman";

#[tokio::test]
async fn test_rate_limiting_returns_429_when_exceeded() {
    // Only 3 requests allowed per minute
    let h = harness(3).await;

    for i in 1..=3 {
        let response = h.app.clone().oneshot(get(RATES, Some(&h.token))).await.unwrap();
        assert_ne!(
            response.status(),
            StatusCode::TOO_MANY_REQUESTS,
            "Request {} should not be rate limited (quota not yet exceeded)",
            i
        );
    }

    // 4th request should be rate limited
    let response = h.app.clone().oneshot(get(RATES, Some(&h.token))).await.unwrap();

    assert_eq!(
        response.status(),
        StatusCode::TOO_MANY_REQUESTS,
        "Request should be rate limited after exceeding quota"
    );

    let json = json_body(response).await;
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("Rate limit exceeded")
    );
    assert_eq!(json["retry_after_seconds"], 60);
}

#[tokio::test]
async fn test_rate_limiting_health_endpoint_bypassed() {
    let h = harness(1).await;

    // Health endpoint bypasses rate limiting entirely
    for _ in 0..10 {
        let response = h.app.clone().oneshot(get("/health", None)).await.unwrap();

        assert_eq!(
            response.status(),
            StatusCode::OK,
            "Health endpoint should not be rate limited"
        );
    }
}

#[tokio::test]
async fn test_rate_limiting_per_session_isolation() {
    let h = harness(1).await;

    // Session quota used up
    let response = h.app.clone().oneshot(get(RATES, Some(&h.token))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = h.app.clone().oneshot(get(RATES, Some(&h.token))).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Anonymous callers have their own bucket
    let response = h.app.clone().oneshot(get(RATES, None)).await.unwrap();
    assert_eq!(
        response.status(),
        StatusCode::OK,
        "Anonymous bucket should have its own quota"
    );
}

#[tokio::test]
async fn test_unknown_tokens_share_anonymous_bucket() {
    let h = harness(1).await;

    let response = h.app.clone().oneshot(get(RATES, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Made-up tokens resolve to no session and cannot mint fresh quota
    for i in 0..20 {
        let token = format!("sess_made_up_{}", i);
        let response = h.app.clone().oneshot(get(RATES, Some(&token))).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::TOO_MANY_REQUESTS,
            "Unknown token {} should use the anonymous bucket",
            token
        );
    }

    // The signed-in owner still has a bucket of their own
    let response = h.app.clone().oneshot(get(RATES, Some(&h.token))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limiting_response_format() {
    let h = harness(1).await;

    let _ = h.app.clone().oneshot(get(RATES, None)).await;
    let response = h.app.clone().oneshot(get(RATES, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("application/json"));

    let json = json_body(response).await;
    assert!(
        json.get("error").is_some(),
        "Response should have 'error' field"
    );
    assert!(
        json.get("retry_after_seconds").is_some(),
        "Response should have 'retry_after_seconds' field"
    );
}

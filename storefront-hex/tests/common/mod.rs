//! Shared setup for HTTP integration tests: in-memory SQLite, a stub gateway,
//! and one seeded order with a signed-in owner.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, Response},
};
use http_body_util::BodyExt;
use tower::ServiceExt;
use storefront_hex::{StorefrontService, inbound::HttpServer};
use storefront_repo::SqliteRepo;
use storefront_types::{
    CreateOrderRequest, Currency, ExchangeRateMatrix, GatewayAuthorization, GatewayError,
    GatewayVerification, Order, PaymentGateway, PaymentIntent, StorefrontRepository, UserId,
};

pub const AUTHORITY: &str = "A00000000000000000000000000217885159";

/// Gateway that issues one fixed authority and verifies everything.
pub struct StubGateway;

#[async_trait::async_trait]
impl PaymentGateway for StubGateway {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn request_payment(
        &self,
        _intent: PaymentIntent,
    ) -> Result<GatewayAuthorization, GatewayError> {
        Ok(GatewayAuthorization {
            authority: AUTHORITY.to_string(),
            payment_url: format!("https://gateway.test/StartPay/{}", AUTHORITY),
        })
    }

    async fn verify_payment(
        &self,
        _authority: &str,
        _amount: i64,
    ) -> Result<GatewayVerification, GatewayError> {
        Ok(GatewayVerification {
            ref_id: "201".to_string(),
            card_pan: Some("502229******5995".to_string()),
            fee: Some(0),
            already_verified: false,
        })
    }
}

pub struct Harness {
    pub app: axum::Router,
    pub order: Order,
    pub owner: UserId,
    /// Raw session token of the order owner
    pub token: String,
}

/// Builds a server over a fresh database holding one order.
pub async fn harness(requests_per_minute: u32) -> Harness {
    let repo = SqliteRepo::new("sqlite::memory:").await.unwrap();
    let owner = UserId::new();
    let order = repo
        .create_order(CreateOrderRequest {
            user_id: owner,
            amount: 250_000,
        })
        .await
        .unwrap();
    let (_, token) = repo
        .create_session(owner, chrono::Duration::hours(1))
        .await
        .unwrap();

    let rates = ExchangeRateMatrix::empty()
        .with_rate(Currency::Dollar, Currency::Toman, 60000.0)
        .unwrap();
    let service = StorefrontService::new(repo, StubGateway, Arc::new(rates));
    let app = HttpServer::with_rate_limit(service, requests_per_minute).router();

    Harness {
        app,
        order,
        owner,
        token,
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("Cookie", format!("session={}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

/// Opens a payment for the harness order so callbacks carry a known authority.
pub async fn open_payment(h: &Harness) {
    let response = h
        .app
        .clone()
        .oneshot(post_json(
            "/api/payment/request",
            &h.token,
            serde_json::json!({ "order_id": h.order.id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}

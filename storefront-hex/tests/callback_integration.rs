//! Integration tests for the payment callback and payment JSON endpoints.
//!
//! These run the full router (auth, rate limiting, handlers) against
//! in-memory SQLite and a stub gateway.
//!
//! This test requires the `sqlite` feature flag.

#![cfg(feature = "sqlite")]

mod common;

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use common::{AUTHORITY, get, harness, json_body, location, open_payment, post_json};

fn callback_uri(authority: &str, status: &str, order_id: &str) -> String {
    format!(
        "/api/payment/callback?Authority={}&Status={}&orderId={}",
        authority, status, order_id
    )
}

#[tokio::test]
async fn test_full_payment_flow() {
    let h = harness(100).await;
    let order_id = h.order.id.to_string();

    let response = h
        .app
        .clone()
        .oneshot(post_json(
            "/api/payment/request",
            &h.token,
            json!({ "order_id": order_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["authority"], AUTHORITY);

    let response = h
        .app
        .clone()
        .oneshot(get(&callback_uri(AUTHORITY, "OK", &order_id), Some(&h.token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response),
        format!("/order/{}?status=success", order_id)
    );

    let response = h
        .app
        .clone()
        .oneshot(get(
            &format!("/api/orders/{}/payment", order_id),
            Some(&h.token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["payment_status"], "PAID");
    assert_eq!(json["details"]["ref_id"], "201");
}

#[tokio::test]
async fn test_repeated_callback_is_already_paid() {
    let h = harness(100).await;
    let order_id = h.order.id.to_string();
    open_payment(&h).await;

    for expected in ["success", "already_paid"] {
        let response = h
            .app
            .clone()
            .oneshot(get(&callback_uri(AUTHORITY, "OK", &order_id), Some(&h.token)))
            .await
            .unwrap();
        assert_eq!(
            location(&response),
            format!("/order/{}?status={}", order_id, expected)
        );
    }
}

#[tokio::test]
async fn test_callback_without_order_id() {
    let h = harness(100).await;

    let response = h
        .app
        .clone()
        .oneshot(get(
            "/api/payment/callback?Authority=A1&Status=OK",
            Some(&h.token),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/order?error=invalid_params");
}

#[tokio::test]
async fn test_callback_without_session() {
    let h = harness(100).await;
    let order_id = h.order.id.to_string();

    let response = h
        .app
        .clone()
        .oneshot(get(&callback_uri(AUTHORITY, "OK", &order_id), None))
        .await
        .unwrap();

    assert_eq!(
        location(&response),
        format!("/order/{}?error=unauthorized", order_id)
    );
}

#[tokio::test]
async fn test_cancelled_payment() {
    let h = harness(100).await;
    let order_id = h.order.id.to_string();
    open_payment(&h).await;

    let response = h
        .app
        .clone()
        .oneshot(get(&callback_uri(AUTHORITY, "NOK", &order_id), Some(&h.token)))
        .await
        .unwrap();
    assert_eq!(
        location(&response),
        format!("/order/{}?error=payment_failed", order_id)
    );

    let response = h
        .app
        .clone()
        .oneshot(get(
            &format!("/api/orders/{}/payment", order_id),
            Some(&h.token),
        ))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["payment_status"], "FAILED");
}

#[tokio::test]
async fn test_callback_without_payment_request() {
    let h = harness(100).await;
    let order_id = h.order.id.to_string();

    let response = h
        .app
        .clone()
        .oneshot(get(&callback_uri(AUTHORITY, "OK", &order_id), Some(&h.token)))
        .await
        .unwrap();
    assert_eq!(
        location(&response),
        format!("/order/{}?error=verification_failed", order_id)
    );

    let response = h
        .app
        .clone()
        .oneshot(get(
            &format!("/api/orders/{}/payment", order_id),
            Some(&h.token),
        ))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["payment_status"], "NO_ATTEMPT");
}

#[tokio::test]
async fn test_payment_request_requires_session() {
    let h = harness(100).await;

    let response = h
        .app
        .clone()
        .oneshot(post_json(
            "/api/payment/request",
            "sess_not_a_real_token",
            json!({ "order_id": h.order.id }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(response).await;
    assert_eq!(json["code"], 401);
}

#[tokio::test]
async fn test_invalid_order_id_path() {
    let h = harness(100).await;

    let response = h
        .app
        .clone()
        .oneshot(get("/api/orders/not-a-uuid/payment", Some(&h.token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_convert_price_endpoint() {
    let h = harness(100).await;

    let response = h
        .app
        .clone()
        .oneshot(get(
            "/api/prices/convert?amount=12.5&from=dollar&to=toman",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["converted"], 750000.0);
    assert_eq!(json["formatted"], "۷۵۰٬۰۰۰ تومان");
}

#[tokio::test]
async fn test_convert_price_rejects_unknown_currency() {
    let h = harness(100).await;

    let response = h
        .app
        .clone()
        .oneshot(get("/api/prices/convert?amount=1&from=yen&to=toman", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rates_endpoint() {
    let h = harness(100).await;

    let response = h
        .app
        .clone()
        .oneshot(get("/api/prices/rates?base=dollar", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["base"], "dollar");
    assert_eq!(json["rates"]["toman"], 60000.0);
    assert!(json["rates"].get("euro").is_none());
}

#[tokio::test]
async fn test_openapi_document_served() {
    let h = harness(100).await;

    let response = h
        .app
        .clone()
        .oneshot(get("/api-docs/openapi.json", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert!(json["paths"].get("/api/payment/callback").is_some());
}

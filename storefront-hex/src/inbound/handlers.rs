//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use utoipa::OpenApi;

use storefront_types::{
    AppError, CallbackError, CallbackOutcome, CallbackQuery, ConvertQuery, OrderId,
    PaymentGateway, PaymentLock, PaymentRequest, RatesQuery, RatesResponse, StorefrontRepository,
};

use super::auth::Caller;
use crate::StorefrontService;
use crate::openapi::ApiDoc;

/// Application state shared across handlers.
pub struct AppState<R, G>
where
    R: StorefrontRepository + PaymentLock,
    G: PaymentGateway,
{
    pub service: StorefrontService<R, G>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Gateway(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Serves the OpenAPI document.
pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment callback
// ─────────────────────────────────────────────────────────────────────────────

/// Where the shopper lands after a callback.
///
/// Only a well-formed order id is echoed into the URL.
pub fn callback_location(
    order_id: Option<OrderId>,
    result: &Result<CallbackOutcome, CallbackError>,
) -> String {
    match (order_id, result) {
        (Some(id), Ok(outcome)) => format!("/order/{}?status={}", id, outcome.code()),
        (Some(id), Err(err)) => format!("/order/{}?error={}", id, err.code()),
        (None, _) => format!("/order?error={}", CallbackError::InvalidParams.code()),
    }
}

/// Gateway redirect back to the shop. Always answers with a 302.
#[tracing::instrument(skip(state, caller, query))]
pub async fn payment_callback<R, G>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> Response
where
    R: StorefrontRepository + PaymentLock,
    G: PaymentGateway,
{
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            tracing::warn!("Unreadable callback query: {}", rejection);
            CallbackQuery::default()
        }
    };

    let result = match caller.for_callback() {
        Ok(user) => state.service.handle_callback(&query, user).await,
        Err(e) => Err(e),
    };

    let order_id = query
        .order_id
        .as_deref()
        .and_then(|raw| raw.trim().parse::<OrderId>().ok());
    let location = callback_location(order_id, &result);

    match &result {
        Ok(outcome) => tracing::info!(outcome = outcome.code(), "Callback handled"),
        Err(err) => tracing::warn!(error = err.code(), "Callback failed"),
    }

    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment API
// ─────────────────────────────────────────────────────────────────────────────

/// Start paying for an order.
#[tracing::instrument(skip(state, caller), fields(order_id = %req.order_id))]
pub async fn request_payment<R, G>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<PaymentRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    R: StorefrontRepository + PaymentLock,
    G: PaymentGateway,
{
    let user_id = caller.require()?;
    let response = state.service.request_payment(user_id, req).await?;
    Ok(Json(response))
}

/// Payment status of an order.
#[tracing::instrument(skip(state, caller), fields(order_id = %id))]
pub async fn order_payment<R, G>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    R: StorefrontRepository + PaymentLock,
    G: PaymentGateway,
{
    let user_id = caller.require()?;
    let order_id: OrderId = id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid order ID".into()))?;

    let response = state.service.order_payment(user_id, order_id).await?;
    Ok(Json(response))
}

// ─────────────────────────────────────────────────────────────────────────────
// Pricing
// ─────────────────────────────────────────────────────────────────────────────

/// Convert and format a price.
#[tracing::instrument(skip(state, query))]
pub async fn convert_price<R, G>(
    State(state): State<Arc<AppState<R, G>>>,
    query: Result<Query<ConvertQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    R: StorefrontRepository + PaymentLock,
    G: PaymentGateway,
{
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let response = state.service.convert_price(query)?;
    Ok(Json(response))
}

/// Rates out of one currency.
pub async fn rates<R, G>(
    State(state): State<Arc<AppState<R, G>>>,
    query: Result<Query<RatesQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    R: StorefrontRepository + PaymentLock,
    G: PaymentGateway,
{
    let Query(RatesQuery { base }) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(Json(RatesResponse {
        base,
        rates: state.service.rates_from(base),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_location() {
        let id = OrderId::new();
        assert_eq!(
            callback_location(Some(id), &Ok(CallbackOutcome::Success)),
            format!("/order/{}?status=success", id)
        );
        assert_eq!(
            callback_location(Some(id), &Ok(CallbackOutcome::AlreadyPaid)),
            format!("/order/{}?status=already_paid", id)
        );
    }

    #[test]
    fn test_error_location() {
        let id = OrderId::new();
        assert_eq!(
            callback_location(Some(id), &Err(CallbackError::LockFailed)),
            format!("/order/{}?error=lock_failed", id)
        );
    }

    #[test]
    fn test_missing_order_location() {
        assert_eq!(
            callback_location(None, &Err(CallbackError::InvalidParams)),
            "/order?error=invalid_params"
        );
        // A malformed id is never echoed back.
        assert_eq!(
            callback_location(None, &Err(CallbackError::Unauthorized)),
            "/order?error=invalid_params"
        );
    }
}

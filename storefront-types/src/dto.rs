//! Data Transfer Objects (DTOs) for requests and responses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{Currency, OrderId, PaymentDetails, PaymentStatus, UserId};
use crate::error::CallbackError;

// ─────────────────────────────────────────────────────────────────────────────
// Order DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create an order (used by seeding tools and tests).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    /// Payable total in Toman
    #[schema(example = 1250000)]
    pub amount: i64,
}

/// Payment state of an order as shown to its owner.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderPaymentResponse {
    pub order_id: OrderId,
    #[schema(example = 1250000)]
    pub amount: i64,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<PaymentDetails>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to start paying for an order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentRequest {
    pub order_id: OrderId,
}

/// Where to send the shopper to pay.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentRequestResponse {
    #[schema(example = "A00000000000000000000000000217885159")]
    pub authority: String,
    #[schema(example = "https://www.zarinpal.com/pg/StartPay/A00000000000000000000000000217885159")]
    pub payment_url: String,
}

/// Raw query string of the gateway redirect, as received.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    /// Gateway authority token
    #[serde(rename = "Authority")]
    pub authority: Option<String>,
    /// Gateway status code (`OK` or `NOK`)
    #[serde(rename = "Status")]
    pub status: Option<String>,
    #[serde(rename = "orderId")]
    pub order_id: Option<String>,
}

/// A callback whose required fields are present and well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub authority: String,
    pub status: String,
    pub order_id: OrderId,
}

impl CallbackParams {
    /// Whether the gateway reported the shopper completed payment.
    pub fn gateway_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("OK")
    }
}

impl CallbackQuery {
    /// Checks that all three fields are present, non-blank, and that the
    /// order id parses.
    pub fn validate(&self) -> Result<CallbackParams, CallbackError> {
        let authority = non_blank(&self.authority).ok_or(CallbackError::InvalidParams)?;
        let status = non_blank(&self.status).ok_or(CallbackError::InvalidParams)?;
        let order_id = non_blank(&self.order_id)
            .ok_or(CallbackError::InvalidParams)?
            .parse::<OrderId>()
            .map_err(|_| CallbackError::InvalidParams)?;

        Ok(CallbackParams {
            authority: authority.to_string(),
            status: status.to_string(),
            order_id,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Successful ends of a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// This callback committed the payment.
    Success,
    /// The order was already paid; nothing was written.
    AlreadyPaid,
}

impl CallbackOutcome {
    /// Stable code surfaced as `?status=<code>`.
    pub fn code(&self) -> &'static str {
        match self {
            CallbackOutcome::Success => "success",
            CallbackOutcome::AlreadyPaid => "already_paid",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pricing DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Query for converting a displayed price.
#[derive(Debug, Clone, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConvertQuery {
    pub amount: f64,
    pub from: Currency,
    pub to: Currency,
}

/// A converted and formatted price.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConvertResponse {
    #[schema(example = 12.5)]
    pub amount: f64,
    pub from: Currency,
    pub to: Currency,
    #[schema(example = 750000.0)]
    pub converted: f64,
    #[schema(example = "۷۵۰٬۰۰۰ تومان")]
    pub formatted: String,
}

/// Query for listing rates out of one currency.
#[derive(Debug, Clone, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RatesQuery {
    pub base: Currency,
}

/// Rates out of one currency, keyed by target. Unset pairs are omitted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RatesResponse {
    pub base: Currency,
    #[schema(example = json!({"toman": 1.0, "dollar": 0.0000166}))]
    pub rates: BTreeMap<String, f64>,
}

//! Payment records kept alongside orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::ids::OrderId;
use super::order::PaymentStatus;

/// The gateway-side record of an order's payment. One row per order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentDetails {
    pub order_id: OrderId,
    /// Gateway that issued the authority, e.g. `zarinpal`
    pub gateway: String,
    /// Gateway token identifying the payment attempt
    pub authority: String,
    /// Bank reference returned on successful verification
    pub ref_id: Option<String>,
    /// Amount in Toman
    pub amount: i64,
    pub status: PaymentStatus,
    /// Masked card number reported by the gateway
    pub card_pan: Option<String>,
    /// Gateway fee
    pub fee: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentDetails {
    /// A freshly requested payment awaiting the shopper's return.
    pub fn pending(order_id: OrderId, gateway: &str, authority: &str, amount: i64) -> Self {
        let now = Utc::now();
        Self {
            order_id,
            gateway: gateway.to_string(),
            authority: authority.to_string(),
            ref_id: None,
            amount,
            status: PaymentStatus::Pending,
            card_pan: None,
            fee: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Everything written when a verified payment is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentCommit {
    pub order_id: OrderId,
    pub gateway: String,
    pub authority: String,
    pub amount: i64,
    pub ref_id: String,
    pub card_pan: Option<String>,
    pub fee: Option<i64>,
}

impl PaymentCommit {
    /// Applies this commit on top of an existing row, or creates one.
    pub fn into_details(self, existing: Option<PaymentDetails>) -> PaymentDetails {
        let now = Utc::now();
        PaymentDetails {
            order_id: self.order_id,
            gateway: self.gateway,
            authority: self.authority,
            ref_id: Some(self.ref_id),
            amount: self.amount,
            status: PaymentStatus::Paid,
            card_pan: self.card_pan,
            fee: self.fee,
            created_at: existing.map(|d| d.created_at).unwrap_or(now),
            updated_at: now,
        }
    }
}

/// A held per-order processing lock.
///
/// The lease expires at `expires_at`; after that another holder may take it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    pub order_id: OrderId,
    pub token: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl LockLease {
    pub fn new(order_id: OrderId, ttl: chrono::Duration) -> Self {
        Self {
            order_id,
            token: Uuid::new_v4(),
            expires_at: Utc::now() + ttl,
        }
    }
}

//! Order domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{OrderId, UserId};
use crate::error::DomainError;

/// Payment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// No payment has been requested yet
    #[default]
    NoAttempt,
    /// A gateway authority was issued and the shopper was redirected
    Pending,
    /// Verified by the gateway and committed
    Paid,
    /// Cancelled by the shopper or declined by the bank
    Failed,
}

impl AsRef<str> for PaymentStatus {
    fn as_ref(&self) -> &str {
        match self {
            Self::NoAttempt => "NO_ATTEMPT",
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NO_ATTEMPT" => Ok(Self::NoAttempt),
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "FAILED" => Ok(Self::Failed),
            other => Err(DomainError::ValidationError(format!(
                "Unknown payment status: {}",
                other
            ))),
        }
    }
}

/// A shopper's order, as far as payment is concerned.
///
/// `amount` is the payable total in Toman.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    #[schema(example = 1250000)]
    pub amount: i64,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates an unpaid order.
    pub fn new(user_id: UserId, amount: i64) -> Result<Self, DomainError> {
        if amount <= 0 {
            return Err(DomainError::NonPositiveAmount);
        }
        let now = Utc::now();
        Ok(Self {
            id: OrderId::new(),
            user_id,
            amount,
            payment_status: PaymentStatus::NoAttempt,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

//! Payment gateway port.
//!
//! Implementations talk to a third-party payment API (Zarinpal, test stubs).

use crate::domain::OrderId;
use crate::error::GatewayError;

/// What the shop asks the gateway to collect.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    pub order_id: OrderId,
    /// Amount in Toman
    pub amount: i64,
    pub description: String,
}

/// Gateway answer to a payment request.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayAuthorization {
    /// Token the shopper carries to the gateway and back
    pub authority: String,
    /// Where the shopper should be sent to pay
    pub payment_url: String,
}

/// Gateway confirmation of a completed payment.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayVerification {
    pub ref_id: String,
    pub card_pan: Option<String>,
    pub fee: Option<i64>,
    /// The gateway had already verified this authority before
    pub already_verified: bool,
}

/// Port trait for payment gateways.
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Short identifier stored with payment records.
    fn name(&self) -> &'static str;

    /// Opens a payment for `intent` and returns the authority to redirect with.
    async fn request_payment(
        &self,
        intent: PaymentIntent,
    ) -> Result<GatewayAuthorization, GatewayError>;

    /// Confirms that `authority` was paid for exactly `amount` Toman.
    ///
    /// Implementations must bound the call with a timeout and report it as
    /// [`GatewayError::Timeout`].
    async fn verify_payment(
        &self,
        authority: &str,
        amount: i64,
    ) -> Result<GatewayVerification, GatewayError>;
}

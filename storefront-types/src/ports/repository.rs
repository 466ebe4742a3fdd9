//! Repository port trait.
//!
//! Adapters (Postgres, SQLite, in-memory) implement this trait.

use crate::domain::{Order, OrderId, PaymentCommit, PaymentDetails, Session, UserId};
use crate::dto::CreateOrderRequest;
use crate::error::RepoError;

/// The storage port for orders, payment records and sessions.
///
/// Operations that touch both an order and its payment record MUST be
/// atomic: readers never observe one without the other.
#[async_trait::async_trait]
pub trait StorefrontRepository: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────────
    // Orders
    // ─────────────────────────────────────────────────────────────────────────────

    /// Creates an order with status `NoAttempt`.
    async fn create_order(&self, req: CreateOrderRequest) -> Result<Order, RepoError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Payments (MUST be atomic)
    // ─────────────────────────────────────────────────────────────────────────────

    async fn get_payment_details(
        &self,
        order_id: OrderId,
    ) -> Result<Option<PaymentDetails>, RepoError>;

    /// Upserts a pending payment record and moves the order to `Pending`.
    ///
    /// Fails with `DomainError::AlreadyPaid` when the order is paid.
    async fn record_payment_request(
        &self,
        details: PaymentDetails,
    ) -> Result<PaymentDetails, RepoError>;

    /// Upserts the paid payment record and marks the order `Paid`.
    async fn commit_payment(&self, commit: PaymentCommit) -> Result<PaymentDetails, RepoError>;

    /// Marks the order and its payment record `Failed`, unless already paid.
    ///
    /// Returns false when nothing was changed because the order is paid.
    async fn mark_payment_failed(
        &self,
        order_id: OrderId,
        gateway: &str,
        authority: &str,
    ) -> Result<bool, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────────

    /// Creates a session and returns it with the raw token (shown once).
    async fn create_session(
        &self,
        user_id: UserId,
        ttl: chrono::Duration,
    ) -> Result<(Session, String), RepoError>;

    /// Finds an unexpired session by token hash.
    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, RepoError>;
}

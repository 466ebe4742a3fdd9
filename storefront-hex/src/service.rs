//! Storefront Application Service
//!
//! Orchestrates domain operations through the repository, lock and gateway
//! ports. Contains NO infrastructure logic - pure business orchestration.

use std::collections::BTreeMap;
use std::sync::Arc;

use storefront_repo::security::tokens_match;
use storefront_types::{
    AppError, CallbackError, CallbackOutcome, CallbackParams, CallbackQuery, ConvertQuery,
    ConvertResponse, Currency, DomainError, ExchangeRateMatrix, LockLease, Order, OrderId,
    OrderPaymentResponse, PaymentCommit, PaymentDetails, PaymentGateway, PaymentIntent,
    PaymentLock, PaymentRequest, PaymentRequestResponse, RepoError, StorefrontRepository, UserId,
    format_price,
};

/// Default lease for the per-order payment lock.
pub const DEFAULT_LOCK_TTL_SECS: i64 = 30;

/// Application service for payments and pricing.
///
/// Generic over the storage adapter (which also provides the per-order lock)
/// and the payment gateway. Exchange rates are built once at startup and
/// shared read-only.
pub struct StorefrontService<R, G>
where
    R: StorefrontRepository + PaymentLock,
    G: PaymentGateway,
{
    repo: R,
    gateway: G,
    rates: Arc<ExchangeRateMatrix>,
    lock_ttl: chrono::Duration,
}

impl<R, G> StorefrontService<R, G>
where
    R: StorefrontRepository + PaymentLock,
    G: PaymentGateway,
{
    /// Creates a new service with the default lock lease.
    pub fn new(repo: R, gateway: G, rates: Arc<ExchangeRateMatrix>) -> Self {
        Self {
            repo,
            gateway,
            rates,
            lock_ttl: chrono::Duration::seconds(DEFAULT_LOCK_TTL_SECS),
        }
    }

    /// Overrides how long a callback may hold an order's lock.
    pub fn with_lock_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn rates(&self) -> &ExchangeRateMatrix {
        &self.rates
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Payment callback
    // ─────────────────────────────────────────────────────────────────────────────

    /// Reconciles a gateway redirect with the order it names.
    ///
    /// Runs validate, verify, lock, idempotency check, commit and release in
    /// that order. At most one callback per order ever commits; the others
    /// see `AlreadyPaid` or `LockFailed`. The callback's authority must be the
    /// one recorded by [`Self::request_payment`] for this order.
    #[tracing::instrument(skip(self, query), fields(order_id = ?query.order_id))]
    pub async fn handle_callback(
        &self,
        query: &CallbackQuery,
        caller: Option<UserId>,
    ) -> Result<CallbackOutcome, CallbackError> {
        let params = query.validate().inspect_err(|_| {
            tracing::warn!("Rejecting callback with missing or malformed parameters");
        })?;
        let caller = caller.ok_or(CallbackError::Unauthorized)?;

        let order = self
            .repo
            .get_order(params.order_id)
            .await
            .map_err(|e| log_repo_error("load order", e))?
            .ok_or_else(|| {
                tracing::warn!("Callback for unknown order");
                CallbackError::InvalidParams
            })?;

        if !order.is_owned_by(caller) {
            tracing::warn!(caller = %caller, "Callback caller does not own the order");
            return Err(CallbackError::Unauthorized);
        }

        if order.is_paid() {
            tracing::info!("Order already paid, nothing to do");
            return Ok(CallbackOutcome::AlreadyPaid);
        }

        // An authority is only accepted for the order it was issued to.
        let stored = self
            .repo
            .get_payment_details(order.id)
            .await
            .map_err(|e| log_repo_error("load payment details", e))?;
        match stored {
            Some(details) if tokens_match(&details.authority, &params.authority) => {}
            Some(_) => {
                tracing::warn!("Callback authority does not match the payment request");
                return Err(CallbackError::VerificationFailed);
            }
            None => {
                tracing::warn!("Callback for an order with no payment request");
                return Err(CallbackError::VerificationFailed);
            }
        }

        if !params.gateway_ok() {
            return self.record_failure(&order, &params).await;
        }

        let verification = self
            .gateway
            .verify_payment(&params.authority, order.amount)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Gateway verification failed");
                CallbackError::from(e)
            })?;
        if verification.already_verified {
            tracing::debug!("Gateway reports the authority was verified before");
        }

        let commit = PaymentCommit {
            order_id: order.id,
            gateway: self.gateway.name().to_string(),
            authority: params.authority,
            amount: order.amount,
            ref_id: verification.ref_id,
            card_pan: verification.card_pan,
            fee: verification.fee,
        };

        let lease = self.acquire(order.id).await?;
        let outcome = self.commit_locked(commit).await;
        self.release(&lease).await;
        outcome
    }

    /// Status other than OK: mark the attempt failed unless a concurrent
    /// callback already paid the order.
    async fn record_failure(
        &self,
        order: &Order,
        params: &CallbackParams,
    ) -> Result<CallbackOutcome, CallbackError> {
        let lease = self.acquire(order.id).await?;
        let changed = self
            .repo
            .mark_payment_failed(order.id, self.gateway.name(), &params.authority)
            .await
            .map_err(|e| log_repo_error("mark payment failed", e));
        self.release(&lease).await;

        if changed? {
            tracing::info!(status = %params.status, "Payment cancelled or declined");
            Err(CallbackError::PaymentFailed)
        } else {
            Ok(CallbackOutcome::AlreadyPaid)
        }
    }

    async fn commit_locked(&self, commit: PaymentCommit) -> Result<CallbackOutcome, CallbackError> {
        let order = self
            .repo
            .get_order(commit.order_id)
            .await
            .map_err(|e| log_repo_error("reload order", e))?
            .ok_or(CallbackError::ServerError)?;
        if order.is_paid() {
            tracing::info!("Order was paid while verifying, skipping commit");
            return Ok(CallbackOutcome::AlreadyPaid);
        }

        match self.repo.commit_payment(commit).await {
            Ok(details) => {
                tracing::info!(ref_id = ?details.ref_id, amount = details.amount, "Payment committed");
                Ok(CallbackOutcome::Success)
            }
            Err(RepoError::Domain(DomainError::AlreadyPaid(_))) => Ok(CallbackOutcome::AlreadyPaid),
            Err(e) => Err(log_repo_error("commit payment", e)),
        }
    }

    async fn acquire(&self, order_id: OrderId) -> Result<LockLease, CallbackError> {
        match self.repo.try_acquire(order_id, self.lock_ttl).await {
            Ok(Some(lease)) => Ok(lease),
            Ok(None) => {
                tracing::warn!("Order is locked by another callback");
                Err(CallbackError::LockFailed)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to acquire payment lock");
                Err(CallbackError::from(e))
            }
        }
    }

    async fn release(&self, lease: &LockLease) {
        // An unreleased lease expires on its own after the TTL.
        if let Err(e) = self.repo.release(lease).await {
            tracing::error!(error = %e, "Failed to release payment lock");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Payment requests
    // ─────────────────────────────────────────────────────────────────────────────

    /// Opens a gateway payment for an order owned by `caller`.
    #[tracing::instrument(skip(self, req), fields(order_id = %req.order_id))]
    pub async fn request_payment(
        &self,
        caller: UserId,
        req: PaymentRequest,
    ) -> Result<PaymentRequestResponse, AppError> {
        let order = self.owned_order(caller, req.order_id).await?;
        if order.is_paid() {
            return Err(AppError::Conflict(format!("Order {} is already paid", order.id)));
        }

        let authorization = self
            .gateway
            .request_payment(PaymentIntent {
                order_id: order.id,
                amount: order.amount,
                description: format!("Order {}", order.id),
            })
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Gateway refused payment request"))?;

        self.repo
            .record_payment_request(PaymentDetails::pending(
                order.id,
                self.gateway.name(),
                &authorization.authority,
                order.amount,
            ))
            .await?;

        tracing::info!(authority = %authorization.authority, "Payment request recorded");
        Ok(PaymentRequestResponse {
            authority: authorization.authority,
            payment_url: authorization.payment_url,
        })
    }

    /// Payment state of an order owned by `caller`.
    #[tracing::instrument(skip(self))]
    pub async fn order_payment(
        &self,
        caller: UserId,
        order_id: OrderId,
    ) -> Result<OrderPaymentResponse, AppError> {
        let order = self.owned_order(caller, order_id).await?;
        let details = self.repo.get_payment_details(order.id).await?;

        Ok(OrderPaymentResponse {
            order_id: order.id,
            amount: order.amount,
            payment_status: order.payment_status,
            details,
        })
    }

    /// Orders belonging to someone else are reported as missing.
    async fn owned_order(&self, caller: UserId, order_id: OrderId) -> Result<Order, AppError> {
        self.repo
            .get_order(order_id)
            .await?
            .filter(|order| order.is_owned_by(caller))
            .ok_or_else(|| AppError::NotFound(format!("Order {}", order_id)))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Pricing
    // ─────────────────────────────────────────────────────────────────────────────

    /// Converts and formats a displayed price.
    pub fn convert_price(&self, query: ConvertQuery) -> Result<ConvertResponse, AppError> {
        if !query.amount.is_finite() || query.amount < 0.0 {
            return Err(AppError::BadRequest(
                "Amount must be a non-negative number".into(),
            ));
        }

        let converted = self.rates.convert(query.amount, query.from, query.to);
        Ok(ConvertResponse {
            amount: query.amount,
            from: query.from,
            to: query.to,
            converted,
            formatted: format_price(converted, query.to),
        })
    }

    /// Configured rates out of `base`.
    pub fn rates_from(&self, base: Currency) -> BTreeMap<String, f64> {
        self.rates.rates_from(base)
    }
}

fn log_repo_error(action: &str, err: RepoError) -> CallbackError {
    tracing::error!(error = %err, "Failed to {}", action);
    CallbackError::from(err)
}

//! Error types for the storefront payments service.

use crate::domain::OrderId;

/// Domain-level errors (business rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Amount must be positive")]
    NonPositiveAmount,

    #[error("Order {0} is already paid")]
    AlreadyPaid(OrderId),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Failures of the per-order lock backend.
///
/// A lock that is merely held by someone else is not an error; see
/// [`crate::PaymentLock::try_acquire`].
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Lock backend error: {0}")]
    Backend(String),
}

impl From<RepoError> for LockError {
    fn from(err: RepoError) -> Self {
        LockError::Backend(err.to_string())
    }
}

/// Errors talking to a payment gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The gateway answered and refused the request.
    #[error("Gateway rejected the request ({code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Gateway request timed out")]
    Timeout,

    #[error("Gateway transport error: {0}")]
    Transport(String),

    #[error("Unexpected gateway response: {0}")]
    InvalidResponse(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Callback taxonomy
// ─────────────────────────────────────────────────────────────────────────────

/// Why a payment callback did not complete.
///
/// Each variant has a stable code that is placed in the redirect URL for the
/// storefront to translate into a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CallbackError {
    #[error("Missing or malformed callback parameters")]
    InvalidParams,

    #[error("Caller is not signed in as the order owner")]
    Unauthorized,

    #[error("Payment was cancelled or declined")]
    PaymentFailed,

    #[error("Internal error while processing payment")]
    ServerError,

    #[error("Gateway could not verify the payment")]
    VerificationFailed,

    #[error("Order is being processed by another request")]
    LockFailed,
}

impl CallbackError {
    /// Stable code surfaced as `?error=<code>`.
    pub fn code(&self) -> &'static str {
        match self {
            CallbackError::InvalidParams => "invalid_params",
            CallbackError::Unauthorized => "unauthorized",
            CallbackError::PaymentFailed => "payment_failed",
            CallbackError::ServerError => "server_error",
            CallbackError::VerificationFailed => "verification_failed",
            CallbackError::LockFailed => "lock_failed",
        }
    }
}

impl From<RepoError> for CallbackError {
    fn from(_: RepoError) -> Self {
        CallbackError::ServerError
    }
}

impl From<LockError> for CallbackError {
    fn from(_: LockError) -> Self {
        CallbackError::ServerError
    }
}

impl From<GatewayError> for CallbackError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected { .. } => CallbackError::VerificationFailed,
            GatewayError::Timeout
            | GatewayError::Transport(_)
            | GatewayError::InvalidResponse(_) => CallbackError::ServerError,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP-facing errors
// ─────────────────────────────────────────────────────────────────────────────

/// Application-level errors for JSON endpoints.
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(DomainError::AlreadyPaid(id)) => {
                AppError::Conflict(format!("Order {} is already paid", id))
            }
            RepoError::Domain(DomainError::ValidationError(msg)) => AppError::BadRequest(msg),
            RepoError::Domain(e) => AppError::BadRequest(e.to_string()),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
            RepoError::Conflict(e) => AppError::Conflict(e),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Gateway(err.to_string())
    }
}

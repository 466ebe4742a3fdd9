//! # Storefront Types
//!
//! Domain types and port traits for the storefront payments service.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Order, PaymentDetails, Session)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain, callback and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    Currency, LockLease, Order, OrderId, PaymentCommit, PaymentDetails, PaymentStatus, Session,
    UserId,
};
pub use dto::*;
pub use error::{AppError, CallbackError, DomainError, GatewayError, LockError, RepoError};
pub use exchange_rates::{ExchangeRateMatrix, format as format_price};
pub use ports::{
    GatewayAuthorization, GatewayVerification, PaymentGateway, PaymentIntent, PaymentLock,
    StorefrontRepository,
};

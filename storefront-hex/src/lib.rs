//! # Storefront Hex
//!
//! Application services, HTTP adapter and gateway client for the storefront.
//!
//! ## Architecture
//!
//! - `service` - Application service (payment reconciliation, pricing)
//! - `inbound/` - HTTP adapter (Axum server)
//! - `outbound/` - Payment gateway adapters (Zarinpal)
//!
//! The service is generic over `R: StorefrontRepository + PaymentLock` and
//! `G: PaymentGateway`, so storage and gateway are injected at compile time.

pub mod inbound;
pub mod openapi;
pub mod outbound;
pub mod service;


pub use service::StorefrontService;

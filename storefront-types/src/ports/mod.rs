//! Port traits (interfaces for adapters).
//!
//! These are the contracts that adapters must implement.
//! The application layer depends on these traits, not concrete implementations.

mod gateway;
mod lock;
mod repository;

pub use gateway::{GatewayAuthorization, GatewayVerification, PaymentGateway, PaymentIntent};
pub use lock::PaymentLock;
pub use repository::StorefrontRepository;

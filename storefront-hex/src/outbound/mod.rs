//! Outbound adapters for third-party payment gateways.

mod zarinpal;

pub use zarinpal::{GatewayCurrency, ZarinpalConfig, ZarinpalGateway};

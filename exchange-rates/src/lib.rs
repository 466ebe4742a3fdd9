//! Exchange Rates Library for Storefront Pricing
//!
//! Prices are stored in Toman and shown to shoppers in Toman, Dollar or Euro.
//! This crate owns the three pieces that make that possible:
//!
//! - [`Currency`] - the closed set of display currencies
//! - [`ExchangeRateMatrix`] - directed rates built once from configuration
//! - [`format`] - locale-aware display strings (`۱٬۲۳۴ تومان`, `$12.5`)
//!
//! # Example
//! ```
//! use exchange_rates::{Currency, ExchangeRateMatrix, format};
//!
//! let rates = ExchangeRateMatrix::empty()
//!     .with_rate(Currency::Dollar, Currency::Toman, 60_000.0)
//!     .unwrap();
//!
//! let toman = rates.convert(12.5, Currency::Dollar, Currency::Toman);
//! assert_eq!(format(toman, Currency::Toman), "۷۵۰٬۰۰۰ تومان");
//! assert_eq!(format(12.5, Currency::Dollar), "$12.5");
//! ```

mod currency;
mod format;
mod matrix;

pub use currency::{Currency, ParseCurrencyError};
pub use format::format;
pub use matrix::{ExchangeRateMatrix, RATE_VARS, RateError, RateVar};

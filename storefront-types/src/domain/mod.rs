//! Domain models for the storefront payments service.

pub mod ids;
pub mod order;
pub mod payment;
pub mod session;

pub use exchange_rates::Currency;
pub use ids::{OrderId, UserId};
pub use order::{Order, PaymentStatus};
pub use payment::{LockLease, PaymentCommit, PaymentDetails};
pub use session::Session;

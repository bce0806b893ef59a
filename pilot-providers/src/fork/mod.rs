//! Simulating calls on disposable forks of a live chain.

mod api;
pub use api::{Fork, ForkApi, ForkApiError, Tenderly, TransactionInfo};

mod provider;
pub use provider::{ForkError, ForkProvider, RATE_LIMITED_CODE};

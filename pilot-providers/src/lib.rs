#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]
//! # Pilot providers
//!
//! JSON-RPC clients that sit between an application and the user's wallet so the application
//! can act as a Safe avatar:
//!
//! - [`WrappingProvider`] answers as the avatar and re-encodes transactions for the route's
//!   authorization module.
//! - [`ForkProvider`] simulates state changing calls on a lazily created fork, taking a
//!   checkpoint before every sent transaction.
//! - [`PilotProvider`] picks the stack the active route needs, and [`Session`] records the
//!   simulated calls for a route.
//!
//! All of them implement [`ethers_providers::JsonRpcClient`] and can be used as the transport
//! of an `ethers_providers::Provider`.

pub mod config;
pub use config::{ForkOptions, TenderlyConfig};

pub mod events;
pub use events::{EventHub, EventKind, ProviderEvent, Subscription};

pub mod fork;
pub use fork::{
    Fork, ForkApi, ForkApiError, ForkError, ForkProvider, Tenderly, TransactionInfo,
    RATE_LIMITED_CODE,
};

mod wrapping;
pub use wrapping::{
    DirectExecution, DirectExecutionError, Submission, WrappingError, WrappingProvider,
};

mod chain;
pub use chain::{BuildError, PilotError, PilotProvider, PilotProviderBuilder};

pub mod session;
pub use session::{Recorded, Session, SessionError};

pub mod dry_run;
pub use dry_run::{check, DryRun};

mod params;

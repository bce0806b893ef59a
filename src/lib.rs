#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]
//! # Pilot
//!
//! Act as a Safe avatar from any application. Pilot sits between the application and the user's
//! wallet: calls made "as the avatar" are recorded and simulated on a disposable fork, can be
//! rewritten into clearer equivalents, and are finally wrapped for the Zodiac module that
//! authorizes the user to act for the avatar.
//!
//! The functionality is split across three crates, re-exported here:
//!
//! - [`core`]: routes, authorization modules and call wrapping
//! - [`providers`]: the JSON-RPC clients that intercept, simulate and wrap requests
//! - [`translations`]: rewrite rules for recorded calls
//!
//! ```no_run
//! use pilot::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run(route: Route) -> Result<(), Box<dyn std::error::Error>> {
//! let wallet = Http::from_str("http://localhost:8545")?;
//! let session = Session::new(wallet, Arc::new(Tenderly::new_from_env()?), route)?;
//!
//! let call = MetaTransaction::new("0xdddddddddddddddddddddddddddddddddddddddd".parse()?);
//! session.send(&call).await?;
//!
//! let translations = Translations::default();
//! pilot::auto_apply(&session, &translations).await?;
//! # Ok(())
//! # }
//! ```

pub use pilot_core as core;
pub use pilot_providers as providers;
pub use pilot_translations as translations;

mod translate;
pub use translate::{auto_apply, translate_call};

/// Easy imports of frequently used types
pub mod prelude {
    pub use super::{auto_apply, translate_call};

    pub use pilot_core::{
        module::{AuthorizationModule, Diagnosis},
        route::{Account, Connection, Route, Waypoint},
        types::{MetaTransaction, Operation, PrefixedAddress},
        wrap, WrapError,
    };

    pub use pilot_providers::{
        check, DryRun, EventKind, ForkApi, ForkOptions, ForkProvider, PilotProvider,
        ProviderEvent, Session, SessionError, Tenderly, TenderlyConfig, WrappingProvider,
    };

    pub use pilot_translations::{Applicable, Translation, TranslationOptions, Translations};

    pub use ethers_providers::{Http, JsonRpcClient};
    pub use std::str::FromStr;
}

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]
//! # Pilot translations
//!
//! Rewrite rules for recorded avatar calls. A [`Translation`] either rewrites a single call,
//! like unpacking a multicall into the calls it batches, or looks at the whole recorded batch,
//! like appending the acknowledgement a bridge-aware module expects after a bridge transfer.
//!
//! [`Translations`] runs the registered rules in order and memoizes per-call results.
//!
//! ```
//! use pilot_translations::{TranslationOptions, Translations};
//! use pilot_core::types::MetaTransaction;
//!
//! let translations = Translations::new(TranslationOptions::default());
//! let call = MetaTransaction::new("0xdddddddddddddddddddddddddddddddddddddddd".parse()?);
//! assert!(translations.find_applicable(&call, 1).is_none());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use ethers_core::types::Address;
use pilot_core::types::MetaTransaction;
use std::fmt::Debug;
use thiserror::Error;

pub mod bridge_aware;
pub use bridge_aware::BridgeAware;

pub mod multicall;
pub use multicall::UniswapMulticall;

mod engine;
pub use engine::{Applicable, TranslationOptions, Translations};

/// Reasons a rule could not read a call. The engine treats them as "not applicable".
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error(transparent)]
    Abi(#[from] ethers_core::abi::Error),

    #[error("unexpected {0} in decoded call")]
    UnexpectedToken(&'static str),
}

pub type Result<T, E = TranslationError> = std::result::Result<T, E>;

/// A rewrite rule for recorded calls.
///
/// Rules return `Ok(None)` for calls they do not recognize. Errors are never fatal, the engine
/// logs them and moves on to the next rule.
pub trait Translation: Debug + Send + Sync {
    /// Shown to the user next to the suggested rewrite
    fn title(&self) -> &str;

    /// Rewrites a single call.
    fn translate(
        &self,
        _call: &MetaTransaction,
        _chain_id: u64,
    ) -> Result<Option<Vec<MetaTransaction>>> {
        Ok(None)
    }

    /// Rewrites the whole batch recorded for `avatar`.
    fn translate_global(
        &self,
        _batch: &[MetaTransaction],
        _chain_id: u64,
        _avatar: Address,
    ) -> Result<Option<Vec<MetaTransaction>>> {
        Ok(None)
    }

    /// Whether the batch rewrite is applied without asking. Such rules must return `None` when
    /// run on their own output.
    fn auto_apply(&self) -> bool {
        false
    }
}

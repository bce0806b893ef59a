#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]
//! # Pilot core
//!
//! Data types shared across Pilot: the [`Route`](route::Route) describing how an initiator
//! reaches an avatar, conversion from the older flat connection records, and the [`wrap`]
//! function that encodes an avatar call for the route's authorization module.
//!
//! ```
//! use pilot_core::{route::from_legacy, types::MetaTransaction, wrap};
//! # use pilot_core::route::{LegacyConnection, ModuleType, ProviderType};
//! # let legacy = LegacyConnection {
//! #     id: "1".into(), label: "".into(), chain_id: 1,
//! #     module_address: "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".into(),
//! #     avatar_address: "0xcccccccccccccccccccccccccccccccccccccccc".into(),
//! #     pilot_address: "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".into(),
//! #     provider_type: ProviderType::InjectedWallet, module_type: Some(ModuleType::RolesV1),
//! #     role_id: "1".into(), multisend: None, multisend_call_only: None, last_used: None,
//! # };
//! let route = from_legacy(&legacy).expect("valid avatar");
//! let call = MetaTransaction::new("0xdddddddddddddddddddddddddddddddddddddddd".parse()?);
//! let wrapped = wrap(&call, &route, true)?;
//! assert_eq!(wrapped.to, route.module_address().unwrap());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod module;
pub use module::{AuthorizationModule, Diagnosis, WrapError};

pub mod route;

pub mod types;

mod wrap;
pub use wrap::wrap;

/// Re-export of ethers-core for downstream crates
pub use ethers_core;

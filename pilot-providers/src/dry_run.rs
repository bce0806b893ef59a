//! Checks whether a route's module would accept calls from the initiator, without sending any.
//!
//! A test call to the zero address is wrapped for the route's module and estimated against the
//! live chain. A correctly configured module gets as far as rejecting the call's target; any
//! other revert points at a configuration problem.

use ethers_core::types::{Address, Bytes, TransactionRequest};
use ethers_providers::{JsonRpcClient, RpcError};
use pilot_core::{
    module::{AuthorizationModule, Diagnosis},
    route::Route,
    types::{format_address, MetaTransaction},
    wrap, WrapError,
};
use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard,
    },
};
use tracing::{debug, warn};

pub const UNEXPECTED_ERROR: &str = "Unexpected error";

/// The chain did not answer, so nothing is known about the route yet.
#[derive(Debug)]
struct Incomplete;

/// Runs the permission check for `route` against the chain behind `client`.
///
/// Returns `None` when no problem was found, otherwise a message for the user.
pub async fn check<C: JsonRpcClient>(client: &C, route: &Route) -> Option<String> {
    diagnose(client, route).await.unwrap_or_else(|Incomplete| Some(UNEXPECTED_ERROR.to_string()))
}

async fn diagnose<C: JsonRpcClient>(
    client: &C,
    route: &Route,
) -> Result<Option<String>, Incomplete> {
    let Some(initiator) = route.initiator_address() else {
        return Ok(Some("No pilot account connected".to_string()))
    };
    let module = match AuthorizationModule::from_route(route) {
        Ok(module) => module,
        // nothing to check for avatars owned by the initiator
        Err(WrapError::NoModule) => return Ok(None),
        Err(err) => return Ok(Some(err.to_string())),
    };
    let avatar = route.avatar_address();
    if initiator.is_zero() || avatar.is_zero() || module.address().is_zero() {
        return Ok(Some("Addresses must not be the zero address".to_string()))
    }

    for (what, address) in [("Module", module.address()), ("Avatar", avatar)] {
        match is_contract(client, address).await {
            Ok(true) => {}
            Ok(false) => {
                let address = format_address(&address);
                return Ok(Some(format!("{what} address {address} is not a contract")))
            }
            Err(err) => {
                warn!(target: "pilot::dry_run", %err, "could not fetch code");
                return Err(Incomplete)
            }
        }
    }

    let call = MetaTransaction::new(Address::zero()).data(vec![0u8; 4]);
    let wrapped = match wrap(&call, route, false) {
        Ok(wrapped) => wrapped,
        Err(err) => return Ok(Some(err.to_string())),
    };
    let tx: TransactionRequest = wrapped.into();
    let err = match client.request::<_, serde_json::Value>("eth_estimateGas", [tx]).await {
        // a module that lets the call through cannot be misconfigured for it
        Ok(_) => return Ok(None),
        Err(err) => err,
    };

    let Some(revert) = err.as_error_response().and_then(|e| e.as_revert_data()) else {
        warn!(target: "pilot::dry_run", %err, "estimate failed without revert data");
        return Err(Incomplete)
    };
    let diagnosis = module.classify_revert(&revert);
    debug!(target: "pilot::dry_run", ?diagnosis, "classified revert");
    Ok(message(diagnosis, &revert))
}

fn message(diagnosis: Diagnosis, revert: &Bytes) -> Option<String> {
    match diagnosis {
        Diagnosis::Expected => None,
        Diagnosis::MissingRole(role) => {
            Some(format!("The pilot account is not a member of role {role}"))
        }
        Diagnosis::MultisendNotConfigured => Some(
            "The Roles modifier has no multisend address set. Call setMultisend on the Roles \
             modifier with the address of the MultiSend contract."
                .to_string(),
        ),
        Diagnosis::NotEnabled => Some("Module not authorized".to_string()),
        Diagnosis::Reason(reason) => Some(reason),
        Diagnosis::Unknown => {
            warn!(target: "pilot::dry_run", %revert, "could not decode revert");
            Some(UNEXPECTED_ERROR.to_string())
        }
    }
}

async fn is_contract<C: JsonRpcClient>(client: &C, address: Address) -> Result<bool, C::Error> {
    let code: Bytes = client.request("eth_getCode", (address, "latest")).await?;
    Ok(!code.is_empty())
}

/// Inputs a dry run depends on. The check runs again whenever one of them changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DryRunKey {
    pub initiator: Option<Address>,
    pub module: Option<Address>,
    pub avatar: Address,
    pub role: Option<String>,
    pub chain_id: Option<u64>,
}

impl DryRunKey {
    pub fn from_route(route: &Route) -> Self {
        let role = route.module_waypoint().and_then(|w| match &w.connection {
            Some(pilot_core::route::Connection::IsMember { roles, .. }) => roles.first().cloned(),
            _ => None,
        });
        Self {
            initiator: route.initiator_address(),
            module: route.module_address(),
            avatar: route.avatar_address(),
            role,
            chain_id: route.chain_id(),
        }
    }
}

#[derive(Debug, Default)]
struct Outcome {
    key: Option<DryRunKey>,
    error: Option<String>,
}

/// Keeps the dry run result in sync with a route being edited.
///
/// Results of checks that were overtaken by newer input are dropped, so the stored error always
/// belongs to the latest route.
#[derive(Debug)]
pub struct DryRun<C> {
    client: C,
    generation: AtomicU64,
    outcome: Mutex<Outcome>,
}

impl<C: JsonRpcClient> DryRun<C> {
    pub fn new(client: C) -> Self {
        Self { client, generation: AtomicU64::new(0), outcome: Mutex::new(Outcome::default()) }
    }

    fn lock(&self) -> MutexGuard<'_, Outcome> {
        self.outcome.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The error of the latest completed check
    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// Checks `route` unless its inputs match the last completed check. Checks the chain did
    /// not answer are never reused.
    ///
    /// Returns `None` if a newer call to `update` started while this one was running; its
    /// result is discarded.
    pub async fn update(&self, route: &Route) -> Option<Option<String>> {
        let key = DryRunKey::from_route(route);
        {
            let outcome = self.lock();
            if outcome.key.as_ref() == Some(&key) {
                return Some(outcome.error.clone())
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let result = diagnose(&self.client, route).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(target: "pilot::dry_run", "discarding stale result");
            return None
        }

        let mut outcome = self.lock();
        let error = match result {
            Ok(error) => {
                outcome.key = Some(key);
                error
            }
            // shown, but not reused: the next update asks the chain again
            Err(Incomplete) => {
                outcome.key = None;
                Some(UNEXPECTED_ERROR.to_string())
            }
        };
        outcome.error = error.clone();
        Some(error)
    }
}

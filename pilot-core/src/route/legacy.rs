//! Conversion between [`Route`]s and the flat connection records older versions persisted.
//!
//! A [`LegacyConnection`] can describe at most one module between the pilot and the avatar, so
//! only routes with up to three waypoints convert back.

use super::{Account, Connection, ProviderType, RolesVersion, Route, Waypoint};
use crate::types::{format_address, parse_address, Address, PrefixedAddress};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Module kinds known to legacy connection records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleType {
    #[serde(rename = "roles_v1")]
    RolesV1,
    #[serde(rename = "roles_v2")]
    RolesV2,
    #[serde(rename = "delay")]
    Delay,
}

/// The historical, flattened route record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyConnection {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub chain_id: u64,
    /// Empty when the avatar is owned directly by the pilot.
    #[serde(default)]
    pub module_address: String,
    pub avatar_address: String,
    /// Empty until a signer has been connected.
    #[serde(default)]
    pub pilot_address: String,
    #[serde(default)]
    pub provider_type: ProviderType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_type: Option<ModuleType>,
    #[serde(default)]
    pub role_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multisend: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multisend_call_only: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<u64>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotRepresentable {
    #[error("not representable: route has {0} waypoints, legacy connections support at most 3")]
    TooManyWaypoints(usize),

    #[error("not representable: {0} accounts cannot be a legacy module")]
    UnsupportedModule(&'static str),

    #[error("not representable: avatar is not qualified with a chain")]
    ChainAgnosticAvatar,
}

/// Builds a route from a legacy record.
///
/// Returns `None` if the avatar address is not a valid address, or if the chain is not one Pilot
/// can qualify addresses for.
pub fn from_legacy(legacy: &LegacyConnection) -> Option<Route> {
    let chain = legacy.chain_id;
    let avatar = PrefixedAddress::new(chain, parse_address(&legacy.avatar_address).ok()?).ok()?;
    let initiator = parse_address(&legacy.pilot_address).ok().map(PrefixedAddress::eoa);

    let module = match (legacy.module_type, parse_address(&legacy.module_address)) {
        (Some(ModuleType::Delay), Ok(address)) => Some(Account::Delay { chain, address }),
        (Some(ModuleType::RolesV1), Ok(address)) => Some(Account::Roles {
            chain,
            address,
            version: RolesVersion::V1,
            multisend: legacy.multisend,
            multisend_call_only: legacy.multisend_call_only,
        }),
        (Some(ModuleType::RolesV2), Ok(address)) => Some(Account::Roles {
            chain,
            address,
            version: RolesVersion::V2,
            multisend: legacy.multisend,
            multisend_call_only: legacy.multisend_call_only,
        }),
        _ => None,
    };

    let waypoints = match initiator {
        Some(initiator) => {
            let start = Waypoint::start(Account::Eoa { address: initiator.address() });
            let mut waypoints = vec![start];
            let avatar_connection = match module {
                Some(module) => {
                    let module_prefixed = PrefixedAddress::new(chain, module.address()).ok()?;
                    let connection = match module {
                        Account::Roles { .. } => Connection::IsMember {
                            from: initiator,
                            roles: Some(legacy.role_id.clone())
                                .filter(|r| !r.is_empty())
                                .into_iter()
                                .collect(),
                        },
                        _ => Connection::IsEnabled { from: initiator },
                    };
                    waypoints.push(Waypoint::new(module, connection));
                    Connection::IsEnabled { from: module_prefixed }
                }
                None => Connection::Owns { from: initiator },
            };
            waypoints.push(Waypoint::new(
                Account::Safe { chain, address: avatar.address() },
                avatar_connection,
            ));
            Some(waypoints)
        }
        None => None,
    };

    Some(Route {
        id: legacy.id.clone(),
        label: legacy.label.clone(),
        initiator,
        avatar,
        waypoints,
        provider_type: Some(legacy.provider_type),
        last_used: legacy.last_used,
    })
}

/// Flattens a route into a legacy record.
pub fn to_legacy(route: &Route) -> Result<LegacyConnection, NotRepresentable> {
    let waypoint_count = route.waypoints.as_ref().map_or(0, Vec::len);
    if waypoint_count > 3 {
        return Err(NotRepresentable::TooManyWaypoints(waypoint_count))
    }
    let chain_id = route.chain_id().ok_or(NotRepresentable::ChainAgnosticAvatar)?;

    let mut legacy = LegacyConnection {
        id: route.id.clone(),
        label: route.label.clone(),
        chain_id,
        module_address: String::new(),
        avatar_address: format_address(&route.avatar_address()),
        pilot_address: route.initiator_address().as_ref().map(format_address).unwrap_or_default(),
        provider_type: route.provider_type.unwrap_or_default(),
        module_type: None,
        role_id: String::new(),
        multisend: None,
        multisend_call_only: None,
        last_used: route.last_used,
    };

    if let Some(waypoint) = route.module_waypoint() {
        legacy.module_address = format_address(&waypoint.account.address());
        match &waypoint.account {
            Account::Roles { version, multisend, multisend_call_only, .. } => {
                legacy.module_type = Some(match version {
                    RolesVersion::V1 => ModuleType::RolesV1,
                    RolesVersion::V2 => ModuleType::RolesV2,
                });
                legacy.multisend = *multisend;
                legacy.multisend_call_only = *multisend_call_only;
                if let Some(Connection::IsMember { roles, .. }) = &waypoint.connection {
                    legacy.role_id = roles.first().cloned().unwrap_or_default();
                }
            }
            Account::Delay { .. } => legacy.module_type = Some(ModuleType::Delay),
            other => return Err(NotRepresentable::UnsupportedModule(other.kind())),
        }
    }

    Ok(legacy)
}

impl TryFrom<&Route> for LegacyConnection {
    type Error = NotRepresentable;

    fn try_from(route: &Route) -> Result<Self, Self::Error> {
        to_legacy(route)
    }
}

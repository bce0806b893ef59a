//! The route model: how a signing key reaches the avatar it wants to act as.
//!
//! A [`Route`] is an ordered list of [`Waypoint`]s. The first waypoint is the initiator's own
//! account; every later waypoint carries the [`Connection`] through which the previous account
//! controls it. The last waypoint is always the avatar.
//!
//! ```text
//! EOA 0xaaa ──IS_MEMBER(role)──▶ Roles 0xbbb ──IS_ENABLED──▶ Safe 0xccc
//! ```

pub mod legacy;
pub use legacy::{from_legacy, to_legacy, LegacyConnection, ModuleType, NotRepresentable};

mod migrate;
pub use migrate::{migrate_legacy, MigrationReport};

mod store;
pub use store::{MemoryStore, RouteStore};

use crate::types::{Address, PrefixedAddress};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version of a Zodiac Roles modifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RolesVersion {
    V1 = 1,
    V2 = 2,
}

impl From<RolesVersion> for u8 {
    fn from(version: RolesVersion) -> Self {
        version as u8
    }
}

impl TryFrom<u8> for RolesVersion {
    type Error = RouteError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(RolesVersion::V1),
            2 => Ok(RolesVersion::V2),
            other => Err(RouteError::UnknownRolesVersion(other)),
        }
    }
}

/// One account on the path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Account {
    #[serde(rename = "EOA")]
    Eoa { address: Address },
    #[serde(rename = "SAFE")]
    Safe { chain: u64, address: Address },
    #[serde(rename = "ROLES")]
    Roles {
        chain: u64,
        address: Address,
        version: RolesVersion,
        /// MultiSend helper the modifier is configured to unpack
        #[serde(default, skip_serializing_if = "Option::is_none")]
        multisend: Option<Address>,
        /// Call-only MultiSend helper, kept apart from `multisend`
        #[serde(default, rename = "multisendCallOnly", skip_serializing_if = "Option::is_none")]
        multisend_call_only: Option<Address>,
    },
    #[serde(rename = "DELAY")]
    Delay { chain: u64, address: Address },
}

impl Account {
    pub fn address(&self) -> Address {
        match self {
            Account::Eoa { address } |
            Account::Safe { address, .. } |
            Account::Roles { address, .. } |
            Account::Delay { address, .. } => *address,
        }
    }

    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Account::Eoa { .. } => None,
            Account::Safe { chain, .. } |
            Account::Roles { chain, .. } |
            Account::Delay { chain, .. } => Some(*chain),
        }
    }

    pub fn prefixed_address(&self) -> Result<PrefixedAddress, crate::types::AddressError> {
        match self.chain_id() {
            Some(chain) => PrefixedAddress::new(chain, self.address()),
            None => Ok(PrefixedAddress::eoa(self.address())),
        }
    }

    /// Whether this account is an authorization module rather than a holder of funds.
    pub fn is_module(&self) -> bool {
        matches!(self, Account::Roles { .. } | Account::Delay { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Account::Eoa { .. } => "EOA",
            Account::Safe { .. } => "SAFE",
            Account::Roles { .. } => "ROLES",
            Account::Delay { .. } => "DELAY",
        }
    }
}

/// How the previous waypoint reaches the current one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Connection {
    /// `from` is an owner of the account
    Owns { from: PrefixedAddress },
    /// `from` is enabled as a module on the account
    IsEnabled { from: PrefixedAddress },
    /// `from` is a member of `roles` on a Roles modifier
    IsMember {
        from: PrefixedAddress,
        #[serde(default)]
        roles: Vec<String>,
    },
}

impl Connection {
    pub fn origin(&self) -> &PrefixedAddress {
        match self {
            Connection::Owns { from } |
            Connection::IsEnabled { from } |
            Connection::IsMember { from, .. } => from,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Waypoint {
    pub account: Account,
    /// Absent on the starting waypoint only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<Connection>,
}

impl Waypoint {
    pub fn start(account: Account) -> Self {
        Self { account, connection: None }
    }

    pub fn new(account: Account, connection: Connection) -> Self {
        Self { account, connection: Some(connection) }
    }
}

/// Which transport backs the initiator's signatures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ProviderType {
    /// Remote signer reached through a relay
    WalletConnect = 0,
    /// Browser-injected wallet
    #[default]
    InjectedWallet = 1,
}

impl From<ProviderType> for u8 {
    fn from(provider: ProviderType) -> Self {
        provider as u8
    }
}

impl TryFrom<u8> for ProviderType {
    type Error = RouteError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ProviderType::WalletConnect),
            1 => Ok(ProviderType::InjectedWallet),
            other => Err(RouteError::UnknownProviderType(other)),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("unknown roles modifier version: {0}")]
    UnknownRolesVersion(u8),

    #[error("unknown provider type: {0}")]
    UnknownProviderType(u8),

    #[error("route has no waypoints")]
    NoWaypoints,

    #[error("first waypoint must be the initiator")]
    InitiatorMismatch,

    #[error("last waypoint must be the avatar")]
    AvatarMismatch,

    #[error("waypoint {0} has no connection")]
    MissingConnection(usize),

    #[error("waypoint {0} is not reached from waypoint {1}")]
    BrokenConnection(usize, usize),
}

/// A reusable authorization path from an initiator to an avatar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator: Option<PrefixedAddress>,
    pub avatar: PrefixedAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waypoints: Option<Vec<Waypoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<ProviderType>,
    /// Unix timestamp in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<u64>,
}

impl Route {
    pub fn chain_id(&self) -> Option<u64> {
        self.avatar.chain_id()
    }

    pub fn avatar_address(&self) -> Address {
        self.avatar.address()
    }

    pub fn initiator_address(&self) -> Option<Address> {
        self.initiator.map(|i| i.address())
    }

    /// The intermediary waypoint directly in front of the avatar, if the avatar is reached
    /// through a module rather than owned by the initiator.
    pub fn module_waypoint(&self) -> Option<&Waypoint> {
        let waypoints = self.waypoints.as_ref()?;
        if waypoints.len() < 3 {
            return None
        }
        waypoints.get(waypoints.len() - 2)
    }

    pub fn module(&self) -> Option<&Account> {
        self.module_waypoint().map(|w| &w.account).filter(|a| a.is_module())
    }

    pub fn module_address(&self) -> Option<Address> {
        self.module().map(Account::address)
    }

    /// Marks the route as activated at `now` (unix millis).
    pub fn touch(&mut self, now: u64) {
        self.last_used = Some(now);
    }

    /// Checks the waypoint invariants: the path starts at the initiator, ends at the avatar and
    /// every hop is connected from the previous account.
    pub fn validate(&self) -> Result<(), RouteError> {
        let Some(waypoints) = self.waypoints.as_ref() else { return Ok(()) };
        let (first, last) = match (waypoints.first(), waypoints.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(RouteError::NoWaypoints),
        };
        if Some(first.account.address()) != self.initiator_address() {
            return Err(RouteError::InitiatorMismatch)
        }
        if waypoints.len() < 2 || last.account.address() != self.avatar_address() {
            return Err(RouteError::AvatarMismatch)
        }
        for (i, pair) in waypoints.windows(2).enumerate() {
            let connection =
                pair[1].connection.as_ref().ok_or(RouteError::MissingConnection(i + 1))?;
            if connection.origin().address() != pair[0].account.address() {
                return Err(RouteError::BrokenConnection(i + 1, i))
            }
        }
        Ok(())
    }
}

//! Zodiac authorization modules sitting between the pilot and the avatar.
//!
//! Each [`AuthorizationModule`] variant knows how to encode an avatar call for its contract and
//! how to read the reverts that contract produces.

use crate::{
    route::{Account, Connection, RolesVersion, Route},
    types::{Address, Bytes, MetaTransaction, H256, U256},
};
use ethers_core::{
    abi::{self, parse_abi, Abi, ParamType, Token},
    utils::id,
};
use once_cell::sync::Lazy;
use thiserror::Error;

const ROLES_V1_EXEC: &str = "execTransactionWithRole(address,uint256,bytes,uint8,uint16,bool)";
const ROLES_V2_EXEC: &str = "execTransactionWithRole(address,uint256,bytes,uint8,bytes32,bool)";
const DELAY_EXEC: &str = "execTransactionFromModule(address,uint256,bytes,uint8)";

/// Custom errors of the Roles v1 modifier (`Roles.sol`, `Permissions.sol`).
static ROLES_V1_ERRORS: Lazy<Abi> = Lazy::new(|| {
    parse_abi(&[
        "error NoMembership()",
        "error UnacceptableMultiSendOffset()",
        "error TargetAddressNotAllowed()",
        "error FunctionNotAllowed()",
        "error SendNotAllowed()",
        "error DelegateCallNotAllowed()",
        "error FunctionSignatureTooShort()",
        "error ParameterNotAllowed()",
        "error ParameterNotOneOfAllowed()",
        "error ParameterLessThanAllowed()",
        "error ParameterGreaterThanAllowed()",
        "error ModuleTransactionFailed()",
        "error NotAuthorized(address module)",
    ])
    .expect("could not parse ABI")
});

/// Custom errors of the Roles v2 modifier.
static ROLES_V2_ERRORS: Lazy<Abi> = Lazy::new(|| {
    parse_abi(&[
        "error NoMembership()",
        "error ConditionViolation(uint8 status, bytes32 info)",
        "error ModuleTransactionFailed()",
        "error NotAuthorized(address module)",
    ])
    .expect("could not parse ABI")
});

/// Custom errors of the Delay modifier.
static DELAY_ERRORS: Lazy<Abi> =
    Lazy::new(|| parse_abi(&["error NotAuthorized(address module)"]).expect("could not parse ABI"));

/// `Error(string)`
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
/// `Panic(uint256)`
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// The `Status` value Roles v2 reports when the call target is not scoped for the role.
const ROLES_V2_TARGET_ADDRESS_NOT_ALLOWED: u8 = 2;

/// Names of the Roles v2 `Status` enum, indexed by value.
const ROLES_V2_STATUS: &[&str] = &[
    "Ok",
    "DelegateCallNotAllowed",
    "TargetAddressNotAllowed",
    "FunctionNotAllowed",
    "SendNotAllowed",
    "OrViolation",
    "NorViolation",
    "ParameterNotAllowed",
    "ParameterLessThanAllowed",
    "ParameterGreaterThanAllowed",
    "ParameterNotAMatch",
    "NotEveryArrayElementPasses",
    "NoArrayElementPasses",
    "ParameterNotSubsetOfAllowed",
    "BitmaskOverflow",
    "BitmaskNotAllowed",
    "CustomConditionViolation",
    "AllowanceExceeded",
    "CallAllowanceExceeded",
    "EtherAllowanceExceeded",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WrapError {
    /// The avatar is owned by the initiator directly; calls go through direct execution.
    #[error("route has no module, use direct execution")]
    NoModule,

    #[error("route has no initiator")]
    MissingInitiator,

    #[error("unsupported module type: {0}")]
    UnsupportedModuleType(&'static str),

    #[error("route does not name a role for the roles modifier")]
    MissingRole,

    #[error("invalid role id {0:?}")]
    InvalidRole(String),
}

/// How a module revert should be read when probing a route's permissions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnosis {
    /// The module got as far as checking the call target, so the route itself works.
    Expected,
    /// The initiator is not a member of the role.
    MissingRole(String),
    /// Roles v1 has no multisend address configured.
    MultisendNotConfigured,
    /// The initiator is not enabled as a module.
    NotEnabled,
    /// Any other decodable revert.
    Reason(String),
    /// Revert data that could not be decoded.
    Unknown,
}

/// The module capability through which the pilot reaches the avatar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationModule {
    RolesV1 { address: Address, role: u16 },
    RolesV2 { address: Address, role: H256 },
    Delay { address: Address },
}

impl AuthorizationModule {
    /// Resolves the module the route passes through.
    pub fn from_route(route: &Route) -> Result<Self, WrapError> {
        let waypoints = route.waypoints.as_ref().ok_or(WrapError::MissingInitiator)?;
        if waypoints.len() < 3 {
            return Err(WrapError::NoModule)
        }
        let waypoint = &waypoints[waypoints.len() - 2];
        match &waypoint.account {
            Account::Roles { address, version, .. } => {
                let role = match &waypoint.connection {
                    Some(Connection::IsMember { roles, .. }) => roles.first(),
                    _ => None,
                }
                .ok_or(WrapError::MissingRole)?;
                Ok(match version {
                    RolesVersion::V1 => AuthorizationModule::RolesV1 {
                        address: *address,
                        role: role.parse().map_err(|_| WrapError::InvalidRole(role.clone()))?,
                    },
                    RolesVersion::V2 => AuthorizationModule::RolesV2 {
                        address: *address,
                        role: encode_role_key(role)?,
                    },
                })
            }
            Account::Delay { address, .. } => Ok(AuthorizationModule::Delay { address: *address }),
            other => Err(WrapError::UnsupportedModuleType(other.kind())),
        }
    }

    pub fn address(&self) -> Address {
        match self {
            AuthorizationModule::RolesV1 { address, .. } |
            AuthorizationModule::RolesV2 { address, .. } |
            AuthorizationModule::Delay { address } => *address,
        }
    }

    /// ABI encodes `call` as an invocation of this module's exec function.
    pub fn encode(&self, call: &MetaTransaction, revert_on_error: bool) -> Bytes {
        let mut tokens = vec![
            Token::Address(call.to),
            Token::Uint(call.value),
            Token::Bytes(call.data.to_vec()),
            Token::Uint(U256::from(u8::from(call.operation))),
        ];
        let signature = match self {
            AuthorizationModule::RolesV1 { role, .. } => {
                tokens.push(Token::Uint(U256::from(*role)));
                tokens.push(Token::Bool(revert_on_error));
                ROLES_V1_EXEC
            }
            AuthorizationModule::RolesV2 { role, .. } => {
                tokens.push(Token::FixedBytes(role.as_bytes().to_vec()));
                tokens.push(Token::Bool(revert_on_error));
                ROLES_V2_EXEC
            }
            // the delay only enforces a cooldown, there is no role to pass
            AuthorizationModule::Delay { .. } => DELAY_EXEC,
        };
        let mut data = id(signature).to_vec();
        data.extend(abi::encode(&tokens));
        data.into()
    }

    /// Reads revert data produced by this module.
    pub fn classify_revert(&self, data: &[u8]) -> Diagnosis {
        if data.len() < 4 {
            return Diagnosis::Unknown
        }
        let (selector, args) = data.split_at(4);

        if selector == &ERROR_STRING_SELECTOR[..] {
            return match abi::decode(&[ParamType::String], args) {
                Ok(tokens) => match tokens.into_iter().next() {
                    Some(Token::String(reason)) if reason == "Module not authorized" => {
                        Diagnosis::NotEnabled
                    }
                    Some(Token::String(reason)) => Diagnosis::Reason(reason),
                    _ => Diagnosis::Unknown,
                },
                Err(_) => Diagnosis::Unknown,
            }
        }
        if selector == &PANIC_SELECTOR[..] {
            return match abi::decode(&[ParamType::Uint(256)], args) {
                Ok(tokens) => match tokens.first() {
                    Some(Token::Uint(code)) => Diagnosis::Reason(format!("panic code {code:#x}")),
                    _ => Diagnosis::Unknown,
                },
                Err(_) => Diagnosis::Unknown,
            }
        }

        let errors = match self {
            AuthorizationModule::RolesV1 { .. } => &*ROLES_V1_ERRORS,
            AuthorizationModule::RolesV2 { .. } => &*ROLES_V2_ERRORS,
            AuthorizationModule::Delay { .. } => &*DELAY_ERRORS,
        };
        let Some(error) = errors
            .errors
            .values()
            .flatten()
            .find(|error| &error.signature().as_bytes()[..4] == selector)
        else {
            return Diagnosis::Unknown
        };
        let Ok(tokens) = error.decode(args) else { return Diagnosis::Unknown };

        match (self, error.name.as_str()) {
            (_, "NoMembership") => Diagnosis::MissingRole(self.role_label()),
            (_, "NotAuthorized") => Diagnosis::NotEnabled,
            (AuthorizationModule::RolesV1 { .. }, "TargetAddressNotAllowed") => Diagnosis::Expected,
            (AuthorizationModule::RolesV1 { .. }, "UnacceptableMultiSendOffset") => {
                Diagnosis::MultisendNotConfigured
            }
            (AuthorizationModule::RolesV2 { .. }, "ConditionViolation") => {
                // uint8 words are not range checked when decoding
                let status = match tokens.first().cloned() {
                    Some(Token::Uint(status)) => match u8::try_from(status) {
                        Ok(status) => status,
                        Err(_) => return Diagnosis::Unknown,
                    },
                    _ => return Diagnosis::Unknown,
                };
                if status == ROLES_V2_TARGET_ADDRESS_NOT_ALLOWED {
                    Diagnosis::Expected
                } else {
                    let name = ROLES_V2_STATUS.get(status as usize).copied().unwrap_or("Unknown");
                    Diagnosis::Reason(format!("ConditionViolation({name})"))
                }
            }
            (_, name) => Diagnosis::Reason(format!("{name}()")),
        }
    }

    /// Human readable role for messages.
    pub fn role_label(&self) -> String {
        match self {
            AuthorizationModule::RolesV1 { role, .. } => role.to_string(),
            AuthorizationModule::RolesV2 { role, .. } => decode_role_key(role),
            AuthorizationModule::Delay { .. } => String::new(),
        }
    }
}

/// Encodes a Roles v2 role key. A 32 byte hex string is taken as the key itself, anything else
/// is treated as a short string and right padded, like `formatBytes32String`.
pub fn encode_role_key(role: &str) -> Result<H256, WrapError> {
    if let Some(hex_part) = role.strip_prefix("0x") {
        if hex_part.len() == 64 {
            let bytes = hex::decode(hex_part).map_err(|_| WrapError::InvalidRole(role.into()))?;
            return Ok(H256::from_slice(&bytes))
        }
    }
    let bytes = role.as_bytes();
    if bytes.is_empty() || bytes.len() > 31 {
        return Err(WrapError::InvalidRole(role.into()))
    }
    let mut key = [0u8; 32];
    key[..bytes.len()].copy_from_slice(bytes);
    Ok(H256(key))
}

/// Inverse of [`encode_role_key`] for keys that hold a short string, hex otherwise.
pub fn decode_role_key(key: &H256) -> String {
    let bytes = key.as_bytes();
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    match std::str::from_utf8(&bytes[..end]) {
        Ok(s) if !s.is_empty() && bytes[end..].iter().all(|b| *b == 0) => s.to_string(),
        _ => format!("{key:?}"),
    }
}

use super::chain::{chain_by_short_name, chain_info};
use ethers_core::types::Address;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Prefix of chain-agnostic externally owned accounts.
pub const EOA_PREFIX: &str = "eoa";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),

    #[error("address {0:?} is missing a chain prefix")]
    MissingPrefix(String),

    #[error("unknown chain prefix: {0}")]
    UnknownPrefix(String),

    #[error("unsupported chain id: {0}")]
    UnsupportedChain(u64),
}

/// Parses a `0x` prefixed, 20 byte hex address. Mixed case input is accepted without checksum
/// validation.
pub fn parse_address(s: &str) -> Result<Address, AddressError> {
    let hex_part = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| AddressError::InvalidAddress(s.to_string()))?;
    if hex_part.len() != 40 {
        return Err(AddressError::InvalidAddress(s.to_string()))
    }
    let bytes = hex::decode(hex_part).map_err(|_| AddressError::InvalidAddress(s.to_string()))?;
    Ok(Address::from_slice(&bytes))
}

pub fn is_valid_address(s: &str) -> bool {
    parse_address(s).is_ok()
}

/// Lower-case `0x` hex rendering of an address.
pub fn format_address(address: &Address) -> String {
    format!("{address:?}")
}

/// An address qualified with the chain it lives on, rendered as `<shortName>:<address>`.
///
/// Externally owned accounts can sign on any chain and carry the `eoa` prefix instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrefixedAddress {
    chain: Option<u64>,
    address: Address,
}

impl PrefixedAddress {
    /// Qualifies `address` with a supported chain.
    pub fn new(chain_id: u64, address: Address) -> Result<Self, AddressError> {
        chain_info(chain_id).ok_or(AddressError::UnsupportedChain(chain_id))?;
        Ok(Self { chain: Some(chain_id), address })
    }

    pub fn eoa(address: Address) -> Self {
        Self { chain: None, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// `None` for chain-agnostic addresses.
    pub fn chain_id(&self) -> Option<u64> {
        self.chain
    }

    pub fn is_eoa(&self) -> bool {
        self.chain.is_none()
    }

    fn prefix(&self) -> &'static str {
        self.chain.and_then(chain_info).map(|c| c.short_name).unwrap_or(EOA_PREFIX)
    }
}

impl fmt::Display for PrefixedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}", self.prefix(), self.address)
    }
}

impl FromStr for PrefixedAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, address) =
            s.split_once(':').ok_or_else(|| AddressError::MissingPrefix(s.to_string()))?;
        let address = parse_address(address)?;
        if prefix.eq_ignore_ascii_case(EOA_PREFIX) {
            return Ok(Self::eoa(address))
        }
        let chain =
            chain_by_short_name(prefix).ok_or_else(|| AddressError::UnknownPrefix(prefix.into()))?;
        Ok(Self { chain: Some(chain.id), address })
    }
}

impl Serialize for PrefixedAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PrefixedAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

//! Primitive types shared by every Pilot component.

mod call;
pub use call::{CallError, EncodedCall, MetaTransaction, Operation};

pub mod chain;
pub use chain::{chain_by_short_name, chain_info, ChainInfo};

mod prefixed;
pub use prefixed::{
    format_address, is_valid_address, parse_address, AddressError, PrefixedAddress, EOA_PREFIX,
};

// re-export the ethers primitives used throughout the API
pub use ethers_core::types::{Address, Bytes, H256, U256};

mod bridge_aware;
mod multicall;

use ethers_core::{
    abi::{encode, Token},
    types::Address,
    utils::id,
};

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

/// Calldata for `signature` with `args`
pub fn calldata(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = id(signature).to_vec();
    data.extend(encode(args));
    data
}

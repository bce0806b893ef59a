//! Unpacks Uniswap style `multicall` batches into the calls they contain.

use crate::{Result, Translation, TranslationError};
use ethers_core::abi::{parse_abi, Abi, Token};
use once_cell::sync::Lazy;
use pilot_core::types::MetaTransaction;

/// The three overloads used by the Uniswap V3 routers and position manager.
static MULTICALL: Lazy<Abi> = Lazy::new(|| {
    parse_abi(&[
        "function multicall(bytes[] data)",
        "function multicall(uint256 deadline, bytes[] data)",
        "function multicall(bytes32 previousBlockhash, bytes[] data)",
    ])
    .expect("could not parse ABI")
});

/// Replaces a `multicall` with its inner calls, so each can be checked against the role's
/// permissions on its own.
///
/// Inner calls keep the target, value and operation of the outer call.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniswapMulticall;

impl UniswapMulticall {
    fn inner_calls(data: &[u8]) -> Result<Option<Vec<Vec<u8>>>> {
        let Some(selector) = data.get(..4) else { return Ok(None) };
        let Some(function) = MULTICALL.functions().find(|f| f.short_signature() == selector) else {
            return Ok(None)
        };
        let tokens = function.decode_input(&data[4..])?;
        match tokens.into_iter().last() {
            Some(Token::Array(calls)) => calls
                .into_iter()
                .map(|call| match call {
                    Token::Bytes(bytes) => Ok(bytes),
                    _ => Err(TranslationError::UnexpectedToken("multicall entry")),
                })
                .collect::<Result<_>>()
                .map(Some),
            _ => Err(TranslationError::UnexpectedToken("multicall argument")),
        }
    }
}

impl Translation for UniswapMulticall {
    fn title(&self) -> &str {
        "Unfold individual calls"
    }

    fn translate(
        &self,
        call: &MetaTransaction,
        _chain_id: u64,
    ) -> Result<Option<Vec<MetaTransaction>>> {
        let Some(inner) = Self::inner_calls(&call.data)? else { return Ok(None) };
        if inner.is_empty() {
            return Ok(None)
        }
        Ok(Some(inner.into_iter().map(|data| call.clone().data(data)).collect()))
    }
}

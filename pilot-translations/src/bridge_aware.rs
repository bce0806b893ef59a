//! Acknowledges bridge transfers for avatars guarded by a bridge-aware module.
//!
//! Such a module only lets funds leave through a bridge when the same batch announces the
//! transfer with `bridgeStart(asset)`. The rule scans the recorded batch for transfers to the
//! avatar's counterpart on the other chain and appends the missing announcements.

use crate::{Result, Translation, TranslationError};
use ethers_core::{
    abi::{parse_abi, Abi, Function, Token},
    types::{Address, H160},
    utils::id,
};
use once_cell::sync::Lazy;
use pilot_core::types::MetaTransaction;
use tracing::debug;

/// Ethereum mainnet, the only chain the known bridges are deployed on.
pub const MAINNET: u64 = 1;

/// xDAI bridge, sends DAI to Gnosis Chain.
pub const XDAI_BRIDGE: Address = H160([
    0x4a, 0xa4, 0x21, 0x45, 0xaa, 0x6e, 0xbf, 0x72, 0xe1, 0x64, 0xc9, 0xbb, 0xc7, 0x4f, 0xbd, 0x37,
    0x88, 0x04, 0x50, 0x16,
]);

/// Omnibridge, sends any ERC20 token to Gnosis Chain.
pub const OMNIBRIDGE: Address = H160([
    0x88, 0xad, 0x09, 0x51, 0x86, 0x95, 0xc6, 0xc3, 0x71, 0x2a, 0xc1, 0x0a, 0x21, 0x4b, 0xe5, 0x10,
    0x9a, 0x65, 0x56, 0x71,
]);

/// DAI on mainnet
pub const DAI: Address = H160([
    0x6b, 0x17, 0x54, 0x74, 0xe8, 0x90, 0x94, 0xc4, 0x4d, 0xa9, 0x8b, 0x95, 0x4e, 0xed, 0xea, 0xc4,
    0x95, 0x27, 0x1d, 0x0f,
]);

static BRIDGES: Lazy<Abi> = Lazy::new(|| {
    parse_abi(&[
        "function relayTokens(address receiver, uint256 amount)",
        "function relayTokens(address token, address receiver, uint256 value)",
        "function bridgeStart(address asset)",
    ])
    .expect("could not parse ABI")
});

fn function(signature: &str) -> Option<&'static Function> {
    let selector = id(signature);
    BRIDGES.functions().find(|f| f.short_signature() == selector)
}

fn address(token: Option<&Token>) -> Result<Address> {
    match token {
        Some(Token::Address(address)) => Ok(*address),
        _ => Err(TranslationError::UnexpectedToken("address")),
    }
}

/// Appends one `bridgeStart(asset)` call to `module` for every asset bridged to the avatar that
/// is not announced anywhere in the batch yet.
#[derive(Clone, Copy, Debug)]
pub struct BridgeAware {
    module: Address,
}

impl BridgeAware {
    /// `module` is the bridge-aware contract receiving the announcements.
    pub fn new(module: Address) -> Self {
        Self { module }
    }

    pub fn module(&self) -> Address {
        self.module
    }

    /// Asset moved by `call` if it relays tokens to `receiver` through a known bridge.
    fn bridged_asset(call: &MetaTransaction, receiver: Address) -> Result<Option<Address>> {
        let Some(selector) = call.selector() else { return Ok(None) };
        let args = &call.data[4..];

        let (asset, to) = if call.to == XDAI_BRIDGE {
            let Some(relay) = function("relayTokens(address,uint256)") else { return Ok(None) };
            if relay.short_signature() != selector {
                return Ok(None)
            }
            let tokens = relay.decode_input(args)?;
            (DAI, address(tokens.first())?)
        } else if call.to == OMNIBRIDGE {
            let Some(relay) = function("relayTokens(address,address,uint256)") else {
                return Ok(None)
            };
            if relay.short_signature() != selector {
                return Ok(None)
            }
            let tokens = relay.decode_input(args)?;
            (address(tokens.first())?, address(tokens.get(1))?)
        } else {
            return Ok(None)
        };
        Ok((to == receiver).then_some(asset))
    }

    /// Asset announced by `call`, if it is an acknowledgement for this module.
    fn acknowledged_asset(&self, call: &MetaTransaction) -> Option<Address> {
        if call.to != self.module {
            return None
        }
        let start = function("bridgeStart(address)")?;
        if call.selector()? != start.short_signature() {
            return None
        }
        address(start.decode_input(&call.data[4..]).ok()?.first()).ok()
    }

    fn acknowledgement(&self, asset: Address) -> Result<MetaTransaction> {
        let start = function("bridgeStart(address)")
            .ok_or(TranslationError::UnexpectedToken("bridgeStart"))?;
        let data = start.encode_input(&[Token::Address(asset)])?;
        Ok(MetaTransaction::new(self.module).data(data))
    }
}

impl Translation for BridgeAware {
    fn title(&self) -> &str {
        "Acknowledge bridge transfers"
    }

    fn translate_global(
        &self,
        batch: &[MetaTransaction],
        chain_id: u64,
        avatar: Address,
    ) -> Result<Option<Vec<MetaTransaction>>> {
        if chain_id != MAINNET {
            return Ok(None)
        }

        let acknowledged: Vec<Address> =
            batch.iter().filter_map(|call| self.acknowledged_asset(call)).collect();
        let mut missing = Vec::new();
        for call in batch {
            let asset = match Self::bridged_asset(call, avatar) {
                Ok(Some(asset)) => asset,
                Ok(None) => continue,
                Err(err) => {
                    debug!(target: "pilot::translations", to = ?call.to, %err, "skipping call");
                    continue
                }
            };
            if !acknowledged.contains(&asset) && !missing.contains(&asset) {
                missing.push(asset);
            }
        }
        if missing.is_empty() {
            return Ok(None)
        }

        let mut translated = batch.to_vec();
        for asset in missing {
            translated.push(self.acknowledgement(asset)?);
        }
        Ok(Some(translated))
    }

    fn auto_apply(&self) -> bool {
        true
    }
}

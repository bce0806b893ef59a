use crate::{addr, calldata};
use ethers_core::{abi::Token, types::Address};
use pilot_core::types::MetaTransaction;
use pilot_translations::{
    bridge_aware::{DAI, OMNIBRIDGE, XDAI_BRIDGE},
    BridgeAware, Translation, TranslationOptions, Translations,
};

const MODULE: u8 = 0xb1;
const AVATAR: u8 = 0xcc;

fn translations() -> Translations {
    Translations::new(TranslationOptions { bridge_aware: Some(addr(MODULE)), ..Default::default() })
}

fn relay_dai(receiver: Address) -> MetaTransaction {
    MetaTransaction::new(XDAI_BRIDGE).data(calldata(
        "relayTokens(address,uint256)",
        &[Token::Address(receiver), Token::Uint(100.into())],
    ))
}

fn relay_token(token: Address, receiver: Address) -> MetaTransaction {
    MetaTransaction::new(OMNIBRIDGE).data(calldata(
        "relayTokens(address,address,uint256)",
        &[Token::Address(token), Token::Address(receiver), Token::Uint(100.into())],
    ))
}

fn bridge_start(asset: Address) -> MetaTransaction {
    MetaTransaction::new(addr(MODULE))
        .data(calldata("bridgeStart(address)", &[Token::Address(asset)]))
}

#[test]
fn appends_acknowledgements() {
    let batch = vec![
        MetaTransaction::new(addr(0xdd)),
        relay_dai(addr(AVATAR)),
        relay_token(addr(0x70), addr(AVATAR)),
    ];
    let applied = translations().auto_apply(&batch, 1, addr(AVATAR)).unwrap();

    let mut expected = batch.clone();
    expected.push(bridge_start(DAI));
    expected.push(bridge_start(addr(0x70)));
    assert_eq!(applied, expected);
}

#[test]
fn auto_apply_is_idempotent() {
    let translations = translations();
    let batch = vec![relay_dai(addr(AVATAR)), relay_dai(addr(AVATAR))];

    let applied = translations.auto_apply(&batch, 1, addr(AVATAR)).unwrap();
    assert_eq!(applied.len(), 3);
    assert_eq!(translations.auto_apply(&applied, 1, addr(AVATAR)), None);
}

#[test]
fn finds_acknowledgements_anywhere_in_the_batch() {
    let batch = vec![bridge_start(DAI), MetaTransaction::new(addr(0xdd)), relay_dai(addr(AVATAR))];
    assert_eq!(translations().auto_apply(&batch, 1, addr(AVATAR)), None);

    // only the missing asset is acknowledged
    let batch =
        vec![relay_token(addr(0x70), addr(AVATAR)), relay_dai(addr(AVATAR)), bridge_start(DAI)];
    let applied = translations().auto_apply(&batch, 1, addr(AVATAR)).unwrap();
    assert_eq!(applied.last(), Some(&bridge_start(addr(0x70))));
    assert_eq!(applied.len(), 4);
}

#[test]
fn ignores_transfers_to_other_receivers() {
    let batch = vec![relay_dai(addr(0xee))];
    assert_eq!(translations().auto_apply(&batch, 1, addr(AVATAR)), None);
}

#[test]
fn only_applies_on_mainnet() {
    let batch = vec![relay_dai(addr(AVATAR))];
    assert_eq!(translations().auto_apply(&batch, 100, addr(AVATAR)), None);
}

#[test]
fn acknowledgements_for_other_modules_do_not_count() {
    let foreign = MetaTransaction::new(addr(0xb2))
        .data(calldata("bridgeStart(address)", &[Token::Address(DAI)]));
    let batch = vec![foreign, relay_dai(addr(AVATAR))];
    let applied = BridgeAware::new(addr(MODULE))
        .translate_global(&batch, 1, addr(AVATAR))
        .unwrap()
        .unwrap();
    assert_eq!(applied.last(), Some(&bridge_start(DAI)));
}

#[test]
fn malformed_transfers_do_not_abort_the_batch() {
    let broken =
        MetaTransaction::new(XDAI_BRIDGE).data(calldata("relayTokens(address,uint256)", &[]));
    let batch = vec![broken, relay_token(addr(0x70), addr(AVATAR))];
    let applied = translations().auto_apply(&batch, 1, addr(AVATAR)).unwrap();
    assert_eq!(applied.last(), Some(&bridge_start(addr(0x70))));
}

#[test]
fn global_translation_reports_the_rule() {
    let batch = vec![relay_dai(addr(AVATAR))];
    let applicable = translations().translate_global(&batch, 1, addr(AVATAR)).unwrap();
    assert_eq!(applicable.title, "Acknowledge bridge transfers");
    assert_eq!(applicable.result.len(), 2);
}

use crate::{addr, calldata};
use ethers_core::abi::Token;
use pilot_core::types::{MetaTransaction, Operation};
use pilot_translations::{Applicable, Translations};

#[test]
fn unfolds_a_multicall_in_order() {
    let first =
        calldata("transfer(address,uint256)", &[Token::Address(addr(1)), Token::Uint(5.into())]);
    let second =
        calldata("approve(address,uint256)", &[Token::Address(addr(2)), Token::Uint(6.into())]);
    let outer = MetaTransaction::new(addr(0xdd)).value(3u64).data(calldata(
        "multicall(uint256,bytes[])",
        &[
            Token::Uint(1_700_000_000u64.into()),
            Token::Array(vec![Token::Bytes(first.clone()), Token::Bytes(second.clone())]),
        ],
    ));

    let translations = Translations::default();
    let Applicable { title, result } = translations.find_applicable(&outer, 1).unwrap();
    assert_eq!(title, "Unfold individual calls");
    assert_eq!(result, vec![outer.clone().data(first), outer.clone().data(second)]);
    for call in &result {
        assert_eq!(call.to, addr(0xdd));
        assert_eq!(call.value, 3u64.into());
        assert_eq!(call.operation, Operation::Call);
    }
}

#[test]
fn malformed_calls_are_not_applicable() {
    let mut data = calldata("multicall(bytes[])", &[Token::Array(vec![Token::Bytes(vec![1; 4])])]);
    data.truncate(20);
    let broken = MetaTransaction::new(addr(0xdd)).data(data);
    let plain = MetaTransaction::new(addr(0xdd)).data(vec![0xaa; 4]);

    let translations = Translations::default();
    assert_eq!(translations.find_applicable(&broken, 1), None);
    assert_eq!(translations.find_applicable(&plain, 1), None);
}

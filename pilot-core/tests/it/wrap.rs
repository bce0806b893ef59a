use crate::{addr, roles_route, MANAGER_KEY};
use ethers_core::{
    abi::{self, Token},
    utils::id,
};
use pilot_core::{
    route::{Account, Connection, RolesVersion, Waypoint},
    types::{MetaTransaction, PrefixedAddress, H256, U256},
    wrap, WrapError,
};

#[test]
fn wraps_through_roles_v2() {
    let route = roles_route(RolesVersion::V2, MANAGER_KEY);
    let call = MetaTransaction::new(addr(0xdd));

    let wrapped = wrap(&call, &route, true).unwrap();
    assert_eq!(wrapped.from, addr(0xaa));
    assert_eq!(wrapped.to, addr(0xbb));
    assert_eq!(wrapped.value, U256::zero());

    let mut expected =
        id("execTransactionWithRole(address,uint256,bytes,uint8,bytes32,bool)").to_vec();
    expected.extend(abi::encode(&[
        Token::Address(addr(0xdd)),
        Token::Uint(U256::zero()),
        Token::Bytes(vec![]),
        Token::Uint(U256::zero()),
        Token::FixedBytes(MANAGER_KEY.parse::<H256>().unwrap().as_bytes().to_vec()),
        Token::Bool(true),
    ]));
    assert_eq!(wrapped.data.to_vec(), expected);

    let json = serde_json::to_value(&wrapped).unwrap();
    assert_eq!(json["value"], "0x0");
}

#[test]
fn short_role_names_are_padded() {
    let call = MetaTransaction::new(addr(1));
    let padded = wrap(&call, &roles_route(RolesVersion::V2, "MANAGER"), true);
    let hex = wrap(&call, &roles_route(RolesVersion::V2, MANAGER_KEY), true);
    assert_eq!(padded.unwrap(), hex.unwrap());
}

#[test]
fn wrapping_is_deterministic() {
    let route = roles_route(RolesVersion::V1, "3");
    let call = MetaTransaction::new(addr(0xdd)).value(10u64).data(vec![1u8, 2, 3, 4]);
    assert_eq!(wrap(&call, &route, false).unwrap(), wrap(&call, &route, false).unwrap());
}

#[test]
fn roles_versions_differ_only_in_role_parameter() {
    let call = MetaTransaction::new(addr(0xdd)).value(1u64).data(vec![0xab; 36]);
    let v1 = wrap(&call, &roles_route(RolesVersion::V1, "1"), true).unwrap();
    let v2 = wrap(&call, &roles_route(RolesVersion::V2, MANAGER_KEY), true).unwrap();

    assert_eq!(v1.from, v2.from);
    assert_eq!(v1.to, v2.to);
    assert_eq!(v1.value, v2.value);
    assert_eq!(v1.data.len(), v2.data.len());

    // head: to, value, data offset, operation, role, revertOnError
    let word = |data: &[u8], i: usize| data[4 + 32 * i..4 + 32 * (i + 1)].to_vec();
    for i in [0, 1, 2, 3, 5] {
        assert_eq!(word(&v1.data, i), word(&v2.data, i), "word {i}");
    }
    assert_ne!(word(&v1.data, 4), word(&v2.data, 4));
    // the tail holding the inner calldata is identical
    assert_eq!(v1.data[4 + 32 * 6..], v2.data[4 + 32 * 6..]);
}

#[test]
fn roles_v1_requires_numeric_role() {
    let route = roles_route(RolesVersion::V1, "MANAGER");
    assert_eq!(
        wrap(&MetaTransaction::new(addr(1)), &route, true),
        Err(WrapError::InvalidRole("MANAGER".into()))
    );
}

#[test]
fn delay_wraps_without_role() {
    let mut route = roles_route(RolesVersion::V1, "1");
    let initiator = route.initiator.unwrap();
    route.waypoints.as_mut().unwrap()[1] = Waypoint::new(
        Account::Delay { chain: 1, address: addr(0xbb) },
        Connection::IsEnabled { from: initiator },
    );
    let call = MetaTransaction::new(addr(0xdd)).value(5u64);
    let wrapped = wrap(&call, &route, true).unwrap();
    let selector = id("execTransactionFromModule(address,uint256,bytes,uint8)");
    assert_eq!(&wrapped.data[..4], &selector[..]);
    assert_eq!(wrapped.value, U256::zero());
    assert_eq!(wrapped.data.len(), 4 + 32 * 5);
}

#[test]
fn refuses_routes_without_module() {
    let mut route = roles_route(RolesVersion::V1, "1");
    let initiator = route.initiator.unwrap();
    let waypoints = route.waypoints.as_mut().unwrap();
    waypoints.remove(1);
    waypoints[1].connection = Some(Connection::Owns { from: initiator });
    assert_eq!(wrap(&MetaTransaction::new(addr(1)), &route, true), Err(WrapError::NoModule));
}

#[test]
fn refuses_unsupported_intermediaries() {
    let mut route = roles_route(RolesVersion::V1, "1");
    let initiator = route.initiator.unwrap();
    route.waypoints.as_mut().unwrap()[1] = Waypoint::new(
        Account::Safe { chain: 1, address: addr(0xbb) },
        Connection::Owns { from: initiator },
    );
    assert_eq!(
        wrap(&MetaTransaction::new(addr(1)), &route, true),
        Err(WrapError::UnsupportedModuleType("SAFE"))
    );
}

#[test]
fn requires_initiator() {
    let mut route = roles_route(RolesVersion::V2, "MANAGER");
    route.initiator = None;
    route.waypoints = None;
    let wrapped = wrap(&MetaTransaction::new(addr(1)), &route, true);
    assert_eq!(wrapped, Err(WrapError::MissingInitiator));
    assert!(PrefixedAddress::new(1, addr(1)).is_ok());
}

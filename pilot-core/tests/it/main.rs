mod wrap;

use pilot_core::route::{
    Account, Connection, RolesVersion, Route, Waypoint,
};
use pilot_core::types::{Address, PrefixedAddress};

/// `MANAGER` as a right padded bytes32 key
pub const MANAGER_KEY: &str = "0x4d414e4147455200000000000000000000000000000000000000000000000000";

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

/// EOA 0xaa.. -> Roles 0xbb.. -> Safe 0xcc.. on mainnet
pub fn roles_route(version: RolesVersion, role: &str) -> Route {
    let initiator = PrefixedAddress::eoa(addr(0xaa));
    Route {
        id: "route".into(),
        label: "roles".into(),
        initiator: Some(initiator),
        avatar: PrefixedAddress::new(1, addr(0xcc)).unwrap(),
        waypoints: Some(vec![
            Waypoint::start(Account::Eoa { address: addr(0xaa) }),
            Waypoint::new(
                Account::Roles {
                    chain: 1,
                    address: addr(0xbb),
                    version,
                    multisend: None,
                    multisend_call_only: None,
                },
                Connection::IsMember { from: initiator, roles: vec![role.to_string()] },
            ),
            Waypoint::new(
                Account::Safe { chain: 1, address: addr(0xcc) },
                Connection::IsEnabled { from: PrefixedAddress::new(1, addr(0xbb)).unwrap() },
            ),
        ]),
        provider_type: None,
        last_used: None,
    }
}

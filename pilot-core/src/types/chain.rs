/// A chain Pilot can qualify addresses for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainInfo {
    pub id: u64,
    /// EIP-3770 short name used as address prefix
    pub short_name: &'static str,
    pub name: &'static str,
}

/// Supported chains. Prefixes come from the EIP-3770 chain registry.
pub const CHAINS: &[ChainInfo] = &[
    ChainInfo { id: 1, short_name: "eth", name: "Ethereum" },
    ChainInfo { id: 10, short_name: "oeth", name: "Optimism" },
    ChainInfo { id: 56, short_name: "bnb", name: "BNB Smart Chain" },
    ChainInfo { id: 100, short_name: "gno", name: "Gnosis" },
    ChainInfo { id: 137, short_name: "matic", name: "Polygon" },
    ChainInfo { id: 8453, short_name: "base", name: "Base" },
    ChainInfo { id: 42161, short_name: "arb1", name: "Arbitrum One" },
    ChainInfo { id: 43114, short_name: "avax", name: "Avalanche" },
    ChainInfo { id: 11155111, short_name: "sep", name: "Sepolia" },
];

pub fn chain_info(id: u64) -> Option<&'static ChainInfo> {
    CHAINS.iter().find(|c| c.id == id)
}

pub fn chain_by_short_name(short_name: &str) -> Option<&'static ChainInfo> {
    CHAINS.iter().find(|c| c.short_name.eq_ignore_ascii_case(short_name))
}

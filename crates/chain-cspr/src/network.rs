use serde::Serialize;

use crate::amount::CSPR_DECIMALS;

/// Definition of a Casper network.
#[derive(Debug, Clone, Serialize)]
pub struct CasperNetwork {
    /// Chain name written into deploy headers.
    pub chain_name: &'static str,
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: usize,
    pub rpc_url: &'static str,
    pub explorer_url: &'static str,
    pub is_testnet: bool,
}

/// Casper Mainnet.
pub const CASPER_MAINNET: CasperNetwork = CasperNetwork {
    chain_name: "casper",
    name: "Casper",
    symbol: "CSPR",
    decimals: CSPR_DECIMALS,
    rpc_url: "https://node.mainnet.casper.network/rpc",
    explorer_url: "https://cspr.live",
    is_testnet: false,
};

/// Casper Testnet.
pub const CASPER_TESTNET: CasperNetwork = CasperNetwork {
    chain_name: "casper-test",
    name: "Casper Testnet",
    symbol: "CSPR",
    decimals: CSPR_DECIMALS,
    rpc_url: "http://65.109.83.79:7777/rpc",
    explorer_url: "https://testnet.cspr.live",
    is_testnet: true,
};

const ALL_NETWORKS: &[&CasperNetwork] = &[&CASPER_MAINNET, &CASPER_TESTNET];

/// Look up a network by the chain name used in deploy headers.
pub fn network_by_chain_name(chain_name: &str) -> Option<&'static CasperNetwork> {
    ALL_NETWORKS
        .iter()
        .find(|network| network.chain_name == chain_name)
        .copied()
}

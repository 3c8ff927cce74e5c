//! Known DA networks.

use std::collections::BTreeMap;

use crate::{ConfigError, DaBackend, DaData};

/// Immutable table of known DA networks, keyed by network ID.
///
/// Built once at startup and handed to whoever needs it.
#[derive(Debug, Clone)]
pub struct NetworkPresets {
    networks: BTreeMap<String, DaData>,
}

fn preset(
    backend: DaBackend,
    id: &str,
    api_url: &str,
    rpc_url: &str,
    current_state_node: &str,
    state_nodes: &[&str],
    gas_price: &str,
) -> DaData {
    DaData {
        backend,
        id: id.to_string(),
        api_url: api_url.to_string(),
        rpc_url: rpc_url.to_string(),
        current_state_node: current_state_node.to_string(),
        state_nodes: state_nodes.iter().map(|s| s.to_string()).collect(),
        gas_price: gas_price.to_string(),
        namespace_id: None,
        app_id: None,
        remote: None,
    }
}

impl NetworkPresets {
    /// The networks shipped with the tool.
    pub fn builtin() -> Self {
        use DaBackend::*;

        let all = [
            preset(Mock, "mock", "", "", "mock", &["mock1", "mock"], ""),
            preset(
                Celestia,
                "mocha-4",
                "https://api.celestia-mocha.com",
                "https://celestia-testnet-rpc.itrocket.net:443",
                "rpc-mocha.pops.one",
                &[
                    "public-celestia-mocha4-consensus.numia.xyz",
                    "full.consensus.mocha-4.celestia-mocha.com",
                    "consensus-full-mocha-4.celestia-mocha.com",
                    "rpc-mocha.pops.one",
                ],
                "0.02",
            ),
            preset(
                Celestia,
                "celestia",
                "https://api.celestia.pops.one",
                "http://rpc.celestia.pops.one:26657",
                "rpc.celestia.pops.one",
                &["rpc-celestia.alphab.ai", "celestia.rpc.kjnodes.com"],
                "0.002",
            ),
            preset(
                Avail,
                "avail",
                "https://turing-rpc.avail.so/rpc",
                "wss://turing-rpc.avail.so/ws",
                "",
                &[],
                "",
            ),
            preset(
                Avail,
                "avail-1",
                "https://mainnet-rpc.avail.so/rpc",
                "wss://mainnet.avail-rpc.com/ws",
                "",
                &[],
                "",
            ),
            preset(
                LoadNetwork,
                "alphanet",
                "https://alphanet.load.network",
                "wss://alphanet.load.network/ws",
                "",
                &[],
                "",
            ),
            preset(LoadNetwork, "loadnetwork", "", "", "", &[], ""),
            preset(
                Bnb,
                "97",
                "https://data-seed-prebsc-1-s1.bnbchain.org:8545",
                "https://data-seed-prebsc-1-s1.bnbchain.org:8545",
                "",
                &[],
                "",
            ),
            preset(
                Bnb,
                "56",
                "https://bsc-dataseed.bnbchain.org",
                "https://bsc-dataseed.bnbchain.org",
                "",
                &[],
                "",
            ),
            preset(Aptos, "2", "", "", "", &[], ""),
            preset(Aptos, "1", "", "", "", &[], ""),
            preset(
                Sui,
                "sui-testnet",
                "",
                "https://fullnode.testnet.sui.io:443",
                "",
                &[],
                "",
            ),
            preset(
                Sui,
                "sui-mainnet",
                "",
                "https://fullnode.mainnet.sui.io:443",
                "",
                &[],
                "",
            ),
            preset(
                Walrus,
                "walrus-testnet",
                "https://aggregator.walrus-testnet.walrus.space",
                "https://publisher.walrus-testnet.walrus.space",
                "",
                &[],
                "",
            ),
            preset(
                Walrus,
                "walrus-mainnet",
                "https://aggregator.walrus-mainnet.walrus.space",
                "https://publisher.walrus-mainnet.walrus.space",
                "",
                &[],
                "",
            ),
            preset(
                Solana,
                "solana-testnet",
                "http://barcelona:8899",
                "http://barcelona:8899",
                "",
                &[],
                "0.00000002",
            ),
            preset(
                Solana,
                "solana-mainnet",
                "http://barcelona:8899",
                "http://barcelona:8899",
                "",
                &[],
                "",
            ),
            preset(
                Kaspa,
                "kaspa-testnet",
                "https://api-tn10.kaspa.org",
                "wss://testnet.kaspa.org/ws",
                "",
                &[],
                "",
            ),
            preset(
                Kaspa,
                "kaspa-mainnet",
                "https://api.kaspa.org",
                "wss://mainnet.kaspa.org/ws",
                "",
                &[],
                "",
            ),
        ];

        Self {
            networks: all.into_iter().map(|da| (da.id.clone(), da)).collect(),
        }
    }

    /// Look up a network by its ID.
    pub fn get(&self, network_id: &str) -> Option<&DaData> {
        self.networks.get(network_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DaData> {
        self.networks.values()
    }

    /// Pick the network for a hub environment and backend.
    ///
    /// `playground`, `blumbus` and `custom` hubs use DA testnets, `mainnet`
    /// uses DA mainnets and `mock` always resolves to the mock network.
    pub fn lookup(&self, environment: &str, backend: DaBackend) -> Result<&DaData, ConfigError> {
        let network_id = match environment {
            "playground" | "blumbus" | "custom" => testnet_id(backend),
            "mainnet" => mainnet_id(backend),
            "mock" => Some("mock"),
            other => return Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
        .ok_or(ConfigError::NoNetwork {
            environment: environment.to_string(),
            backend,
        })?;

        self.get(network_id).ok_or(ConfigError::NoNetwork {
            environment: environment.to_string(),
            backend,
        })
    }
}

fn testnet_id(backend: DaBackend) -> Option<&'static str> {
    match backend {
        DaBackend::Celestia => Some("mocha-4"),
        DaBackend::Avail => Some("avail"),
        DaBackend::Aptos => Some("2"),
        DaBackend::Sui => Some("sui-testnet"),
        DaBackend::LoadNetwork => Some("alphanet"),
        DaBackend::Bnb => Some("97"),
        DaBackend::Walrus => Some("walrus-testnet"),
        DaBackend::Solana => Some("solana-testnet"),
        DaBackend::Kaspa => Some("kaspa-testnet"),
        DaBackend::Mock => Some("mock"),
        DaBackend::WeaveVm | DaBackend::Near => None,
    }
}

fn mainnet_id(backend: DaBackend) -> Option<&'static str> {
    match backend {
        DaBackend::Celestia => Some("celestia"),
        DaBackend::Avail => Some("avail-1"),
        DaBackend::Aptos => Some("1"),
        DaBackend::Sui => Some("sui-mainnet"),
        DaBackend::LoadNetwork => Some("loadnetwork"),
        DaBackend::Bnb => Some("56"),
        DaBackend::Walrus => Some("walrus-mainnet"),
        DaBackend::Solana => Some("solana-mainnet"),
        DaBackend::Kaspa => Some("kaspa-mainnet"),
        DaBackend::Mock => Some("mock"),
        DaBackend::WeaveVm | DaBackend::Near => None,
    }
}

//! Cluster definitions and client configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use spl_wire::{Address, Signature};

use crate::error::TokenError;
use crate::ledger::Commitment;

/// Static description of a Solana cluster.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterInfo {
    pub name: &'static str,
    pub rpc_url: &'static str,
    /// Query string that points explorers at this cluster (empty on mainnet).
    pub explorer_query: &'static str,
    pub airdrop_available: bool,
}

pub const DEVNET: ClusterInfo = ClusterInfo {
    name: "devnet",
    rpc_url: "https://api.devnet.solana.com",
    explorer_query: "?cluster=devnet",
    airdrop_available: true,
};

pub const TESTNET: ClusterInfo = ClusterInfo {
    name: "testnet",
    rpc_url: "https://api.testnet.solana.com",
    explorer_query: "?cluster=testnet",
    airdrop_available: true,
};

pub const MAINNET_BETA: ClusterInfo = ClusterInfo {
    name: "mainnet-beta",
    rpc_url: "https://api.mainnet-beta.solana.com",
    explorer_query: "",
    airdrop_available: false,
};

pub const LOCALNET: ClusterInfo = ClusterInfo {
    name: "localnet",
    rpc_url: "http://127.0.0.1:8899",
    explorer_query: "?cluster=custom&customUrl=http%3A%2F%2F127.0.0.1%3A8899",
    airdrop_available: true,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    #[default]
    Devnet,
    Testnet,
    MainnetBeta,
    Localnet,
}

impl Cluster {
    pub fn info(&self) -> &'static ClusterInfo {
        match self {
            Cluster::Devnet => &DEVNET,
            Cluster::Testnet => &TESTNET,
            Cluster::MainnetBeta => &MAINNET_BETA,
            Cluster::Localnet => &LOCALNET,
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().name)
    }
}

impl FromStr for Cluster {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "devnet" => Ok(Cluster::Devnet),
            "testnet" => Ok(Cluster::Testnet),
            "mainnet-beta" | "mainnet" => Ok(Cluster::MainnetBeta),
            "localnet" | "localhost" => Ok(Cluster::Localnet),
            other => Err(TokenError::InvalidConfig(format!("unknown cluster '{other}'"))),
        }
    }
}

/// Explorer page for an account or mint.
pub fn explorer_address_url(cluster: Cluster, address: &Address) -> String {
    format!(
        "https://explorer.solana.com/address/{address}{}",
        cluster.info().explorer_query
    )
}

/// Explorer page for a transaction.
pub fn explorer_tx_url(cluster: Cluster, signature: &Signature) -> String {
    format!(
        "https://explorer.solana.com/tx/{signature}{}",
        cluster.info().explorer_query
    )
}

/// Solscan token page. Solscan cannot show a local validator.
pub fn solscan_token_url(cluster: Cluster, mint: &Address) -> Option<String> {
    match cluster {
        Cluster::Localnet => None,
        _ => Some(format!(
            "https://solscan.io/token/{mint}{}",
            cluster.info().explorer_query
        )),
    }
}

const DEFAULT_CONFIRM_POLL_INTERVAL_MS: u64 = 500;

/// Client-side settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub cluster: Cluster,
    /// Overrides the cluster's public endpoint.
    pub rpc_url: Option<String>,
    pub commitment: Commitment,
    pub confirm_poll_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_cluster(Cluster::default())
    }
}

impl ClientConfig {
    pub fn for_cluster(cluster: Cluster) -> Self {
        Self {
            cluster,
            rpc_url: None,
            commitment: Commitment::Confirmed,
            confirm_poll_interval_ms: DEFAULT_CONFIRM_POLL_INTERVAL_MS,
        }
    }

    /// Read `NETWORK` (cluster name) and `RPC_URL` (endpoint override).
    pub fn from_env() -> Result<Self, TokenError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TokenError> {
        let cluster = match lookup("NETWORK") {
            Some(name) if !name.trim().is_empty() => name.trim().parse()?,
            _ => Cluster::default(),
        };

        let mut config = Self::for_cluster(cluster);
        config.rpc_url = lookup("RPC_URL").filter(|url| !url.trim().is_empty());
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, TokenError> {
        serde_json::from_str(json).map_err(|e| TokenError::InvalidConfig(e.to_string()))
    }

    pub fn rpc_url(&self) -> &str {
        self.rpc_url
            .as_deref()
            .unwrap_or(self.cluster.info().rpc_url)
    }

    pub fn confirm_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirm_poll_interval_ms)
    }
}

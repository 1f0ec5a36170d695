//! Blockchain network identification.
//!
//! Networks are identified by short lowercase names on the wire
//! (e.g., `"bsc"`, `"base-sepolia"`). EVM networks additionally map to
//! numeric EIP-155 chain ids; chains the protocol has no name for render
//! as `chain-<id>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A supported blockchain network.
///
/// The named variants form the closed set of networks the protocol ships
/// with. [`Network::Other`] carries identifiers produced for unknown
/// chain ids (`chain-<id>`) so that requirements built against an
/// unrecognized RPC endpoint still round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Network {
    /// Base mainnet.
    Base,
    /// Base Sepolia testnet.
    BaseSepolia,
    /// Avalanche C-Chain.
    Avalanche,
    /// Avalanche Fuji testnet.
    AvalancheFuji,
    /// IoTeX mainnet.
    Iotex,
    /// Sei mainnet.
    Sei,
    /// Sei testnet.
    SeiTestnet,
    /// Polygon PoS.
    Polygon,
    /// Polygon Amoy testnet.
    PolygonAmoy,
    /// Peaq mainnet.
    Peaq,
    /// BNB Smart Chain.
    Bsc,
    /// BNB Smart Chain testnet.
    BscTestnet,
    /// Solana mainnet.
    Solana,
    /// Solana devnet.
    SolanaDevnet,
    /// Any other network identifier (e.g., `chain-10143`).
    Other(String),
}

/// A known EVM network with its wire name and EIP-155 chain id.
struct NetworkEntry {
    name: &'static str,
    chain_id: u64,
}

/// Well-known EVM networks, the single source of truth for the
/// name ↔ chain-id mapping in both directions.
static EVM_NETWORKS: &[NetworkEntry] = &[
    NetworkEntry { name: "bsc", chain_id: 56 },
    NetworkEntry { name: "bsc-testnet", chain_id: 97 },
    NetworkEntry { name: "polygon", chain_id: 137 },
    NetworkEntry { name: "polygon-amoy", chain_id: 80_001 },
    NetworkEntry { name: "base", chain_id: 8453 },
    NetworkEntry { name: "base-sepolia", chain_id: 84_531 },
    NetworkEntry { name: "avalanche", chain_id: 43_114 },
    NetworkEntry { name: "avalanche-fuji", chain_id: 43_113 },
    NetworkEntry { name: "iotex", chain_id: 4689 },
    NetworkEntry { name: "sei", chain_id: 1329 },
    NetworkEntry { name: "sei-testnet", chain_id: 1328 },
    NetworkEntry { name: "peaq", chain_id: 3338 },
];

impl Network {
    /// Returns the wire name of this network.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Base => "base",
            Self::BaseSepolia => "base-sepolia",
            Self::Avalanche => "avalanche",
            Self::AvalancheFuji => "avalanche-fuji",
            Self::Iotex => "iotex",
            Self::Sei => "sei",
            Self::SeiTestnet => "sei-testnet",
            Self::Polygon => "polygon",
            Self::PolygonAmoy => "polygon-amoy",
            Self::Peaq => "peaq",
            Self::Bsc => "bsc",
            Self::BscTestnet => "bsc-testnet",
            Self::Solana => "solana",
            Self::SolanaDevnet => "solana-devnet",
            Self::Other(s) => s,
        }
    }

    /// Parses a network from its wire name.
    ///
    /// Unrecognized names become [`Network::Other`]; parsing never fails.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "base" => Self::Base,
            "base-sepolia" => Self::BaseSepolia,
            "avalanche" => Self::Avalanche,
            "avalanche-fuji" => Self::AvalancheFuji,
            "iotex" => Self::Iotex,
            "sei" => Self::Sei,
            "sei-testnet" => Self::SeiTestnet,
            "polygon" => Self::Polygon,
            "polygon-amoy" => Self::PolygonAmoy,
            "peaq" => Self::Peaq,
            "bsc" => Self::Bsc,
            "bsc-testnet" => Self::BscTestnet,
            "solana" => Self::Solana,
            "solana-devnet" => Self::SolanaDevnet,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Maps an EIP-155 chain id to a network.
    ///
    /// Unknown chain ids yield [`Network::Other`] with a `chain-<id>`
    /// identifier rather than failing, so servers pointed at an
    /// unrecognized RPC endpoint stay operational.
    #[must_use]
    pub fn from_chain_id(chain_id: u64) -> Self {
        EVM_NETWORKS
            .iter()
            .find(|entry| entry.chain_id == chain_id)
            .map_or_else(
                || Self::Other(format!("chain-{chain_id}")),
                |entry| Self::from_name(entry.name),
            )
    }

    /// Returns the EIP-155 chain id for known EVM networks.
    ///
    /// Solana networks and [`Network::Other`] have no EIP-155 chain id.
    #[must_use]
    pub fn chain_id(&self) -> Option<u64> {
        let name = self.as_str();
        EVM_NETWORKS
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.chain_id)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl From<String> for Network {
    fn from(s: String) -> Self {
        Self::from_name(&s)
    }
}

impl From<&str> for Network {
    fn from(s: &str) -> Self {
        Self::from_name(s)
    }
}

impl From<Network> for String {
    fn from(network: Network) -> Self {
        network.as_str().to_owned()
    }
}

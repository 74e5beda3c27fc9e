use serde::Serialize;

use crate::error::EthError;

/// Definition of an EVM-compatible blockchain network.
#[derive(Debug, Clone, Serialize)]
pub struct EvmChain {
    pub chain_id: u64,
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
    pub rpc_url: &'static str,
    pub explorer_url: &'static str,
    pub is_testnet: bool,
}

impl EvmChain {
    /// Block explorer link for a transaction hash.
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{tx_hash}", self.explorer_url)
    }
}

/// Ethereum Mainnet (chain ID 1).
pub const ETHEREUM: EvmChain = EvmChain {
    chain_id: 1,
    name: "Ethereum",
    symbol: "ETH",
    decimals: 18,
    rpc_url: "https://eth.llamarpc.com",
    explorer_url: "https://etherscan.io",
    is_testnet: false,
};

/// Sepolia Testnet (chain ID 11155111). The token contract lives here.
pub const SEPOLIA: EvmChain = EvmChain {
    chain_id: 11155111,
    name: "Sepolia",
    symbol: "ETH",
    decimals: 18,
    rpc_url: "https://rpc.sepolia.org",
    explorer_url: "https://sepolia.etherscan.io",
    is_testnet: true,
};

/// Holesky Testnet (chain ID 17000).
pub const HOLESKY: EvmChain = EvmChain {
    chain_id: 17000,
    name: "Holesky",
    symbol: "ETH",
    decimals: 18,
    rpc_url: "https://ethereum-holesky-rpc.publicnode.com",
    explorer_url: "https://holesky.etherscan.io",
    is_testnet: true,
};

const ALL_CHAINS: &[&EvmChain] = &[&ETHEREUM, &SEPOLIA, &HOLESKY];

/// Returns the chain definition for a given chain ID, or `None` if unsupported.
pub fn get_chain(chain_id: u64) -> Option<&'static EvmChain> {
    ALL_CHAINS.iter().find(|c| c.chain_id == chain_id).copied()
}

/// Like [`get_chain`] but errors on unknown IDs.
pub fn require_chain(chain_id: u64) -> Result<&'static EvmChain, EthError> {
    get_chain(chain_id).ok_or(EthError::UnsupportedChain(chain_id))
}

/// Parses the hex chain ID returned by `eth_chainId` (e.g. `"0xaa36a7"`).
pub fn parse_chain_id(hex_id: &str) -> Result<u64, EthError> {
    let digits = hex_id
        .strip_prefix("0x")
        .or_else(|| hex_id.strip_prefix("0X"))
        .ok_or_else(|| EthError::InvalidQuantity(format!("{hex_id}: missing 0x prefix")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| EthError::InvalidQuantity(format!("{hex_id}: {e}")))
}

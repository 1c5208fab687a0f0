use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Parameters handed to the wallet when it does not know a chain yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainParams {
    /// Hex-encoded chain id, e.g. `0x13882`.
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

const SUPPORTED: &[(u64, &str, &str, &str, &str)] = &[
    (
        80002,
        "Polygon Amoy",
        "MATIC",
        "https://rpc-amoy.polygon.technology",
        "https://amoy.polygonscan.com",
    ),
    (
        137,
        "Polygon",
        "MATIC",
        "https://polygon-rpc.com",
        "https://polygonscan.com",
    ),
    (
        8453,
        "Base",
        "ETH",
        "https://mainnet.base.org",
        "https://basescan.org",
    ),
    (
        84532,
        "Base Sepolia",
        "ETH",
        "https://sepolia.base.org",
        "https://sepolia.basescan.org",
    ),
];

pub fn chain_params(chain_id: u64) -> Option<ChainParams> {
    SUPPORTED
        .iter()
        .find(|(id, ..)| *id == chain_id)
        .map(|(id, name, symbol, rpc, explorer)| ChainParams {
            chain_id: format!("{:#x}", id),
            chain_name: name.to_string(),
            native_currency: NativeCurrency {
                name: symbol.to_string(),
                symbol: symbol.to_string(),
                decimals: 18,
            },
            rpc_urls: vec![rpc.to_string()],
            block_explorer_urls: vec![explorer.to_string()],
        })
}

pub fn supported_chains() -> Vec<(u64, ChainParams)> {
    SUPPORTED
        .iter()
        .filter_map(|(id, ..)| chain_params(*id).map(|params| (*id, params)))
        .collect()
}

pub fn explorer_tx_url(chain_id: u64, tx_hash: &str) -> String {
    let base = match chain_id {
        1 => "https://etherscan.io".to_string(),
        11155111 => "https://sepolia.etherscan.io".to_string(),
        other => chain_params(other)
            .and_then(|params| params.block_explorer_urls.into_iter().next())
            .unwrap_or_else(|| "https://etherscan.io".to_string()),
    };
    format!("{}/tx/{}", base, tx_hash)
}

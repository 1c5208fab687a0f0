//! Configuration types for the stakeflow system

mod chains;

pub use chains::{chain_params, explorer_tx_url, supported_chains, ChainParams, NativeCurrency};

use {
    alloy_primitives::{address, Address},
    serde::{Deserialize, Serialize},
    std::{
        fs,
        path::{Path, PathBuf},
        time::Duration,
    },
    tracing::{debug, info},
};

use crate::errors::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeflowConfig {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub chain: ChainConfig,
    pub staking: StakingConfig,
    pub dex: DexConfig,
    pub ledger: LedgerConfig,
    pub retry: RetryConfig,
    /// Largest tolerated gap between the local aggregate and on-chain stake.
    #[serde(default = "default_divergence_tolerance")]
    pub divergence_tolerance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain the staking contract lives on. `None` disables network switching.
    pub chain_id: Option<u64>,
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingConfig {
    pub contract_address: Address,
    pub token_address: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexConfig {
    pub base_url: String,
    #[serde(default = "default_dex_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,
    /// Output ratio applied to estimate-only quotes, in basis points.
    #[serde(default = "default_estimate_ratio_bps")]
    pub estimate_ratio_bps: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub storage: StorageType,
    pub activity_key: String,
    pub balances_key: String,
    /// Full create-form submissions, one row each.
    #[serde(default = "default_creations_key")]
    pub creations_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub delay_ms: u64,
}

fn default_creations_key() -> String {
    "create_activity.csv".to_string()
}

fn default_divergence_tolerance() -> f64 {
    0.0001
}

fn default_rpc_timeout() -> u64 {
    30
}

fn default_dex_timeout() -> u64 {
    15
}

fn default_slippage_bps() -> u16 {
    50
}

fn default_estimate_ratio_bps() -> u16 {
    9_800
}

impl Default for StakeflowConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            chain: ChainConfig {
                chain_id: Some(80002),
                rpc_timeout_secs: default_rpc_timeout(),
            },
            staking: StakingConfig {
                contract_address: address!("7D0ce8CB4F3615A1c9437026b2b53d2C58a9a976"),
                token_address: address!("361D2689F8aaC8e1EB4A810Aa928fc9C78f608ca"),
            },
            dex: DexConfig {
                base_url: "https://www.okx.com/api/v5/dex/aggregator".to_string(),
                timeout_secs: default_dex_timeout(),
                slippage_bps: default_slippage_bps(),
                estimate_ratio_bps: default_estimate_ratio_bps(),
            },
            ledger: LedgerConfig {
                storage: StorageType::File,
                activity_key: "stake_activity.csv".to_string(),
                balances_key: "staking_balances.json".to_string(),
                creations_key: default_creations_key(),
            },
            retry: RetryConfig {
                max_retries: 2,
                delay_ms: 1_000,
            },
            divergence_tolerance: default_divergence_tolerance(),
        }
    }
}

impl StakeflowConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config = serde_json::from_str::<Self>(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise the defaults, then layers the
    /// `STAKEFLOW_*` environment variables on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| {
            let value = lookup(key);
            if value.is_some() {
                debug!("Applying {} from the environment", key);
            }
            value
        };
        if let Some(chain_id) = lookup("STAKEFLOW_CHAIN_ID") {
            self.chain.chain_id = if chain_id.trim().is_empty() {
                None
            } else {
                Some(chain_id.trim().parse().map_err(|_| {
                    Error::Config(format!("STAKEFLOW_CHAIN_ID is not a number: {}", chain_id))
                })?)
            };
        }
        if let Some(contract) = lookup("STAKEFLOW_STAKING_CONTRACT") {
            self.staking.contract_address = parse_address("STAKEFLOW_STAKING_CONTRACT", &contract)?;
        }
        if let Some(token) = lookup("STAKEFLOW_STAKING_TOKEN") {
            self.staking.token_address = parse_address("STAKEFLOW_STAKING_TOKEN", &token)?;
        }
        if let Some(base_url) = lookup("STAKEFLOW_DEX_BASE_URL") {
            self.dex.base_url = base_url;
        }
        if let Some(data_dir) = lookup("STAKEFLOW_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }
        if let Some(log_level) = lookup("STAKEFLOW_LOG_LEVEL") {
            self.log_level = log_level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.staking.contract_address == Address::ZERO {
            return Err(Error::Config("staking contract address is not configured".into()));
        }
        if self.staking.token_address == Address::ZERO {
            return Err(Error::Config("staking token address is not configured".into()));
        }
        if self.dex.slippage_bps > 10_000 {
            return Err(Error::Config(format!(
                "slippage of {} bps exceeds 100%",
                self.dex.slippage_bps
            )));
        }
        if self.dex.estimate_ratio_bps > 10_000 {
            return Err(Error::Config(format!(
                "estimate ratio of {} bps exceeds 100%",
                self.dex.estimate_ratio_bps
            )));
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.chain.rpc_timeout_secs)
    }

    pub fn dex_timeout(&self) -> Duration {
        Duration::from_secs(self.dex.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry.delay_ms)
    }
}

fn parse_address(key: &str, value: &str) -> Result<Address> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|e| Error::Config(format!("{} is not a valid address: {}", key, e)))
}

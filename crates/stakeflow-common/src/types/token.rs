use {
    alloy_primitives::{Address, U256},
    serde::{Deserialize, Serialize},
};

use crate::{types::event::PLACEHOLDER_SYMBOL, utils::units::format_token_amount};

pub const DEFAULT_DECIMALS: u8 = 18;

/// Snapshot of the staking token as seen by the connected account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    /// Base units held by the owner.
    pub balance: U256,
    /// Base units the staking contract may pull from the owner.
    pub allowance: U256,
    /// `None` when the name lookup failed; display falls back to the symbol.
    pub name: Option<String>,
}

impl TokenInfo {
    /// Zeroed stand-in used when the token could not be read at all.
    pub fn placeholder(address: Address) -> Self {
        Self {
            address,
            symbol: PLACEHOLDER_SYMBOL.to_string(),
            decimals: DEFAULT_DECIMALS,
            balance: U256::ZERO,
            allowance: U256::ZERO,
            name: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.symbol)
    }

    pub fn display_balance(&self) -> String {
        format_token_amount(self.balance, self.decimals)
    }

    pub fn display_allowance(&self) -> String {
        format_token_amount(self.allowance, self.decimals)
    }
}

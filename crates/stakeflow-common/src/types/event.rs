use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

use crate::utils::time::now_millis;

/// Token symbol recorded when the real one could not be resolved.
pub const PLACEHOLDER_SYMBOL: &str = "TOKEN";

/// APY annotation for events that carry no yield.
pub const NO_APY: &str = "0%";

const UNSTAKE_PREFIX: &str = "Unstake from ";

/// One immutable row of the activity ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeEvent {
    /// When the event was recorded locally, not when the chain confirmed it.
    pub timestamp: DateTime<Utc>,
    pub subject_name: String,
    pub pool_name: String,
    /// Positive for stakes, negative for unstakes.
    pub amount: f64,
    pub token_symbol: String,
    pub apy: String,
    pub user_address: Option<String>,
    pub transaction_hash: Option<String>,
    pub category: Option<String>,
}

impl StakeEvent {
    pub fn stake(
        pool_name: impl Into<String>,
        amount: f64,
        token_symbol: impl Into<String>,
        apy: impl Into<String>,
    ) -> Self {
        let pool_name = pool_name.into();
        Self {
            timestamp: now_millis(),
            subject_name: derive_subject(&pool_name),
            pool_name,
            amount,
            token_symbol: symbol_or_placeholder(token_symbol.into()),
            apy: apy.into(),
            user_address: None,
            transaction_hash: None,
            category: None,
        }
    }

    /// Unstakes are stored as a labelled row with a negative amount.
    pub fn unstake(subject_name: impl Into<String>, amount: f64, token_symbol: impl Into<String>) -> Self {
        let subject_name = subject_name.into();
        Self {
            timestamp: now_millis(),
            pool_name: format!("{}{}", UNSTAKE_PREFIX, subject_name),
            subject_name,
            amount: -amount.abs(),
            token_symbol: symbol_or_placeholder(token_symbol.into()),
            apy: NO_APY.to_string(),
            user_address: None,
            transaction_hash: None,
            category: None,
        }
    }

    pub fn with_provenance(mut self, user_address: Option<String>, transaction_hash: Option<String>) -> Self {
        self.user_address = user_address.filter(|s| !s.is_empty());
        self.transaction_hash = transaction_hash.filter(|s| !s.is_empty());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_stake(&self) -> bool {
        self.amount > 0.0
    }

    pub fn is_unstake(&self) -> bool {
        self.amount < 0.0 && self.pool_name.starts_with(UNSTAKE_PREFIX)
    }
}

fn symbol_or_placeholder(symbol: String) -> String {
    if symbol.trim().is_empty() {
        PLACEHOLDER_SYMBOL.to_string()
    } else {
        symbol
    }
}

/// Groups pools under their counterparty: the first word of the display name.
pub fn derive_subject(pool_name: &str) -> String {
    pool_name
        .split_whitespace()
        .next()
        .unwrap_or("Unknown")
        .to_string()
}

/// Subjects compare ASCII case-insensitively everywhere; this is the canonical key.
pub fn subject_key(subject: &str) -> String {
    subject.to_ascii_lowercase()
}

use serde::{Deserialize, Serialize};

/// Running per-subject total derived from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateBalance {
    /// Never negative; unstakes beyond the recorded stake clamp to zero.
    pub total_staked: f64,
    pub token_symbol: String,
}

impl AggregateBalance {
    pub fn new(token_symbol: impl Into<String>) -> Self {
        Self {
            total_staked: 0.0,
            token_symbol: token_symbol.into(),
        }
    }

    /// Applies a signed adjustment and returns the amount clamped away, if any.
    pub fn apply(&mut self, delta: f64) -> f64 {
        let next = self.total_staked + delta;
        if next < 0.0 {
            self.total_staked = 0.0;
            -next
        } else {
            self.total_staked = next;
            0.0
        }
    }
}

/// Gap between the local aggregate and the chain's own accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub subject: String,
    pub local: f64,
    pub on_chain: f64,
}

impl Divergence {
    pub fn gap(&self) -> f64 {
        (self.local - self.on_chain).abs()
    }
}

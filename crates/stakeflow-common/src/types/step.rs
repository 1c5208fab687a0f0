use {
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Stages of the auto-stake pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKey {
    Switch,
    Swap,
    Approve,
    Stake,
}

impl StepKey {
    pub const ALL: [StepKey; 4] = [StepKey::Switch, StepKey::Swap, StepKey::Approve, StepKey::Stake];

    pub fn index(self) -> usize {
        match self {
            StepKey::Switch => 0,
            StepKey::Swap => 1,
            StepKey::Approve => 2,
            StepKey::Stake => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StepKey::Switch => "Switch network",
            StepKey::Swap => "Swap into staking token (if needed)",
            StepKey::Approve => "Approve tokens",
            StepKey::Stake => "Stake tokens",
        }
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self {
            StepKey::Switch => "switch",
            StepKey::Swap => "swap",
            StepKey::Approve => "approve",
            StepKey::Stake => "stake",
        };
        f.write_str(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Done,
    Error,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Done | StepStatus::Error | StepStatus::Skipped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationStep {
    pub key: StepKey,
    pub status: StepStatus,
    pub detail: Option<String>,
}

impl OrchestrationStep {
    pub fn pending(key: StepKey) -> Self {
        Self {
            key,
            status: StepStatus::Pending,
            detail: None,
        }
    }
}

//! Error types for the stakeflow system

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Request rejected in wallet")]
    UserRejected,

    #[error("Invalid contract: {0}")]
    InvalidContract(String),

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Insufficient allowance: {0}")]
    InsufficientAllowance(String),

    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("Insufficient token balance after swap: have {have}, need {need}")]
    InsufficientBalanceAfterSwap { have: String, need: String },

    #[error("Swap quote unavailable: {0}")]
    QuoteUnavailable(String),

    #[error("Ledger write failed: {0}")]
    LedgerWrite(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid ledger event: {0}")]
    InvalidEvent(String),

    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Auto-stake already in progress for {0}")]
    WorkflowInProgress(String),

    #[error("Network changed to chain {actual} during workflow, expected {expected}")]
    NetworkChanged { expected: u64, actual: u64 },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Only transport-level failures are worth an automatic retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::NetworkUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Raw failure reported by a wallet, RPC node or contract binding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("no contract code at {0}")]
    NoCode(String),

    #[error("execution reverted: {0}")]
    Reverted(String),
}

impl ProviderError {
    pub const USER_REJECTED: i64 = 4001;
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const LIMIT_EXCEEDED: i64 = -32005;
    pub const RESOURCE_UNAVAILABLE: i64 = -32002;

    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        ProviderError::Rpc {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<i64> {
        match self {
            ProviderError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.code() == Some(Self::UNRECOGNIZED_CHAIN)
    }
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Rpc { code, .. } if code == ProviderError::USER_REJECTED => {
                Error::UserRejected
            }
            ProviderError::Rpc { code, message }
                if code == ProviderError::INTERNAL_ERROR
                    || code == ProviderError::LIMIT_EXCEEDED
                    || code == ProviderError::RESOURCE_UNAVAILABLE =>
            {
                Error::NetworkUnavailable(message)
            }
            ProviderError::Rpc { message, .. } => Error::Provider(message),
            ProviderError::Transport(message) => Error::NetworkUnavailable(message),
            ProviderError::Timeout => Error::NetworkUnavailable("request timed out".into()),
            ProviderError::NoCode(address) => {
                Error::InvalidContract(format!("no contract deployed at {}", address))
            }
            ProviderError::Reverted(reason) => Error::TransactionFailed(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_classification() {
        let rejected: Error = ProviderError::rpc(4001, "User denied").into();
        assert!(matches!(rejected, Error::UserRejected));

        let internal: Error = ProviderError::rpc(-32603, "Internal JSON-RPC error").into();
        assert!(internal.is_retryable());

        let timeout: Error = ProviderError::Timeout.into();
        assert!(timeout.is_retryable());

        let no_code: Error = ProviderError::NoCode("0xdead".into()).into();
        assert!(matches!(no_code, Error::InvalidContract(_)));
        assert!(!no_code.is_retryable());

        let other: Error = ProviderError::rpc(-32000, "insufficient funds").into();
        assert!(matches!(other, Error::Provider(ref m) if m == "insufficient funds"));
    }

    #[test]
    fn test_unrecognized_chain_code() {
        assert!(ProviderError::rpc(4902, "Unrecognized chain").is_unrecognized_chain());
        assert!(!ProviderError::Timeout.is_unrecognized_chain());
    }
}

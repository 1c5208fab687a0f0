use {
    alloy_primitives::{Address, Bytes, TxHash, U256},
    serde::{Deserialize, Serialize},
};

/// Unsigned transaction handed to the wallet for signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub to: Address,
    pub data: Bytes,
    pub value: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub transaction_hash: TxHash,
    /// `true` when the transaction executed without reverting.
    pub status: bool,
    pub block_number: Option<u64>,
}

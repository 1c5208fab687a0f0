//! Collaborator interfaces consumed by the orchestrator.
//!
//! Implementations wrap a wallet connection, an RPC node or a contract
//! binding. They report raw [`ProviderError`]s; classification into the
//! user-facing [`Error`] taxonomy happens on this side of the seam.

use {
    alloy_primitives::{Address, TxHash, U256},
    async_trait::async_trait,
    stakeflow_common::{ChainParams, Error, ProviderError, Result, TransactionRequest, TxReceipt},
    std::{future::Future, sync::Arc, time::Duration},
    tokio::sync::broadcast,
};

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Account, session and chain-switch primitives of the connected wallet.
#[async_trait]
pub trait WalletProvider: Send + Sync + 'static {
    /// Accounts exposed by the wallet, primary first
    async fn accounts(&self) -> ProviderResult<Vec<Address>>;

    /// Chain the wallet is currently connected to
    async fn chain_id(&self) -> ProviderResult<u64>;

    /// Ask the wallet to switch chains
    async fn switch_chain(&self, chain_id: u64) -> ProviderResult<()>;

    /// Register a chain the wallet does not know yet
    async fn add_chain(&self, params: &ChainParams) -> ProviderResult<()>;

    /// Sign and broadcast a transaction
    async fn send_transaction(&self, tx: &TransactionRequest) -> ProviderResult<TxHash>;

    /// Wait until the transaction is mined
    async fn wait_for_receipt(&self, hash: TxHash) -> ProviderResult<TxReceipt>;

    /// Chain ids announced by the wallet whenever the user switches networks
    fn chain_changed(&self) -> broadcast::Receiver<u64>;
}

/// ERC-20 reads and the approve call, for any token address.
#[async_trait]
pub trait Erc20Client: Send + Sync + 'static {
    /// Size of the deployed bytecode at `token`
    async fn code_size(&self, token: Address) -> ProviderResult<usize>;

    async fn decimals(&self, token: Address) -> ProviderResult<u8>;

    async fn symbol(&self, token: Address) -> ProviderResult<String>;

    async fn name(&self, token: Address) -> ProviderResult<String>;

    async fn balance_of(&self, token: Address, owner: Address) -> ProviderResult<U256>;

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> ProviderResult<U256>;

    /// Submit `approve(spender, amount)` from the connected account
    async fn approve(&self, token: Address, spender: Address, amount: U256) -> ProviderResult<TxHash>;
}

/// The on-chain staking contract. Its accounting is authoritative.
#[async_trait]
pub trait StakingContract: Send + Sync + 'static {
    /// Address of the contract, which is also the allowance spender
    fn address(&self) -> Address;

    async fn stake(&self, amount: U256) -> ProviderResult<TxHash>;

    async fn unstake(&self, amount: U256) -> ProviderResult<TxHash>;

    async fn staked_balance(&self, account: Address) -> ProviderResult<U256>;

    async fn total_staked(&self) -> ProviderResult<U256>;

    /// Token the contract accepts
    async fn token(&self) -> ProviderResult<Address>;
}

/// Bounds a provider read; an elapsed timer reads as a network failure.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = ProviderResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(Error::from),
        Err(_) => Err(ProviderError::Timeout.into()),
    }
}

/// The wallet's primary account.
pub async fn connected_account(wallet: &dyn WalletProvider) -> Result<Address> {
    wallet
        .accounts()
        .await?
        .first()
        .copied()
        .ok_or(Error::WalletNotConnected)
}

/// Waits for a receipt and turns a reverted transaction into an error.
pub async fn confirm(wallet: &dyn WalletProvider, hash: TxHash, what: &str) -> Result<TxReceipt> {
    let receipt = wallet.wait_for_receipt(hash).await?;
    if !receipt.status {
        return Err(Error::TransactionFailed(format!("{} transaction {} reverted", what, hash)));
    }
    Ok(receipt)
}

/// The external systems one orchestrator talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub wallet: Arc<dyn WalletProvider>,
    pub erc20: Arc<dyn Erc20Client>,
    pub staking: Arc<dyn StakingContract>,
}

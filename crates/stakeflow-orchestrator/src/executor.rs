use {
    crate::provider::{confirm, with_timeout, StakingContract, WalletProvider},
    alloy_primitives::{Address, TxHash, U256},
    stakeflow_common::{Result, TxReceipt},
    std::{sync::Arc, time::Duration},
    tracing::info,
};

/// Submits stake and unstake transactions and waits for them to be mined.
pub struct StakeExecutor {
    staking: Arc<dyn StakingContract>,
    wallet: Arc<dyn WalletProvider>,
    timeout: Duration,
}

impl StakeExecutor {
    pub fn new(staking: Arc<dyn StakingContract>, wallet: Arc<dyn WalletProvider>, timeout: Duration) -> Self {
        Self {
            staking,
            wallet,
            timeout,
        }
    }

    pub fn contract_address(&self) -> Address {
        self.staking.address()
    }

    pub async fn stake(&self, amount: U256) -> Result<TxReceipt> {
        let hash = self.submit_stake(amount).await?;
        self.confirm(hash, "stake").await
    }

    pub async fn unstake(&self, amount: U256) -> Result<TxReceipt> {
        let hash = self.submit_unstake(amount).await?;
        self.confirm(hash, "unstake").await
    }

    /// Broadcast a stake without waiting for it to be mined.
    pub async fn submit_stake(&self, amount: U256) -> Result<TxHash> {
        let hash = self.staking.stake(amount).await?;
        info!("Stake of {} submitted: {}", amount, hash);
        Ok(hash)
    }

    pub async fn submit_unstake(&self, amount: U256) -> Result<TxHash> {
        let hash = self.staking.unstake(amount).await?;
        info!("Unstake of {} submitted: {}", amount, hash);
        Ok(hash)
    }

    /// Wait for an already submitted transaction. Safe to repeat for the same hash.
    pub async fn confirm(&self, hash: TxHash, what: &str) -> Result<TxReceipt> {
        let receipt = confirm(self.wallet.as_ref(), hash, what).await?;
        info!("{} {} confirmed in block {:?}", what, hash, receipt.block_number);
        Ok(receipt)
    }

    pub async fn staked_balance(&self, account: Address) -> Result<U256> {
        with_timeout(self.timeout, self.staking.staked_balance(account)).await
    }

    pub async fn total_staked(&self) -> Result<U256> {
        with_timeout(self.timeout, self.staking.total_staked()).await
    }

    pub async fn staking_token(&self) -> Result<Address> {
        with_timeout(self.timeout, self.staking.token()).await
    }
}

//! Direct approve, stake and unstake without the auto-stake pipeline.

use {
    crate::{
        executor::StakeExecutor,
        gateway::{AllowanceOutcome, LoadOptions, TokenGateway},
        provider::{connected_account, Collaborators, WalletProvider},
    },
    alloy_primitives::{Address, U256},
    stakeflow_common::{
        config::RetryConfig,
        utils::{format_token_amount, parse_token_amount, token_amount_to_f64},
        Error, Result, StakeEvent, StakeflowConfig, TokenInfo, TxReceipt,
    },
    stakeflow_ledger::Ledger,
    std::{future::Future, sync::Arc, time::Duration},
    tracing::{info, warn},
};

/// Bounded retry for network-classified failures only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_millis(1_000),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: Duration::from_millis(config.delay_ms),
        }
    }
}

impl RetryPolicy {
    pub async fn run<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        what, e, attempt, self.max_retries, self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

pub struct ManualStaker {
    wallet: Arc<dyn WalletProvider>,
    gateway: TokenGateway,
    executor: StakeExecutor,
    ledger: Ledger,
    token: Address,
    retry: RetryPolicy,
}

impl ManualStaker {
    pub fn new(collaborators: &Collaborators, ledger: Ledger, config: &StakeflowConfig) -> Self {
        Self {
            wallet: collaborators.wallet.clone(),
            gateway: TokenGateway::new(
                collaborators.erc20.clone(),
                collaborators.wallet.clone(),
                config.rpc_timeout(),
            ),
            executor: StakeExecutor::new(
                collaborators.staking.clone(),
                collaborators.wallet.clone(),
                config.rpc_timeout(),
            ),
            ledger,
            token: config.staking.token_address,
            retry: RetryPolicy::from(&config.retry),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn load(&self) -> Result<(Address, TokenInfo)> {
        let owner = connected_account(self.wallet.as_ref()).await?;
        let options = LoadOptions::full(self.executor.contract_address());
        let info = self
            .retry
            .run("token load", || async move {
                self.gateway
                    .load_token_info(self.token, owner, options)
                    .await
                    .into_result()
            })
            .await?;
        Ok((owner, info))
    }

    /// Approve the staking contract for exactly `amount`.
    pub async fn approve(&self, amount: &str) -> Result<AllowanceOutcome> {
        let (owner, info) = self.load().await?;
        let desired = parse_token_amount(amount, info.decimals)?;
        let spender = self.executor.contract_address();
        self.retry
            .run("approve", || self.gateway.ensure_allowance(owner, spender, desired))
            .await
    }

    pub async fn stake(&self, pool_name: &str, amount: &str, apy: &str) -> Result<TxReceipt> {
        let (owner, info) = self.load().await?;
        let desired = parse_token_amount(amount, info.decimals)?;
        if info.allowance < desired {
            return Err(Error::InsufficientAllowance(format!(
                "allowance {} {} is below {}; approve tokens first",
                info.display_allowance(),
                info.symbol,
                format_token_amount(desired, info.decimals)
            )));
        }

        let hash = self.retry.run("stake", || self.executor.submit_stake(desired)).await?;
        let receipt = self
            .retry
            .run("stake receipt", || self.executor.confirm(hash, "stake"))
            .await?;
        let event = StakeEvent::stake(pool_name, token_amount_to_f64(desired, info.decimals), info.symbol.clone(), apy)
            .with_provenance(Some(owner.to_string()), Some(receipt.transaction_hash.to_string()));
        self.ledger.record_stake(event).await;
        self.refresh_after(owner).await;
        Ok(receipt)
    }

    pub async fn unstake(&self, subject: &str, amount: &str) -> Result<TxReceipt> {
        let (owner, info) = self.load().await?;
        let desired = parse_token_amount(amount, info.decimals)?;

        let hash = self.retry.run("unstake", || self.executor.submit_unstake(desired)).await?;
        let receipt = self
            .retry
            .run("unstake receipt", || self.executor.confirm(hash, "unstake"))
            .await?;
        let event = StakeEvent::unstake(subject, token_amount_to_f64(desired, info.decimals), info.symbol.clone())
            .with_provenance(Some(owner.to_string()), Some(receipt.transaction_hash.to_string()));
        self.ledger.record_unstake(event).await;
        self.refresh_after(owner).await;
        Ok(receipt)
    }

    /// On-chain stake of the connected account, in base units.
    pub async fn staked_balance(&self) -> Result<U256> {
        let owner = connected_account(self.wallet.as_ref()).await?;
        self.executor.staked_balance(owner).await
    }

    async fn refresh_after(&self, owner: Address) {
        match self
            .gateway
            .refresh(owner, Some(self.executor.contract_address()))
            .await
        {
            Ok(info) => info!("Balance now {} {}", info.display_balance(), info.symbol),
            Err(e) => warn!("Token refresh failed: {}", e),
        }
    }
}

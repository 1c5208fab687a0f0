//! Token metadata, balance and allowance access for the connected account

use {
    crate::provider::{confirm, with_timeout, Erc20Client, WalletProvider},
    alloy_primitives::{Address, TxHash, U256},
    stakeflow_common::{Error, Result, TokenInfo},
    std::{sync::Arc, time::Duration},
    tokio::sync::RwLock,
    tracing::{debug, info, warn},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Allowance is read against this spender; zero when absent.
    pub spender: Option<Address>,
    /// Skip `balanceOf`/`allowance` when false.
    pub include_balances: bool,
}

impl LoadOptions {
    pub fn full(spender: Address) -> Self {
        Self {
            spender: Some(spender),
            include_balances: true,
        }
    }

    pub fn metadata_only() -> Self {
        Self::default()
    }
}

/// Result of a token load. A degraded load still carries a renderable
/// [`TokenInfo`] so callers can draw the screen without the real figures.
#[derive(Debug)]
pub enum TokenLoad {
    Loaded(TokenInfo),
    Degraded { info: TokenInfo, reason: Error },
}

impl TokenLoad {
    pub fn info(&self) -> &TokenInfo {
        match self {
            TokenLoad::Loaded(info) | TokenLoad::Degraded { info, .. } => info,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, TokenLoad::Degraded { .. })
    }

    pub fn into_result(self) -> Result<TokenInfo> {
        match self {
            TokenLoad::Loaded(info) => Ok(info),
            TokenLoad::Degraded { reason, .. } => Err(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowanceOutcome {
    AlreadySufficient,
    Approved(TxHash),
}

pub struct TokenGateway {
    erc20: Arc<dyn Erc20Client>,
    wallet: Arc<dyn WalletProvider>,
    timeout: Duration,
    cache: RwLock<Option<TokenInfo>>,
}

impl TokenGateway {
    pub fn new(erc20: Arc<dyn Erc20Client>, wallet: Arc<dyn WalletProvider>, timeout: Duration) -> Self {
        Self {
            erc20,
            wallet,
            timeout,
            cache: RwLock::new(None),
        }
    }

    /// Last loaded token snapshot
    pub async fn cached(&self) -> Option<TokenInfo> {
        self.cache.read().await.clone()
    }

    pub async fn load_token_info(&self, address: Address, owner: Address, options: LoadOptions) -> TokenLoad {
        let load = self.fetch(address, owner, options).await;
        if let TokenLoad::Degraded { reason, .. } = &load {
            warn!("Token {} degraded: {}", address, reason);
        }
        *self.cache.write().await = Some(load.info().clone());
        load
    }

    async fn fetch(&self, address: Address, owner: Address, options: LoadOptions) -> TokenLoad {
        let degraded = |info: TokenInfo, reason: Error| TokenLoad::Degraded { info, reason };

        match with_timeout(self.timeout, self.erc20.code_size(address)).await {
            Ok(0) => {
                return degraded(
                    TokenInfo::placeholder(address),
                    Error::InvalidContract(format!("no contract deployed at {}", address)),
                )
            }
            Ok(_) => {}
            Err(e) => return degraded(TokenInfo::placeholder(address), e),
        }

        let decimals = match with_timeout(self.timeout, self.erc20.decimals(address)).await {
            Ok(decimals) => decimals,
            Err(e) => return degraded(TokenInfo::placeholder(address), metadata_failure(address, "decimals", e)),
        };
        let symbol = match with_timeout(self.timeout, self.erc20.symbol(address)).await {
            Ok(symbol) => symbol,
            Err(e) => return degraded(TokenInfo::placeholder(address), metadata_failure(address, "symbol", e)),
        };
        let name = match with_timeout(self.timeout, self.erc20.name(address)).await {
            Ok(name) if !name.trim().is_empty() => Some(name),
            Ok(_) => None,
            Err(e) => {
                debug!("Token {} name unavailable, falling back to symbol: {}", address, e);
                None
            }
        };

        let mut info = TokenInfo {
            address,
            symbol,
            decimals,
            balance: U256::ZERO,
            allowance: U256::ZERO,
            name,
        };

        if options.include_balances {
            if let Err(e) = self.read_balances(&mut info, owner, options.spender).await {
                return degraded(info, e);
            }
        }
        TokenLoad::Loaded(info)
    }

    async fn read_balances(&self, info: &mut TokenInfo, owner: Address, spender: Option<Address>) -> Result<()> {
        info.balance = with_timeout(self.timeout, self.erc20.balance_of(info.address, owner)).await?;
        info.allowance = match spender {
            Some(spender) => {
                with_timeout(self.timeout, self.erc20.allowance(info.address, owner, spender)).await?
            }
            None => U256::ZERO,
        };
        Ok(())
    }

    /// Re-reads balance and allowance for the cached token.
    pub async fn refresh(&self, owner: Address, spender: Option<Address>) -> Result<TokenInfo> {
        let mut info = self
            .cached()
            .await
            .ok_or_else(|| Error::Other("token info has not been loaded".into()))?;
        self.read_balances(&mut info, owner, spender).await?;
        debug!(
            "Refreshed {}: balance {}, allowance {}",
            info.symbol,
            info.display_balance(),
            info.display_allowance()
        );
        *self.cache.write().await = Some(info.clone());
        Ok(info)
    }

    /// Approves exactly `amount` when the cached allowance falls short.
    pub async fn ensure_allowance(&self, owner: Address, spender: Address, amount: U256) -> Result<AllowanceOutcome> {
        let info = self
            .cached()
            .await
            .ok_or_else(|| Error::Other("token info has not been loaded".into()))?;
        if info.allowance >= amount {
            debug!("Allowance {} covers {}", info.allowance, amount);
            return Ok(AllowanceOutcome::AlreadySufficient);
        }

        info!(
            "Approving {} {} for {}",
            stakeflow_common::utils::format_token_amount(amount, info.decimals),
            info.symbol,
            spender
        );
        let hash = self.erc20.approve(info.address, spender, amount).await?;
        confirm(self.wallet.as_ref(), hash, "approve").await?;
        self.refresh(owner, Some(spender)).await?;
        Ok(AllowanceOutcome::Approved(hash))
    }
}

// Transport failures stay retryable; anything else means the address
// does not behave like a token.
fn metadata_failure(address: Address, call: &str, err: Error) -> Error {
    if err.is_retryable() {
        err
    } else {
        Error::InvalidContract(format!("{} failed {}(): {}", address, call, err))
    }
}

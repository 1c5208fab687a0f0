use {
    crate::provider::WalletProvider,
    stakeflow_common::{config::chain_params, Error, Result},
    std::sync::Arc,
    tracing::{debug, info, warn},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainSwitch {
    /// No target chain configured; nothing was asked of the wallet.
    NotConfigured,
    AlreadyOnChain(u64),
    Switched(u64),
    /// The wallet did not know the chain, so it was added first.
    AddedAndSwitched(u64),
}

/// Keeps the wallet on the staking contract's chain.
pub struct NetworkGuard {
    wallet: Arc<dyn WalletProvider>,
}

impl NetworkGuard {
    pub fn new(wallet: Arc<dyn WalletProvider>) -> Self {
        Self { wallet }
    }

    pub async fn ensure_chain(&self, target: Option<u64>) -> Result<ChainSwitch> {
        let Some(target) = target else {
            return Ok(ChainSwitch::NotConfigured);
        };

        match self.wallet.chain_id().await {
            Ok(current) if current == target => return Ok(ChainSwitch::AlreadyOnChain(target)),
            Ok(current) => debug!("Wallet on chain {}, switching to {}", current, target),
            Err(e) => debug!("Could not read wallet chain, switching anyway: {}", e),
        }

        match self.wallet.switch_chain(target).await {
            Ok(()) => {
                info!("Switched wallet to chain {}", target);
                Ok(ChainSwitch::Switched(target))
            }
            Err(e) if e.is_unrecognized_chain() => {
                let params = chain_params(target)
                    .ok_or_else(|| Error::Config("Unsupported network for auto add".into()))?;
                warn!("Wallet does not know chain {}, adding {}", target, params.chain_name);
                self.wallet.add_chain(&params).await?;
                self.wallet.switch_chain(target).await?;
                info!("Added and switched wallet to chain {}", target);
                Ok(ChainSwitch::AddedAndSwitched(target))
            }
            Err(e) => Err(e.into()),
        }
    }
}

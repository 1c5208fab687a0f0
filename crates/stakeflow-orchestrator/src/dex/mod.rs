//! Swap quotes and swap transactions from an external DEX aggregator.
//!
//! Quoting degrades to a flagged local estimate when the aggregator cannot
//! be reached. Building a swap transaction never does: a guessed
//! transaction could move funds, so any failure there is returned as is.

pub mod normalize;
pub mod okx;

pub use okx::HttpDexAggregator;

use {
    alloy_primitives::{Address, U256},
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    serde_json::Value,
    stakeflow_common::{Error, Result, TransactionRequest},
    std::sync::Arc,
    tracing::{debug, info, warn},
};

const BPS_DENOMINATOR: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub chain_id: u64,
    pub from_token: Address,
    pub to_token: Address,
    /// Base units of `from_token`.
    pub amount_in: U256,
    pub slippage_bps: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub chain_id: u64,
    pub from_token: Address,
    pub to_token: Address,
    pub amount_in: U256,
    pub slippage_bps: u16,
    pub user_address: Address,
}

impl SwapRequest {
    pub fn from_quote(quote: &QuoteRequest, user_address: Address) -> Self {
        Self {
            chain_id: quote.chain_id,
            from_token: quote.from_token,
            to_token: quote.to_token,
            amount_in: quote.amount_in,
            slippage_bps: quote.slippage_bps,
            user_address,
        }
    }
}

/// Raw access to an aggregator. Responses are returned undecoded; the
/// bridge owns envelope checks and normalisation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DexAggregator: Send + Sync + 'static {
    /// Price a swap
    async fn quote(&self, request: &QuoteRequest) -> Result<Value>;

    /// Build a ready-to-sign swap transaction
    async fn swap(&self, request: &SwapRequest) -> Result<Value>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexQuote {
    pub amount_in: U256,
    pub amount_out: U256,
    pub estimated_gas: Option<U256>,
    pub router_address: Option<Address>,
    /// Set when `amount_out` is a local estimate rather than an aggregator price.
    pub is_estimate_only: bool,
    pub fallback_reason: Option<String>,
}

impl DexQuote {
    /// Only a real aggregator price may back an executed swap.
    pub fn ensure_executable(&self) -> Result<()> {
        if self.is_estimate_only {
            return Err(Error::QuoteUnavailable(
                self.fallback_reason
                    .clone()
                    .unwrap_or_else(|| "aggregator unreachable".to_string()),
            ));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct DexBridge {
    aggregator: Arc<dyn DexAggregator>,
    estimate_ratio_bps: u16,
}

impl DexBridge {
    pub fn new(aggregator: Arc<dyn DexAggregator>, estimate_ratio_bps: u16) -> Self {
        Self {
            aggregator,
            estimate_ratio_bps,
        }
    }

    /// Never fails. When the aggregator errors the quote is an estimate
    /// with `is_estimate_only` set.
    pub async fn get_quote(&self, request: &QuoteRequest) -> DexQuote {
        match self.fetch_quote(request).await {
            Ok(quote) => {
                debug!(
                    "Quote {} -> {}: {} in, {} out",
                    request.from_token, request.to_token, request.amount_in, quote.amount_out
                );
                quote
            }
            Err(e) => {
                warn!("DEX quote failed, using local estimate: {}", e);
                self.estimate(request, e.to_string())
            }
        }
    }

    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<DexQuote> {
        let body = self.aggregator.quote(request).await?;
        normalize::check_envelope(&body)?;
        let quote = normalize::normalize_quote(&body)?;
        Ok(DexQuote {
            amount_in: request.amount_in,
            amount_out: quote.amount_out,
            estimated_gas: quote.estimated_gas,
            router_address: quote.router_address,
            is_estimate_only: false,
            fallback_reason: None,
        })
    }

    fn estimate(&self, request: &QuoteRequest, reason: String) -> DexQuote {
        let amount_out = request.amount_in * U256::from(self.estimate_ratio_bps) / U256::from(BPS_DENOMINATOR);
        DexQuote {
            amount_in: request.amount_in,
            amount_out,
            estimated_gas: None,
            router_address: None,
            is_estimate_only: true,
            fallback_reason: Some(reason),
        }
    }

    /// Fails closed: any aggregator or payload problem is returned.
    pub async fn build_swap_transaction(&self, request: &SwapRequest) -> Result<TransactionRequest> {
        let body = self.aggregator.swap(request).await?;
        normalize::check_envelope(&body)?;
        let tx = normalize::normalize_swap(&body)?;
        info!("Built swap transaction to {} for {}", tx.to, request.user_address);
        Ok(tx)
    }
}

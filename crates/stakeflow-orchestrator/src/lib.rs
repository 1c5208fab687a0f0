//! This is the stakeflow-orchestrator crate - the auto-stake pipeline
//! (network switch, swap, approve, stake) and the manual staking flow,
//! both recording into the local ledger after on-chain confirmation.

pub mod dex;
pub mod executor;
pub mod gateway;
pub mod lease;
pub mod manual;
pub mod network;
pub mod orchestrator;
pub mod pipeline;
pub mod provider;

#[cfg(test)]
mod mock;

pub use {
    dex::{DexAggregator, DexBridge, DexQuote, HttpDexAggregator, QuoteRequest, SwapRequest},
    executor::StakeExecutor,
    gateway::{AllowanceOutcome, LoadOptions, TokenGateway, TokenLoad},
    lease::{SubjectLease, SubjectLocks},
    manual::{ManualStaker, RetryPolicy},
    network::{ChainSwitch, NetworkGuard},
    orchestrator::{AutoStakeOrchestrator, AutoStakeOutcome, AutoStakeRequest},
    pipeline::{reduce, PipelineEvent, PipelineState},
    provider::{Collaborators, Erc20Client, ProviderResult, StakingContract, WalletProvider},
};

//! The auto-stake workflow: switch network, swap any shortfall, approve, stake.
//!
//! Steps run strictly in order and each one awaits its external call before
//! the next begins. The first failure halts the run; there is no automatic
//! resume. Re-running the whole workflow is safe because every step except
//! the stake itself is skipped once its effect is already in place.

use {
    crate::{
        dex::{DexBridge, QuoteRequest, SwapRequest},
        executor::StakeExecutor,
        gateway::{AllowanceOutcome, LoadOptions, TokenGateway},
        lease::SubjectLocks,
        network::{ChainSwitch, NetworkGuard},
        pipeline::{reduce, PipelineEvent, PipelineState},
        provider::{confirm, connected_account, Collaborators, WalletProvider},
    },
    alloy_primitives::{Address, U256},
    serde::{Deserialize, Serialize},
    stakeflow_common::{
        derive_subject,
        utils::{format_token_amount, parse_ledger_amount, parse_token_amount, token_amount_to_f64},
        Divergence, Error, Result, StakeEvent, StakeflowConfig, StepKey, TokenInfo, TxReceipt,
    },
    stakeflow_ledger::Ledger,
    std::sync::Arc,
    tokio::sync::{
        broadcast::{self, error::TryRecvError},
        watch,
    },
    tracing::{error, info, warn},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoStakeRequest {
    /// Display name; its first word is the subject.
    pub pool_name: String,
    /// Decimal token amount as entered, e.g. `"10"` or `"2.5"`.
    pub amount: String,
    pub apy: String,
    /// Token to swap from when the balance falls short.
    pub source_token: Option<Address>,
    pub slippage_bps: Option<u16>,
    pub category: Option<String>,
}

impl AutoStakeRequest {
    pub fn new(pool_name: impl Into<String>, amount: impl Into<String>, apy: impl Into<String>) -> Self {
        Self {
            pool_name: pool_name.into(),
            amount: amount.into(),
            apy: apy.into(),
            source_token: None,
            slippage_bps: None,
            category: None,
        }
    }

    pub fn with_source_token(mut self, token: Address) -> Self {
        self.source_token = Some(token);
        self
    }
}

#[derive(Debug, Clone)]
pub struct AutoStakeOutcome {
    pub receipt: TxReceipt,
    /// The ledger row written for the confirmed stake.
    pub event: StakeEvent,
    pub state: PipelineState,
    /// Set when the ledger's total disagrees with the account's on-chain stake.
    pub divergence: Option<Divergence>,
}

struct Prepared {
    owner: Address,
    info: TokenInfo,
    desired: U256,
}

pub struct AutoStakeOrchestrator {
    wallet: Arc<dyn WalletProvider>,
    gateway: TokenGateway,
    dex: DexBridge,
    guard: NetworkGuard,
    executor: StakeExecutor,
    ledger: Ledger,
    locks: SubjectLocks,
    target_chain: Option<u64>,
    token: Address,
    default_slippage_bps: u16,
    state: watch::Sender<PipelineState>,
}

impl AutoStakeOrchestrator {
    pub fn new(collaborators: &Collaborators, dex: DexBridge, ledger: Ledger, config: &StakeflowConfig) -> Self {
        let (state, _) = watch::channel(PipelineState::default());
        Self {
            wallet: collaborators.wallet.clone(),
            gateway: TokenGateway::new(
                collaborators.erc20.clone(),
                collaborators.wallet.clone(),
                config.rpc_timeout(),
            ),
            dex,
            guard: NetworkGuard::new(collaborators.wallet.clone()),
            executor: StakeExecutor::new(
                collaborators.staking.clone(),
                collaborators.wallet.clone(),
                config.rpc_timeout(),
            ),
            ledger,
            locks: SubjectLocks::new(),
            target_chain: config.chain.chain_id,
            token: config.staking.token_address,
            default_slippage_bps: config.dex.slippage_bps,
            state,
        }
    }

    /// Share leases with other orchestrators in the process.
    pub fn with_locks(mut self, locks: SubjectLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &SubjectLocks {
        &self.locks
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Step state of the most recent run.
    pub fn state(&self) -> PipelineState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    pub async fn token_info(&self) -> Option<TokenInfo> {
        self.gateway.cached().await
    }

    pub async fn run(&self, request: AutoStakeRequest) -> Result<AutoStakeOutcome> {
        parse_ledger_amount(&request.amount)?;
        let subject = derive_subject(&request.pool_name);
        let _lease = self.locks.acquire(&subject)?;

        self.apply(PipelineEvent::Reset);
        let mut chain_changes = self.wallet.chain_changed();
        info!("Auto-stake of {} into {} started", request.amount, request.pool_name);

        let result = self.execute(&request, &mut chain_changes).await;
        match &result {
            Ok(outcome) => info!(
                "Auto-stake into {} confirmed in {}",
                request.pool_name, outcome.receipt.transaction_hash
            ),
            Err(e) => error!("Auto-stake into {} failed: {}", request.pool_name, e),
        }
        result
    }

    async fn execute(
        &self,
        request: &AutoStakeRequest,
        chain_changes: &mut broadcast::Receiver<u64>,
    ) -> Result<AutoStakeOutcome> {
        self.switch_step().await?;
        let prepared = self.swap_step(request).await?;
        self.approve_step(&prepared).await?;
        let receipt = self.stake_step(&prepared, chain_changes).await?;

        let event = self.record(request, &prepared, &receipt).await;
        let divergence = self.check_divergence(&prepared).await;

        Ok(AutoStakeOutcome {
            receipt,
            event,
            state: self.state(),
            divergence,
        })
    }

    async fn switch_step(&self) -> Result<()> {
        self.apply(PipelineEvent::Started(StepKey::Switch));
        match self.guard.ensure_chain(self.target_chain).await {
            Ok(ChainSwitch::NotConfigured) => self.skip(StepKey::Switch, "No target network configured"),
            Ok(ChainSwitch::AlreadyOnChain(id)) => self.skip(StepKey::Switch, format!("Already on chain {}", id)),
            Ok(ChainSwitch::Switched(id)) => self.complete(StepKey::Switch, format!("Switched to chain {}", id)),
            Ok(ChainSwitch::AddedAndSwitched(id)) => {
                self.complete(StepKey::Switch, format!("Added and switched to chain {}", id))
            }
            Err(e) => return Err(self.fail(StepKey::Switch, e)),
        }
        Ok(())
    }

    async fn swap_step(&self, request: &AutoStakeRequest) -> Result<Prepared> {
        self.apply(PipelineEvent::Started(StepKey::Swap));
        let prepared = match self.prepare(request).await {
            Ok(prepared) => prepared,
            Err(e) => return Err(self.fail(StepKey::Swap, e)),
        };

        let shortfall = prepared.desired.saturating_sub(prepared.info.balance);
        if shortfall.is_zero() {
            self.skip(StepKey::Swap, "Already have enough tokens");
            return Ok(prepared);
        }

        let Some(source) = request.source_token else {
            self.skip(StepKey::Swap, "No source token set");
            let err = Error::InsufficientBalance(format!(
                "have {}, need {} {}",
                prepared.info.display_balance(),
                format_token_amount(prepared.desired, prepared.info.decimals),
                prepared.info.symbol
            ));
            warn!("Auto-stake aborted: {}", err);
            self.apply(PipelineEvent::Aborted(err.to_string()));
            return Err(err);
        };

        let swapped = self.swap_shortfall(request, &prepared, source, shortfall).await;
        match swapped {
            Ok(info) => {
                self.complete(StepKey::Swap, "Swap confirmed");
                Ok(Prepared { info, ..prepared })
            }
            Err(e) => Err(self.fail(StepKey::Swap, e)),
        }
    }

    async fn prepare(&self, request: &AutoStakeRequest) -> Result<Prepared> {
        let owner = connected_account(self.wallet.as_ref()).await?;
        let spender = self.executor.contract_address();
        let info = self
            .gateway
            .load_token_info(self.token, owner, LoadOptions::full(spender))
            .await
            .into_result()?;
        let desired = parse_token_amount(&request.amount, info.decimals)?;
        Ok(Prepared { owner, info, desired })
    }

    async fn swap_shortfall(
        &self,
        request: &AutoStakeRequest,
        prepared: &Prepared,
        source: Address,
        shortfall: U256,
    ) -> Result<TokenInfo> {
        let chain_id = match self.target_chain {
            Some(chain_id) => chain_id,
            None => self.wallet.chain_id().await?,
        };
        let quote_request = QuoteRequest {
            chain_id,
            from_token: source,
            to_token: self.token,
            amount_in: shortfall,
            slippage_bps: request.slippage_bps.unwrap_or(self.default_slippage_bps),
        };

        let quote = self.dex.get_quote(&quote_request).await;
        quote.ensure_executable()?;
        self.progress(
            StepKey::Swap,
            format!(
                "Quoted {} {} for the shortfall",
                format_token_amount(quote.amount_out, prepared.info.decimals),
                prepared.info.symbol
            ),
        );

        let tx = self
            .dex
            .build_swap_transaction(&SwapRequest::from_quote(&quote_request, prepared.owner))
            .await?;
        self.progress(StepKey::Swap, "Waiting for swap confirmation");
        let hash = self.wallet.send_transaction(&tx).await?;
        confirm(self.wallet.as_ref(), hash, "swap").await?;

        let refreshed = self
            .gateway
            .refresh(prepared.owner, Some(self.executor.contract_address()))
            .await?;
        if refreshed.balance < prepared.desired {
            return Err(Error::InsufficientBalanceAfterSwap {
                have: refreshed.display_balance(),
                need: format_token_amount(prepared.desired, refreshed.decimals),
            });
        }
        Ok(refreshed)
    }

    async fn approve_step(&self, prepared: &Prepared) -> Result<()> {
        self.apply(PipelineEvent::Started(StepKey::Approve));
        let spender = self.executor.contract_address();
        match self
            .gateway
            .ensure_allowance(prepared.owner, spender, prepared.desired)
            .await
        {
            Ok(AllowanceOutcome::AlreadySufficient) => self.skip(StepKey::Approve, "Sufficient allowance"),
            Ok(AllowanceOutcome::Approved(hash)) => self.complete(StepKey::Approve, format!("Approved in {}", hash)),
            Err(e) => return Err(self.fail(StepKey::Approve, e)),
        }
        Ok(())
    }

    async fn stake_step(
        &self,
        prepared: &Prepared,
        chain_changes: &mut broadcast::Receiver<u64>,
    ) -> Result<TxReceipt> {
        self.apply(PipelineEvent::Started(StepKey::Stake));
        if let Err(e) = self.ensure_chain_unchanged(chain_changes) {
            return Err(self.fail(StepKey::Stake, e));
        }

        self.progress(StepKey::Stake, "Waiting for stake confirmation");
        match self.executor.stake(prepared.desired).await {
            Ok(receipt) => {
                self.complete(StepKey::Stake, format!("Staked in {}", receipt.transaction_hash));
                Ok(receipt)
            }
            Err(e) => Err(self.fail(StepKey::Stake, e)),
        }
    }

    fn ensure_chain_unchanged(&self, chain_changes: &mut broadcast::Receiver<u64>) -> Result<()> {
        let Some(expected) = self.target_chain else {
            return Ok(());
        };
        let mut latest = None;
        loop {
            match chain_changes.try_recv() {
                Ok(chain_id) => latest = Some(chain_id),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        match latest {
            Some(actual) if actual != expected => Err(Error::NetworkChanged { expected, actual }),
            _ => Ok(()),
        }
    }

    // Runs only after a confirmed receipt.
    async fn record(&self, request: &AutoStakeRequest, prepared: &Prepared, receipt: &TxReceipt) -> StakeEvent {
        let mut event = StakeEvent::stake(
            request.pool_name.clone(),
            token_amount_to_f64(prepared.desired, prepared.info.decimals),
            prepared.info.symbol.clone(),
            request.apy.clone(),
        )
        .with_provenance(
            Some(prepared.owner.to_string()),
            Some(receipt.transaction_hash.to_string()),
        );
        if let Some(category) = &request.category {
            event = event.with_category(category.clone());
        }
        self.ledger.record_stake(event.clone()).await;

        if let Err(e) = self
            .gateway
            .refresh(prepared.owner, Some(self.executor.contract_address()))
            .await
        {
            warn!("Token refresh after stake failed: {}", e);
        }
        event
    }

    /// The contract tracks one stake per account, so it is compared with the
    /// ledger's total across all subjects.
    async fn check_divergence(&self, prepared: &Prepared) -> Option<Divergence> {
        self.target_chain?;
        let on_chain = match self.executor.staked_balance(prepared.owner).await {
            Ok(on_chain) => token_amount_to_f64(on_chain, prepared.info.decimals),
            Err(e) => {
                warn!("Skipping divergence check, staked balance unavailable: {}", e);
                return None;
            }
        };
        let account = prepared.owner.to_string();
        match self.ledger.detect_account_divergence(&account, on_chain).await {
            Ok(divergence) => divergence,
            Err(e) => {
                warn!("Divergence check for {} failed: {}", account, e);
                None
            }
        }
    }

    fn apply(&self, event: PipelineEvent) {
        self.state
            .send_modify(|state| *state = reduce(std::mem::take(state), &event));
    }

    fn progress(&self, key: StepKey, detail: impl Into<String>) {
        self.apply(PipelineEvent::Progress(key, detail.into()));
    }

    fn complete(&self, key: StepKey, detail: impl Into<String>) {
        let detail = detail.into();
        info!("{} step done: {}", key, detail);
        self.apply(PipelineEvent::Completed(key, Some(detail)));
    }

    fn skip(&self, key: StepKey, reason: impl Into<String>) {
        let reason = reason.into();
        info!("{} step skipped: {}", key, reason);
        self.apply(PipelineEvent::Skipped(key, reason));
    }

    fn fail(&self, key: StepKey, err: Error) -> Error {
        warn!("{} step failed: {}", key, err);
        self.apply(PipelineEvent::Failed(key, err.to_string()));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dex::MockDexAggregator,
        mock::{tokens, Harness, ROUTER, SOURCE},
    };
    use serde_json::json;
    use stakeflow_common::{ProviderError, StepStatus};
    use tokio_test::assert_ok;

    fn bridge(aggregator: MockDexAggregator) -> DexBridge {
        DexBridge::new(Arc::new(aggregator), 9_800)
    }

    fn no_dex() -> DexBridge {
        let mut aggregator = MockDexAggregator::new();
        aggregator.expect_quote().never();
        aggregator.expect_swap().never();
        bridge(aggregator)
    }

    fn swapping_dex() -> DexBridge {
        let mut aggregator = MockDexAggregator::new();
        aggregator
            .expect_quote()
            .times(1)
            .returning(|r| Ok(json!({ "code": "0", "data": [{ "toTokenAmount": r.amount_in.to_string() }] })));
        aggregator.expect_swap().times(1).returning(|_| {
            Ok(json!({ "code": "0", "data": [{ "tx": {
                "to": ROUTER.to_string(),
                "data": "0x",
                "value": "0"
            }}] }))
        });
        bridge(aggregator)
    }

    fn orchestrator(harness: &Harness, dex: DexBridge) -> AutoStakeOrchestrator {
        AutoStakeOrchestrator::new(&harness.collaborators(), dex, Ledger::in_memory(), &harness.config())
    }

    fn statuses(state: &PipelineState) -> Vec<StepStatus> {
        state.steps.iter().map(|step| step.status).collect()
    }

    #[tokio::test]
    async fn test_happy_path_with_sufficient_balance() {
        let harness = Harness::new();
        harness.world().token_balance = tokens(12);
        let orchestrator = orchestrator(&harness, no_dex());

        let outcome = orchestrator
            .run(AutoStakeRequest::new("Acme Growth Pool", "10", "12%"))
            .await
            .unwrap();

        assert_eq!(
            statuses(&outcome.state),
            vec![StepStatus::Skipped, StepStatus::Skipped, StepStatus::Done, StepStatus::Done]
        );
        assert_eq!(
            outcome.state.step(StepKey::Swap).detail.as_deref(),
            Some("Already have enough tokens")
        );
        assert!(outcome.receipt.status);
        assert_eq!(harness.world().allowance, U256::ZERO);
        assert_eq!(harness.world().staked, tokens(10));

        let events = orchestrator.ledger().store().load_all().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].amount, 10.0);
        assert_eq!(events[0].subject_name, "Acme");
        assert_eq!(events[0].category, None);
        assert_eq!(events[0], outcome.event);
        assert_eq!(
            orchestrator.ledger().balances().get_staked_amount("Acme").await.unwrap(),
            10.0
        );
    }

    #[tokio::test]
    async fn test_other_subjects_count_toward_account_stake() {
        let harness = Harness::new();
        harness.world().token_balance = tokens(12);
        harness.world().staked = tokens(3);
        let orchestrator = orchestrator(&harness, no_dex());
        orchestrator
            .ledger()
            .record_stake(StakeEvent::stake("Beta Pool", 3.0, "TT", "8%"))
            .await;

        let outcome = orchestrator
            .run(AutoStakeRequest::new("Acme Pool", "10", "12%"))
            .await
            .unwrap();

        assert_eq!(harness.world().staked, tokens(13));
        assert_eq!(outcome.divergence, None);
    }

    #[tokio::test]
    async fn test_unrecorded_stake_is_reported_as_divergence() {
        let harness = Harness::new();
        harness.world().token_balance = tokens(12);
        harness.world().staked = tokens(5);
        let orchestrator = orchestrator(&harness, no_dex());

        let outcome = orchestrator
            .run(AutoStakeRequest::new("Acme Pool", "10", "12%"))
            .await
            .unwrap();

        let divergence = outcome.divergence.unwrap();
        assert_eq!(divergence.subject, harness.owner.to_string());
        assert_eq!(divergence.local, 10.0);
        assert_eq!(divergence.on_chain, 15.0);
        assert_eq!(
            orchestrator.ledger().balances().get_staked_amount("Acme").await.unwrap(),
            10.0
        );
    }

    #[tokio::test]
    async fn test_rerun_skips_satisfied_steps() {
        let harness = Harness::new();
        harness.world().token_balance = tokens(30);
        harness.world().allowance = tokens(50);
        let orchestrator = orchestrator(&harness, no_dex());

        let outcome = orchestrator
            .run(AutoStakeRequest::new("Acme Pool", "10", "12%"))
            .await
            .unwrap();
        assert_eq!(outcome.state.status(StepKey::Approve), StepStatus::Skipped);
        assert_eq!(
            outcome.state.step(StepKey::Approve).detail.as_deref(),
            Some("Sufficient allowance")
        );
        assert_eq!(harness.calls("approve"), 0);
    }

    #[tokio::test]
    async fn test_shortfall_is_swapped() {
        let harness = Harness::new();
        harness.world().token_balance = tokens(4);
        harness.world().swap_output = tokens(6);
        let orchestrator = orchestrator(&harness, swapping_dex());

        let outcome = orchestrator
            .run(AutoStakeRequest::new("Acme Pool", "10", "12%").with_source_token(SOURCE))
            .await
            .unwrap();

        assert_eq!(outcome.state.status(StepKey::Swap), StepStatus::Done);
        assert_eq!(
            outcome.state.step(StepKey::Swap).detail.as_deref(),
            Some("Swap confirmed")
        );
        assert_eq!(harness.calls("send_transaction"), 1);
        assert_eq!(harness.world().staked, tokens(10));
        assert_eq!(orchestrator.ledger().store().load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_swap_that_falls_short_halts_without_ledger_writes() {
        let harness = Harness::new();
        harness.world().token_balance = tokens(4);
        harness.world().swap_output = tokens(2);
        let orchestrator = orchestrator(&harness, swapping_dex());

        let err = orchestrator
            .run(AutoStakeRequest::new("Acme Pool", "10", "12%").with_source_token(SOURCE))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InsufficientBalanceAfterSwap { ref have, ref need } if have == "6" && need == "10"));
        let state = orchestrator.state();
        assert_eq!(
            statuses(&state),
            vec![StepStatus::Skipped, StepStatus::Error, StepStatus::Pending, StepStatus::Pending]
        );
        assert!(orchestrator.ledger().store().load_all().await.unwrap().is_empty());
        assert_eq!(harness.world().staked, U256::ZERO);
    }

    #[tokio::test]
    async fn test_estimate_only_quote_never_executes() {
        let harness = Harness::new();
        harness.world().token_balance = tokens(4);
        let mut aggregator = MockDexAggregator::new();
        aggregator
            .expect_quote()
            .returning(|_| Err(Error::NetworkUnavailable("connection refused".into())));
        aggregator.expect_swap().never();
        let orchestrator = orchestrator(&harness, bridge(aggregator));

        let err = orchestrator
            .run(AutoStakeRequest::new("Acme Pool", "10", "12%").with_source_token(SOURCE))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::QuoteUnavailable(_)));
        assert_eq!(orchestrator.state().status(StepKey::Swap), StepStatus::Error);
        assert_eq!(harness.calls("send_transaction"), 0);
    }

    #[tokio::test]
    async fn test_shortfall_without_source_token_aborts() {
        let harness = Harness::new();
        harness.world().token_balance = tokens(4);
        let orchestrator = orchestrator(&harness, no_dex());

        let err = orchestrator
            .run(AutoStakeRequest::new("Acme Pool", "10", "12%"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InsufficientBalance(_)));
        let state = orchestrator.state();
        assert_eq!(state.status(StepKey::Swap), StepStatus::Skipped);
        assert_eq!(state.step(StepKey::Swap).detail.as_deref(), Some("No source token set"));
        assert_eq!(state.status(StepKey::Approve), StepStatus::Pending);
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn test_switch_failure_short_circuits() {
        let harness = Harness::new();
        harness.world().chain_id = 1;
        harness.world().token_balance = tokens(12);
        harness.fail_next("switch_chain", ProviderError::rpc(4001, "User rejected the request"));
        let orchestrator = orchestrator(&harness, no_dex());
        let mut updates = orchestrator.subscribe();

        let err = orchestrator
            .run(AutoStakeRequest::new("Acme Pool", "10", "12%"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UserRejected));
        let state = updates.borrow_and_update().clone();
        assert_eq!(
            statuses(&state),
            vec![StepStatus::Error, StepStatus::Pending, StepStatus::Pending, StepStatus::Pending]
        );
        assert_eq!(state.error.as_deref(), Some("Request rejected in wallet"));
        assert_eq!(harness.calls("balance_of"), 0);
        assert!(orchestrator.ledger().store().load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_switch_adds_unknown_chain() {
        let harness = Harness::new();
        harness.world().chain_id = 1;
        harness.world().known_chains.retain(|id| *id != 80002);
        harness.world().token_balance = tokens(12);
        let orchestrator = orchestrator(&harness, no_dex());

        let outcome = orchestrator
            .run(AutoStakeRequest::new("Acme Pool", "10", "12%"))
            .await
            .unwrap();
        assert_eq!(outcome.state.status(StepKey::Switch), StepStatus::Done);
        assert_eq!(
            outcome.state.step(StepKey::Switch).detail.as_deref(),
            Some("Added and switched to chain 80002")
        );
    }

    #[tokio::test]
    async fn test_rejected_stake_writes_nothing() {
        let harness = Harness::new();
        harness.world().token_balance = tokens(12);
        harness.fail_next("stake", ProviderError::rpc(4001, "User denied transaction signature"));
        let orchestrator = orchestrator(&harness, no_dex());

        let err = orchestrator
            .run(AutoStakeRequest::new("Acme Pool", "10", "12%"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UserRejected));
        assert_eq!(orchestrator.state().status(StepKey::Stake), StepStatus::Error);
        assert!(orchestrator.ledger().store().load_all().await.unwrap().is_empty());
        assert!(orchestrator.ledger().balances().get_all_balances().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_network_change_before_stake_fails_stake_step() {
        let harness = Harness::new();
        harness.world().token_balance = tokens(12);
        harness.world().hop_chain_on_approve = Some(137);
        let orchestrator = orchestrator(&harness, no_dex());

        let err = orchestrator
            .run(AutoStakeRequest::new("Acme Pool", "10", "12%"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NetworkChanged { expected: 80002, actual: 137 }));
        assert_eq!(orchestrator.state().status(StepKey::Approve), StepStatus::Done);
        assert_eq!(orchestrator.state().status(StepKey::Stake), StepStatus::Error);
        assert_eq!(harness.calls("stake"), 0);
    }

    #[tokio::test]
    async fn test_concurrent_run_for_same_subject_is_refused() {
        let harness = Harness::new();
        harness.world().token_balance = tokens(12);
        let orchestrator = orchestrator(&harness, no_dex());

        let lease = orchestrator.locks().acquire("acme").unwrap();
        let err = orchestrator
            .run(AutoStakeRequest::new("Acme Pool", "10", "12%"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WorkflowInProgress(_)));
        assert_eq!(harness.calls("switch_chain") + harness.calls("chain_id"), 0);

        drop(lease);
        assert_ok!(orchestrator.run(AutoStakeRequest::new("Acme Pool", "10", "12%")).await);
        assert!(!orchestrator.locks().is_held("Acme"));
    }

    #[tokio::test]
    async fn test_invalid_amount_is_rejected_up_front() {
        let harness = Harness::new();
        let orchestrator = orchestrator(&harness, no_dex());
        for amount in ["0", "-5", "abc", ""] {
            let err = orchestrator
                .run(AutoStakeRequest::new("Acme Pool", amount, "12%"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidAmount(_)));
        }
        assert_eq!(orchestrator.state(), PipelineState::default());
    }

    #[tokio::test]
    async fn test_disconnected_wallet_fails_swap_step() {
        let harness = Harness::new();
        harness.world().connected = false;
        let orchestrator = orchestrator(&harness, no_dex());

        let err = orchestrator
            .run(AutoStakeRequest::new("Acme Pool", "10", "12%"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WalletNotConnected));
        assert_eq!(orchestrator.state().status(StepKey::Swap), StepStatus::Error);
    }
}

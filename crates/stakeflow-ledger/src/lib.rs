//! This is the stakeflow-ledger crate - the local activity log and the
//! per-subject balance cache derived from it.

pub mod activity;
pub mod balances;
pub mod blob;
pub mod create;
pub mod csv_codec;
pub mod factory;
pub mod traits;

pub use {
    activity::CsvLedgerStore,
    balances::{JsonBalanceCache, RECONCILE_EPSILON},
    blob::{FileBlobStorage, MemoryBlobStorage},
    create::{CreateKind, CreateLog, CreateRecord, CreateSubmission},
    factory::ConfiguredLedgerFactory,
    traits::{
        BalanceCache, BlobStorage, LedgerChange, LedgerFactory, LedgerStore, LedgerSummary,
        ReconcileReport,
    },
};

use {
    stakeflow_common::{Divergence, Error, Result, StakeEvent},
    std::sync::Arc,
    tracing::{info, warn},
};

const ACTIVITY_KEY: &str = "stake_activity.csv";
const BALANCES_KEY: &str = "staking_balances.json";
const CREATIONS_KEY: &str = "create_activity.csv";

/// The activity log and balance cache, opened together and closed together.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    balances: Arc<dyn BalanceCache>,
    creations: Option<Arc<CreateLog>>,
    divergence_tolerance: f64,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>, balances: Arc<dyn BalanceCache>) -> Self {
        Self {
            store,
            balances,
            creations: None,
            divergence_tolerance: RECONCILE_EPSILON,
        }
    }

    /// A ledger backed by one shared in-memory blob store.
    pub fn in_memory() -> Self {
        let storage: Arc<dyn BlobStorage> = Arc::new(MemoryBlobStorage::new());
        Self::new(
            Arc::new(CsvLedgerStore::new(storage.clone(), ACTIVITY_KEY)),
            Arc::new(JsonBalanceCache::new(storage.clone(), BALANCES_KEY)),
        )
        .with_creations(CreateLog::new(storage, CREATIONS_KEY))
    }

    pub fn with_creations(mut self, creations: CreateLog) -> Self {
        self.creations = Some(Arc::new(creations));
        self
    }

    pub fn creations(&self) -> Option<&Arc<CreateLog>> {
        self.creations.as_ref()
    }

    pub fn with_divergence_tolerance(mut self, tolerance: f64) -> Self {
        self.divergence_tolerance = tolerance;
        self
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn balances(&self) -> &Arc<dyn BalanceCache> {
        &self.balances
    }

    /// Append a confirmed stake and raise the subject's aggregate.
    /// Never fails: the on-chain operation has already happened.
    pub async fn record_stake(&self, event: StakeEvent) {
        let subject = event.subject_name.clone();
        let amount = event.amount.abs();
        let symbol = event.token_symbol.clone();

        if let Err(e) = self.store.append(event).await {
            warn!("{}", Error::LedgerWrite(e.to_string()));
        }
        if let Err(e) = self.balances.record_stake(&subject, amount, &symbol).await {
            warn!("{} (balance cache, subject={})", Error::LedgerWrite(e.to_string()), subject);
        }
    }

    /// Append a confirmed unstake and lower the subject's aggregate, clamping at zero.
    pub async fn record_unstake(&self, event: StakeEvent) {
        let subject = event.subject_name.clone();
        let amount = event.amount.abs();
        let symbol = event.token_symbol.clone();

        if let Err(e) = self.store.append(event).await {
            warn!("{}", Error::LedgerWrite(e.to_string()));
        }
        if let Err(e) = self.balances.record_unstake(&subject, amount, &symbol).await {
            warn!("{} (balance cache, subject={})", Error::LedgerWrite(e.to_string()), subject);
        }
    }

    /// Log a create-flow submission to the activity log and, when attached,
    /// the create log. Aggregates are left untouched.
    pub async fn record_creation(&self, submission: &CreateSubmission) {
        let event = submission.to_event();
        if let Err(e) = self.store.append(event).await {
            warn!("{} (create:{})", Error::LedgerWrite(e.to_string()), submission.kind);
        }
        if let Some(creations) = &self.creations {
            if let Err(e) = creations.append(submission).await {
                warn!("{} (create log)", Error::LedgerWrite(e.to_string()));
            }
        }
    }

    /// Rebuild the aggregate cache from the full activity log.
    pub async fn reconcile_from_ledger(&self) -> Result<ReconcileReport> {
        let events = self.store.load_all().await?;
        self.balances.reconcile(&events).await
    }

    /// Empty both the activity log and the aggregate cache.
    pub async fn clear_all(&self) -> Result<()> {
        self.store.clear_all().await?;
        self.balances.reset_all().await
    }

    /// Compare the cached aggregate against the chain's own figure.
    /// Reports the gap; the cache is never corrected here.
    pub async fn detect_divergence(&self, subject: &str, on_chain: f64) -> Result<Option<Divergence>> {
        let local = self.balances.get_staked_amount(subject).await?;
        Ok(self.compare(subject, local, on_chain))
    }

    /// Compare the sum of every cached aggregate against an account-wide
    /// on-chain stake, such as the staking contract's `stakedBalance`.
    pub async fn detect_account_divergence(&self, account: &str, on_chain: f64) -> Result<Option<Divergence>> {
        let local: f64 = self
            .balances
            .get_all_balances()
            .await?
            .values()
            .map(|balance| balance.total_staked)
            .sum();
        Ok(self.compare(account, local, on_chain))
    }

    fn compare(&self, subject: &str, local: f64, on_chain: f64) -> Option<Divergence> {
        let divergence = Divergence {
            subject: subject.to_string(),
            local,
            on_chain,
        };
        if divergence.gap() > self.divergence_tolerance {
            warn!(
                "Aggregate for {} diverges from chain: local {} vs on-chain {}",
                subject, local, on_chain
            );
            return Some(divergence);
        }
        None
    }

    pub async fn close(&self) -> Result<()> {
        self.store.close().await?;
        info!("Ledger closed");
        Ok(())
    }
}

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::collections::BTreeMap,
    tokio::sync::broadcast,
    stakeflow_common::{AggregateBalance, Result, StakeEvent},
};

use crate::Ledger;

/// Key-value persistence for the ledger's text blobs.
/// Each logical store owns exactly one key.
#[async_trait]
pub trait BlobStorage: Send + Sync + 'static {
    /// Read the blob stored under `key`, if any
    async fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the blob stored under `key`
    async fn write(&self, key: &str, contents: &str) -> Result<()>;

    /// Remove the blob stored under `key`; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;

    /// Flush pending writes
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Notification emitted after every successful ledger mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerChange {
    Appended(StakeEvent),
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    /// Number of stake (positive amount) events.
    pub total_records: usize,
    /// Sum of positive amounts only.
    pub total_amount: f64,
    pub unique_subjects: usize,
    pub last_event_at: Option<DateTime<Utc>>,
}

/// Append-only log of stake and unstake activity.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    /// Validate and append an event. Persistence failures are logged, not returned.
    async fn append(&self, event: StakeEvent) -> Result<()>;

    /// All events, newest first. Malformed rows are skipped.
    async fn load_all(&self) -> Result<Vec<StakeEvent>>;

    /// Drop every event. Irreversible.
    async fn clear_all(&self) -> Result<()>;

    /// Stake counts and totals over the whole log
    async fn summarize(&self) -> Result<LedgerSummary>;

    /// The persisted delimited text, header included
    async fn export_csv(&self) -> Result<String>;

    /// Subscribe to change notifications
    fn subscribe(&self) -> broadcast::Receiver<LedgerChange>;

    /// Flush and release the underlying storage
    async fn close(&self) -> Result<()>;

    /// Events for one subject, matched case-insensitively
    async fn records_for_subject(&self, subject: &str) -> Result<Vec<StakeEvent>> {
        let events = self.load_all().await?;
        Ok(events
            .into_iter()
            .filter(|event| event.subject_name.eq_ignore_ascii_case(subject))
            .collect())
    }

    /// Signed sum of all amounts recorded for one subject
    async fn total_for_subject(&self, subject: &str) -> Result<f64> {
        let events = self.records_for_subject(subject).await?;
        Ok(events.iter().map(|event| event.amount).sum())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Subjects whose cached total was replaced by the ledger-derived one.
    pub updated: Vec<String>,
    pub unchanged: usize,
}

/// Per-subject running totals derived from the ledger.
#[async_trait]
pub trait BalanceCache: Send + Sync + 'static {
    /// Add `amount` to the subject's total
    async fn record_stake(&self, subject: &str, amount: f64, token_symbol: &str) -> Result<()>;

    /// Subtract `amount` from the subject's total, clamping at zero
    async fn record_unstake(&self, subject: &str, amount: f64, token_symbol: &str) -> Result<()>;

    /// Current total for a subject, zero when unknown
    async fn get_staked_amount(&self, subject: &str) -> Result<f64>;

    /// Every cached balance keyed by subject
    async fn get_all_balances(&self) -> Result<BTreeMap<String, AggregateBalance>>;

    /// Merge ledger-derived totals into the cache, overwriting only drifted entries
    async fn reconcile(&self, events: &[StakeEvent]) -> Result<ReconcileReport>;

    /// Drop every cached balance
    async fn reset_all(&self) -> Result<()>;
}

/// Factory trait for opening ledger instances
#[async_trait]
pub trait LedgerFactory: Send + Sync + 'static {
    /// Open a ledger with the factory's configuration
    async fn open_ledger(&self) -> Result<Ledger>;
}

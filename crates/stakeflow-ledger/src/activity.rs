//! Activity ledger persisted as a single delimited text blob

use {
    crate::{
        csv_codec,
        traits::{BlobStorage, LedgerChange, LedgerStore, LedgerSummary},
    },
    async_trait::async_trait,
    std::{collections::HashSet, sync::Arc},
    stakeflow_common::{subject_key, Error, Result, StakeEvent},
    tokio::sync::{broadcast, Mutex},
    tracing::{debug, info, warn},
};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

pub struct CsvLedgerStore {
    storage: Arc<dyn BlobStorage>,
    key: String,
    changes: broadcast::Sender<LedgerChange>,
    // Serializes read-modify-write cycles within this process only.
    write_lock: Mutex<()>,
}

impl CsvLedgerStore {
    pub fn new(storage: Arc<dyn BlobStorage>, key: impl Into<String>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            storage,
            key: key.into(),
            changes,
            write_lock: Mutex::new(()),
        }
    }

    fn validate(event: &StakeEvent) -> Result<()> {
        if event.subject_name.trim().is_empty() {
            return Err(Error::InvalidEvent("subject name is required".into()));
        }
        if !event.amount.is_finite() {
            return Err(Error::InvalidEvent(format!("amount {} is not finite", event.amount)));
        }
        if event.token_symbol.trim().is_empty() {
            return Err(Error::InvalidEvent("token symbol is required".into()));
        }
        Ok(())
    }

    async fn persist_row(&self, event: &StakeEvent) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let row = csv_codec::encode_event(event)?;
        let mut contents = match self.storage.read(&self.key).await? {
            Some(existing) if !existing.trim().is_empty() => existing,
            _ => csv_codec::header_line()?,
        };
        if !contents.ends_with('\n') {
            contents.push('\n');
        }
        contents.push_str(&row);
        self.storage.write(&self.key, &contents).await
    }

    fn notify(&self, change: LedgerChange) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }
}

#[async_trait]
impl LedgerStore for CsvLedgerStore {
    async fn append(&self, event: StakeEvent) -> Result<()> {
        Self::validate(&event)?;

        if let Err(e) = self.persist_row(&event).await {
            let failure = Error::LedgerWrite(e.to_string());
            warn!(
                "{} (subject={}, amount={}); event dropped",
                failure, event.subject_name, event.amount
            );
            return Ok(());
        }

        info!(
            "Recorded {} {} {} for {}",
            if event.amount < 0.0 { "unstake of" } else { "stake of" },
            event.amount.abs(),
            event.token_symbol,
            event.subject_name
        );
        self.notify(LedgerChange::Appended(event));
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<StakeEvent>> {
        let contents = match self.storage.read(&self.key).await? {
            Some(contents) => contents,
            None => return Ok(Vec::new()),
        };
        let mut events = csv_codec::decode_ledger(&contents);
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        debug!("Loaded {} ledger events", events.len());
        Ok(events)
    }

    async fn clear_all(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.storage.remove(&self.key).await?;
        info!("All stake records cleared");
        self.notify(LedgerChange::Cleared);
        Ok(())
    }

    async fn summarize(&self) -> Result<LedgerSummary> {
        let events = self.load_all().await?;
        let unique_subjects = events
            .iter()
            .map(|event| subject_key(&event.subject_name))
            .collect::<HashSet<_>>()
            .len();
        let stakes = events.iter().filter(|event| event.is_stake());

        Ok(LedgerSummary {
            total_records: stakes.clone().count(),
            total_amount: stakes.map(|event| event.amount).sum(),
            unique_subjects,
            last_event_at: events.first().map(|event| event.timestamp),
        })
    }

    async fn export_csv(&self) -> Result<String> {
        match self.storage.read(&self.key).await? {
            Some(contents) if !contents.trim().is_empty() => Ok(contents),
            _ => csv_codec::header_line(),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<LedgerChange> {
        self.changes.subscribe()
    }

    async fn close(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.storage.flush().await
    }
}

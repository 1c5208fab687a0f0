//! Aggregate balance cache persisted as one JSON blob

use {
    crate::traits::{BalanceCache, BlobStorage, ReconcileReport},
    async_trait::async_trait,
    std::{collections::BTreeMap, sync::Arc},
    stakeflow_common::{subject_key, AggregateBalance, Error, Result, StakeEvent},
    tokio::sync::Mutex,
    tracing::{info, warn},
};

/// Drift below this is treated as equal when reconciling.
pub const RECONCILE_EPSILON: f64 = 0.0001;

type Balances = BTreeMap<String, AggregateBalance>;

/// Cached keys naming `subject` in any letter case.
fn matching_keys(balances: &Balances, subject: &str) -> Vec<String> {
    balances
        .keys()
        .filter(|key| key.eq_ignore_ascii_case(subject))
        .cloned()
        .collect()
}

pub struct JsonBalanceCache {
    storage: Arc<dyn BlobStorage>,
    key: String,
    write_lock: Mutex<()>,
}

impl JsonBalanceCache {
    pub fn new(storage: Arc<dyn BlobStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Balances> {
        let Some(contents) = self.storage.read(&self.key).await? else {
            return Ok(Balances::new());
        };
        match serde_json::from_str(&contents) {
            Ok(balances) => Ok(balances),
            Err(e) => {
                warn!("Discarding unreadable balance cache: {}", e);
                Ok(Balances::new())
            }
        }
    }

    async fn save(&self, balances: &Balances) -> Result<()> {
        let contents =
            serde_json::to_string(balances).map_err(|e| Error::Serialization(e.to_string()))?;
        self.storage.write(&self.key, &contents).await
    }

    async fn adjust(&self, subject: &str, delta: f64, token_symbol: &str) -> Result<f64> {
        if !delta.is_finite() {
            return Err(Error::InvalidAmount(format!("{} is not a finite amount", delta)));
        }
        let _guard = self.write_lock.lock().await;
        let mut balances = self.load().await?;
        let key = matching_keys(&balances, subject)
            .into_iter()
            .next()
            .unwrap_or_else(|| subject.to_string());
        let entry = balances
            .entry(key)
            .or_insert_with(|| AggregateBalance::new(token_symbol));

        let clamped = entry.apply(delta);
        if clamped > 0.0 {
            warn!(
                "Unstake from {} exceeded the recorded stake by {}; clamping to 0",
                subject, clamped
            );
        }
        entry.token_symbol = token_symbol.to_string();
        let total = entry.total_staked;

        self.save(&balances).await?;
        Ok(total)
    }
}

#[async_trait]
impl BalanceCache for JsonBalanceCache {
    async fn record_stake(&self, subject: &str, amount: f64, token_symbol: &str) -> Result<()> {
        let total = self.adjust(subject, amount.abs(), token_symbol).await?;
        info!("Recorded stake of {} {} for {} (total {})", amount, token_symbol, subject, total);
        Ok(())
    }

    async fn record_unstake(&self, subject: &str, amount: f64, token_symbol: &str) -> Result<()> {
        let total = self.adjust(subject, -amount.abs(), token_symbol).await?;
        info!("Recorded unstake of {} {} from {} (total {})", amount, token_symbol, subject, total);
        Ok(())
    }

    async fn get_staked_amount(&self, subject: &str) -> Result<f64> {
        Ok(self
            .load()
            .await?
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(subject))
            .map(|(_, balance)| balance.total_staked)
            .sum())
    }

    async fn get_all_balances(&self) -> Result<BTreeMap<String, AggregateBalance>> {
        self.load().await
    }

    async fn reconcile(&self, events: &[StakeEvent]) -> Result<ReconcileReport> {
        let mut derived: BTreeMap<String, (String, AggregateBalance)> = BTreeMap::new();
        for event in events {
            // The first name and symbol seen win; callers pass events newest first.
            derived
                .entry(subject_key(&event.subject_name))
                .or_insert_with(|| {
                    (
                        event.subject_name.clone(),
                        AggregateBalance::new(event.token_symbol.clone()),
                    )
                })
                .1
                .total_staked += event.amount;
        }

        let _guard = self.write_lock.lock().await;
        let mut cached = self.load().await?;
        let mut report = ReconcileReport::default();

        for (_, (name, mut balance)) in derived {
            balance.total_staked = balance.total_staked.max(0.0);
            let existing = matching_keys(&cached, &name);
            let drifted = match existing.as_slice() {
                [key] => (cached[key].total_staked - balance.total_staked).abs() > RECONCILE_EPSILON,
                _ => true,
            };
            if drifted {
                for key in &existing {
                    cached.remove(key);
                }
                let subject = existing.into_iter().next().unwrap_or(name);
                cached.insert(subject.clone(), balance);
                report.updated.push(subject);
            } else {
                report.unchanged += 1;
            }
        }

        self.save(&cached).await?;
        info!(
            "Reconciled balances from {} ledger events ({} updated, {} unchanged)",
            events.len(),
            report.updated.len(),
            report.unchanged
        );
        Ok(report)
    }

    async fn reset_all(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.storage.remove(&self.key).await?;
        info!("Reset all staking balances");
        Ok(())
    }
}

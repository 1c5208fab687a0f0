use {
    crate::{
        activity::CsvLedgerStore,
        balances::JsonBalanceCache,
        create::CreateLog,
        blob::{FileBlobStorage, MemoryBlobStorage},
        traits::{BlobStorage, LedgerFactory},
        Ledger,
    },
    async_trait::async_trait,
    stakeflow_common::{config::StorageType, Result, StakeflowConfig},
    std::sync::Arc,
    tracing::info,
};

/// Factory for opening ledgers based on configuration
pub struct ConfiguredLedgerFactory {
    config: StakeflowConfig,
}

impl ConfiguredLedgerFactory {
    pub fn new(config: StakeflowConfig) -> Self {
        Self { config }
    }

    async fn open_storage(&self) -> Result<Arc<dyn BlobStorage>> {
        match self.config.ledger.storage {
            StorageType::File => {
                let storage = FileBlobStorage::open(&self.config.data_dir).await?;
                Ok(Arc::new(storage))
            }
            StorageType::Memory => Ok(Arc::new(MemoryBlobStorage::new())),
        }
    }
}

#[async_trait]
impl LedgerFactory for ConfiguredLedgerFactory {
    async fn open_ledger(&self) -> Result<Ledger> {
        let storage = self.open_storage().await?;
        let ledger_config = &self.config.ledger;

        let store = CsvLedgerStore::new(storage.clone(), ledger_config.activity_key.clone());
        let balances = JsonBalanceCache::new(storage.clone(), ledger_config.balances_key.clone());
        let creations = CreateLog::new(storage, ledger_config.creations_key.clone());

        info!(
            "Opened {:?} ledger ({}, {})",
            ledger_config.storage, ledger_config.activity_key, ledger_config.balances_key
        );
        Ok(Ledger::new(Arc::new(store), Arc::new(balances))
            .with_creations(creations)
            .with_divergence_tolerance(self.config.divergence_tolerance))
    }
}

//! Ledger rows for the create flows that share the activity log, plus a
//! dedicated log keeping each full submission.

use {
    crate::traits::BlobStorage,
    chrono::{DateTime, Utc},
    csv::{ReaderBuilder, WriterBuilder},
    serde::{Deserialize, Serialize},
    stakeflow_common::{
        derive_subject,
        utils::time::{format_timestamp, parse_timestamp},
        Error, Result, StakeEvent, NO_APY,
    },
    std::{fmt, sync::Arc},
    tokio::sync::Mutex,
    tracing::{debug, info, warn},
};

pub const CREATE_HEADER: [&str; 6] = ["Date", "Type", "Name", "User Address", "Transaction Hash", "Form"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreateKind {
    StakePool,
    Hackathon,
    Job,
}

impl fmt::Display for CreateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CreateKind::StakePool => "stake-pool",
            CreateKind::Hackathon => "hackathon",
            CreateKind::Job => "job",
        })
    }
}

/// A submitted create form. Only `kind` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubmission {
    pub kind: CreateKind,
    pub name: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub amount: Option<f64>,
    pub token_symbol: Option<String>,
    pub apy: Option<String>,
    pub user_address: Option<String>,
    pub tx_hash: Option<String>,
}

impl CreateSubmission {
    pub fn new(kind: CreateKind) -> Self {
        Self {
            kind,
            name: None,
            title: None,
            company: None,
            amount: None,
            token_symbol: None,
            apy: None,
            user_address: None,
            tx_hash: None,
        }
    }

    pub fn subject(&self) -> String {
        match self.kind {
            CreateKind::Job => non_empty(&self.company).unwrap_or("Recruiter").to_string(),
            CreateKind::Hackathon => non_empty(&self.name).unwrap_or("Hackathon").to_string(),
            CreateKind::StakePool => match non_empty(&self.name) {
                Some(name) => derive_subject(name),
                None => "Stake".to_string(),
            },
        }
    }

    fn label(&self) -> String {
        let preferred = match self.kind {
            CreateKind::Job => non_empty(&self.title).or_else(|| non_empty(&self.name)),
            _ => non_empty(&self.name),
        };
        preferred
            .map(String::from)
            .unwrap_or_else(|| self.kind.to_string())
    }

    pub fn to_event(&self) -> StakeEvent {
        let mut event = StakeEvent::stake(
            self.label(),
            self.amount.filter(|a| a.is_finite()).unwrap_or(0.0),
            self.token_symbol.clone().unwrap_or_default(),
            non_empty(&self.apy).unwrap_or(NO_APY),
        )
        .with_provenance(self.user_address.clone(), self.tx_hash.clone())
        .with_category(format!("create:{}", self.kind));
        event.subject_name = self.subject();
        event
    }
}

/// One row of the create log.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRecord {
    pub timestamp: DateTime<Utc>,
    pub submission: CreateSubmission,
}

/// Append-only log of full create submissions, stored as one delimited blob.
pub struct CreateLog {
    storage: Arc<dyn BlobStorage>,
    key: String,
    write_lock: Mutex<()>,
}

impl CreateLog {
    pub fn new(storage: Arc<dyn BlobStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn append(&self, submission: &CreateSubmission) -> Result<()> {
        let form = serde_json::to_string(submission).map_err(|e| Error::Serialization(e.to_string()))?;
        let name = non_empty(&submission.name)
            .or_else(|| non_empty(&submission.title))
            .map(String::from)
            .unwrap_or_else(|| submission.kind.to_string());
        let row = [
            format_timestamp(&Utc::now()),
            submission.kind.to_string(),
            name,
            submission.user_address.clone().unwrap_or_default(),
            submission.tx_hash.clone().unwrap_or_default(),
            form,
        ];

        let _guard = self.write_lock.lock().await;
        let mut contents = match self.storage.read(&self.key).await? {
            Some(existing) if !existing.trim().is_empty() => existing,
            _ => write_row(&CREATE_HEADER)?,
        };
        if !contents.ends_with('\n') {
            contents.push('\n');
        }
        contents.push_str(&write_row(&row)?);
        self.storage.write(&self.key, &contents).await?;
        info!("Logged {} submission {}", submission.kind, row[2]);
        Ok(())
    }

    /// Every readable row in storage order; malformed rows are skipped.
    pub async fn load_all(&self) -> Result<Vec<CreateRecord>> {
        let Some(contents) = self.storage.read(&self.key).await? else {
            return Ok(Vec::new());
        };
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(contents.as_bytes());

        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let parsed = row.ok().and_then(|row| {
                Some(CreateRecord {
                    timestamp: parse_timestamp(row.get(0)?)?,
                    submission: serde_json::from_str(row.get(5)?).ok()?,
                })
            });
            match parsed {
                Some(record) => records.push(record),
                None => warn!("Skipping malformed create row {}", index + 1),
            }
        }
        debug!("Loaded {} create submissions", records.len());
        Ok(records)
    }

    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.storage.remove(&self.key).await
    }
}

fn write_row<S: AsRef<[u8]>>(fields: &[S]) -> Result<String> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer
        .write_record(fields)
        .map_err(|e| Error::Serialization(e.to_string()))?;
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Serialization(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| Error::Serialization(e.to_string()))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStorage;
    use stakeflow_common::PLACEHOLDER_SYMBOL;

    #[test]
    fn test_job_submission() {
        let mut job = CreateSubmission::new(CreateKind::Job);
        job.title = Some("Rust Engineer".into());
        job.company = Some("Acme Labs".into());

        let event = job.to_event();
        assert_eq!(event.subject_name, "Acme Labs");
        assert_eq!(event.pool_name, "Rust Engineer");
        assert_eq!(event.category.as_deref(), Some("create:job"));
        assert_eq!(event.apy, "0%");
        assert_eq!(event.token_symbol, PLACEHOLDER_SYMBOL);
        assert_eq!(event.amount, 0.0);

        assert_eq!(CreateSubmission::new(CreateKind::Job).subject(), "Recruiter");
    }

    #[test]
    fn test_stake_pool_and_hackathon_subjects() {
        let mut pool = CreateSubmission::new(CreateKind::StakePool);
        pool.name = Some("Nova Yield Pool".into());
        pool.amount = Some(25.0);
        pool.token_symbol = Some("TT".into());
        pool.apy = Some("9%".into());

        let event = pool.to_event();
        assert_eq!(event.subject_name, "Nova");
        assert_eq!(event.amount, 25.0);
        assert_eq!(event.apy, "9%");
        assert_eq!(event.category.as_deref(), Some("create:stake-pool"));

        assert_eq!(CreateSubmission::new(CreateKind::StakePool).subject(), "Stake");
        assert_eq!(CreateSubmission::new(CreateKind::Hackathon).subject(), "Hackathon");

        let untitled = CreateSubmission::new(CreateKind::Hackathon).to_event();
        assert_eq!(untitled.pool_name, "hackathon");
    }

    #[tokio::test]
    async fn test_create_log_keeps_full_submission() {
        let storage = Arc::new(MemoryBlobStorage::new());
        let log = CreateLog::new(storage.clone(), "create.csv");

        let mut job = CreateSubmission::new(CreateKind::Job);
        job.title = Some("Engineer, \"Rust\"".into());
        job.company = Some("Acme Labs".into());
        job.user_address = Some("0xabc".into());
        log.append(&job).await.unwrap();

        let mut pool = CreateSubmission::new(CreateKind::StakePool);
        pool.name = Some("Nova Yield Pool".into());
        pool.amount = Some(25.0);
        log.append(&pool).await.unwrap();

        let raw = storage.read("create.csv").await.unwrap().unwrap();
        let mut lines = raw.lines();
        assert_eq!(lines.next(), Some("Date,Type,Name,User Address,Transaction Hash,Form"));
        assert_eq!(raw.lines().count(), 3);

        let records = log.load_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].submission, job);
        assert_eq!(records[1].submission, pool);

        log.clear().await.unwrap();
        assert!(log.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_log_skips_malformed_rows() {
        let storage = Arc::new(MemoryBlobStorage::new());
        storage
            .write(
                "create.csv",
                "Date,Type,Name,User Address,Transaction Hash,Form\nyesterday,job,x,,,{}\n",
            )
            .await
            .unwrap();
        let log = CreateLog::new(storage, "create.csv");

        log.append(&CreateSubmission::new(CreateKind::Hackathon)).await.unwrap();
        let records = log.load_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].submission.kind, CreateKind::Hackathon);
    }
}

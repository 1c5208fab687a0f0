use {
    dashmap::DashSet,
    stakeflow_common::{subject_key, Error, Result},
    std::sync::Arc,
    tracing::debug,
};

/// At most one in-flight auto-stake per subject. Subjects compare
/// case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct SubjectLocks {
    held: Arc<DashSet<String>>,
}

impl SubjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, subject: &str) -> Result<SubjectLease> {
        let key = subject_key(subject);
        if !self.held.insert(key.clone()) {
            return Err(Error::WorkflowInProgress(subject.to_string()));
        }
        debug!("Lease acquired for {}", subject);
        Ok(SubjectLease {
            held: self.held.clone(),
            key,
        })
    }

    pub fn is_held(&self, subject: &str) -> bool {
        self.held.contains(&subject_key(subject))
    }
}

/// Released on drop, whichever way the workflow ends.
#[derive(Debug)]
pub struct SubjectLease {
    held: Arc<DashSet<String>>,
    key: String,
}

impl Drop for SubjectLease {
    fn drop(&mut self) {
        self.held.remove(&self.key);
        debug!("Lease released for {}", self.key);
    }
}

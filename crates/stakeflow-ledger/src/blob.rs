//! Blob storage backends for the ledger

use {
    crate::traits::BlobStorage,
    async_trait::async_trait,
    std::{
        collections::HashMap,
        io::ErrorKind,
        path::{Path, PathBuf},
    },
    stakeflow_common::{Error, Result},
    tokio::sync::RwLock,
    tracing::debug,
};

/// Stores each key as a file under a data directory.
pub struct FileBlobStorage {
    root: PathBuf,
}

impl FileBlobStorage {
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        debug!("Opened file blob storage at {}", root.display());
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(Error::Storage(format!("invalid storage key '{}'", key)));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStorage for FileBlobStorage {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, contents: &str) -> Result<()> {
        let path = self.path_for(key)?;
        // Readers never observe a partially written blob.
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process storage, used by tests and the `memory` storage type.
#[derive(Default)]
pub struct MemoryBlobStorage {
    blobs: RwLock<HashMap<String, String>>,
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, contents: &str) -> Result<()> {
        self.blobs
            .write()
            .await
            .insert(key.to_string(), contents.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.blobs.write().await.remove(key);
        Ok(())
    }
}

//! Whole-document persistence for the endpoint pool

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::document::PoolDocument;
use crate::error::Result;

/// Storage for the pool document. Every read loads the full document and
/// every write replaces it.
#[async_trait]
pub trait PoolStore: Send + Sync {
    async fn load(&self) -> Result<PoolDocument>;

    async fn save(&self, document: &PoolDocument) -> Result<()>;
}

/// JSON file store
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PoolStore for JsonFileStore {
    async fn load(&self) -> Result<PoolDocument> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No pool document yet, using defaults");
                return Ok(PoolDocument::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut document: PoolDocument = serde_json::from_slice(&bytes)?;
        document.normalize();
        Ok(document)
    }

    async fn save(&self, document: &PoolDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(document)?;

        // Write beside the target and rename so readers never see a partial file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), bytes = json.len(), "Saved pool document");
        Ok(())
    }
}

/// In-memory store, used by tests and for running without a state file
#[derive(Default)]
pub struct MemoryStore {
    document: Mutex<PoolDocument>,
}

impl MemoryStore {
    pub fn new(document: PoolDocument) -> Self {
        info!(endpoints = document.api_endpoints.len(), "Using in-memory pool store");
        Self {
            document: Mutex::new(document),
        }
    }
}

#[async_trait]
impl PoolStore for MemoryStore {
    async fn load(&self) -> Result<PoolDocument> {
        Ok(self.document.lock().clone())
    }

    async fn save(&self, document: &PoolDocument) -> Result<()> {
        *self.document.lock() = document.clone();
        Ok(())
    }
}

//! Completion notices for downstream consumers of cleaned signals.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::cleaner::PositionSignal;

/// One cleaned position file, ready for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionNotice {
    pub file: String,
    pub bucket: String,
    /// blake3 hex digest of the raw position file.
    pub source_hash: String,
    pub signals: Vec<PositionSignal>,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize notice: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to append to queue file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait SignalPublisher: Send + Sync {
    /// Returns only once the notice is durably enqueued.
    async fn publish(&self, notice: &CompletionNotice) -> Result<(), PublishError>;
}

#[derive(Debug, Default)]
pub struct MemoryPublisher {
    notices: RwLock<Vec<CompletionNotice>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn notices(&self) -> Vec<CompletionNotice> {
        self.notices.read().await.clone()
    }
}

#[async_trait]
impl SignalPublisher for MemoryPublisher {
    async fn publish(&self, notice: &CompletionNotice) -> Result<(), PublishError> {
        self.notices.write().await.push(notice.clone());
        Ok(())
    }
}

/// Appends each notice as one JSON line to a queue file.
#[derive(Debug, Clone)]
pub struct JsonLinesPublisher {
    path: PathBuf,
}

impl JsonLinesPublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> PublishError {
        PublishError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl SignalPublisher for JsonLinesPublisher {
    async fn publish(&self, notice: &CompletionNotice) -> Result<(), PublishError> {
        let mut line = serde_json::to_vec(notice)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| self.io_error(err))?;
        file.write_all(&line).await.map_err(|err| self.io_error(err))?;
        // tokio only reports a failed background write from flush.
        file.flush().await.map_err(|err| self.io_error(err))?;
        file.sync_data().await.map_err(|err| self.io_error(err))?;
        Ok(())
    }
}

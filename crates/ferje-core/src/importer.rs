//! Upload handling: pair a position file with its metadata file, clean it,
//! publish the result and remove both sources.

use std::sync::Arc;

use blake3::Hasher;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bucket::{BucketError, BucketStore};
use crate::cleaner::SignalCleaner;
use crate::config::NamingConfig;
use crate::error::PipelineError;
use crate::publisher::{CompletionNotice, PublishError, SignalPublisher};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("metadata file {metadata_key} for {key} is not available")]
    MissingCompanion { key: String, metadata_key: String },
    #[error("bucket error: {0}")]
    Bucket(#[from] BucketError),
    #[error("{key} is not valid UTF-8: {source}")]
    Utf8 {
        key: String,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("cleaning {key} failed: {source}")]
    Pipeline {
        key: String,
        #[source]
        source: PipelineError,
    },
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
}

/// Object-created notification, shaped like an S3 event.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadEvent {
    #[serde(rename = "Records")]
    pub records: Vec<UploadRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectRef {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Not a position file; left untouched.
    Ignored { key: String },
    Processed(ImportSummary),
    /// The position file was already processed and removed; its leftover
    /// metadata file has now been removed too.
    Reclaimed { key: String, metadata_key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub key: String,
    pub metadata_key: String,
    pub source_hash: String,
    pub signals: usize,
    pub skipped: usize,
    pub excluded: usize,
}

pub struct Importer {
    store: Arc<dyn BucketStore>,
    publisher: Arc<dyn SignalPublisher>,
    cleaner: SignalCleaner,
    naming: NamingConfig,
}

impl Importer {
    pub fn new(
        store: Arc<dyn BucketStore>,
        publisher: Arc<dyn SignalPublisher>,
        cleaner: SignalCleaner,
        naming: NamingConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            cleaner,
            naming,
        }
    }

    /// Handles every record in order, stopping at the first failure.
    pub async fn handle_event(
        &self,
        event: &UploadEvent,
    ) -> Result<Vec<ImportOutcome>, ImportError> {
        let mut outcomes = Vec::with_capacity(event.records.len());
        for record in &event.records {
            let outcome = self
                .handle_upload(&record.s3.bucket.name, &record.s3.object.key)
                .await?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Source files are deleted only once their notice has been published.
    pub async fn handle_upload(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ImportOutcome, ImportError> {
        let Some(stem) = self.naming.position_stem(key) else {
            debug!(bucket, key, "not a position file, ignoring");
            return Ok(ImportOutcome::Ignored {
                key: key.to_string(),
            });
        };
        let metadata_key = self.naming.metadata_key(stem);
        info!(bucket, key, metadata_key = %metadata_key, "processing uploaded position file");

        let positions = match self.store.get_object(key).await {
            Ok(bytes) => bytes,
            Err(BucketError::NotFound(_)) => return self.reclaim(key, metadata_key).await,
            Err(err) => return Err(err.into()),
        };
        let vessels = match self.store.get_object(&metadata_key).await {
            Ok(bytes) => bytes,
            Err(BucketError::NotFound(_)) => {
                return Err(ImportError::MissingCompanion {
                    key: key.to_string(),
                    metadata_key,
                });
            }
            Err(err) => return Err(err.into()),
        };

        let positions_text = decode(key, &positions)?;
        let vessels_text = decode(&metadata_key, &vessels)?;
        let result = self
            .cleaner
            .clean(positions_text, vessels_text)
            .map_err(|source| ImportError::Pipeline {
                key: key.to_string(),
                source,
            })?;

        let source_hash = compute_hash(&positions);
        let summary = ImportSummary {
            key: key.to_string(),
            metadata_key: metadata_key.clone(),
            source_hash: source_hash.clone(),
            signals: result.signals.len(),
            skipped: result.skipped.len(),
            excluded: result.excluded,
        };

        let notice = CompletionNotice {
            file: key.to_string(),
            bucket: bucket.to_string(),
            source_hash,
            signals: result.signals,
        };
        self.publisher.publish(&notice).await?;
        info!(key, signals = summary.signals, "published completion notice");

        self.store.delete_object(key).await?;
        self.store.delete_object(&metadata_key).await?;
        info!(key, metadata_key = %metadata_key, "removed processed files");

        Ok(ImportOutcome::Processed(summary))
    }

    /// A missing position file next to a present metadata file means an
    /// earlier run published and then failed between the two deletes.
    async fn reclaim(
        &self,
        key: &str,
        metadata_key: String,
    ) -> Result<ImportOutcome, ImportError> {
        match self.store.get_object(&metadata_key).await {
            Ok(_) => {}
            Err(BucketError::NotFound(_)) => {
                return Err(BucketError::NotFound(key.to_string()).into());
            }
            Err(err) => return Err(err.into()),
        }

        warn!(
            key,
            metadata_key = %metadata_key,
            "position file already processed, removing leftover metadata"
        );
        self.store.delete_object(&metadata_key).await?;
        Ok(ImportOutcome::Reclaimed {
            key: key.to_string(),
            metadata_key,
        })
    }
}

/// UTF-8 with any leading byte-order mark removed.
fn decode<'a>(key: &str, bytes: &'a [u8]) -> Result<&'a str, ImportError> {
    let text = std::str::from_utf8(bytes).map_err(|source| ImportError::Utf8 {
        key: key.to_string(),
        source,
    })?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

fn compute_hash(contents: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    let hash = hasher.finalize();
    hash.to_hex().to_string()
}

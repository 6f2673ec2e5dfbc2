//! Object storage the importer reads uploaded files from and cleans up after.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("sdk error: {0}")]
    Sdk(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("invalid object key '{0}'")]
    InvalidKey(String),
    #[error("io error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

impl BucketError {
    #[cfg_attr(not(feature = "s3"), allow(dead_code))]
    fn from_sdk(err: impl fmt::Display) -> Self {
        Self::Sdk(err.to_string())
    }

    fn from_io(key: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(key.to_string())
        } else {
            Self::Io {
                key: key.to_string(),
                source,
            }
        }
    }
}

#[async_trait]
pub trait BucketStore: Send + Sync {
    async fn put_object(&self, key: &str, bytes: Bytes) -> Result<(), BucketError>;
    async fn get_object(&self, key: &str) -> Result<Bytes, BucketError>;
    /// Deleting an absent key succeeds, as it does on S3.
    async fn delete_object(&self, key: &str) -> Result<(), BucketError>;
}

/// In-process bucket, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryBucketStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted keys currently stored.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl BucketStore for MemoryBucketStore {
    async fn put_object(&self, key: &str, bytes: Bytes) -> Result<(), BucketError> {
        self.objects.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, BucketError> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| BucketError::NotFound(key.to_string()))
    }

    async fn delete_object(&self, key: &str) -> Result<(), BucketError> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}

/// A local directory standing in for a bucket; keys are relative paths.
#[derive(Debug, Clone)]
pub struct FsBucketStore {
    root: PathBuf,
}

impl FsBucketStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, BucketError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(BucketError::Configuration(format!(
                "bucket root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BucketError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(BucketError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BucketStore for FsBucketStore {
    async fn put_object(&self, key: &str, bytes: Bytes) -> Result<(), BucketError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| BucketError::from_io(key, err))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|err| BucketError::from_io(key, err))
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, BucketError> {
        let path = self.path_for(key)?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|err| BucketError::from_io(key, err))?;
        Ok(Bytes::from(data))
    }

    async fn delete_object(&self, key: &str) -> Result<(), BucketError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(BucketError::from_io(key, err)),
        }
    }
}

#[cfg(feature = "s3")]
pub use s3::{content_type_for, S3BucketStore, S3Config, DEFAULT_REGION};

#[cfg(feature = "s3")]
mod s3 {
    use async_trait::async_trait;
    use aws_config::BehaviorVersion;
    use aws_credential_types::provider::SharedCredentialsProvider;
    use aws_credential_types::Credentials;
    use aws_sdk_s3::config::Region;
    use aws_sdk_s3::error::SdkError;
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::Client;
    use bytes::Bytes;

    use super::{BucketError, BucketStore};

    pub const DEFAULT_REGION: &str = "eu-north-1";

    #[derive(Debug, Clone)]
    pub struct S3Config {
        pub bucket: String,
        pub region: String,
        pub endpoint: Option<String>,
        pub access_key_id: Option<String>,
        pub secret_access_key: Option<String>,
        pub force_path_style: bool,
    }

    impl S3Config {
        /// Reads `S3_REGION`, `S3_ENDPOINT_URL`, `S3_ACCESS_KEY_ID`,
        /// `S3_SECRET_ACCESS_KEY` and `S3_FORCE_PATH_STYLE`.
        pub fn from_env(bucket: impl Into<String>) -> Self {
            Self::from_lookup(bucket, |key| std::env::var(key).ok())
        }

        /// Empty values count as unset.
        pub fn from_lookup(
            bucket: impl Into<String>,
            lookup: impl Fn(&str) -> Option<String>,
        ) -> Self {
            let var = |key: &str| lookup(key).filter(|v| !v.is_empty());
            Self {
                bucket: bucket.into(),
                region: var("S3_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
                endpoint: var("S3_ENDPOINT_URL"),
                access_key_id: var("S3_ACCESS_KEY_ID"),
                secret_access_key: var("S3_SECRET_ACCESS_KEY"),
                force_path_style: var("S3_FORCE_PATH_STYLE")
                    .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true")),
            }
        }

        /// The bucket must be named; credentials come as a pair or not at all.
        pub fn validate(&self) -> Result<(), BucketError> {
            if self.bucket.trim().is_empty() {
                return Err(BucketError::Configuration(
                    "bucket name cannot be empty".into(),
                ));
            }
            if self.access_key_id.is_some() != self.secret_access_key.is_some() {
                return Err(BucketError::Configuration(
                    "S3_ACCESS_KEY_ID and S3_SECRET_ACCESS_KEY must be set together".into(),
                ));
            }
            Ok(())
        }
    }

    /// Content type recorded for an uploaded key.
    pub fn content_type_for(key: &str) -> &'static str {
        if key.ends_with(".csv") {
            "text/csv"
        } else if key.ends_with(".json") || key.ends_with(".jsonl") {
            "application/json"
        } else {
            "application/octet-stream"
        }
    }

    #[derive(Clone)]
    pub struct S3BucketStore {
        client: Client,
        bucket: String,
    }

    impl S3BucketStore {
        pub async fn new(config: S3Config) -> Result<Self, BucketError> {
            config.validate()?;

            let mut loader = aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(config.region.clone()));

            if let (Some(access_key), Some(secret_key)) =
                (&config.access_key_id, &config.secret_access_key)
            {
                let credentials = Credentials::new(access_key, secret_key, None, None, "ferje-static");
                loader = loader.credentials_provider(SharedCredentialsProvider::new(credentials));
            }

            let shared_config = loader.load().await;
            let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);

            if let Some(endpoint) = &config.endpoint {
                builder = builder.endpoint_url(endpoint);
            }

            if config.force_path_style {
                builder = builder.force_path_style(true);
            }

            let client = Client::from_conf(builder.build());
            Ok(Self {
                client,
                bucket: config.bucket,
            })
        }

        pub fn bucket(&self) -> &str {
            &self.bucket
        }
    }

    #[async_trait]
    impl BucketStore for S3BucketStore {
        async fn put_object(&self, key: &str, bytes: Bytes) -> Result<(), BucketError> {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(bytes))
                .content_type(content_type_for(key))
                .send()
                .await
                .map_err(BucketError::from_sdk)?;
            Ok(())
        }

        async fn get_object(&self, key: &str) -> Result<Bytes, BucketError> {
            let output = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|err| match err {
                    SdkError::ServiceError(service_err) if service_err.err().is_no_such_key() => {
                        BucketError::NotFound(key.to_string())
                    }
                    other => BucketError::from_sdk(other),
                })?;

            let data = output.body.collect().await.map_err(BucketError::from_sdk)?;
            Ok(Bytes::from(data.into_bytes()))
        }

        async fn delete_object(&self, key: &str) -> Result<(), BucketError> {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(BucketError::from_sdk)?;
            Ok(())
        }
    }
}

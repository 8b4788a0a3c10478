//! Upload function backed by a bucketed object store, as used by the admin
//! screens for covers, team photos and blog images.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::file::FileBlob;
use crate::upload::UploadFn;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("object `{bucket}/{key}` already exists")]
    AlreadyExists { bucket: String, key: String },
    #[error("object `{bucket}/{key}` not found")]
    NotFound { bucket: String, key: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("File too large (max {max_mb}MB)")]
    TooLarge { size: usize, max_mb: u64 },
    #[error("file type `{0}` is not accepted")]
    NotAccepted(String),
    #[error("No public URL returned")]
    NoPublicUrl,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: String,
    pub cache_control: String,
    pub upsert: bool,
}

#[async_trait(?Send)]
pub trait ObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        options: &UploadOptions,
    ) -> Result<(), StorageError>;

    /// URL of a publicly readable object. May be empty if the store has no
    /// public endpoint.
    fn public_url(&self, bucket: &str, key: &str) -> String;

    async fn signed_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError>;
}

#[async_trait(?Send)]
impl<S: ObjectStore + ?Sized> ObjectStore for Rc<S> {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        options: &UploadOptions,
    ) -> Result<(), StorageError> {
        (**self).upload(bucket, key, bytes, options).await
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        (**self).public_url(bucket, key)
    }

    async fn signed_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        (**self).signed_url(bucket, key, expires_in).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum UrlMode {
    Public,
    Signed { expires_in_secs: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    pub bucket: String,
    pub max_size_mb: u64,
    /// MIME patterns; `type/*` matches a whole top-level type.
    pub accept: Vec<String>,
    pub cache_control: String,
    pub upsert: bool,
    pub url_mode: UrlMode,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            bucket: "thumbnails".to_string(),
            max_size_mb: 10,
            accept: vec!["image/*".to_string(), "application/pdf".to_string()],
            cache_control: "3600".to_string(),
            upsert: false,
            url_mode: UrlMode::Public,
        }
    }
}

impl BucketConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn max_size_bytes(&self) -> usize {
        usize::try_from(self.max_size_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }

    pub fn accepts(&self, mime: &str) -> bool {
        self.accept.iter().any(|pattern| match pattern.strip_suffix("/*") {
            Some(top) => mime
                .split_once('/')
                .is_some_and(|(ty, _)| ty.eq_ignore_ascii_case(top)),
            None => pattern.eq_ignore_ascii_case(mime),
        })
    }
}

/// Object key for an upload: a millisecond timestamp, a dash, then the file
/// name with each whitespace run turned into a single dash.
pub fn object_key(timestamp_millis: i64, file_name: &str) -> String {
    let mut name = String::with_capacity(file_name.len());
    let mut in_space = false;
    for ch in file_name.chars() {
        if ch.is_whitespace() {
            if !in_space {
                name.push('-');
            }
            in_space = true;
        } else {
            name.push(ch);
            in_space = false;
        }
    }
    format!("{timestamp_millis}-{name}")
}

type Clock = dyn Fn() -> i64;

/// Validates a file against a [`BucketConfig`], stores it and resolves the
/// URL it can be served from.
pub struct BucketUploader<S> {
    store: S,
    config: BucketConfig,
    clock: Box<Clock>,
}

impl<S: ObjectStore> BucketUploader<S> {
    pub fn new(store: S, config: BucketConfig) -> Self {
        Self {
            store,
            config,
            clock: Box::new(|| chrono::Utc::now().timestamp_millis()),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> i64 + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &BucketConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn put(&self, file: &FileBlob) -> Result<String, UploadError> {
        let config = &self.config;
        if file.len() > config.max_size_bytes() {
            return Err(UploadError::TooLarge {
                size: file.len(),
                max_mb: config.max_size_mb,
            });
        }
        if !config.accepts(file.mime()) {
            return Err(UploadError::NotAccepted(file.mime().to_string()));
        }

        let key = object_key((self.clock)(), file.name());
        let options = UploadOptions {
            content_type: file.mime().to_string(),
            cache_control: config.cache_control.clone(),
            upsert: config.upsert,
        };
        tracing::debug!(bucket = %config.bucket, %key, size = file.len(), mime = file.mime(), "uploading object");

        self.store
            .upload(&config.bucket, &key, file.bytes(), &options)
            .await?;

        let url = match &config.url_mode {
            UrlMode::Public => self.store.public_url(&config.bucket, &key),
            UrlMode::Signed { expires_in_secs } => {
                let expires_in = Duration::from_secs(*expires_in_secs);
                self.store
                    .signed_url(&config.bucket, &key, expires_in)
                    .await?
            }
        };
        if url.is_empty() {
            return Err(UploadError::NoPublicUrl);
        }

        tracing::info!(bucket = %config.bucket, %key, %url, "object uploaded");
        Ok(url)
    }
}

#[async_trait(?Send)]
impl<S: ObjectStore> UploadFn for BucketUploader<S> {
    async fn upload(&self, file: FileBlob) -> anyhow::Result<String> {
        Ok(self.put(&file).await?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub options: UploadOptions,
}

/// In-process [`ObjectStore`] with URL shapes of a hosted storage API.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    base_url: String,
    buckets: BTreeSet<String>,
    objects: RefCell<BTreeMap<(String, String), StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.buckets.insert(bucket.into());
        self
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .borrow()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects
            .borrow()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    fn check_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        if self.buckets.contains(bucket) {
            Ok(())
        } else {
            Err(StorageError::BucketNotFound(bucket.to_string()))
        }
    }
}

#[async_trait(?Send)]
impl ObjectStore for MemoryObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        options: &UploadOptions,
    ) -> Result<(), StorageError> {
        self.check_bucket(bucket)?;
        let mut objects = self.objects.borrow_mut();
        let id = (bucket.to_string(), key.to_string());
        if !options.upsert && objects.contains_key(&id) {
            return Err(StorageError::AlreadyExists {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        objects.insert(
            id,
            StoredObject {
                bytes: bytes.to_vec(),
                options: options.clone(),
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        if self.base_url.is_empty() {
            return String::new();
        }
        format!("{}/storage/v1/object/public/{bucket}/{key}", self.base_url)
    }

    async fn signed_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        self.check_bucket(bucket)?;
        if self.object(bucket, key).is_none() {
            return Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        Ok(format!(
            "{}/storage/v1/object/sign/{bucket}/{key}?expires_in={}",
            self.base_url,
            expires_in.as_secs()
        ))
    }
}

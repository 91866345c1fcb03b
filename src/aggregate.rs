//! Load-time aggregation of manifests and documents.
//!
//! A bucket loads atomically: the manifest is read first, then every
//! document it lists is fetched (up to `concurrency` at a time, all of them
//! awaited) and decoded. Any document failure fails the whole bucket. A
//! missing manifest is an empty bucket unless the loader is configured to
//! treat it as an error.
//!
//! Buckets are independent. [`Loader::load_site`] loads all four at once
//! and reports each as either loaded content or a failure message.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;

use crate::config::{LoaderConfig, MissingManifest};
use crate::derive::{
    closure_board, document_views, information_views, program_views, ClosureBoard, DocumentView,
    InformationView, ProgramView,
};
use crate::error::{ContentError, ContentResult, TransportError};
use crate::format::Formatter;
use crate::models::{Bucket, Closure, ContentRecord, Document, InformationItem, Program};
use crate::source::ContentSource;

/// Loaded content of one bucket, or why it could not be loaded.
///
/// Serializes as `{"status":"loaded","data":...}` or
/// `{"status":"failed","message":...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BucketState<T> {
    Loaded { data: T },
    Failed { message: String },
}

impl<T> BucketState<T> {
    fn from_result(result: ContentResult<T>) -> Self {
        match result {
            Ok(data) => BucketState::Loaded { data },
            Err(e) => {
                tracing::warn!(bucket = %e.bucket(), error = %e, "bucket failed to load");
                BucketState::Failed {
                    message: e.user_message(),
                }
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, BucketState::Loaded { .. })
    }
}

/// Derived view state for every bucket.
#[derive(Debug, Clone, Serialize)]
pub struct SiteContent {
    pub generated_at: DateTime<Utc>,
    pub programs: BucketState<Vec<ProgramView>>,
    pub closures: BucketState<ClosureBoard>,
    pub documents: BucketState<Vec<DocumentView>>,
    pub information: BucketState<Vec<InformationView>>,
}

impl SiteContent {
    /// Buckets that failed to load.
    pub fn failed_buckets(&self) -> Vec<Bucket> {
        let mut failed = Vec::new();
        if !self.programs.is_loaded() {
            failed.push(Bucket::Programs);
        }
        if !self.closures.is_loaded() {
            failed.push(Bucket::Closures);
        }
        if !self.documents.is_loaded() {
            failed.push(Bucket::Documents);
        }
        if !self.information.is_loaded() {
            failed.push(Bucket::Information);
        }
        failed
    }
}

/// Derived view of a single bucket.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BucketView {
    Programs(Vec<ProgramView>),
    Closures(ClosureBoard),
    Documents(Vec<DocumentView>),
    Information(Vec<InformationView>),
}

pub struct Loader<'a> {
    source: &'a dyn ContentSource,
    timeout: Duration,
    concurrency: usize,
    missing_manifest: MissingManifest,
}

impl<'a> Loader<'a> {
    pub fn new(source: &'a dyn ContentSource) -> Self {
        let defaults = LoaderConfig::default();
        Self {
            source,
            timeout: defaults.timeout(),
            concurrency: defaults.concurrency,
            missing_manifest: defaults.missing_manifest,
        }
    }

    pub fn from_config(source: &'a dyn ContentSource, config: &LoaderConfig) -> Self {
        Self::new(source)
            .with_timeout(config.timeout())
            .with_concurrency(config.concurrency)
            .with_missing_manifest(config.missing_manifest)
    }

    /// Per-fetch timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Maximum document fetches in flight per bucket.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_missing_manifest(mut self, policy: MissingManifest) -> Self {
        self.missing_manifest = policy;
        self
    }

    async fn fetch(
        &self,
        bucket: Bucket,
        path: &str,
    ) -> ContentResult<Result<Option<Value>, TransportError>> {
        tokio::time::timeout(self.timeout, self.source.fetch_json(path))
            .await
            .map_err(|_| ContentError::FetchTimeout {
                bucket,
                path: path.to_string(),
                millis: self.timeout.as_millis(),
            })
    }

    /// Read a bucket's manifest.
    pub async fn load_manifest(&self, bucket: Bucket) -> ContentResult<Vec<String>> {
        let path = bucket.manifest_name();
        let value = match self.fetch(bucket, &path).await? {
            Ok(Some(value)) => value,
            Ok(None) => {
                return match self.missing_manifest {
                    MissingManifest::Empty => {
                        tracing::debug!(%bucket, %path, "manifest missing, bucket is empty");
                        Ok(Vec::new())
                    }
                    MissingManifest::Error => Err(ContentError::ManifestMissing { bucket, path }),
                }
            }
            Err(source) => return Err(ContentError::ManifestFetchFailed { bucket, source }),
        };

        let invalid = |reason: String| ContentError::ManifestInvalid {
            bucket,
            path: path.clone(),
            reason,
        };

        let files: Vec<String> = serde_json::from_value(value)
            .map_err(|e| invalid(format!("expected an array of file names: {}", e)))?;

        for file in &files {
            if !is_plain_file_name(file) {
                return Err(invalid(format!("'{}' is not a plain file name", file)));
            }
        }

        Ok(files)
    }

    async fn load_document<T: ContentRecord>(&self, file: &str) -> ContentResult<T> {
        let bucket = T::BUCKET;
        let path = bucket.document_path(file);

        let value = match self.fetch(bucket, &path).await? {
            Ok(Some(value)) => value,
            Ok(None) => {
                return Err(ContentError::DocumentMissing {
                    bucket,
                    file: file.to_string(),
                })
            }
            Err(source) => {
                return Err(ContentError::DocumentFetchFailed {
                    bucket,
                    file: file.to_string(),
                    source,
                })
            }
        };

        let malformed = |reason: String| ContentError::MalformedDocument {
            bucket,
            file: file.to_string(),
            reason,
        };

        let record: T = serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
        record.validate().map_err(malformed)?;
        Ok(record)
    }

    /// Load and decode every record of `T`'s bucket, in manifest order.
    pub async fn load_bucket<T: ContentRecord>(&self) -> ContentResult<Vec<T>> {
        let bucket = T::BUCKET;
        let files = self.load_manifest(bucket).await?;

        let results: Vec<ContentResult<T>> = stream::iter(files.iter())
            .map(|file| self.load_document::<T>(file))
            .buffered(self.concurrency)
            .collect()
            .await;

        let records = results.into_iter().collect::<ContentResult<Vec<T>>>()?;

        if T::UNIQUE_TITLE {
            let mut seen = HashSet::new();
            for (file, record) in files.iter().zip(&records) {
                if !seen.insert(record.title().trim()) {
                    return Err(ContentError::DuplicateTitle {
                        bucket,
                        file: file.clone(),
                        title: record.title().to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            %bucket,
            records = records.len(),
            source = %self.source.describe(),
            "bucket loaded"
        );
        Ok(records)
    }

    pub async fn programs(&self, fmt: &Formatter) -> ContentResult<Vec<ProgramView>> {
        Ok(program_views(self.load_bucket::<Program>().await?, fmt))
    }

    pub async fn closures(
        &self,
        now: DateTime<Utc>,
        fmt: &Formatter,
    ) -> ContentResult<ClosureBoard> {
        Ok(closure_board(self.load_bucket::<Closure>().await?, now, fmt))
    }

    pub async fn documents(&self) -> ContentResult<Vec<DocumentView>> {
        Ok(document_views(self.load_bucket::<Document>().await?))
    }

    pub async fn information(&self) -> ContentResult<Vec<InformationView>> {
        Ok(information_views(self.load_bucket::<InformationItem>().await?))
    }

    /// Load one bucket and derive its view.
    pub async fn load_view(
        &self,
        bucket: Bucket,
        now: DateTime<Utc>,
        fmt: &Formatter,
    ) -> ContentResult<BucketView> {
        Ok(match bucket {
            Bucket::Programs => BucketView::Programs(self.programs(fmt).await?),
            Bucket::Closures => BucketView::Closures(self.closures(now, fmt).await?),
            Bucket::Documents => BucketView::Documents(self.documents().await?),
            Bucket::Information => BucketView::Information(self.information().await?),
        })
    }

    /// Load all buckets concurrently. A failing bucket does not affect the others.
    pub async fn load_site(&self, now: DateTime<Utc>, fmt: &Formatter) -> SiteContent {
        let (programs, closures, documents, information) = tokio::join!(
            self.programs(fmt),
            self.closures(now, fmt),
            self.documents(),
            self.information(),
        );

        SiteContent {
            generated_at: now,
            programs: BucketState::from_result(programs),
            closures: BucketState::from_result(closures),
            documents: BucketState::from_result(documents),
            information: BucketState::from_result(information),
        }
    }
}

/// A manifest entry must name a file directly inside the bucket.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

//! Error types for indexing and loading content.
//!
//! [`TransportError`] covers a single fetch. "Absent" is not an error at
//! that level: [`ContentSource::fetch_json`](crate::source::ContentSource::fetch_json)
//! returns `Ok(None)` for it, so callers can tell a missing manifest from a
//! broken one. [`ContentError`] is scoped to one bucket; a failure never
//! carries over to another bucket.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::Bucket;

/// Failure fetching one resource from a content source.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request for {path} failed: {message}")]
    Request { path: String, message: String },

    #[error("{path} returned HTTP {status}")]
    Status { path: String, status: u16 },

    #[error("{path} is not valid JSON: {source}")]
    InvalidJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Failure indexing or loading one bucket.
#[derive(Debug, Error)]
pub enum ContentError {
    /// Only raised when the loader is configured with `missing_manifest = "error"`.
    #[error("{bucket}: manifest {path} not found")]
    ManifestMissing { bucket: Bucket, path: String },

    #[error("{bucket}: manifest could not be fetched: {source}")]
    ManifestFetchFailed {
        bucket: Bucket,
        #[source]
        source: TransportError,
    },

    #[error("{bucket}: manifest {path} is invalid: {reason}")]
    ManifestInvalid {
        bucket: Bucket,
        path: String,
        reason: String,
    },

    #[error("{bucket}/{file}: {source}")]
    DocumentFetchFailed {
        bucket: Bucket,
        file: String,
        #[source]
        source: TransportError,
    },

    #[error("{bucket}/{file}: listed in the manifest but not found")]
    DocumentMissing { bucket: Bucket, file: String },

    #[error("{bucket}/{file}: malformed document: {reason}")]
    MalformedDocument {
        bucket: Bucket,
        file: String,
        reason: String,
    },

    #[error("{bucket}/{file}: duplicate title '{title}'")]
    DuplicateTitle {
        bucket: Bucket,
        file: String,
        title: String,
    },

    #[error("{bucket}: fetching {path} timed out after {millis} ms")]
    FetchTimeout {
        bucket: Bucket,
        path: String,
        millis: u128,
    },

    #[error("{bucket}: cannot read {}: {source}", path.display())]
    FilesystemReadFailed {
        bucket: Bucket,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{bucket}: {op} {} failed: {source}", path.display())]
    FilesystemWriteFailed {
        bucket: Bucket,
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ContentError {
    /// The bucket this error belongs to.
    pub fn bucket(&self) -> Bucket {
        match self {
            ContentError::ManifestMissing { bucket, .. }
            | ContentError::ManifestFetchFailed { bucket, .. }
            | ContentError::ManifestInvalid { bucket, .. }
            | ContentError::DocumentFetchFailed { bucket, .. }
            | ContentError::DocumentMissing { bucket, .. }
            | ContentError::MalformedDocument { bucket, .. }
            | ContentError::DuplicateTitle { bucket, .. }
            | ContentError::FetchTimeout { bucket, .. }
            | ContentError::FilesystemReadFailed { bucket, .. }
            | ContentError::FilesystemWriteFailed { bucket, .. } => *bucket,
        }
    }

    /// Message shown in place of a bucket's content when it fails to load.
    pub fn user_message(&self) -> String {
        format!("Could not load {}. {}", self.bucket(), self)
    }
}

pub type ContentResult<T> = std::result::Result<T, ContentError>;

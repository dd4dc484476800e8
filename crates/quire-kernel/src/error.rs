//! Kernel error types.

use std::fmt;

use thiserror::Error;

use quire_doc::DocError;
use quire_types::{BlockId, RecipientId, UploadHandle, ValidationError};

/// Why one staged file didn't make it to durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadFailureReason {
    /// The file no longer passes its block kind's limits.
    Invalid(ValidationError),
    /// The block points at a handle with no staged file behind it.
    MissingFile,
    /// The storage collaborator refused or failed.
    Storage(String),
}

impl fmt::Display for UploadFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadFailureReason::Invalid(e) => write!(f, "{e}"),
            UploadFailureReason::MissingFile => write!(f, "no file staged"),
            UploadFailureReason::Storage(msg) => write!(f, "storage failed: {msg}"),
        }
    }
}

/// One failed file in a staging batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailure {
    pub block_id: BlockId,
    pub handle: UploadHandle,
    pub file_name: Option<String>,
    pub reason: UploadFailureReason,
}

/// A staging batch failed. Nothing from the batch was written back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} upload(s) failed: {}", .failures.len(), summarize(.failures))]
pub struct UploadError {
    pub failures: Vec<UploadFailure>,
}

impl UploadError {
    /// Blocks whose files failed, in the order reported.
    pub fn failed_blocks(&self) -> Vec<BlockId> {
        self.failures.iter().map(|f| f.block_id).collect()
    }
}

fn summarize(failures: &[UploadFailure]) -> String {
    failures
        .iter()
        .map(|f| match &f.file_name {
            Some(name) => format!("{name} ({})", f.reason),
            None => format!("block {} ({})", f.block_id.short(), f.reason),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// File storage collaborator errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upload rejected: {0}")]
    Rejected(String),
}

/// Persistence collaborator errors.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The save call returned `success: false`.
    #[error("save rejected: {0}")]
    Rejected(String),

    #[error("persistence unavailable: {0}")]
    Unavailable(String),

    #[error("stored document is corrupt: {0}")]
    Corrupt(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Document(#[from] DocError),
}

/// Recipient directory errors.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Anything a [`DocumentSession`](crate::DocumentSession) operation can fail with.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Document(#[from] DocError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("no contact with id {0}")]
    UnknownRecipient(RecipientId),
}

impl From<ValidationError> for SessionError {
    fn from(e: ValidationError) -> Self {
        SessionError::Document(e.into())
    }
}

impl SessionError {
    /// Field-level problems the operator can fix inline.
    pub fn is_validation(&self) -> bool {
        matches!(self, SessionError::Document(DocError::Validation(_)))
    }

    /// Failures worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::Upload(_)
                | SessionError::Persistence(PersistenceError::Rejected(_))
                | SessionError::Persistence(PersistenceError::Unavailable(_))
                | SessionError::Directory(DirectoryError::Unavailable(_))
        )
    }
}

pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;
pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;
pub type StorageResult<T> = std::result::Result<T, StorageError>;

//! Async side of the Quire document model.
//!
//! `quire-doc` knows what a legal document looks like; this crate moves one
//! through its lifecycle against real collaborators:
//!
//! - [`collab`]: the persistence, file storage, and recipient directory traits
//! - [`stage_all`]: concurrent upload of staged files, all or nothing
//! - [`DocumentSession`]: plan → stage → apply → persist → commit, with rollback
//! - [`backends`]: in-memory, SQLite, and local-disk implementations
//! - [`config`]: the operator's TOML config

pub mod backends;
pub mod collab;
pub mod config;
mod error;
pub mod session;
pub mod staging;

pub use collab::{DocumentPersistence, DocumentSummary, FileStorage, RecipientDirectory, SaveOutcome};
pub use config::{ConfigError, QuireConfig};
pub use error::{
    DirectoryError, DirectoryResult, PersistenceError, PersistenceResult, SessionError,
    StorageError, StorageResult, UploadError, UploadFailure, UploadFailureReason,
};
pub use session::{Collaborators, DocumentSession, SessionEvent};
pub use staging::{StagedUpload, StagedUrls, stage_all};

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

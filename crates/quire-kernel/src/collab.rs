//! Collaborator traits.
//!
//! The document core depends only on these three narrow interfaces. Each is
//! object-safe and `Send + Sync` so sessions can hold them as
//! `Arc<dyn Trait>` and swap backends (memory for tests, SQLite and local
//! disk for the CLI).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use quire_doc::{DocumentPayload, LocalFile};
use quire_types::{DocumentId, DocumentKind, LifecycleState, Recipient, RecipientId, UploadCategory};

use crate::error::{DirectoryResult, PersistenceError, PersistenceResult, StorageResult};

/// Result of a save call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }

    /// Fold an error payload into [`PersistenceError::Rejected`].
    pub fn into_result(self) -> PersistenceResult<()> {
        if self.success {
            Ok(())
        } else {
            Err(PersistenceError::Rejected(
                self.error.unwrap_or_else(|| "unspecified error".to_string()),
            ))
        }
    }
}

/// Listing row for stored documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub kind: DocumentKind,
    pub title: String,
    pub state: LifecycleState,
    pub updated_at: u64,
}

impl From<&DocumentPayload> for DocumentSummary {
    fn from(p: &DocumentPayload) -> Self {
        Self {
            id: p.id,
            kind: p.kind,
            title: p.title.clone(),
            state: p.lifecycle_state,
            updated_at: p.updated_at,
        }
    }
}

/// Durable document storage.
///
/// Called exactly once per lifecycle transition. Last write wins.
#[async_trait]
pub trait DocumentPersistence: Send + Sync {
    /// Store the serialized document.
    ///
    /// `Err` means the call itself failed; `Ok` with `success: false` means
    /// the store answered with an error payload. Both roll the transition back.
    async fn save_document(
        &self,
        id: DocumentId,
        payload: &DocumentPayload,
    ) -> PersistenceResult<SaveOutcome>;

    /// Fetch the last stored payload.
    async fn load_document(&self, id: DocumentId) -> PersistenceResult<Option<DocumentPayload>>;

    /// All stored documents, most recently updated first.
    async fn list_documents(&self) -> PersistenceResult<Vec<DocumentSummary>>;
}

/// Durable file storage.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store `file` under `category` and return its durable URL.
    async fn upload(&self, file: &LocalFile, category: UploadCategory) -> StorageResult<String>;
}

/// Read-only contact lookup.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    async fn lookup(&self, id: RecipientId) -> DirectoryResult<Option<Recipient>>;

    async fn list(&self) -> DirectoryResult<Vec<Recipient>>;
}

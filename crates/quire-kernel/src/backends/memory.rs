//! In-memory collaborator backends.
//!
//! Used for tests and dry runs. All data is lost when dropped. Each backend
//! can be told to fail so rollback paths are testable.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use quire_doc::{DocumentPayload, LocalFile};
use quire_types::{DocumentId, EventKind, Recipient, RecipientId, UploadCategory};

use crate::collab::{
    DocumentPersistence, DocumentSummary, FileStorage, RecipientDirectory, SaveOutcome,
};
use crate::error::{
    DirectoryError, DirectoryResult, PersistenceError, PersistenceResult, StorageError,
    StorageResult,
};

// ============================================================================
// Persistence
// ============================================================================

/// How the next saves should fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SaveFailure {
    #[default]
    None,
    /// Answer with `success: false` and this message.
    Reject(String),
    /// Fail the call itself.
    Unavailable,
}

/// In-memory document store.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    documents: RwLock<HashMap<DocumentId, DocumentPayload>>,
    log: RwLock<Vec<(DocumentId, EventKind)>>,
    failure: Mutex<SaveFailure>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following save fail in the given way until reset.
    pub fn set_failure(&self, failure: SaveFailure) {
        *self.failure.lock() = failure;
    }

    /// Every successful save, in order.
    pub fn saves(&self) -> Vec<(DocumentId, EventKind)> {
        self.log.read().clone()
    }

    pub fn stored(&self, id: DocumentId) -> Option<DocumentPayload> {
        self.documents.read().get(&id).cloned()
    }
}

#[async_trait]
impl DocumentPersistence for MemoryPersistence {
    async fn save_document(
        &self,
        id: DocumentId,
        payload: &DocumentPayload,
    ) -> PersistenceResult<SaveOutcome> {
        match self.failure.lock().clone() {
            SaveFailure::None => {}
            SaveFailure::Reject(msg) => return Ok(SaveOutcome::failed(msg)),
            SaveFailure::Unavailable => {
                return Err(PersistenceError::Unavailable("memory store offline".into()));
            }
        }
        self.documents.write().insert(id, payload.clone());
        self.log.write().push((id, payload.lifecycle_event));
        Ok(SaveOutcome::ok())
    }

    async fn load_document(&self, id: DocumentId) -> PersistenceResult<Option<DocumentPayload>> {
        Ok(self.stored(id))
    }

    async fn list_documents(&self) -> PersistenceResult<Vec<DocumentSummary>> {
        let mut docs: Vec<DocumentSummary> =
            self.documents.read().values().map(DocumentSummary::from).collect();
        docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(docs)
    }
}

// ============================================================================
// File storage
// ============================================================================

/// In-memory file storage handing out `{base}/{category}/{id}-{name}` URLs.
#[derive(Debug)]
pub struct MemoryFileStorage {
    base_url: String,
    files: RwLock<HashMap<String, Vec<u8>>>,
    fail_names: RwLock<HashSet<String>>,
    uploads: AtomicUsize,
}

impl MemoryFileStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            files: RwLock::new(HashMap::new()),
            fail_names: RwLock::new(HashSet::new()),
            uploads: AtomicUsize::new(0),
        }
    }

    /// Reject uploads of files with this name.
    pub fn fail_on(&self, file_name: impl Into<String>) {
        self.fail_names.write().insert(file_name.into());
    }

    pub fn clear_failures(&self) {
        self.fail_names.write().clear();
    }

    /// Upload attempts that succeeded.
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn get(&self, url: &str) -> Option<Vec<u8>> {
        self.files.read().get(url).cloned()
    }
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn upload(&self, file: &LocalFile, category: UploadCategory) -> StorageResult<String> {
        if self.fail_names.read().contains(&file.name) {
            return Err(StorageError::Rejected(format!("{} refused", file.name)));
        }
        let url = format!(
            "{}/{}/{}-{}",
            self.base_url,
            category,
            uuid::Uuid::new_v4().simple(),
            file.name
        );
        self.files.write().insert(url.clone(), file.data.clone());
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(url)
    }
}

// ============================================================================
// Directory
// ============================================================================

/// In-memory contact list.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    recipients: RwLock<Vec<Recipient>>,
    offline: Mutex<bool>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recipients(recipients: impl IntoIterator<Item = Recipient>) -> Self {
        Self {
            recipients: RwLock::new(recipients.into_iter().collect()),
            offline: Mutex::new(false),
        }
    }

    pub fn insert(&self, recipient: Recipient) {
        self.recipients.write().push(recipient);
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock() = offline;
    }

    fn ensure_online(&self) -> DirectoryResult<()> {
        if *self.offline.lock() {
            return Err(DirectoryError::Unavailable("memory directory offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecipientDirectory for MemoryDirectory {
    async fn lookup(&self, id: RecipientId) -> DirectoryResult<Option<Recipient>> {
        self.ensure_online()?;
        Ok(self.recipients.read().iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self) -> DirectoryResult<Vec<Recipient>> {
        self.ensure_online()?;
        Ok(self.recipients.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_doc::{Document, serialize};
    use quire_types::DocumentKind;

    fn payload(title: &str) -> DocumentPayload {
        let doc = Document::new(DocumentKind::Wall, title);
        serialize(&doc, EventKind::SaveDraft, &HashMap::new()).unwrap()
    }

    #[tokio::test]
    async fn test_persistence_roundtrip_and_failures() {
        let store = MemoryPersistence::new();
        let p = payload("One");

        assert!(store.save_document(p.id, &p).await.unwrap().success);
        assert_eq!(store.load_document(p.id).await.unwrap(), Some(p.clone()));
        assert_eq!(store.saves(), vec![(p.id, EventKind::SaveDraft)]);

        store.set_failure(SaveFailure::Reject("quota".into()));
        let outcome = store.save_document(p.id, &p).await.unwrap();
        assert_eq!(outcome, SaveOutcome::failed("quota"));

        store.set_failure(SaveFailure::Unavailable);
        assert!(store.save_document(p.id, &p).await.is_err());
        assert_eq!(store.saves().len(), 1);
    }

    #[tokio::test]
    async fn test_list_documents() {
        let store = MemoryPersistence::new();
        for title in ["A", "B"] {
            let p = payload(title);
            store.save_document(p.id, &p).await.unwrap();
        }
        let listed = store.list_documents().await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn test_file_storage() {
        let storage = MemoryFileStorage::new("mem://cdn/");
        let file = LocalFile::new("a.pdf", "application/pdf", vec![9]);
        let url = storage.upload(&file, UploadCategory::Files).await.unwrap();
        assert!(url.starts_with("mem://cdn/files/"));
        assert!(url.ends_with("-a.pdf"));
        assert_eq!(storage.get(&url), Some(vec![9]));

        storage.fail_on("a.pdf");
        assert!(storage.upload(&file, UploadCategory::Files).await.is_err());
        assert_eq!(storage.upload_count(), 1);
    }

    #[tokio::test]
    async fn test_directory() {
        let ada = Recipient::new("Ada", "ada@example.com");
        let dir = MemoryDirectory::with_recipients([ada.clone()]);
        assert_eq!(dir.lookup(ada.id).await.unwrap(), Some(ada));
        assert_eq!(dir.lookup(RecipientId::new()).await.unwrap(), None);

        dir.set_offline(true);
        assert!(dir.list().await.is_err());
    }
}

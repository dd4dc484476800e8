//! Wiring between the CLI and the SQLite + local-disk backends.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};

use quire_kernel::backends::{DocumentDb, LocalFileStorage};
use quire_kernel::{Collaborators, DocumentSession, QuireConfig};
use quire_types::{BlockId, DocumentId, resolve_prefix};

pub struct App {
    db: Arc<DocumentDb>,
    storage: Arc<LocalFileStorage>,
}

impl App {
    pub fn open(config: &QuireConfig, data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("creating {}", data_dir.display()))?;

        let db_path = config.storage.database_path(data_dir);
        let db = DocumentDb::open(&db_path)
            .with_context(|| format!("opening database {}", db_path.display()))?;

        let mut storage = LocalFileStorage::new(config.storage.uploads_path(data_dir))
            .with_categories(config.uploads.clone());
        if let Some(base) = &config.storage.public_base_url {
            storage = storage.with_public_base_url(base.clone());
        }
        tracing::debug!(db = %db_path.display(), uploads = %storage.root().display(), "backends ready");

        Ok(Self {
            db: Arc::new(db),
            storage: Arc::new(storage),
        })
    }

    pub fn db(&self) -> &DocumentDb {
        &self.db
    }

    pub fn collab(&self) -> Collaborators {
        Collaborators {
            persistence: self.db.clone(),
            storage: self.storage.clone(),
            directory: self.db.clone(),
        }
    }

    /// Resolve a full ID or unambiguous hex prefix to a stored document.
    pub fn resolve_document(&self, query: &str) -> Result<DocumentId> {
        if let Ok(id) = DocumentId::parse(query) {
            return Ok(id);
        }
        let docs = self.db.list_documents()?;
        let query = query.to_ascii_lowercase();
        resolve_prefix(docs.iter().map(|d| d.id), &query, DocumentId::to_hex)
            .ok_or_else(|| anyhow!("no unique document matches {query:?}"))
    }

    pub async fn session(&self, query: &str) -> Result<DocumentSession> {
        let id = self.resolve_document(query)?;
        Ok(DocumentSession::open(id, self.collab()).await?)
    }
}

/// Resolve a full ID or unambiguous hex prefix to a block in `session`.
pub fn resolve_block(session: &DocumentSession, query: &str) -> Result<BlockId> {
    if let Ok(id) = BlockId::parse(query) {
        return Ok(id);
    }
    let query = query.to_ascii_lowercase();
    resolve_prefix(
        session.document().store().ids().into_iter(),
        &query,
        BlockId::to_hex,
    )
    .ok_or_else(|| anyhow!("no unique block matches {query:?}"))
}

/// Persist content edits without moving the document's lifecycle state.
pub async fn persist_edit(session: &mut DocumentSession) -> Result<()> {
    session.save_edits().await?;
    Ok(())
}

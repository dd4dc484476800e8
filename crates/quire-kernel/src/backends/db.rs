//! SQLite persistence for documents, contacts, and the transition log.
//!
//! Documents are stored as their serialized payload (one row per document,
//! last write wins) next to a few indexed columns for listing. Every save
//! also appends to the `events` table so the history of a document's
//! lifecycle survives overwrites.

use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult, params};

use quire_doc::{DocumentPayload, from_json, to_json};
use quire_types::{DocumentId, DocumentKind, EventKind, LifecycleState, Recipient, RecipientId};

use crate::collab::{DocumentPersistence, DocumentSummary, RecipientDirectory, SaveOutcome};
use crate::error::{DirectoryResult, PersistenceError, PersistenceResult};

/// One row of the transition log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub id: i64,
    pub document_id: DocumentId,
    pub event: EventKind,
    pub state: LifecycleState,
    pub created_at: u64,
}

const SCHEMA: &str = r#"
-- Latest payload per document
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    title TEXT NOT NULL,
    state TEXT NOT NULL,
    payload TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_documents_updated ON documents(updated_at);

-- Transition log (append-only)
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY,
    document_id TEXT NOT NULL,
    event TEXT NOT NULL,
    state TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_document ON events(document_id, id);

-- Contacts
CREATE TABLE IF NOT EXISTS recipients (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE
);
"#;

/// Database handle shared by persistence and directory lookups.
pub struct DocumentDb {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for DocumentDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentDb").finish_non_exhaustive()
    }
}

fn parse_id<T: std::str::FromStr>(s: &str, idx: usize) -> SqliteResult<T> {
    s.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("invalid id: {s}").into(),
        )
    })
}

impl DocumentDb {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Upsert a payload and log its event in one transaction.
    pub fn put_document(&self, payload: &DocumentPayload) -> PersistenceResult<()> {
        let json = to_json(payload)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO documents (id, kind, title, state, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                title = excluded.title,
                state = excluded.state,
                payload = excluded.payload,
                updated_at = excluded.updated_at",
            params![
                payload.id.to_string(),
                payload.kind.as_str(),
                payload.title,
                payload.lifecycle_state.as_str(),
                json,
                payload.updated_at as i64,
            ],
        )?;
        tx.execute(
            "INSERT INTO events (document_id, event, state, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                payload.id.to_string(),
                payload.lifecycle_event.as_str(),
                payload.lifecycle_state.as_str(),
                quire_types::now_millis() as i64,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Get the stored payload for a document.
    pub fn get_document(&self, id: DocumentId) -> PersistenceResult<Option<DocumentPayload>> {
        let conn = self.conn.lock();
        let json: Option<String> = conn
            .query_row(
                "SELECT payload FROM documents WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| from_json(&j).map_err(|e| PersistenceError::Corrupt(e.to_string())))
            .transpose()
    }

    /// List documents, most recently updated first.
    pub fn list_documents(&self) -> PersistenceResult<Vec<DocumentSummary>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, kind, title, state, updated_at FROM documents ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let kind: String = row.get(1)?;
            let state: String = row.get(3)?;
            let updated_at: i64 = row.get(4)?;
            Ok(DocumentSummary {
                id: parse_id(&id, 0)?,
                kind: DocumentKind::from_str(&kind).unwrap_or_default(),
                title: row.get(2)?,
                state: LifecycleState::from_str(&state).unwrap_or_default(),
                updated_at: updated_at as u64,
            })
        })?;
        Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
    }

    /// Transition log for one document, oldest first.
    pub fn events_for(&self, id: DocumentId) -> PersistenceResult<Vec<EventRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, document_id, event, state, created_at
             FROM events WHERE document_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![id.to_string()], |row| {
            let document_id: String = row.get(1)?;
            let event: String = row.get(2)?;
            let state: String = row.get(3)?;
            let created_at: i64 = row.get(4)?;
            Ok(EventRecord {
                id: row.get(0)?,
                document_id: parse_id(&document_id, 1)?,
                event: parse_id(&event, 2)?,
                state: LifecycleState::from_str(&state).unwrap_or_default(),
                created_at: created_at as u64,
            })
        })?;
        Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
    }

    // =========================================================================
    // Recipients
    // =========================================================================

    /// Add a contact. Emails are unique; re-adding one returns the existing contact.
    pub fn add_recipient(&self, recipient: &Recipient) -> SqliteResult<Recipient> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO recipients (id, name, email) VALUES (?1, ?2, ?3)
             ON CONFLICT(email) DO NOTHING",
            params![recipient.id.to_string(), recipient.name, recipient.email],
        )?;
        conn.query_row(
            "SELECT id, name, email FROM recipients WHERE email = ?1",
            params![recipient.email],
            row_to_recipient,
        )
    }

    pub fn get_recipient(&self, id: RecipientId) -> SqliteResult<Option<Recipient>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name, email FROM recipients WHERE id = ?1",
            params![id.to_string()],
            row_to_recipient,
        )
        .optional()
    }

    pub fn list_recipients(&self) -> SqliteResult<Vec<Recipient>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, name, email FROM recipients ORDER BY name")?;
        let rows = stmt.query_map([], row_to_recipient)?;
        rows.collect()
    }
}

fn row_to_recipient(row: &rusqlite::Row<'_>) -> SqliteResult<Recipient> {
    let id: String = row.get(0)?;
    Ok(Recipient {
        id: parse_id(&id, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
    })
}

#[async_trait]
impl DocumentPersistence for DocumentDb {
    #[tracing::instrument(skip(self, payload), fields(event = %payload.lifecycle_event))]
    async fn save_document(
        &self,
        id: DocumentId,
        payload: &DocumentPayload,
    ) -> PersistenceResult<SaveOutcome> {
        if payload.id != id {
            return Ok(SaveOutcome::failed(format!(
                "payload is for {}, not {}",
                payload.id, id
            )));
        }
        self.put_document(payload)?;
        Ok(SaveOutcome::ok())
    }

    async fn load_document(&self, id: DocumentId) -> PersistenceResult<Option<DocumentPayload>> {
        self.get_document(id)
    }

    async fn list_documents(&self) -> PersistenceResult<Vec<DocumentSummary>> {
        DocumentDb::list_documents(self)
    }
}

#[async_trait]
impl RecipientDirectory for DocumentDb {
    async fn lookup(&self, id: RecipientId) -> DirectoryResult<Option<Recipient>> {
        Ok(self.get_recipient(id)?)
    }

    async fn list(&self) -> DirectoryResult<Vec<Recipient>> {
        Ok(self.list_recipients()?)
    }
}

//! Document session: the transition driver.
//!
//! A session owns one [`Document`] and the collaborators it needs. A
//! lifecycle transition runs in this order:
//!
//! 1. **Plan**: check the event against the document (no side effects).
//! 2. **Stage**: upload every staged file (`save_draft`, `publish`, `send`).
//! 3. **Apply**: move the in-memory lifecycle fields forward.
//! 4. **Persist**: serialize and hand off to persistence, exactly once.
//! 5. **Commit**: write durable URLs into blocks and clear the staged files.
//!
//! Failure at 1 or 2 leaves the document untouched. Failure at 4 restores
//! the lifecycle fields captured before step 3 and emits
//! [`SessionEvent::RolledBack`]. Staged files are only cleared in step 5, so
//! any failure can be retried without picking files again.

use std::sync::Arc;

use tokio::sync::broadcast;

use quire_doc::{
    DocError, Document, LifecycleEvent, Transition, TransitionError, parse_document, plan, serialize,
    transition,
};
use quire_types::{
    DocumentId, DocumentKind, EventKind, LifecycleState, Protection, RecipientChoice, RecipientRef,
};

use crate::collab::{DocumentPersistence, FileStorage, RecipientDirectory};
use crate::error::{PersistenceError, SessionError};
use crate::staging::stage_all;
use crate::Result;

const EVENT_CAPACITY: usize = 64;

/// Something observers of a session care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A transition was persisted.
    Transitioned {
        doc: DocumentId,
        event: EventKind,
        from: LifecycleState,
        to: LifecycleState,
    },
    /// A persisted `send` asks for delivery to this recipient.
    DispatchRequested {
        doc: DocumentId,
        recipient: RecipientRef,
    },
    /// Persistence failed and the lifecycle fields were restored.
    RolledBack {
        doc: DocumentId,
        to: LifecycleState,
        reason: String,
    },
}

/// The three collaborators a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub persistence: Arc<dyn DocumentPersistence>,
    pub storage: Arc<dyn FileStorage>,
    pub directory: Arc<dyn RecipientDirectory>,
}

/// One operator's editing session over one document.
pub struct DocumentSession {
    doc: Document,
    collab: Collaborators,
    events: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("doc", &self.doc.id())
            .field("state", &self.doc.state())
            .finish_non_exhaustive()
    }
}

impl DocumentSession {
    /// Start a session over an in-memory document.
    pub fn new(doc: Document, collab: Collaborators) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            doc,
            collab,
            events,
        }
    }

    /// Start a session on a fresh draft.
    pub fn create(kind: DocumentKind, title: impl Into<String>, collab: Collaborators) -> Self {
        Self::new(Document::new(kind, title), collab)
    }

    /// Load a stored document and start a session on it.
    #[tracing::instrument(skip(collab))]
    pub async fn open(id: DocumentId, collab: Collaborators) -> Result<Self> {
        let payload = collab
            .persistence
            .load_document(id)
            .await?
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        let doc = parse_document(&payload).map_err(PersistenceError::from)?;
        Ok(Self::new(doc, collab))
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Mutable access for block and metadata edits.
    ///
    /// Edits are gated by the document itself; lifecycle changes must go
    /// through [`transition`](Self::transition).
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // =========================================================================
    // Recipients
    // =========================================================================

    /// Resolve the operator's choice into a stored recipient.
    pub async fn resolve_recipient(&self, choice: &RecipientChoice) -> Result<RecipientRef> {
        match choice {
            RecipientChoice::Contact(id) => {
                let contact = self
                    .collab
                    .directory
                    .lookup(*id)
                    .await?
                    .ok_or(SessionError::UnknownRecipient(*id))?;
                Ok(contact.into())
            }
            RecipientChoice::Custom(email) => Ok(RecipientRef::custom(email)?),
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Run a lifecycle event end to end. See the module docs for ordering.
    #[tracing::instrument(skip_all, fields(doc = ?self.doc.id(), event = %event.kind()))]
    pub async fn transition(&mut self, event: LifecycleEvent) -> Result<Transition> {
        plan(&self.doc, &event)?;

        let staged = if event.needs_staging() {
            stage_all(&self.doc, self.collab.storage.as_ref()).await?
        } else {
            Default::default()
        };
        let resolutions = staged.resolutions();

        let snapshot = self.doc.lifecycle_snapshot();
        let next = transition(&mut self.doc, &event)?;

        let persisted = match serialize(&self.doc, next.event, &resolutions) {
            Ok(payload) => self
                .collab
                .persistence
                .save_document(self.doc.id(), &payload)
                .await
                .and_then(|outcome| outcome.into_result()),
            Err(e) => Err(PersistenceError::from(e)),
        };

        if let Err(e) = persisted {
            self.doc.restore_lifecycle(snapshot);
            tracing::warn!(error = %e, restored = %self.doc.state(), "transition rolled back");
            self.emit(SessionEvent::RolledBack {
                doc: self.doc.id(),
                to: self.doc.state(),
                reason: e.to_string(),
            });
            return Err(e.into());
        }

        let committed = self.doc.commit_uploads(&resolutions);
        tracing::info!(from = %next.from, to = %next.to, uploads = committed, "transition persisted");

        self.emit(SessionEvent::Transitioned {
            doc: self.doc.id(),
            event: next.event,
            from: next.from,
            to: next.to,
        });
        if next.event == EventKind::Send {
            if let Some(recipient) = next.recipient.clone() {
                self.emit(SessionEvent::DispatchRequested {
                    doc: self.doc.id(),
                    recipient,
                });
            }
        }
        Ok(next)
    }

    /// Persist block and metadata edits without a lifecycle transition.
    ///
    /// The document keeps its state, so a published document stays
    /// published. Staged files are uploaded first. Blocks are not checked
    /// for completeness; that happens on `publish` and `send`.
    #[tracing::instrument(skip_all, fields(doc = ?self.doc.id(), state = %self.doc.state()))]
    pub async fn save_edits(&mut self) -> Result<()> {
        let event = match self.doc.state() {
            LifecycleState::Draft => EventKind::SaveDraft,
            LifecycleState::Published => EventKind::Publish,
            state => {
                return Err(DocError::from(TransitionError::NotEditable {
                    state,
                    action: "save edits",
                })
                .into());
            }
        };

        let staged = stage_all(&self.doc, self.collab.storage.as_ref()).await?;
        let resolutions = staged.resolutions();
        let payload = serialize(&self.doc, event, &resolutions).map_err(PersistenceError::from)?;
        self.collab
            .persistence
            .save_document(self.doc.id(), &payload)
            .await?
            .into_result()?;

        let committed = self.doc.commit_uploads(&resolutions);
        tracing::info!(uploads = committed, "edits persisted");
        Ok(())
    }

    pub async fn save_draft(&mut self) -> Result<Transition> {
        self.transition(LifecycleEvent::SaveDraft).await
    }

    pub async fn publish(&mut self, protection: Protection) -> Result<Transition> {
        self.transition(LifecycleEvent::Publish { protection }).await
    }

    /// Send to a contact or custom address.
    ///
    /// A missing choice fails with `NoRecipient`; a bad custom email fails
    /// with `InvalidEmail`. Both leave the document untouched.
    pub async fn send(
        &mut self,
        choice: Option<&RecipientChoice>,
        protection: Protection,
    ) -> Result<Transition> {
        let recipient = match choice {
            Some(choice) => Some(self.resolve_recipient(choice).await?),
            None => None,
        };
        self.transition(LifecycleEvent::Send {
            recipient,
            protection,
        })
        .await
    }

    pub async fn sign(&mut self, signer_name: impl Into<String>) -> Result<Transition> {
        self.transition(LifecycleEvent::sign(signer_name)).await
    }

    pub async fn view(&mut self) -> Result<Transition> {
        self.transition(LifecycleEvent::View).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{MemoryDirectory, MemoryFileStorage, MemoryPersistence, SaveFailure};
    use quire_doc::{DocError, LocalFile, TransitionError};
    use quire_types::{BlockKind, BlockPatch, Recipient, RecipientId, SourceMode, ValidationError};

    struct Harness {
        persistence: Arc<MemoryPersistence>,
        storage: Arc<MemoryFileStorage>,
        directory: Arc<MemoryDirectory>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                persistence: Arc::new(MemoryPersistence::new()),
                storage: Arc::new(MemoryFileStorage::new("mem://cdn")),
                directory: Arc::new(MemoryDirectory::new()),
            }
        }

        fn collab(&self) -> Collaborators {
            Collaborators {
                persistence: self.persistence.clone(),
                storage: self.storage.clone(),
                directory: self.directory.clone(),
            }
        }

        fn wall(&self) -> DocumentSession {
            let mut session = DocumentSession::create(DocumentKind::Wall, "Launch", self.collab());
            let doc = session.document_mut();
            let h = doc.insert_block(BlockKind::Heading).unwrap();
            doc.update_block(&h.id, BlockPatch::content("Welcome")).unwrap();
            session
        }
    }

    fn custom(email: &str) -> RecipientChoice {
        RecipientChoice::Custom(email.to_string())
    }

    #[tokio::test]
    async fn test_publish_uploads_then_commits() {
        let h = Harness::new();
        let mut session = h.wall();
        let img = session.document_mut().insert_block(BlockKind::Image).unwrap();
        session
            .document_mut()
            .attach_file(&img.id, LocalFile::new("hero.png", "image/png", vec![1, 2]))
            .unwrap();

        session.publish(Protection::Unchanged).await.unwrap();

        let doc = session.document();
        assert_eq!(doc.state(), LifecycleState::Published);
        assert!(doc.staging().is_empty());
        let block = doc.block(&img.id).unwrap();
        assert_eq!(block.source_mode, Some(SourceMode::RemoteUrl));
        assert!(block.url().unwrap().starts_with("mem://cdn/images/"));

        let stored = h.persistence.stored(doc.id()).unwrap();
        assert_eq!(stored.lifecycle_event, EventKind::Publish);
        assert_eq!(stored.content[1].props["url"], block.url().unwrap());
    }

    #[tokio::test]
    async fn test_save_edits_keeps_published_state() {
        let h = Harness::new();
        let mut session = h.wall();
        session.publish(Protection::Unchanged).await.unwrap();
        let mut events = session.subscribe();

        // Incomplete blocks are fine between publishes.
        let doc = session.document_mut();
        doc.insert_block(BlockKind::Paragraph).unwrap();
        let img = doc.insert_block(BlockKind::Image).unwrap();
        session.save_edits().await.unwrap();
        assert_eq!(session.document().state(), LifecycleState::Published);

        session
            .document_mut()
            .attach_file(&img.id, LocalFile::new("hero.png", "image/png", vec![9]))
            .unwrap();
        session.save_edits().await.unwrap();

        let doc = session.document();
        assert!(doc.staging().is_empty());
        assert!(doc.block(&img.id).unwrap().url().unwrap().starts_with("mem://cdn/images/"));
        let stored = h.persistence.stored(doc.id()).unwrap();
        assert_eq!(stored.lifecycle_state, LifecycleState::Published);
        assert_eq!(stored.content.len(), 3);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_save_edits_rejected_once_sent() {
        let h = Harness::new();
        let mut session = h.wall();
        session.send(Some(&custom("a@b.co")), Protection::Unchanged).await.unwrap();
        let saves = h.persistence.saves().len();

        let err = session.save_edits().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Document(DocError::Transition(TransitionError::NotEditable { .. }))
        ));
        assert_eq!(h.persistence.saves().len(), saves);
    }

    #[tokio::test]
    async fn test_upload_failure_blocks_transition() {
        let h = Harness::new();
        let mut session = h.wall();
        let mut ids = Vec::new();
        for name in ["a.png", "b.png", "c.png"] {
            let doc = session.document_mut();
            let img = doc.insert_block(BlockKind::Image).unwrap();
            doc.attach_file(&img.id, LocalFile::new(name, "image/png", vec![0]))
                .unwrap();
            ids.push(img.id);
        }
        h.storage.fail_on("b.png");
        let before = session.document().blocks().to_vec();

        let err = session.publish(Protection::Unchanged).await.unwrap_err();
        match err {
            SessionError::Upload(e) => assert_eq!(e.failed_blocks(), vec![ids[1]]),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(session.document().state(), LifecycleState::Draft);
        assert_eq!(session.document().blocks(), before.as_slice());
        assert_eq!(session.document().staging().len(), 3);
        assert!(h.persistence.saves().is_empty());

        // Retry without re-selecting files.
        h.storage.clear_failures();
        session.publish(Protection::Unchanged).await.unwrap();
        assert!(session.document().staging().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_rolls_back() {
        let h = Harness::new();
        let mut session = h.wall();
        let img = session.document_mut().insert_block(BlockKind::Image).unwrap();
        session
            .document_mut()
            .attach_file(&img.id, LocalFile::new("hero.png", "image/png", vec![1]))
            .unwrap();
        let mut events = session.subscribe();

        for failure in [SaveFailure::Reject("quota".into()), SaveFailure::Unavailable] {
            h.persistence.set_failure(failure);
            let err = session.send(Some(&custom("a@b.co")), Protection::Protected).await.unwrap_err();
            assert!(err.is_retryable(), "{err}");

            let doc = session.document();
            assert_eq!(doc.state(), LifecycleState::Draft);
            assert!(doc.recipient().is_none());
            assert!(doc.protection_token().is_none());
            // The staged file is kept for the retry.
            assert!(doc.block(&img.id).unwrap().pending_upload().is_some());

            assert!(matches!(
                events.recv().await.unwrap(),
                SessionEvent::RolledBack { to: LifecycleState::Draft, .. }
            ));
        }

        h.persistence.set_failure(SaveFailure::None);
        session.send(Some(&custom("a@b.co")), Protection::Unchanged).await.unwrap();
        assert_eq!(session.document().state(), LifecycleState::Sent);
    }

    #[tokio::test]
    async fn test_send_emits_dispatch() {
        let h = Harness::new();
        let ada = Recipient::new("Ada", "ada@example.com");
        h.directory.insert(ada.clone());
        let mut session = h.wall();
        let mut events = session.subscribe();

        session
            .send(Some(&RecipientChoice::Contact(ada.id)), Protection::Unchanged)
            .await
            .unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Transitioned {
                doc: session.document().id(),
                event: EventKind::Send,
                from: LifecycleState::Draft,
                to: LifecycleState::Sent,
            }
        );
        match events.recv().await.unwrap() {
            SessionEvent::DispatchRequested { recipient, .. } => {
                assert_eq!(recipient.id, Some(ada.id));
                assert_eq!(recipient.email, "ada@example.com");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_recipient_errors() {
        let h = Harness::new();
        let mut session = h.wall();

        let err = session.send(None, Protection::Unchanged).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Document(DocError::Validation(ValidationError::NoRecipient))
        ));

        let err = session
            .send(Some(&custom("not-an-email")), Protection::Unchanged)
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let stranger = RecipientId::new();
        let err = session
            .send(Some(&RecipientChoice::Contact(stranger)), Protection::Unchanged)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::UnknownRecipient(id) if id == stranger));

        assert_eq!(session.document().state(), LifecycleState::Draft);
        assert!(h.persistence.saves().is_empty());
    }

    #[tokio::test]
    async fn test_agreement_sign_and_view_then_locked() {
        let h = Harness::new();
        let mut session = DocumentSession::create(DocumentKind::Agreement, "Lease", h.collab());
        session.document_mut().set_description("Unit 4B").unwrap();
        let p = session.document_mut().insert_block(BlockKind::Paragraph).unwrap();
        session
            .document_mut()
            .update_block(&p.id, BlockPatch::content("Rent is due monthly."))
            .unwrap();

        session.send(Some(&custom("tenant@example.com")), Protection::Unchanged).await.unwrap();
        session.view().await.unwrap();
        session.sign("Tenant").await.unwrap();
        assert_eq!(session.document().state(), LifecycleState::Signed);

        let err = session
            .document_mut()
            .update_block(&p.id, BlockPatch::content("Rent is optional."))
            .unwrap_err();
        assert!(matches!(err, DocError::Transition(TransitionError::NotEditable { .. })));

        let events: Vec<EventKind> = h.persistence.saves().iter().map(|(_, e)| *e).collect();
        assert_eq!(events, vec![EventKind::Send, EventKind::View, EventKind::Sign]);
    }

    #[tokio::test]
    async fn test_open_restores_stored_document() {
        let h = Harness::new();
        let mut session = h.wall();
        session.save_draft().await.unwrap();
        let id = session.document().id();
        let blocks = session.document().blocks().to_vec();

        let reopened = DocumentSession::open(id, h.collab()).await.unwrap();
        assert_eq!(reopened.document().blocks(), blocks.as_slice());
        assert_eq!(reopened.document().title(), "Launch");

        let missing = DocumentSession::open(DocumentId::new(), h.collab()).await;
        assert!(matches!(
            missing,
            Err(SessionError::Persistence(PersistenceError::NotFound(_)))
        ));
    }
}

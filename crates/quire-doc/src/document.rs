//! Document aggregate: metadata, lifecycle state, blocks, and staged files.
//!
//! The document owns its blocks exclusively. Every content mutation goes
//! through here so the lifecycle gate is applied in one place: once a
//! document leaves `draft`/`published`, mutations fail with
//! [`TransitionError::NotEditable`] and leave the block list untouched.

use std::collections::HashMap;

use quire_types::{
    BlockId, BlockKind, BlockPatch, ContentBlock, DocumentId, DocumentKind, LifecycleState,
    RecipientRef, Signature, UploadHandle, now_millis, validate,
};

use crate::block_store::BlockStore;
use crate::lifecycle::{Transition, can_edit};
use crate::staging::{LocalFile, PendingUpload, StagingArea};
use crate::{DocError, Result, TransitionError};

/// Lifecycle-related fields, captured before a transition so a failed
/// persist can put them back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleSnapshot {
    pub state: LifecycleState,
    pub recipient: Option<RecipientRef>,
    pub protection_token: Option<String>,
    pub signature: Option<Signature>,
    pub viewed_at: Option<u64>,
    pub updated_at: u64,
}

/// A wall or agreement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    id: DocumentId,
    kind: DocumentKind,
    title: String,
    description: String,
    recipient: Option<RecipientRef>,
    protection_token: Option<String>,
    state: LifecycleState,
    signature: Option<Signature>,
    viewed_at: Option<u64>,
    created_at: u64,
    updated_at: u64,
    store: BlockStore,
    staging: StagingArea,
}

/// Stored fields used to rebuild a document (see `serialize::parse_document`).
#[derive(Clone, Debug)]
pub(crate) struct DocumentParts {
    pub id: DocumentId,
    pub kind: DocumentKind,
    pub title: String,
    pub description: String,
    pub recipient: Option<RecipientRef>,
    pub protection_token: Option<String>,
    pub state: LifecycleState,
    pub signature: Option<Signature>,
    pub viewed_at: Option<u64>,
    pub created_at: u64,
    pub updated_at: u64,
    pub store: BlockStore,
}

impl Document {
    /// Create an empty draft.
    pub fn new(kind: DocumentKind, title: impl Into<String>) -> Self {
        Self::with_id(DocumentId::new(), kind, title)
    }

    /// Create an empty draft with a known ID.
    pub fn with_id(id: DocumentId, kind: DocumentKind, title: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id,
            kind,
            title: title.into(),
            description: String::new(),
            recipient: None,
            protection_token: None,
            state: LifecycleState::Draft,
            signature: None,
            viewed_at: None,
            created_at: now,
            updated_at: now,
            store: BlockStore::new(),
            staging: StagingArea::new(),
        }
    }

    pub(crate) fn from_parts(parts: DocumentParts) -> Self {
        Self {
            id: parts.id,
            kind: parts.kind,
            title: parts.title,
            description: parts.description,
            recipient: parts.recipient,
            protection_token: parts.protection_token,
            state: parts.state,
            signature: parts.signature,
            viewed_at: parts.viewed_at,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
            store: parts.store,
            staging: StagingArea::new(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn recipient(&self) -> Option<&RecipientRef> {
        self.recipient.as_ref()
    }

    pub fn protection_token(&self) -> Option<&str> {
        self.protection_token.as_deref()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn viewed_at(&self) -> Option<u64> {
        self.viewed_at
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn updated_at(&self) -> u64 {
        self.updated_at
    }

    /// Blocks in document order.
    pub fn blocks(&self) -> &[ContentBlock] {
        self.store.blocks()
    }

    pub fn block(&self, id: &BlockId) -> Option<&ContentBlock> {
        self.store.get(id)
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Whether blocks and metadata may currently change.
    pub fn is_editable(&self) -> bool {
        can_edit(self.kind, self.state)
    }

    fn ensure_editable(&self, action: &'static str) -> Result<()> {
        if self.is_editable() {
            return Ok(());
        }
        tracing::warn!(doc = ?self.id, state = %self.state, action, "mutation rejected");
        Err(TransitionError::NotEditable {
            state: self.state,
            action,
        }
        .into())
    }

    fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    pub fn set_title(&mut self, title: impl Into<String>) -> Result<()> {
        self.ensure_editable("edit title")?;
        self.title = title.into();
        self.touch();
        Ok(())
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> Result<()> {
        self.ensure_editable("edit description")?;
        self.description = description.into();
        self.touch();
        Ok(())
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    /// Append a block of `kind` with default fields.
    pub fn insert_block(&mut self, kind: BlockKind) -> Result<ContentBlock> {
        self.ensure_editable("insert block")?;
        let block = self.store.insert(kind)?;
        self.touch();
        Ok(block)
    }

    /// Append a fully-formed block after validating it.
    pub fn push_block(&mut self, block: ContentBlock) -> Result<BlockId> {
        self.ensure_editable("insert block")?;
        let block = validate(block)?;
        let id = self.store.push(block)?;
        self.touch();
        Ok(id)
    }

    /// Merge `patch` into a block. `Ok(false)` when the block doesn't exist.
    ///
    /// If the patch moves the block off its staged file (new URL, or a
    /// switch to remote mode), the staged file is dropped.
    pub fn update_block(&mut self, id: &BlockId, patch: BlockPatch) -> Result<bool> {
        self.ensure_editable("update block")?;
        if !self.store.update(id, patch) {
            return Ok(false);
        }
        let still_pending = self.store.get(id).and_then(ContentBlock::pending_upload);
        if let Some(staged) = self.staging.for_block(id).map(|p| p.handle) {
            if still_pending != Some(staged) {
                self.staging.remove_for_block(id);
            }
        }
        self.touch();
        Ok(true)
    }

    /// Remove a block and anything staged for it.
    pub fn remove_block(&mut self, id: &BlockId) -> Result<Option<ContentBlock>> {
        self.ensure_editable("remove block")?;
        let removed = self.store.remove(id);
        if removed.is_some() {
            self.staging.remove_for_block(id);
            self.touch();
        }
        Ok(removed)
    }

    /// Reorder blocks to match `order` (a permutation of all block IDs).
    pub fn reorder(&mut self, order: &[BlockId]) -> Result<()> {
        self.ensure_editable("reorder blocks")?;
        self.store.reorder(order)?;
        self.touch();
        Ok(())
    }

    /// Move one block to index `to`.
    pub fn move_block(&mut self, id: &BlockId, to: usize) -> Result<bool> {
        self.ensure_editable("reorder blocks")?;
        let moved = self.store.move_block(id, to);
        if moved {
            self.touch();
        }
        Ok(moved)
    }

    /// Make `id` the active block. Selection is UI state and never gated.
    pub fn select(&mut self, id: &BlockId) -> bool {
        self.store.select(id)
    }

    pub fn selected(&self) -> Option<BlockId> {
        self.store.selected()
    }

    // =========================================================================
    // Staged files
    // =========================================================================

    /// Stage a local file for a media/file block and point the block at it.
    pub fn attach_file(&mut self, block_id: &BlockId, file: LocalFile) -> Result<UploadHandle> {
        self.ensure_editable("attach file")?;
        let kind = self
            .store
            .get(block_id)
            .map(|b| b.kind)
            .ok_or(DocError::BlockNotFound(*block_id))?;
        let handle = self.staging.stage(*block_id, kind, file)?;
        self.store.set_pending(block_id, handle);
        self.touch();
        Ok(handle)
    }

    /// Drop the file staged for a block, leaving it without a source.
    pub fn detach_file(&mut self, block_id: &BlockId) -> Result<Option<PendingUpload>> {
        self.ensure_editable("detach file")?;
        let removed = self.staging.remove_for_block(block_id);
        if removed.is_some() {
            self.store.update(
                block_id,
                BlockPatch {
                    source_ref: Some(None),
                    ..Default::default()
                },
            );
            self.touch();
        }
        Ok(removed)
    }

    /// Staged files still referenced by a block, in document order.
    pub fn pending_uploads(&self) -> Vec<&PendingUpload> {
        self.store
            .blocks()
            .iter()
            .filter_map(|b| b.pending_upload())
            .filter_map(|h| self.staging.get(&h))
            .collect()
    }

    /// Write durable URLs back into blocks and drop their staged files.
    ///
    /// Only call once the transition that uploaded them has been persisted.
    pub fn commit_uploads(&mut self, resolved: &HashMap<UploadHandle, String>) -> usize {
        let count = self.store.resolve_uploads(resolved);
        self.staging.clear(resolved.keys());
        count
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub fn lifecycle_snapshot(&self) -> LifecycleSnapshot {
        LifecycleSnapshot {
            state: self.state,
            recipient: self.recipient.clone(),
            protection_token: self.protection_token.clone(),
            signature: self.signature.clone(),
            viewed_at: self.viewed_at,
            updated_at: self.updated_at,
        }
    }

    /// Put lifecycle fields back after a failed persist.
    pub fn restore_lifecycle(&mut self, snapshot: LifecycleSnapshot) {
        self.state = snapshot.state;
        self.recipient = snapshot.recipient;
        self.protection_token = snapshot.protection_token;
        self.signature = snapshot.signature;
        self.viewed_at = snapshot.viewed_at;
        self.updated_at = snapshot.updated_at;
    }

    pub(crate) fn apply_transition(&mut self, next: &Transition) {
        self.state = next.to;
        self.recipient = next.recipient.clone();
        self.protection_token = next.protection_token.clone();
        self.signature = next.signature.clone();
        self.viewed_at = next.viewed_at;
        self.touch();
    }
}

// ============================================================================
// Tests
// ============================================================================

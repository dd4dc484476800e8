//! Pending local files awaiting durable storage.
//!
//! A block switched to `local-upload` mode points at an [`UploadHandle`];
//! the handle keys into the [`StagingArea`], which holds the file bytes and a
//! preview the builder can render before any upload exists. The area is only
//! cleared after a transition has been persisted, so a failed save leaves
//! every selected file in place for a retry.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use quire_types::{BlockId, BlockKind, UploadHandle, ValidationError, check_upload};

/// A file selected on the operator's machine.
#[derive(Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub mime: String,
    pub data: Vec<u8>,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            data,
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Check this file against `kind`'s upload limits.
    pub fn check(&self, kind: BlockKind) -> Result<(), ValidationError> {
        check_upload(kind, &self.mime, self.size())
    }

    /// `data:` URL for inline preview.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.data))
    }
}

impl std::fmt::Debug for LocalFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("size", &self.data.len())
            .finish()
    }
}

/// One staged file and the block waiting on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingUpload {
    pub handle: UploadHandle,
    pub block_id: BlockId,
    pub kind: BlockKind,
    pub file: LocalFile,
    /// Inline preview (images only).
    pub preview: Option<String>,
}

/// Staged files for one document, keyed by handle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StagingArea {
    pending: BTreeMap<UploadHandle, PendingUpload>,
}

impl StagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn get(&self, handle: &UploadHandle) -> Option<&PendingUpload> {
        self.pending.get(handle)
    }

    /// The staged file for a block, if any.
    pub fn for_block(&self, block_id: &BlockId) -> Option<&PendingUpload> {
        self.pending.values().find(|p| p.block_id == *block_id)
    }

    /// All staged files.
    pub fn iter(&self) -> impl Iterator<Item = &PendingUpload> {
        self.pending.values()
    }

    /// Stage `file` for `block_id`, replacing any file already staged for it.
    ///
    /// The file is validated against the block kind's limits first; on
    /// failure nothing is staged.
    pub fn stage(
        &mut self,
        block_id: BlockId,
        kind: BlockKind,
        file: LocalFile,
    ) -> Result<UploadHandle, ValidationError> {
        file.check(kind)?;
        self.remove_for_block(&block_id);

        let handle = UploadHandle::new();
        let preview = (kind == BlockKind::Image).then(|| file.data_url());
        tracing::debug!(?block_id, ?handle, name = %file.name, size = file.size(), "file staged");
        self.pending.insert(
            handle,
            PendingUpload {
                handle,
                block_id,
                kind,
                file,
                preview,
            },
        );
        Ok(handle)
    }

    /// Drop whatever is staged for `block_id`.
    pub fn remove_for_block(&mut self, block_id: &BlockId) -> Option<PendingUpload> {
        let handle = self.for_block(block_id)?.handle;
        self.pending.remove(&handle)
    }

    /// Drop staged files whose uploads have been committed.
    pub fn clear<'a>(&mut self, handles: impl IntoIterator<Item = &'a UploadHandle>) {
        for handle in handles {
            self.pending.remove(handle);
        }
    }
}

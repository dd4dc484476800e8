//! Concurrent upload of a document's staged files.
//!
//! [`stage_all`] re-checks every staged file against its block's limits,
//! uploads the survivors in parallel, and returns the durable URLs only if
//! every upload succeeded. It never touches the document: the caller writes
//! URLs back with [`Document::commit_uploads`] once the transition that
//! needed them has been persisted.

use std::collections::HashMap;

use futures::future::join_all;

use quire_doc::Document;
use quire_types::{BlockId, UploadHandle, ValidationError};

use crate::collab::FileStorage;
use crate::error::{UploadError, UploadFailure, UploadFailureReason};

/// One resolved upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedUpload {
    pub block_id: BlockId,
    pub handle: UploadHandle,
    pub url: String,
}

/// Every upload of a successful batch, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedUrls {
    uploads: Vec<StagedUpload>,
}

impl StagedUrls {
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty()
    }

    pub fn len(&self) -> usize {
        self.uploads.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StagedUpload> {
        self.uploads.iter()
    }

    /// Durable URL per block.
    pub fn by_block(&self) -> HashMap<BlockId, String> {
        self.uploads
            .iter()
            .map(|u| (u.block_id, u.url.clone()))
            .collect()
    }

    /// Handle → URL map consumed by the serializer and `commit_uploads`.
    pub fn resolutions(&self) -> HashMap<UploadHandle, String> {
        self.uploads
            .iter()
            .map(|u| (u.handle, u.url.clone()))
            .collect()
    }
}

/// Upload every staged file referenced by `doc`.
///
/// All uploads run concurrently and the batch waits for every one of them,
/// so the error lists each failed block, not just the first. On failure no
/// URL from the batch is returned.
#[tracing::instrument(skip_all, fields(doc = ?doc.id()))]
pub async fn stage_all(doc: &Document, storage: &dyn FileStorage) -> Result<StagedUrls, UploadError> {
    let mut failures = Vec::new();
    let mut ready = Vec::new();

    for block in doc.blocks() {
        let Some(handle) = block.pending_upload() else {
            continue;
        };
        let Some(pending) = doc.staging().get(&handle) else {
            failures.push(UploadFailure {
                block_id: block.id,
                handle,
                file_name: None,
                reason: UploadFailureReason::MissingFile,
            });
            continue;
        };
        // Limits are checked against the block as it is now, not as it was
        // when the file was picked.
        let Some(category) = block.kind.upload_category() else {
            failures.push(UploadFailure {
                block_id: block.id,
                handle,
                file_name: Some(pending.file.name.clone()),
                reason: UploadFailureReason::Invalid(ValidationError::NotUploadable(block.kind)),
            });
            continue;
        };
        if let Err(e) = pending.file.check(block.kind) {
            failures.push(UploadFailure {
                block_id: block.id,
                handle,
                file_name: Some(pending.file.name.clone()),
                reason: UploadFailureReason::Invalid(e),
            });
            continue;
        }
        ready.push((block.id, handle, category, &pending.file));
    }

    if !failures.is_empty() {
        tracing::warn!(failed = failures.len(), "staged files failed validation, nothing uploaded");
        return Err(UploadError { failures });
    }
    if ready.is_empty() {
        return Ok(StagedUrls::default());
    }

    tracing::debug!(count = ready.len(), "uploading staged files");
    let results = join_all(ready.iter().map(|(_, _, category, file)| storage.upload(file, *category))).await;

    let mut uploads = Vec::with_capacity(ready.len());
    for ((block_id, handle, _, file), result) in ready.into_iter().zip(results) {
        match result {
            Ok(url) => uploads.push(StagedUpload {
                block_id,
                handle,
                url,
            }),
            Err(e) => failures.push(UploadFailure {
                block_id,
                handle,
                file_name: Some(file.name.clone()),
                reason: UploadFailureReason::Storage(e.to_string()),
            }),
        }
    }

    if !failures.is_empty() {
        tracing::warn!(
            failed = failures.len(),
            discarded = uploads.len(),
            "upload batch failed"
        );
        return Err(UploadError { failures });
    }

    tracing::info!(count = uploads.len(), "staged files uploaded");
    Ok(StagedUrls { uploads })
}

//! Shared identity, block, and lifecycle types for Quire.
//!
//! This crate is the leaf of the workspace: typed IDs, the content block
//! union and its validation rules, per-kind upload limits, lifecycle enums,
//! and recipients. It has **no internal quire dependencies**.
//!
//! # Overview
//!
//! ```text
//! Document (DocumentId) ← wall or agreement
//!     └── owns ContentBlock (BlockId) × n, dense positions 0..n-1
//!     └── has LifecycleState (draft → published → sent → signed)
//!     └── addressed to RecipientRef (contact or custom email)
//!
//! ContentBlock
//!     └── kind: heading | paragraph | link | image | video | file
//!     └── source_ref: Url(..) | Pending(UploadHandle)
//! ```
//!
//! # Key Types
//!
//! |--------------------|---------------------------------------------|
//! | Type               | Purpose                                     |
//! |--------------------|---------------------------------------------|
//! | [`ContentBlock`]   | One block with kind-specific fields         |
//! | [`BlockPatch`]     | Partial update merged into a block          |
//! | [`UploadLimit`]    | Size/MIME constraints per uploadable kind   |
//! | [`LifecycleState`] | draft / published / sent / signed           |
//! | [`RecipientRef`]   | Resolved recipient stored on a document     |
//! | [`ValidationError`]| Field-level failure, surfaced inline        |
//! |--------------------|---------------------------------------------|

pub mod block;
pub mod ids;
pub mod lifecycle;
pub mod limits;
pub mod recipient;
pub mod validate;

pub use block::{
    BlockKind, BlockPatch, ContentBlock, DEFAULT_HEADING_LEVEL, MAX_IMAGE_BLOCKS,
    MAX_VIDEO_BLOCKS, SourceMode, SourceRef, UploadCategory,
};
pub use ids::{BlockId, DocumentId, RecipientId, UploadHandle, resolve_prefix};
pub use lifecycle::{DocumentKind, EventKind, LifecycleState, Protection, Signature};
pub use limits::{UploadLimit, check_upload, extension_for_mime, mime_for_filename, upload_limit};
pub use recipient::{Recipient, RecipientChoice, RecipientRef, is_valid_email};
pub use validate::{ValidationError, check, validate};

/// Current time as Unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

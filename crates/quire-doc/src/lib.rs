//! Document model for Quire walls and agreements.
//!
//! A [`Document`] owns an ordered [`BlockStore`], a [`StagingArea`] of local
//! files waiting for upload, and its lifecycle metadata. Everything here is
//! synchronous and in-memory; uploading and persisting live in
//! `quire-kernel`.
//!
//! # Layers
//!
//! - **Block store**: dense positions, per-kind caps, permutation-checked reorder
//! - **Staging**: pending files with previews, keyed by [`quire_types::UploadHandle`]
//! - **Lifecycle**: [`plan`] checks an event; [`transition`] applies it
//! - **Serializer**: [`serialize`] builds the stored payload; [`parse_document`] reverses it
//!
//! # Editing gate
//!
//! Blocks and metadata change only while the document is `draft` or
//! `published`. In `sent` or `signed` every mutation returns
//! [`TransitionError::NotEditable`] and the document is left untouched.

pub mod block_store;
pub mod document;
mod error;
pub mod lifecycle;
pub mod serialize;
pub mod staging;

pub use block_store::BlockStore;
pub use document::{Document, LifecycleSnapshot};
pub use error::{DocError, PermutationError, TransitionError};
pub use lifecycle::{LifecycleEvent, Transition, can_edit, is_allowed, plan, transition};
pub use serialize::{
    DocumentPayload, StoredBlock, from_json, parse_block, parse_blocks, parse_document, serialize,
    serialize_block, serialize_blocks, to_json,
};
pub use staging::{LocalFile, PendingUpload, StagingArea};

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DocError>;

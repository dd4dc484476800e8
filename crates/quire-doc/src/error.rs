//! Error types for document operations.

use thiserror::Error;

use quire_types::{BlockId, BlockKind, DocumentKind, LifecycleState, ValidationError};

/// Errors raised by block store, staging, and lifecycle operations.
///
/// Every variant is returned at the boundary of the operation that raised
/// it. None of them leave partial state behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocError {
    /// Malformed block, file, recipient, or metadata.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Per-kind cardinality cap reached; the insert was rejected.
    #[error("a document can hold at most {limit} {kind} blocks")]
    Capacity { kind: BlockKind, limit: usize },

    /// Malformed reorder request. Treat as a caller bug.
    #[error(transparent)]
    Permutation(#[from] PermutationError),

    /// Mutation or transition disallowed by the current lifecycle state.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Block not found in document.
    #[error("block not found: {0:?}")]
    BlockNotFound(BlockId),

    /// Block ID already present (restoring from storage).
    #[error("block already exists: {0:?}")]
    DuplicateBlock(BlockId),

    /// A block still points at a local file nobody uploaded.
    #[error("block {0:?} references a file that has not been uploaded")]
    UnresolvedUpload(BlockId),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A reorder request that isn't a permutation of the current block IDs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermutationError {
    #[error("reorder expected {expected} ids, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("reorder lists block {0:?} more than once")]
    Duplicate(BlockId),

    #[error("reorder references unknown block {0:?}")]
    Unknown(BlockId),
}

/// Lifecycle rule violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// Content changes are only allowed in draft/published.
    #[error("cannot {action}: document is {state}")]
    NotEditable {
        state: LifecycleState,
        action: &'static str,
    },

    /// `sign` requires the document to have been sent.
    #[error("cannot sign: document is {0}, not sent")]
    NotSent(LifecycleState),

    /// Only agreements can be signed.
    #[error("{0} documents cannot be signed")]
    NotSignable(DocumentKind),

    /// `view` requires the document to have been sent.
    #[error("cannot record a view: document is {0}")]
    NotDelivered(LifecycleState),
}

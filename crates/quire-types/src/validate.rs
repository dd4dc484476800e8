//! Block validation.
//!
//! `validate` checks kind-specific required fields and returns the first
//! failing field. There is no partial acceptance: a block either enters the
//! store whole or not at all.

use thiserror::Error;

use crate::block::{BlockKind, ContentBlock, HEADING_LEVELS, SourceMode, SourceRef};

/// Field-level validation failure. Always recoverable by the operator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is empty or absent.
    #[error("{kind} block requires a non-empty {field}")]
    MissingField { kind: BlockKind, field: &'static str },

    /// Heading level outside the supported range.
    #[error("heading level {0} is out of range (1-3)")]
    InvalidLevel(u8),

    /// The block's source reference doesn't match its source mode.
    #[error("{kind} block in {mode} mode has a mismatched source reference")]
    SourceMismatch { kind: BlockKind, mode: SourceMode },

    /// A file exceeds its kind's size limit.
    #[error("{kind} file is {size} bytes, exceeding the {limit} byte limit")]
    FileTooLarge { kind: BlockKind, size: u64, limit: u64 },

    /// A file's MIME type is not accepted for its kind.
    #[error("{kind} blocks do not accept '{mime}' (allowed: {allowed})")]
    UnsupportedType {
        kind: BlockKind,
        mime: String,
        allowed: String,
    },

    /// A file was offered to a kind that has no uploads.
    #[error("{0} blocks do not accept file uploads")]
    NotUploadable(BlockKind),

    /// Recipient email fails the address pattern.
    #[error("invalid recipient email: {0:?}")]
    InvalidEmail(String),

    /// `send` without a resolved recipient.
    #[error("no recipient selected")]
    NoRecipient,

    /// Document title is required for this transition.
    #[error("document title is required")]
    MissingTitle,

    /// Document description is required for this transition.
    #[error("document description is required")]
    MissingDescription,

    /// `sign` without a signer name.
    #[error("signer name is required")]
    MissingSigner,

    /// Stored content could not be parsed into a block.
    #[error("unrecognized block shape: {0}")]
    UnrecognizedShape(String),
}

fn missing(kind: BlockKind, field: &'static str) -> ValidationError {
    ValidationError::MissingField { kind, field }
}

/// Check one block's fields without consuming it.
pub fn check(block: &ContentBlock) -> Result<(), ValidationError> {
    match block.kind {
        BlockKind::Heading => {
            if block.content.trim().is_empty() {
                return Err(missing(block.kind, "content"));
            }
            if let Some(level) = block.level {
                if !HEADING_LEVELS.contains(&level) {
                    return Err(ValidationError::InvalidLevel(level));
                }
            }
        }
        BlockKind::Paragraph => {
            if block.content.trim().is_empty() {
                return Err(missing(block.kind, "content"));
            }
        }
        BlockKind::Link => match &block.source_ref {
            Some(SourceRef::Url(url)) if !url.trim().is_empty() => {}
            _ => return Err(missing(block.kind, "source_ref")),
        },
        BlockKind::Image | BlockKind::Video | BlockKind::File => {
            let mode = block.source_mode.ok_or(missing(block.kind, "source_mode"))?;
            match (&block.source_ref, mode) {
                (None, _) => return Err(missing(block.kind, "source_ref")),
                (Some(SourceRef::Url(url)), SourceMode::RemoteUrl) => {
                    if url.trim().is_empty() {
                        return Err(missing(block.kind, "source_ref"));
                    }
                }
                (Some(SourceRef::Pending(_)), SourceMode::LocalUpload) => {}
                _ => {
                    return Err(ValidationError::SourceMismatch {
                        kind: block.kind,
                        mode,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Validate a block, handing it back on success.
pub fn validate(block: ContentBlock) -> Result<ContentBlock, ValidationError> {
    check(&block)?;
    Ok(block)
}

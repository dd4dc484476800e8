//! Per-kind upload constraints.
//!
//! Every uploadable kind declares a size ceiling and the MIME types it
//! accepts. The same table is consulted when the operator selects a file and
//! again right before the upload is attempted.

use crate::block::BlockKind;
use crate::validate::ValidationError;

const MB: u64 = 1024 * 1024;

/// Size and type constraints for one uploadable kind.
#[derive(Debug)]
pub struct UploadLimit {
    pub kind: BlockKind,
    pub max_bytes: u64,
    /// `(extension, mime)` pairs the kind accepts.
    pub accepted: &'static [(&'static str, &'static str)],
}

impl UploadLimit {
    /// Whether `mime` is acceptable for this kind.
    pub fn accepts(&self, mime: &str) -> bool {
        let mime = mime.trim();
        self.accepted
            .iter()
            .any(|(_, m)| m.eq_ignore_ascii_case(mime))
    }

    /// Comma-separated extension list for error messages.
    pub fn extensions(&self) -> String {
        self.accepted
            .iter()
            .map(|(ext, _)| *ext)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Check a file's type and size against this limit.
    pub fn check(&self, mime: &str, size: u64) -> Result<(), ValidationError> {
        if !self.accepts(mime) {
            return Err(ValidationError::UnsupportedType {
                kind: self.kind,
                mime: mime.to_string(),
                allowed: self.extensions(),
            });
        }
        if size > self.max_bytes {
            return Err(ValidationError::FileTooLarge {
                kind: self.kind,
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}

static IMAGE: UploadLimit = UploadLimit {
    kind: BlockKind::Image,
    max_bytes: 10 * MB,
    accepted: &[
        ("jpeg", "image/jpeg"),
        ("jpg", "image/jpg"),
        ("png", "image/png"),
        ("svg", "image/svg+xml"),
        ("webp", "image/webp"),
    ],
};

static VIDEO: UploadLimit = UploadLimit {
    kind: BlockKind::Video,
    max_bytes: 100 * MB,
    accepted: &[
        ("avi", "video/x-msvideo"),
        ("mp4", "video/mp4"),
        ("mkv", "video/x-matroska"),
        ("mov", "video/quicktime"),
    ],
};

static FILE: UploadLimit = UploadLimit {
    kind: BlockKind::File,
    max_bytes: 5 * MB,
    accepted: &[
        ("pdf", "application/pdf"),
        (
            "docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
        ("xls", "application/vnd.ms-excel"),
        (
            "xlsx",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ),
        ("csv", "text/csv"),
        ("txt", "text/plain"),
    ],
};

/// The upload limit for `kind`, or `None` for non-uploadable kinds.
pub fn upload_limit(kind: BlockKind) -> Option<&'static UploadLimit> {
    match kind {
        BlockKind::Image => Some(&IMAGE),
        BlockKind::Video => Some(&VIDEO),
        BlockKind::File => Some(&FILE),
        _ => None,
    }
}

/// Check a file of `mime`/`size` against `kind`'s limit.
pub fn check_upload(kind: BlockKind, mime: &str, size: u64) -> Result<(), ValidationError> {
    let limit = upload_limit(kind).ok_or(ValidationError::NotUploadable(kind))?;
    limit.check(mime, size)
}

/// Guess the MIME type for a file name from the upload tables.
pub fn mime_for_filename(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    [&IMAGE, &VIDEO, &FILE]
        .into_iter()
        .flat_map(|l| l.accepted.iter())
        .find(|(e, _)| *e == ext)
        .map(|(_, m)| *m)
}

/// File extension for an accepted MIME type.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    [&IMAGE, &VIDEO, &FILE]
        .into_iter()
        .flat_map(|l| l.accepted.iter())
        .find(|(_, m)| m.eq_ignore_ascii_case(mime))
        .map(|(e, _)| *e)
}

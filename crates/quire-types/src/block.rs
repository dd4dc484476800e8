//! Content block model.
//!
//! A block is one visual unit of a document. `BlockKind` is a closed set of
//! six variants; the kind decides which fields are meaningful:
//!
//! |-------------|------------------|----------------------|-------------------|
//! | Kind        | `content`        | `source_ref`         | `caption`         |
//! |-------------|------------------|----------------------|-------------------|
//! | `heading`   | heading text     | -                    | -                 |
//! | `paragraph` | body             | -                    | -                 |
//! | `link`      | label            | URL (required)       | description       |
//! | `image`     | caption          | URL or pending file  | -                 |
//! | `video`     | caption          | URL or pending file  | -                 |
//! | `file`      | display name     | URL or pending file  | label             |
//! |-------------|------------------|----------------------|-------------------|
//!
//! Media and file blocks also carry a [`SourceMode`] telling whether the
//! reference is a remote URL or a local file awaiting upload.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::{BlockId, UploadHandle};

/// Maximum image blocks per document.
pub const MAX_IMAGE_BLOCKS: usize = 5;

/// Maximum video blocks per document.
pub const MAX_VIDEO_BLOCKS: usize = 5;

/// Default heading level for newly inserted headings.
pub const DEFAULT_HEADING_LEVEL: u8 = 2;

/// Valid heading levels.
pub const HEADING_LEVELS: std::ops::RangeInclusive<u8> = 1..=3;

/// What a block *is*.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum BlockKind {
    Heading,
    Paragraph,
    Link,
    Image,
    Video,
    File,
}

impl BlockKind {
    /// All kinds, in the order the builder palette lists them.
    pub const ALL: [BlockKind; 6] = [
        BlockKind::Heading,
        BlockKind::Paragraph,
        BlockKind::Link,
        BlockKind::Image,
        BlockKind::Video,
        BlockKind::File,
    ];

    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Heading => "heading",
            BlockKind::Paragraph => "paragraph",
            BlockKind::Link => "link",
            BlockKind::Image => "image",
            BlockKind::Video => "video",
            BlockKind::File => "file",
        }
    }

    /// Whether this kind references a media or file source.
    pub fn has_source_mode(&self) -> bool {
        matches!(self, BlockKind::Image | BlockKind::Video | BlockKind::File)
    }

    /// Per-document cardinality cap, if the kind has one.
    pub fn max_per_document(&self) -> Option<usize> {
        match self {
            BlockKind::Image => Some(MAX_IMAGE_BLOCKS),
            BlockKind::Video => Some(MAX_VIDEO_BLOCKS),
            _ => None,
        }
    }

    /// Storage destination for uploads of this kind.
    pub fn upload_category(&self) -> Option<UploadCategory> {
        match self {
            BlockKind::Image => Some(UploadCategory::Images),
            BlockKind::Video => Some(UploadCategory::Videos),
            BlockKind::File => Some(UploadCategory::Files),
            _ => None,
        }
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a media/file block's source lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SourceMode {
    /// An external URL typed by the operator.
    RemoteUrl,
    /// A locally-selected file staged for upload.
    LocalUpload,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::RemoteUrl => "remote_url",
            SourceMode::LocalUpload => "local_upload",
        }
    }
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reference to a block's source: a URL, or a file still waiting for upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SourceRef {
    Url(String),
    Pending(UploadHandle),
}

impl SourceRef {
    /// The URL, if this is a durable reference.
    pub fn url(&self) -> Option<&str> {
        match self {
            SourceRef::Url(u) => Some(u),
            SourceRef::Pending(_) => None,
        }
    }

    /// The pending upload handle, if any.
    pub fn pending(&self) -> Option<UploadHandle> {
        match self {
            SourceRef::Pending(h) => Some(*h),
            SourceRef::Url(_) => None,
        }
    }
}

/// Destination bucket handed to the file storage collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadCategory {
    Images,
    Videos,
    Files,
}

impl UploadCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadCategory::Images => "images",
            UploadCategory::Videos => "videos",
            UploadCategory::Files => "files",
        }
    }
}

impl std::fmt::Display for UploadCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One content block in a document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Stable identity, generated at insert time.
    pub id: BlockId,
    pub kind: BlockKind,
    /// Display text (heading text, paragraph body, link label, media caption).
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<SourceRef>,
    /// Secondary text (link description, file label).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Only present on image/video/file blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_mode: Option<SourceMode>,
    /// Only present on heading blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    /// Dense ordering key, 0-indexed within the document.
    pub position: u32,
}

impl ContentBlock {
    /// A block of `kind` with the builder's default field values.
    pub fn with_defaults(kind: BlockKind, position: u32) -> Self {
        let (content, source_mode, level) = match kind {
            BlockKind::Heading => ("Heading", None, Some(DEFAULT_HEADING_LEVEL)),
            BlockKind::Paragraph => ("", None, None),
            BlockKind::Link => ("", None, None),
            BlockKind::Image | BlockKind::Video => ("", Some(SourceMode::RemoteUrl), None),
            BlockKind::File => ("", Some(SourceMode::LocalUpload), None),
        };
        Self {
            id: BlockId::new(),
            kind,
            content: content.to_string(),
            source_ref: None,
            caption: None,
            source_mode,
            level,
            position,
        }
    }

    /// Pending upload handle, if this block is waiting on a local file.
    pub fn pending_upload(&self) -> Option<UploadHandle> {
        self.source_ref.as_ref().and_then(SourceRef::pending)
    }

    /// Durable URL, if the source is resolved.
    pub fn url(&self) -> Option<&str> {
        self.source_ref.as_ref().and_then(SourceRef::url)
    }

    /// Merge a partial update into this block. The kind and id never change.
    pub fn apply(&mut self, patch: BlockPatch) {
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(source_ref) = patch.source_ref {
            self.source_ref = source_ref;
        }
        if let Some(caption) = patch.caption {
            self.caption = caption;
        }
        if self.kind.has_source_mode() {
            if let Some(mode) = patch.source_mode {
                // Switching mode invalidates a reference of the other shape.
                if self.source_mode != Some(mode) {
                    let keep = matches!(
                        (&self.source_ref, mode),
                        (Some(SourceRef::Url(_)), SourceMode::RemoteUrl)
                            | (Some(SourceRef::Pending(_)), SourceMode::LocalUpload)
                    );
                    if !keep {
                        self.source_ref = None;
                    }
                }
                self.source_mode = Some(mode);
            }
        }
        if self.kind == BlockKind::Heading {
            if let Some(level) = patch.level {
                self.level = Some(level);
            }
        }
    }
}

/// Partial update for a block. `None` leaves a field unchanged; for optional
/// fields, `Some(None)` clears the value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<Option<SourceRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_mode: Option<SourceMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
}

impl BlockPatch {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self {
            source_ref: Some(Some(SourceRef::Url(url.into()))),
            source_mode: Some(SourceMode::RemoteUrl),
            ..Default::default()
        }
    }

    pub fn with_content(mut self, text: impl Into<String>) -> Self {
        self.content = Some(text.into());
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(Some(caption.into()));
        self
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = Some(level);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

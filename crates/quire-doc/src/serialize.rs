//! Publish serializer and the matching parser.
//!
//! Blocks are stored as `{ "id", "type", "props" }` where `props` depends on
//! the kind:
//!
//! ```text
//! heading    { text, level }
//! paragraph  { text }
//! link       { url, label, description? }
//! image      { url, caption?, sourceMode }
//! video      { url, caption?, sourceMode }
//! file       { url, name, label?, sourceMode }
//! ```
//!
//! `sourceMode` is `remote_url` or `local_upload`. Older payloads without it
//! read a present URL as `remote_url`.
//!
//! Serialized media only ever carries a durable URL. A block still pointing
//! at a staged file must have a resolution in the map passed to
//! [`serialize`], otherwise serialization fails with
//! [`DocError::UnresolvedUpload`].
//!
//! Parsing is strict: an unknown `type` or props of the wrong shape is a
//! [`ValidationError::UnrecognizedShape`], never a silently defaulted block.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use quire_types::{
    BlockId, BlockKind, ContentBlock, DEFAULT_HEADING_LEVEL, DocumentId, DocumentKind, EventKind,
    LifecycleState, RecipientRef, Signature, SourceMode, SourceRef, UploadHandle,
    ValidationError,
};

use crate::block_store::BlockStore;
use crate::document::{Document, DocumentParts};
use crate::{DocError, Result};

// ============================================================================
// Stored shapes
// ============================================================================

/// One block as stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<BlockId>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub props: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct HeadingProps {
    text: String,
    #[serde(default = "default_level")]
    level: u8,
}

fn default_level() -> u8 {
    DEFAULT_HEADING_LEVEL
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TextProps {
    text: String,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LinkProps {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct MediaProps {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    caption: Option<String>,
    #[serde(rename = "sourceMode", default, skip_serializing_if = "Option::is_none")]
    source_mode: Option<SourceMode>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileProps {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(rename = "sourceMode", default, skip_serializing_if = "Option::is_none")]
    source_mode: Option<SourceMode>,
}

/// The record handed to the persistence collaborator on every transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPayload {
    pub id: DocumentId,
    #[serde(default)]
    pub kind: DocumentKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub content: Vec<StoredBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_ref: Option<RecipientRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protection_token: Option<String>,
    pub lifecycle_event: EventKind,
    pub lifecycle_state: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewed_at: Option<u64>,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: u64,
}

// ============================================================================
// Serialize
// ============================================================================

fn props_value<T: Serialize>(props: T) -> Result<serde_json::Value> {
    serde_json::to_value(props).map_err(|e| DocError::Serialization(e.to_string()))
}

/// Source mode as stored. A resolved pending file is a remote URL from here on.
fn stored_mode(block: &ContentBlock) -> Option<SourceMode> {
    match block.source_ref {
        Some(SourceRef::Pending(_)) => Some(SourceMode::RemoteUrl),
        _ => block.source_mode,
    }
}

/// Durable URL for a block: its own URL, or the resolution of its pending file.
fn resolved_url(
    block: &ContentBlock,
    resolved: &HashMap<UploadHandle, String>,
) -> Result<Option<String>> {
    match &block.source_ref {
        None => Ok(None),
        Some(SourceRef::Url(url)) => Ok(Some(url.clone())),
        Some(SourceRef::Pending(handle)) => resolved
            .get(handle)
            .cloned()
            .map(Some)
            .ok_or(DocError::UnresolvedUpload(block.id)),
    }
}

/// Serialize one block.
pub fn serialize_block(
    block: &ContentBlock,
    resolved: &HashMap<UploadHandle, String>,
) -> Result<StoredBlock> {
    let props = match block.kind {
        BlockKind::Heading => props_value(HeadingProps {
            text: block.content.clone(),
            level: block.level.unwrap_or(DEFAULT_HEADING_LEVEL),
        })?,
        BlockKind::Paragraph => props_value(TextProps {
            text: block.content.clone(),
        })?,
        BlockKind::Link => props_value(LinkProps {
            url: resolved_url(block, resolved)?,
            label: block.content.clone(),
            description: block.caption.clone(),
        })?,
        BlockKind::Image | BlockKind::Video => props_value(MediaProps {
            url: resolved_url(block, resolved)?,
            caption: (!block.content.is_empty()).then(|| block.content.clone()),
            source_mode: stored_mode(block),
        })?,
        BlockKind::File => props_value(FileProps {
            url: resolved_url(block, resolved)?,
            name: block.content.clone(),
            label: block.caption.clone(),
            source_mode: stored_mode(block),
        })?,
    };

    Ok(StoredBlock {
        id: Some(block.id),
        kind: block.kind.as_str().to_string(),
        props,
    })
}

/// Serialize blocks in document order.
pub fn serialize_blocks(
    blocks: &[ContentBlock],
    resolved: &HashMap<UploadHandle, String>,
) -> Result<Vec<StoredBlock>> {
    blocks.iter().map(|b| serialize_block(b, resolved)).collect()
}

/// Build the persistence payload for `doc` after `event` has been applied.
///
/// Same document and same resolution map always give the same payload.
pub fn serialize(
    doc: &Document,
    event: EventKind,
    resolved: &HashMap<UploadHandle, String>,
) -> Result<DocumentPayload> {
    Ok(DocumentPayload {
        id: doc.id(),
        kind: doc.kind(),
        title: doc.title().to_string(),
        description: doc.description().to_string(),
        content: serialize_blocks(doc.blocks(), resolved)?,
        recipient_ref: doc.recipient().cloned(),
        protection_token: doc.protection_token().map(str::to_string),
        lifecycle_event: event,
        lifecycle_state: doc.state(),
        signature: doc.signature().cloned(),
        viewed_at: doc.viewed_at(),
        created_at: doc.created_at(),
        updated_at: doc.updated_at(),
    })
}

pub fn to_json(payload: &DocumentPayload) -> Result<String> {
    serde_json::to_string(payload).map_err(|e| DocError::Serialization(e.to_string()))
}

pub fn from_json(json: &str) -> Result<DocumentPayload> {
    serde_json::from_str(json).map_err(|e| DocError::Serialization(e.to_string()))
}

// ============================================================================
// Parse
// ============================================================================

fn parse_props<T: DeserializeOwned>(
    kind: BlockKind,
    props: &serde_json::Value,
) -> std::result::Result<T, ValidationError> {
    serde_json::from_value(props.clone())
        .map_err(|e| ValidationError::UnrecognizedShape(format!("{kind} props: {e}")))
}

fn url_ref(url: Option<String>) -> Option<SourceRef> {
    url.filter(|u| !u.is_empty()).map(SourceRef::Url)
}

/// Stored mode wins; payloads without one treat a present URL as remote.
fn parsed_mode(
    default: Option<SourceMode>,
    stored: Option<SourceMode>,
    source_ref: &Option<SourceRef>,
) -> Option<SourceMode> {
    match (stored, source_ref) {
        (Some(mode), _) => Some(mode),
        (None, Some(_)) => Some(SourceMode::RemoteUrl),
        (None, None) => default,
    }
}

/// Parse one stored block into the closed block union.
///
/// `position` is the block's index in the stored list.
pub fn parse_block(
    stored: &StoredBlock,
    position: u32,
) -> std::result::Result<ContentBlock, ValidationError> {
    let kind = BlockKind::from_str(&stored.kind).ok_or_else(|| {
        ValidationError::UnrecognizedShape(format!("unknown block type {:?}", stored.kind))
    })?;

    let mut block = ContentBlock::with_defaults(kind, position);
    if let Some(id) = stored.id {
        block.id = id;
    }

    match kind {
        BlockKind::Heading => {
            let props: HeadingProps = parse_props(kind, &stored.props)?;
            if !quire_types::block::HEADING_LEVELS.contains(&props.level) {
                return Err(ValidationError::InvalidLevel(props.level));
            }
            block.content = props.text;
            block.level = Some(props.level);
        }
        BlockKind::Paragraph => {
            let props: TextProps = parse_props(kind, &stored.props)?;
            block.content = props.text;
        }
        BlockKind::Link => {
            let props: LinkProps = parse_props(kind, &stored.props)?;
            block.content = props.label;
            block.source_ref = url_ref(props.url);
            block.caption = props.description;
        }
        BlockKind::Image | BlockKind::Video => {
            let props: MediaProps = parse_props(kind, &stored.props)?;
            block.content = props.caption.unwrap_or_default();
            block.source_ref = url_ref(props.url);
            block.source_mode = parsed_mode(block.source_mode, props.source_mode, &block.source_ref);
        }
        BlockKind::File => {
            let props: FileProps = parse_props(kind, &stored.props)?;
            block.content = props.name;
            block.caption = props.label;
            block.source_ref = url_ref(props.url);
            block.source_mode = parsed_mode(block.source_mode, props.source_mode, &block.source_ref);
        }
    }
    Ok(block)
}

/// Parse a stored block list; positions follow list order.
pub fn parse_blocks(
    stored: &[StoredBlock],
) -> std::result::Result<Vec<ContentBlock>, ValidationError> {
    stored
        .iter()
        .enumerate()
        .map(|(i, s)| parse_block(s, i as u32))
        .collect()
}

/// Rebuild a document from its stored payload.
pub fn parse_document(payload: &DocumentPayload) -> Result<Document> {
    let blocks = parse_blocks(&payload.content)?;
    let store = BlockStore::from_blocks(blocks)?;
    Ok(Document::from_parts(DocumentParts {
        id: payload.id,
        kind: payload.kind,
        title: payload.title.clone(),
        description: payload.description.clone(),
        recipient: payload.recipient_ref.clone(),
        protection_token: payload.protection_token.clone(),
        state: payload.lifecycle_state,
        signature: payload.signature.clone(),
        viewed_at: payload.viewed_at,
        created_at: payload.created_at,
        updated_at: payload.updated_at,
        store,
    }))
}

// ============================================================================
// Tests
// ============================================================================

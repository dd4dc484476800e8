//! Typed identifiers for documents, blocks, recipients, and pending uploads.
//!
//! All ID types wrap UUIDv7 (time-ordered, globally unique). They display as
//! standard UUID text for logging. The `short()` form (first 8 hex chars) is
//! for human-facing output only and never used as a lookup key.
//!
//! Block IDs are generated client-side when a block is inserted and stay
//! stable across reorders; positions are tracked separately.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A document identifier (wall or agreement).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(uuid::Uuid);

/// A content block identifier, unique within its document.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(uuid::Uuid);

/// A recipient (contact) identifier from the recipient directory.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(uuid::Uuid);

/// Handle for a locally-selected file that has not reached durable storage.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadHandle(uuid::Uuid);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_typed_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Create a new time-ordered ID (UUIDv7).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// First 8 hex characters, for human display only. Not a lookup key.
            pub fn short(&self) -> String {
                self.0.as_simple().to_string()[..8].to_string()
            }

            /// Full 32-character hex string (no hyphens).
            pub fn to_hex(&self) -> String {
                self.0.as_simple().to_string()
            }

            /// The raw 16 bytes.
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            /// Reconstruct from 16 bytes.
            pub fn from_bytes(b: [u8; 16]) -> Self {
                Self(uuid::Uuid::from_bytes(b))
            }

            /// Parse from a hex string (32 chars, no hyphens) or standard UUID format.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                uuid::Uuid::parse_str(s).map(Self)
            }

            /// Check if a query string matches this ID by hex prefix.
            pub fn matches_hex_prefix(&self, prefix: &str) -> bool {
                self.to_hex().starts_with(prefix)
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<uuid::Uuid> for $T {
            fn from(u: uuid::Uuid) -> Self {
                Self(u)
            }
        }

        impl From<$T> for uuid::Uuid {
            fn from(id: $T) -> uuid::Uuid {
                id.0
            }
        }

        impl std::str::FromStr for $T {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Full UUID with hyphens for log readability
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_typed_id!(DocumentId, "DocumentId");
impl_typed_id!(BlockId, "BlockId");
impl_typed_id!(RecipientId, "RecipientId");
impl_typed_id!(UploadHandle, "UploadHandle");

/// Resolve a hex prefix against a set of IDs.
///
/// Returns `None` when nothing matches or when the prefix is ambiguous.
pub fn resolve_prefix<T: Copy>(
    candidates: impl Iterator<Item = T>,
    prefix: &str,
    hex: impl Fn(&T) -> String,
) -> Option<T> {
    let mut found = None;
    for candidate in candidates {
        if hex(&candidate).starts_with(prefix) {
            if found.is_some() {
                return None;
            }
            found = Some(candidate);
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(BlockId::new(), BlockId::new());
        assert_ne!(DocumentId::new(), DocumentId::new());
    }

    #[test]
    fn test_parse_roundtrip() {
        let id = DocumentId::new();
        assert_eq!(DocumentId::parse(&id.to_string()).unwrap(), id);
        assert_eq!(DocumentId::parse(&id.to_hex()).unwrap(), id);
    }

    #[test]
    fn test_short_is_prefix_of_hex() {
        let id = BlockId::new();
        assert!(id.to_hex().starts_with(&id.short()));
        assert!(id.matches_hex_prefix(&id.short()));
    }

    #[test]
    fn test_debug_uses_type_name() {
        let id = UploadHandle::new();
        assert!(format!("{id:?}").starts_with("UploadHandle("));
    }

    #[test]
    fn test_resolve_prefix() {
        let a = BlockId::from_bytes([0xaa; 16]);
        let b = BlockId::from_bytes([0xab; 16]);
        let ids = [a, b];

        assert_eq!(resolve_prefix(ids.iter().copied(), "aa", |id| id.to_hex()), Some(a));
        assert_eq!(resolve_prefix(ids.iter().copied(), "a", |id| id.to_hex()), None);
        assert_eq!(resolve_prefix(ids.iter().copied(), "ff", |id| id.to_hex()), None);
    }
}

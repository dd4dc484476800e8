//! Document kinds, lifecycle states, and lifecycle events.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

/// What sort of document this is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum DocumentKind {
    /// Content page shared with a recipient. Stops at `sent`.
    #[default]
    Wall,
    /// Signable agreement. Can reach `signed`.
    Agreement,
}

impl DocumentKind {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Wall => "wall",
            DocumentKind::Agreement => "agreement",
        }
    }

    /// Whether documents of this kind can be signed.
    pub fn is_signable(&self) -> bool {
        matches!(self, DocumentKind::Agreement)
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a document is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum LifecycleState {
    #[default]
    Draft,
    Published,
    Sent,
    Signed,
}

impl LifecycleState {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Draft => "draft",
            LifecycleState::Published => "published",
            LifecycleState::Sent => "sent",
            LifecycleState::Signed => "signed",
        }
    }

    /// Blocks and metadata may only change in `draft` or `published`.
    pub fn can_edit(&self) -> bool {
        matches!(self, LifecycleState::Draft | LifecycleState::Published)
    }

    /// No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Signed)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Name of a lifecycle event, as handed to persistence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EventKind {
    SaveDraft,
    Publish,
    Send,
    Sign,
    View,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SaveDraft => "save_draft",
            EventKind::Publish => "publish",
            EventKind::Send => "send",
            EventKind::Sign => "sign",
            EventKind::View => "view",
        }
    }

    /// Events that change document content and therefore need an editable state.
    pub fn is_mutation(&self) -> bool {
        matches!(self, EventKind::SaveDraft | EventKind::Publish | EventKind::Send)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a published/sent document is token-gated.
///
/// Always an explicit input to `publish`/`send`; never inferred.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", content = "token", rename_all = "snake_case")]
pub enum Protection {
    /// Keep whatever token the document already has.
    #[default]
    Unchanged,
    /// Remove token gating.
    Open,
    /// Gate access behind a fresh random token.
    Protected,
    /// Gate access behind the given token.
    Token(String),
}

/// Recipient's acceptance of an agreement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Name the recipient typed when signing.
    pub signer_name: String,
    /// Unix millis.
    pub signed_at: u64,
}

impl Signature {
    pub fn new(signer_name: impl Into<String>) -> Self {
        Self {
            signer_name: signer_name.into(),
            signed_at: crate::now_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_edit() {
        assert!(LifecycleState::Draft.can_edit());
        assert!(LifecycleState::Published.can_edit());
        assert!(!LifecycleState::Sent.can_edit());
        assert!(!LifecycleState::Signed.can_edit());
    }

    #[test]
    fn test_only_agreements_sign() {
        assert!(DocumentKind::Agreement.is_signable());
        assert!(!DocumentKind::Wall.is_signable());
    }

    #[test]
    fn test_state_parse() {
        assert_eq!(LifecycleState::from_str("SENT"), Some(LifecycleState::Sent));
        assert_eq!(LifecycleState::from_str("viewed"), None);
    }

    #[test]
    fn test_event_kind_strings() {
        assert_eq!(EventKind::SaveDraft.as_str(), "save_draft");
        assert_eq!(
            serde_json::to_string(&EventKind::SaveDraft).unwrap(),
            "\"save_draft\""
        );
        assert!(!EventKind::Sign.is_mutation());
    }
}

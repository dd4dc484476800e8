//! Lifecycle rules: which events are legal in which states.
//!
//! ```text
//!            save_draft            publish               send             sign
//!   ┌─────┐ ◄────────── ┌─────────┐ ───────► ┌──────┐ ─────────► ┌────────┐
//!   │draft│             │published│          │ sent │            │ signed │
//!   └─────┘ ──────────► └─────────┘          └──────┘            └────────┘
//!      │     publish                            ▲   (agreements only)
//!      └────────────────── send ────────────────┘
//! ```
//!
//! `draft` and `published` are the editable states. `sent` and `signed` are
//! terminal for editing; any mutation attempted there is rejected, never
//! silently applied. `view` records a receipt on a delivered document and
//! leaves the state alone.
//!
//! [`plan`] is pure: it checks the event against the document and computes
//! the post-transition lifecycle values. [`transition`] applies a plan to the
//! in-memory document. Persisting (and rolling back on failure) is the
//! session's job.

use quire_types::{
    DocumentKind, EventKind, LifecycleState, Protection, RecipientRef, Signature,
    ValidationError, check, is_valid_email,
};

use crate::{DocError, Document, Result, TransitionError};

/// A requested lifecycle change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    SaveDraft,
    Publish {
        protection: Protection,
    },
    Send {
        /// `None` means the operator never picked anyone.
        recipient: Option<RecipientRef>,
        protection: Protection,
    },
    Sign {
        signature: Signature,
    },
    View,
}

impl LifecycleEvent {
    pub fn publish() -> Self {
        Self::Publish {
            protection: Protection::Unchanged,
        }
    }

    pub fn send(recipient: RecipientRef) -> Self {
        Self::Send {
            recipient: Some(recipient),
            protection: Protection::Unchanged,
        }
    }

    pub fn sign(signer_name: impl Into<String>) -> Self {
        Self::Sign {
            signature: Signature::new(signer_name),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            LifecycleEvent::SaveDraft => EventKind::SaveDraft,
            LifecycleEvent::Publish { .. } => EventKind::Publish,
            LifecycleEvent::Send { .. } => EventKind::Send,
            LifecycleEvent::Sign { .. } => EventKind::Sign,
            LifecycleEvent::View => EventKind::View,
        }
    }

    /// Whether this event must persist uploaded media first.
    pub fn needs_staging(&self) -> bool {
        self.kind().is_mutation()
    }
}

/// Lifecycle values a document will hold once the event is applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub event: EventKind,
    pub from: LifecycleState,
    pub to: LifecycleState,
    pub recipient: Option<RecipientRef>,
    pub protection_token: Option<String>,
    pub signature: Option<Signature>,
    pub viewed_at: Option<u64>,
}

/// Whether blocks and metadata may change.
///
/// Agreements share the rule with walls; `signed` is never editable.
pub fn can_edit(_kind: DocumentKind, state: LifecycleState) -> bool {
    state.can_edit()
}

fn ensure_editable(doc: &Document, action: &'static str) -> Result<()> {
    if !can_edit(doc.kind(), doc.state()) {
        tracing::warn!(doc = ?doc.id(), state = %doc.state(), action, "rejected: not editable");
        return Err(TransitionError::NotEditable {
            state: doc.state(),
            action,
        }
        .into());
    }
    Ok(())
}

/// Title is always required to go out; agreements also need a description.
fn ensure_metadata(doc: &Document) -> Result<()> {
    if doc.title().trim().is_empty() {
        return Err(ValidationError::MissingTitle.into());
    }
    if doc.kind() == DocumentKind::Agreement && doc.description().trim().is_empty() {
        return Err(ValidationError::MissingDescription.into());
    }
    Ok(())
}

fn ensure_blocks_valid(doc: &Document) -> Result<()> {
    for block in doc.blocks() {
        check(block)?;
    }
    Ok(())
}

fn resolve_protection(current: Option<&str>, protection: &Protection) -> Option<String> {
    match protection {
        Protection::Unchanged => current.map(str::to_string),
        Protection::Open => None,
        Protection::Protected => Some(uuid::Uuid::new_v4().simple().to_string()),
        Protection::Token(t) if t.trim().is_empty() => None,
        Protection::Token(t) => Some(t.trim().to_string()),
    }
}

/// Check `event` against `doc` and compute the resulting lifecycle values.
pub fn plan(doc: &Document, event: &LifecycleEvent) -> Result<Transition> {
    let from = doc.state();
    let mut next = Transition {
        event: event.kind(),
        from,
        to: from,
        recipient: doc.recipient().cloned(),
        protection_token: doc.protection_token().map(str::to_string),
        signature: doc.signature().cloned(),
        viewed_at: doc.viewed_at(),
    };

    match event {
        LifecycleEvent::SaveDraft => {
            ensure_editable(doc, "save draft")?;
            next.to = LifecycleState::Draft;
        }
        LifecycleEvent::Publish { protection } => {
            ensure_editable(doc, "publish")?;
            ensure_metadata(doc)?;
            ensure_blocks_valid(doc)?;
            next.to = LifecycleState::Published;
            next.protection_token = resolve_protection(doc.protection_token(), protection);
        }
        LifecycleEvent::Send {
            recipient,
            protection,
        } => {
            ensure_editable(doc, "send")?;
            let recipient = recipient.as_ref().ok_or(ValidationError::NoRecipient)?;
            if !is_valid_email(&recipient.email) {
                return Err(ValidationError::InvalidEmail(recipient.email.clone()).into());
            }
            ensure_metadata(doc)?;
            ensure_blocks_valid(doc)?;
            next.to = LifecycleState::Sent;
            next.recipient = Some(recipient.clone());
            next.protection_token = resolve_protection(doc.protection_token(), protection);
        }
        LifecycleEvent::Sign { signature } => {
            if !doc.kind().is_signable() {
                return Err(TransitionError::NotSignable(doc.kind()).into());
            }
            if from != LifecycleState::Sent {
                return Err(TransitionError::NotSent(from).into());
            }
            if signature.signer_name.trim().is_empty() {
                return Err(ValidationError::MissingSigner.into());
            }
            next.to = LifecycleState::Signed;
            next.signature = Some(signature.clone());
        }
        LifecycleEvent::View => {
            if !matches!(from, LifecycleState::Sent | LifecycleState::Signed) {
                return Err(TransitionError::NotDelivered(from).into());
            }
            next.viewed_at = doc.viewed_at().or(Some(quire_types::now_millis()));
        }
    }

    Ok(next)
}

/// Plan `event` and apply it to the in-memory document.
pub fn transition(doc: &mut Document, event: &LifecycleEvent) -> Result<Transition> {
    let next = plan(doc, event)?;
    doc.apply_transition(&next);
    tracing::info!(doc = ?doc.id(), event = %next.event, from = %next.from, to = %next.to, "lifecycle transition");
    Ok(next)
}

/// Same as [`plan`], for callers that only need a yes/no.
pub fn is_allowed(doc: &Document, event: &LifecycleEvent) -> bool {
    !matches!(plan(doc, event), Err(DocError::Transition(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_types::{BlockKind, BlockPatch};

    fn wall() -> Document {
        let mut doc = Document::new(DocumentKind::Wall, "Spring launch");
        let h = doc.insert_block(BlockKind::Heading).unwrap();
        doc.update_block(&h.id, BlockPatch::content("Welcome")).unwrap();
        doc
    }

    fn agreement() -> Document {
        let mut doc = Document::new(DocumentKind::Agreement, "Service agreement");
        doc.set_description("Terms for Q3").unwrap();
        doc
    }

    fn recipient() -> RecipientRef {
        RecipientRef::custom("a@b.co").unwrap()
    }

    #[test]
    fn test_draft_publish_roundtrip() {
        let mut doc = wall();
        transition(&mut doc, &LifecycleEvent::publish()).unwrap();
        assert_eq!(doc.state(), LifecycleState::Published);

        transition(&mut doc, &LifecycleEvent::SaveDraft).unwrap();
        assert_eq!(doc.state(), LifecycleState::Draft);
    }

    #[test]
    fn test_send_requires_recipient() {
        let doc = wall();
        let event = LifecycleEvent::Send {
            recipient: None,
            protection: Protection::Unchanged,
        };
        assert_eq!(
            plan(&doc, &event).unwrap_err(),
            DocError::Validation(ValidationError::NoRecipient)
        );
    }

    #[test]
    fn test_send_rejects_bad_email() {
        let doc = wall();
        let bad = RecipientRef {
            id: None,
            name: None,
            email: "not-an-email".into(),
        };
        assert_eq!(
            plan(&doc, &LifecycleEvent::send(bad)).unwrap_err(),
            DocError::Validation(ValidationError::InvalidEmail("not-an-email".into()))
        );
        assert!(plan(&doc, &LifecycleEvent::send(recipient())).is_ok());
    }

    #[test]
    fn test_sent_is_not_editable() {
        let mut doc = wall();
        transition(&mut doc, &LifecycleEvent::send(recipient())).unwrap();
        assert_eq!(doc.state(), LifecycleState::Sent);

        for event in [
            LifecycleEvent::SaveDraft,
            LifecycleEvent::publish(),
            LifecycleEvent::send(recipient()),
        ] {
            assert!(matches!(
                plan(&doc, &event),
                Err(DocError::Transition(TransitionError::NotEditable { .. }))
            ));
        }
    }

    #[test]
    fn test_sign_requires_sent_agreement() {
        let mut doc = agreement();
        assert_eq!(
            plan(&doc, &LifecycleEvent::sign("Ada")).unwrap_err(),
            DocError::Transition(TransitionError::NotSent(LifecycleState::Draft))
        );

        transition(&mut doc, &LifecycleEvent::send(recipient())).unwrap();
        transition(&mut doc, &LifecycleEvent::sign("Ada")).unwrap();
        assert_eq!(doc.state(), LifecycleState::Signed);
        assert_eq!(doc.signature().unwrap().signer_name, "Ada");

        // Signing twice is not a thing.
        assert!(plan(&doc, &LifecycleEvent::sign("Ada")).is_err());
    }

    #[test]
    fn test_walls_cannot_be_signed() {
        let mut doc = wall();
        transition(&mut doc, &LifecycleEvent::send(recipient())).unwrap();
        assert_eq!(
            plan(&doc, &LifecycleEvent::sign("Ada")).unwrap_err(),
            DocError::Transition(TransitionError::NotSignable(DocumentKind::Wall))
        );
    }

    #[test]
    fn test_sign_requires_signer_name() {
        let mut doc = agreement();
        transition(&mut doc, &LifecycleEvent::send(recipient())).unwrap();
        assert_eq!(
            plan(&doc, &LifecycleEvent::sign("  ")).unwrap_err(),
            DocError::Validation(ValidationError::MissingSigner)
        );
    }

    #[test]
    fn test_publish_requires_title_and_agreement_description() {
        let doc = Document::new(DocumentKind::Wall, "");
        assert_eq!(
            plan(&doc, &LifecycleEvent::publish()).unwrap_err(),
            DocError::Validation(ValidationError::MissingTitle)
        );

        let doc = Document::new(DocumentKind::Agreement, "NDA");
        assert_eq!(
            plan(&doc, &LifecycleEvent::publish()).unwrap_err(),
            DocError::Validation(ValidationError::MissingDescription)
        );

        // Drafts can be saved incomplete.
        assert!(plan(&doc, &LifecycleEvent::SaveDraft).is_ok());
    }

    #[test]
    fn test_publish_validates_blocks() {
        let mut doc = wall();
        doc.insert_block(BlockKind::Link).unwrap();
        assert!(matches!(
            plan(&doc, &LifecycleEvent::publish()),
            Err(DocError::Validation(ValidationError::MissingField { kind: BlockKind::Link, .. }))
        ));
        assert!(plan(&doc, &LifecycleEvent::SaveDraft).is_ok());
    }

    #[test]
    fn test_protection_is_explicit() {
        let mut doc = wall();
        transition(
            &mut doc,
            &LifecycleEvent::Publish {
                protection: Protection::Protected,
            },
        )
        .unwrap();
        let token = doc.protection_token().unwrap().to_string();
        assert_eq!(token.len(), 32);

        // Unchanged keeps the token; Open removes it.
        transition(&mut doc, &LifecycleEvent::publish()).unwrap();
        assert_eq!(doc.protection_token(), Some(token.as_str()));
        transition(
            &mut doc,
            &LifecycleEvent::Publish {
                protection: Protection::Open,
            },
        )
        .unwrap();
        assert_eq!(doc.protection_token(), None);

        transition(
            &mut doc,
            &LifecycleEvent::Publish {
                protection: Protection::Token("s3cret".into()),
            },
        )
        .unwrap();
        assert_eq!(doc.protection_token(), Some("s3cret"));
    }

    #[test]
    fn test_view_records_receipt_once() {
        let mut doc = wall();
        assert!(matches!(
            plan(&doc, &LifecycleEvent::View),
            Err(DocError::Transition(TransitionError::NotDelivered(LifecycleState::Draft)))
        ));

        transition(&mut doc, &LifecycleEvent::send(recipient())).unwrap();
        transition(&mut doc, &LifecycleEvent::View).unwrap();
        let first = doc.viewed_at().unwrap();
        assert_eq!(doc.state(), LifecycleState::Sent);

        transition(&mut doc, &LifecycleEvent::View).unwrap();
        assert_eq!(doc.viewed_at(), Some(first));
    }

    #[test]
    fn test_is_allowed() {
        let doc = wall();
        assert!(is_allowed(&doc, &LifecycleEvent::publish()));
        assert!(!is_allowed(&doc, &LifecycleEvent::sign("Ada")));
    }
}

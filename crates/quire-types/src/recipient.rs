//! Recipients and the recipient email rule.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ids::RecipientId;
use crate::validate::ValidationError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Whether `email` looks like a deliverable address.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// A known contact from the recipient directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub name: String,
    pub email: String,
}

impl Recipient {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: RecipientId::new(),
            name: name.into(),
            email: email.into(),
        }
    }
}

/// How the operator picked who receives a document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RecipientChoice {
    /// An existing contact, looked up in the directory.
    Contact(RecipientId),
    /// A free-form email address.
    Custom(String),
}

/// A resolved recipient as stored on the document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecipientId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
}

impl RecipientRef {
    /// A custom recipient. Fails with a field-level error on a bad address.
    pub fn custom(email: &str) -> Result<Self, ValidationError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ValidationError::NoRecipient);
        }
        if !is_valid_email(email) {
            return Err(ValidationError::InvalidEmail(email.to_string()));
        }
        Ok(Self {
            id: None,
            name: None,
            email: email.to_string(),
        })
    }
}

impl From<Recipient> for RecipientRef {
    fn from(r: Recipient) -> Self {
        Self {
            id: Some(r.id),
            name: Some(r.name),
            email: r.email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last+tag@mail.example.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
        assert!(!is_valid_email("a@@b.co"));
    }

    #[test]
    fn test_custom_recipient() {
        assert_eq!(RecipientRef::custom(" a@b.co ").unwrap().email, "a@b.co");
        assert_eq!(
            RecipientRef::custom("not-an-email").unwrap_err(),
            ValidationError::InvalidEmail("not-an-email".into())
        );
        assert_eq!(RecipientRef::custom("").unwrap_err(), ValidationError::NoRecipient);
    }

    #[test]
    fn test_contact_into_ref() {
        let contact = Recipient::new("Ada", "ada@example.com");
        let id = contact.id;
        let r: RecipientRef = contact.into();
        assert_eq!(r.id, Some(id));
        assert_eq!(r.name.as_deref(), Some("Ada"));
    }
}

//! Error types for platform operations.
//!
//! [`NaksError`] is `Clone + PartialEq` so reducers can keep the last
//! rejection on their state and tests can compare it directly.

use crate::types::{EventStatus, ModerationDecision};
use naks_yetu_core::document_store::DocumentStoreError;
use naks_yetu_runtime::StoreError;
use std::fmt;
use thiserror::Error;

/// Result type for platform operations
pub type Result<T> = std::result::Result<T, NaksError>;

/// One failing input field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field name as the client knows it (`company`, `suspendedUntil`, ...)
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

impl FieldError {
    /// Create a field error
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every failing field of a rejected input, in the order they were checked
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    /// No errors yet
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Record a failing field
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    /// Whether any field failed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The failing fields
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.field.as_str()).collect()
    }

    /// All errors
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// `Ok(())` when empty, otherwise a [`NaksError::Validation`]
    ///
    /// # Errors
    ///
    /// Returns `NaksError::Validation` carrying every recorded field.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(NaksError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

/// Errors returned by platform operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NaksError {
    // ═══════════════════════════════════════════════════════════════════════
    // Domain Rules
    // ═══════════════════════════════════════════════════════════════════════
    /// The requested status change is not an edge of the moderation state machine
    #[error("Cannot {decision} an event that is {from}")]
    InvalidTransition {
        /// Status at the time of the request
        from: EventStatus,
        /// Requested decision
        decision: ModerationDecision,
    },

    /// Not enough stock (tickets or RSVP seats) to satisfy the request
    #[error("Capacity exceeded for {resource}: requested {requested}, available {available}")]
    CapacityExceeded {
        /// Ticket type key or `rsvp`
        resource: String,
        /// Quantity asked for
        requested: u32,
        /// Quantity still available
        available: u32,
    },

    /// One or more input fields are invalid
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// The request would not change anything
    #[error("No change: {0}")]
    NoChange(String),

    // ═══════════════════════════════════════════════════════════════════════
    // Access
    // ═══════════════════════════════════════════════════════════════════════
    /// The actor may not perform this operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The addressed record does not exist
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind (`event`, `user`, `ticket type`)
        kind: &'static str,
        /// Identifier looked up
        id: String,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Infrastructure
    // ═══════════════════════════════════════════════════════════════════════
    /// A concurrent writer won the race
    #[error("Concurrent modification: {0}")]
    Conflict(String),

    /// A stored record does not match its schema
    #[error("Malformed document {key}: {reason}")]
    MalformedDocument {
        /// Document key
        key: String,
        /// Decoder message
        reason: String,
    },

    /// The document store failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// An external collaborator (shortlinks, analytics, email) failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),
}

impl NaksError {
    /// Validation error for a single field
    #[must_use]
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.push(field, message);
        Self::Validation(errors)
    }

    /// Not-found error
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Caused by the request rather than the system
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { .. }
                | Self::CapacityExceeded { .. }
                | Self::Validation(_)
                | Self::NoChange(_)
                | Self::PermissionDenied(_)
                | Self::NotFound { .. }
        )
    }

    /// Re-running the operation on fresh data may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Fields named by a validation error (empty for other kinds)
    #[must_use]
    pub fn invalid_fields(&self) -> Vec<&str> {
        match self {
            Self::Validation(errors) => errors.fields(),
            _ => Vec::new(),
        }
    }
}

impl From<DocumentStoreError> for NaksError {
    fn from(error: DocumentStoreError) -> Self {
        match error {
            DocumentStoreError::Conflict { key, .. } => Self::Conflict(key.to_string()),
            DocumentStoreError::AlreadyExists(key) => {
                Self::Conflict(format!("{key} already exists"))
            },
            DocumentStoreError::Malformed { key, reason } => Self::MalformedDocument {
                key: key.to_string(),
                reason,
            },
            DocumentStoreError::Serialization(message) | DocumentStoreError::Database(message) => {
                Self::Storage(message)
            },
        }
    }
}

impl From<StoreError> for NaksError {
    fn from(error: StoreError) -> Self {
        Self::Storage(error.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use naks_yetu_core::document_store::{DocumentKey, Revision};

    #[test]
    fn validation_lists_every_field() {
        let mut errors = ValidationErrors::new();
        errors.push("company", "is required");
        errors.push("phone", "is required");

        let error = errors.into_result().unwrap_err();
        assert_eq!(error.invalid_fields(), vec!["company", "phone"]);
        assert_eq!(
            error.to_string(),
            "Validation failed: company: is required; phone: is required"
        );
        assert!(error.is_user_error());
    }

    #[test]
    fn store_conflicts_are_retryable() {
        let error = NaksError::from(DocumentStoreError::Conflict {
            key: DocumentKey::new("events", "e1"),
            expected: Revision::first(),
            actual: Some(Revision::new(2)),
        });

        assert!(error.is_retryable());
        assert!(!error.is_user_error());
        assert_eq!(error, NaksError::Conflict("events/e1".to_string()));
    }

    #[test]
    fn malformed_documents_keep_their_key() {
        let error = NaksError::from(DocumentStoreError::Malformed {
            key: DocumentKey::new("users", "u1"),
            reason: "missing field `role`".to_string(),
        });

        assert!(matches!(error, NaksError::MalformedDocument { ref key, .. } if key == "users/u1"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn transition_message_reads_naturally() {
        let error = NaksError::InvalidTransition {
            from: EventStatus::Live,
            decision: ModerationDecision::Approve,
        };
        assert_eq!(error.to_string(), "Cannot approve an event that is live");
    }
}

//! Audit log of administrative mutations.
//!
//! Every successful moderation decision, admin edit, role change and status
//! change appends exactly one [`AuditEntry`]. Entries are create-only
//! documents; nothing ever updates or deletes them.
//!
//! Appending is best effort: the primary mutation is already committed when
//! the append effect runs, so a failed append is logged and counted but never
//! rolled back.
//!
//! # Example
//!
//! ```
//! use naks_yetu::audit::{AuditAction, AuditEntry, AuditFilter, TargetType};
//! use naks_yetu::types::{AuditEntryId, UserId};
//! use chrono::Utc;
//!
//! let entry = AuditEntry::new(
//!     AuditEntryId::new(),
//!     AuditAction::EventApproved,
//!     UserId::new("admin-1"),
//!     "Wanjiru",
//!     Utc::now(),
//! )
//! .with_target(TargetType::Event, "evt-1", "Sauti Sol Live")
//! .with_user_agent("Mozilla/5.0")
//! .with_detail("newStatus", "live");
//!
//! assert!(AuditFilter::new().with_action(AuditAction::EventApproved).matches(&entry));
//! ```

use crate::types::{AuditEntryId, UserId};
use chrono::{DateTime, Utc};
use naks_yetu_core::{
    append_document, async_effect,
    document_store::{DocumentKey, DocumentStore, encode},
    effect::Effect,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Fixed vocabulary of audited actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    /// A user's role changed
    #[serde(rename = "Role Change")]
    RoleChange,
    /// A user's account status changed
    #[serde(rename = "Status Change")]
    StatusChange,
    /// pending → live
    #[serde(rename = "Event Approved")]
    EventApproved,
    /// pending → rejected
    #[serde(rename = "Event Rejected")]
    EventRejected,
    /// live → archived
    #[serde(rename = "Event Taken Down")]
    EventTakenDown,
    /// An admin edited event content
    #[serde(rename = "Event Edited")]
    EventEdited,
}

impl AuditAction {
    /// Label as stored and displayed
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::RoleChange => "Role Change",
            Self::StatusChange => "Status Change",
            Self::EventApproved => "Event Approved",
            Self::EventRejected => "Event Rejected",
            Self::EventTakenDown => "Event Taken Down",
            Self::EventEdited => "Event Edited",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind of record an entry is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    /// An event listing
    Event,
    /// A user account
    User,
}

/// One immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Entry identifier
    pub id: AuditEntryId,
    /// Admin who acted
    pub admin_id: UserId,
    /// Admin display name at the time
    pub admin_name: String,
    /// What happened
    pub action: AuditAction,
    /// Kind of record affected
    pub target_type: TargetType,
    /// Identifier of the record affected
    pub target_id: String,
    /// Display name of the record affected
    pub target_name: String,
    /// Structured details (old/new values, changed fields)
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
    /// Device / user agent of the admin
    pub user_agent: String,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Start an entry; the target defaults to an unnamed user
    #[must_use]
    pub fn new(
        id: AuditEntryId,
        action: AuditAction,
        admin_id: UserId,
        admin_name: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            admin_id,
            admin_name: admin_name.into(),
            action,
            target_type: TargetType::User,
            target_id: String::new(),
            target_name: String::new(),
            details: BTreeMap::new(),
            user_agent: "unknown".to_string(),
            timestamp,
        }
    }

    /// Set the affected record
    #[must_use]
    pub fn with_target(
        mut self,
        target_type: TargetType,
        target_id: impl fmt::Display,
        target_name: impl Into<String>,
    ) -> Self {
        self.target_type = target_type;
        self.target_id = target_id.to_string();
        self.target_name = target_name.into();
        self
    }

    /// Set the admin's user agent
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a detail
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Query over the audit trail; unset criteria match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    /// Only this action
    pub action: Option<AuditAction>,
    /// Only entries by this admin
    pub admin_id: Option<UserId>,
    /// Only entries about this record
    pub target_id: Option<String>,
    /// Not before
    pub since: Option<DateTime<Utc>>,
    /// Strictly before
    pub until: Option<DateTime<Utc>>,
}

impl AuditFilter {
    /// Match-all filter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one action
    #[must_use]
    pub const fn with_action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Restrict to one admin
    #[must_use]
    pub fn with_admin(mut self, admin_id: UserId) -> Self {
        self.admin_id = Some(admin_id);
        self
    }

    /// Restrict to one target
    #[must_use]
    pub fn with_target(mut self, target_id: impl fmt::Display) -> Self {
        self.target_id = Some(target_id.to_string());
        self
    }

    /// Restrict to `[since, until)`
    #[must_use]
    pub const fn between(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    /// Whether `entry` satisfies every set criterion
    #[must_use]
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.action.is_none_or(|action| entry.action == action)
            && self.admin_id.as_ref().is_none_or(|id| &entry.admin_id == id)
            && self.target_id.as_ref().is_none_or(|id| &entry.target_id == id)
            && self.since.is_none_or(|since| entry.timestamp >= since)
            && self.until.is_none_or(|until| entry.timestamp < until)
    }
}

/// Where audit entries are written
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl AuditLog {
    /// Audit log in `collection` of `store`
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// Collection path
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Effect appending `entry`. Failures come back through `on_failure`
    /// as a feedback action; success produces none.
    pub fn append<A>(&self, entry: &AuditEntry, on_failure: fn(AuditEntryId, String) -> A) -> Effect<A>
    where
        A: Send + 'static,
    {
        let entry_id = entry.id;
        let key = DocumentKey::new(self.collection.clone(), entry_id.to_string());

        match encode(entry) {
            Ok(document) => append_document! {
                store: self.store,
                key: key,
                document: document,
                on_success: |_revision| None,
                on_error: |error| Some(on_failure(entry_id, error.to_string()))
            },
            Err(error) => {
                let message = error.to_string();
                async_effect! { Some(on_failure(entry_id, message)) }
            },
        }
    }
}

impl fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLog")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

/// Log and count a failed append. The mutation it describes stays committed.
///
/// The store error itself was already logged by the runtime when the append ran.
pub fn report_append_failure(entry_id: AuditEntryId) {
    tracing::warn!(%entry_id, "Audit append failed; primary mutation kept");
    crate::metrics::record_audit_append_failure();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use naks_yetu_testing::InMemoryDocumentStore;

    #[derive(Debug, PartialEq)]
    enum Feedback {
        Failed(AuditEntryId),
    }

    fn failed(id: AuditEntryId, _error: String) -> Feedback {
        Feedback::Failed(id)
    }

    fn entry(action: AuditAction, at: DateTime<Utc>) -> AuditEntry {
        AuditEntry::new(AuditEntryId::new(), action, UserId::new("admin"), "Admin", at)
            .with_target(TargetType::Event, "evt-1", "Launch Party")
    }

    #[test]
    fn labels_serialize_verbatim() {
        let value = serde_json::to_value(entry(AuditAction::EventTakenDown, Utc::now())).unwrap();

        assert_eq!(value["action"], "Event Taken Down");
        assert_eq!(value["targetType"], "event");
        assert_eq!(value["targetName"], "Launch Party");
    }

    #[test]
    fn filter_combines_criteria() {
        let now = Utc::now();
        let approved = entry(AuditAction::EventApproved, now);

        assert!(AuditFilter::new().matches(&approved));
        assert!(
            AuditFilter::new()
                .with_action(AuditAction::EventApproved)
                .with_target("evt-1")
                .between(now - Duration::minutes(1), now + Duration::minutes(1))
                .matches(&approved)
        );
        assert!(!AuditFilter::new().with_action(AuditAction::RoleChange).matches(&approved));
        assert!(!AuditFilter::new().with_admin(UserId::new("other")).matches(&approved));
        assert!(!AuditFilter::new().between(now + Duration::seconds(1), now + Duration::minutes(1)).matches(&approved));
    }

    #[tokio::test]
    async fn append_writes_one_document() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let log = AuditLog::new(store.clone(), "audit_logs");

        let effect = log.append(&entry(AuditAction::EventApproved, Utc::now()), failed);
        let feedback = naks_yetu_runtime::run_effects(vec![effect]).await;

        assert!(feedback.is_empty());
        assert_eq!(store.documents_in("audit_logs").len(), 1);
    }

    #[tokio::test]
    async fn append_failure_is_reported_not_raised() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store.fail_collection("audit_logs");
        let log = AuditLog::new(store.clone(), "audit_logs");
        let entry = entry(AuditAction::EventRejected, Utc::now());

        let feedback = naks_yetu_runtime::run_effects(vec![log.append(&entry, failed)]).await;

        assert_eq!(feedback, vec![Feedback::Failed(entry.id)]);
        assert!(store.documents_in("audit_logs").is_empty());
    }
}

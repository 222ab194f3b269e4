//! Moderation integration tests.
//!
//! Event submission, the moderation state machine and its audit trail,
//! driven through the platform over the in-memory document store.
//!
//! Run with: `cargo test --test moderation_integration_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

mod common;

use common::{Harness, tier};
use naks_yetu::NaksError;
use naks_yetu::types::{EventCategory, EventDraft, EventPatch, EventStatus, ModerationDecision};
use naks_yetu_core::document_store::DocumentKey;
use serde_json::json;

#[tokio::test]
async fn test_new_events_start_pending() {
    let h = Harness::new();
    let organizer = h.organizer("org-1");

    let event = h
        .platform
        .create_event(&organizer, EventDraft::new("Jazz Night", EventCategory::Nightlife))
        .await
        .unwrap();

    assert_eq!(event.status, EventStatus::Pending);
    assert_eq!(event.organizer_id.as_str(), "org-1");
    assert_eq!(h.stored_event(&event).status, EventStatus::Pending);
    assert!(h.audit_entries().is_empty());
}

#[tokio::test]
async fn test_plain_users_cannot_submit_events() {
    let h = Harness::new();
    let user = h.user("u-1", naks_yetu::types::Role::User, 0);

    let result = h
        .platform
        .create_event(&user, EventDraft::new("Jazz Night", EventCategory::Nightlife))
        .await;

    assert!(matches!(result, Err(NaksError::PermissionDenied(_))));
    assert!(h.store.documents_in(&h.collections.events).is_empty());
}

#[tokio::test]
async fn test_approve_then_take_down() {
    let h = Harness::new();
    let organizer = h.organizer("org-1");
    let admin = h.admin("admin-1", 1);

    let event = h.live_event(&organizer, &admin, vec![tier("regular", 1_000, Some(10))]).await;
    assert_eq!(event.status, EventStatus::Live);

    let archived = h.platform.take_down_event(&admin, event.id).await.unwrap();
    assert_eq!(archived.status, EventStatus::Archived);
    assert_eq!(h.stored_event(&event).status, EventStatus::Archived);

    let actions: Vec<String> = h
        .audit_entries()
        .iter()
        .map(|entry| entry["action"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(actions.len(), 2);
    assert!(actions.contains(&"Event Approved".to_string()));
    assert!(actions.contains(&"Event Taken Down".to_string()));
}

#[tokio::test]
async fn test_second_approval_is_an_invalid_transition() {
    let h = Harness::new();
    let organizer = h.organizer("org-1");
    let admin = h.admin("admin-1", 1);
    let event = h.live_event(&organizer, &admin, vec![]).await;

    let result = h.platform.approve_event(&admin, event.id).await;

    assert_eq!(
        result,
        Err(NaksError::InvalidTransition {
            from: EventStatus::Live,
            decision: ModerationDecision::Approve,
        })
    );
    assert_eq!(h.audit_entries().len(), 1);
}

#[tokio::test]
async fn test_rejected_events_are_final() {
    let h = Harness::new();
    let organizer = h.organizer("org-1");
    let admin = h.admin("admin-1", 1);
    let event = h
        .platform
        .create_event(&organizer, EventDraft::new("Pop-up Market", EventCategory::Free))
        .await
        .unwrap();

    let rejected = h.platform.reject_event(&admin, event.id).await.unwrap();
    assert_eq!(rejected.status, EventStatus::Rejected);

    for decision in [ModerationDecision::Approve, ModerationDecision::TakeDown] {
        let result = h.platform.events.moderate(&admin, event.id, decision).await;
        assert!(matches!(result, Err(NaksError::InvalidTransition { .. })));
    }
    assert_eq!(h.audit_entries().len(), 1);
}

#[tokio::test]
async fn test_only_admins_moderate() {
    let h = Harness::new();
    let organizer = h.organizer("org-1");
    let event = h
        .platform
        .create_event(&organizer, EventDraft::new("Jazz Night", EventCategory::Nightlife))
        .await
        .unwrap();

    let result = h.platform.approve_event(&organizer, event.id).await;

    assert!(matches!(result, Err(NaksError::PermissionDenied(_))));
    assert_eq!(h.stored_event(&event).status, EventStatus::Pending);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_decisions_apply_once() {
    let h = Harness::new();
    let organizer = h.organizer("org-1");
    let first = h.admin("admin-1", 1);
    let second = h.admin("admin-2", 1);
    let event = h
        .platform
        .create_event(&organizer, EventDraft::new("Jazz Night", EventCategory::Nightlife))
        .await
        .unwrap();

    let approve = {
        let platform = h.platform.clone();
        tokio::spawn(async move { platform.approve_event(&first, event.id).await })
    };
    let reject = {
        let platform = h.platform.clone();
        tokio::spawn(async move { platform.reject_event(&second, event.id).await })
    };
    let outcomes = [approve.await.unwrap(), reject.await.unwrap()];

    let applied: Vec<_> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(applied.len(), 1, "exactly one decision wins: {outcomes:?}");
    for failure in outcomes.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(failure, NaksError::InvalidTransition { .. } | NaksError::Conflict(_)),
            "unexpected error {failure:?}"
        );
    }
    assert_eq!(h.stored_event(&event).status, applied[0].status);
    assert_eq!(h.audit_entries().len(), 1);
}

#[tokio::test]
async fn test_status_changed_after_read_is_a_conflict() {
    let h = Harness::new();
    let organizer = h.organizer("org-1");
    let admin = h.admin("admin-1", 1);
    let event = h
        .platform
        .create_event(&organizer, EventDraft::new("Jazz Night", EventCategory::Nightlife))
        .await
        .unwrap();
    let key = DocumentKey::new(h.collections.events.clone(), event.id.to_string());

    let mut rejected = h.store.document(&key).unwrap();
    rejected["status"] = json!("rejected");
    h.store.interleave_before_next_commit(key, rejected);

    let result = h.platform.approve_event(&admin, event.id).await;

    assert!(matches!(result, Err(NaksError::Conflict(_))), "got {result:?}");
    assert_eq!(h.stored_event(&event).status, EventStatus::Rejected);
    assert!(h.audit_entries().is_empty());
}

#[tokio::test]
async fn test_content_edit_after_read_is_retried() {
    let h = Harness::new();
    let organizer = h.organizer("org-1");
    let admin = h.admin("admin-1", 1);
    let event = h
        .platform
        .create_event(&organizer, EventDraft::new("Jazz Night", EventCategory::Nightlife))
        .await
        .unwrap();
    let key = DocumentKey::new(h.collections.events.clone(), event.id.to_string());

    let mut edited = h.store.document(&key).unwrap();
    edited["description"] = json!("Doors at eight");
    h.store.interleave_before_next_commit(key, edited);

    let approved = h.platform.approve_event(&admin, event.id).await.unwrap();

    assert_eq!(approved.status, EventStatus::Live);
    let stored = h.stored_event(&event);
    assert_eq!(stored.status, EventStatus::Live);
    assert_eq!(stored.description, "Doors at eight");
    assert_eq!(h.audit_entries().len(), 1);
}

#[tokio::test]
async fn test_audit_failure_keeps_the_decision() {
    let h = Harness::new();
    let organizer = h.organizer("org-1");
    let admin = h.admin("admin-1", 1);
    let event = h
        .platform
        .create_event(&organizer, EventDraft::new("Jazz Night", EventCategory::Nightlife))
        .await
        .unwrap();

    h.store.fail_collection(h.collections.audit_logs.clone());
    let approved = h.platform.approve_event(&admin, event.id).await.unwrap();

    assert_eq!(approved.status, EventStatus::Live);
    assert_eq!(h.stored_event(&event).status, EventStatus::Live);
    assert!(h.audit_entries().is_empty());
}

#[tokio::test]
async fn test_malformed_event_document_is_reported() {
    let h = Harness::new();
    let admin = h.admin("admin-1", 1);
    let event_id = naks_yetu::types::EventId::new();
    h.store.insert_raw(
        DocumentKey::new(h.collections.events.clone(), event_id.to_string()),
        serde_json::json!({ "id": event_id.to_string(), "name": "Broken", "status": "sold-out" }),
    );

    let result = h.platform.approve_event(&admin, event_id).await;

    assert!(matches!(result, Err(NaksError::MalformedDocument { .. })));
    assert!(h.audit_entries().is_empty());
}

#[tokio::test]
async fn test_oversold_event_document_is_reported() {
    let h = Harness::new();
    let organizer = h.organizer("org-1");
    let admin = h.admin("admin-1", 1);
    let event = h.live_event(&organizer, &admin, vec![tier("regular", 1_000, Some(5))]).await;
    let key = DocumentKey::new(h.collections.events.clone(), event.id.to_string());

    let mut corrupt = h.store.document(&key).unwrap();
    corrupt["ticketTypes"][0]["sold"] = json!(9);
    h.store.insert_raw(key.clone(), corrupt.clone());

    let result = h.platform.take_down_event(&admin, event.id).await;

    assert!(matches!(result, Err(NaksError::MalformedDocument { .. })), "got {result:?}");
    assert_eq!(h.store.document(&key), Some(corrupt));
    assert_eq!(h.audit_entries().len(), 1);
}

#[tokio::test]
async fn test_unknown_event_is_not_found() {
    let h = Harness::new();
    let admin = h.admin("admin-1", 1);

    let result = h.platform.approve_event(&admin, naks_yetu::types::EventId::new()).await;

    assert!(matches!(result, Err(NaksError::NotFound { kind: "event", .. })));
}

#[tokio::test]
async fn test_organizer_edits_are_not_audited() {
    let h = Harness::new();
    let organizer = h.organizer("org-1");
    let admin = h.admin("admin-1", 1);
    let event = h.live_event(&organizer, &admin, vec![]).await;
    let audited_before = h.audit_entries().len();

    let patch = EventPatch {
        description: Some("Now with a second stage".to_string()),
        ..EventPatch::default()
    };
    let edited = h.platform.edit_event(&organizer, event.id, patch.clone()).await.unwrap();
    assert_eq!(edited.description, "Now with a second stage");
    assert_eq!(edited.status, EventStatus::Live);
    assert_eq!(h.audit_entries().len(), audited_before);

    let again = h.platform.edit_event(&organizer, event.id, patch).await;
    assert!(matches!(again, Err(NaksError::NoChange(_))));
}

#[tokio::test]
async fn test_admin_edits_are_audited() {
    let h = Harness::new();
    let organizer = h.organizer("org-1");
    let admin = h.admin("admin-1", 1);
    let event = h.live_event(&organizer, &admin, vec![]).await;

    let patch = EventPatch {
        name: Some("Rooftop Sessions Vol. 2".to_string()),
        ..EventPatch::default()
    };
    h.platform.edit_event(&admin, event.id, patch).await.unwrap();

    let edits: Vec<_> = h
        .audit_entries()
        .into_iter()
        .filter(|entry| entry["action"] == "Event Edited")
        .collect();
    assert_eq!(edits.len(), 1);
}

#[tokio::test]
async fn test_other_organizers_cannot_edit() {
    let h = Harness::new();
    let owner = h.organizer("org-1");
    let other = h.organizer("org-2");
    let admin = h.admin("admin-1", 1);
    let event = h.live_event(&owner, &admin, vec![]).await;

    let patch = EventPatch {
        name: Some("Hijacked".to_string()),
        ..EventPatch::default()
    };
    let result = h.platform.edit_event(&other, event.id, patch).await;

    assert!(matches!(result, Err(NaksError::PermissionDenied(_))));
    assert_eq!(h.stored_event(&event).name, "Rooftop Sessions");
}

//! Administration integration tests.
//!
//! Role and status changes, profile redaction, the audit trail and
//! shortlinks, driven through the platform over the in-memory document store.
//!
//! Run with: `cargo test --test admin_integration_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

mod common;

use chrono::Duration;
use common::Harness;
use naks_yetu::aggregates::StatusChange;
use naks_yetu::collaborators::ShortlinkAnalytics;
use naks_yetu::permissions::ProfileView;
use naks_yetu::types::{AccountStatus, EventCategory, EventDraft, Role, UserId};
use naks_yetu::{AuditAction, AuditFilter, NaksError};
use naks_yetu_core::environment::Clock;

// ============================================================================
// Roles
// ============================================================================

#[tokio::test]
async fn test_promotion_to_admin_needs_level_three() {
    let h = Harness::new();
    let junior = h.admin("admin-2", 2);
    let senior = h.admin("admin-3", 3);
    h.user("u-1", Role::User, 0);

    let denied = h.platform.change_user_role(&junior, &UserId::new("u-1"), Role::Admin, false).await;
    assert!(matches!(denied, Err(NaksError::PermissionDenied(_))));
    assert_eq!(h.stored_profile("u-1").role, Role::User);
    assert!(h.audit_entries().is_empty());

    let promoted = h
        .platform
        .change_user_role(&senior, &UserId::new("u-1"), Role::Admin, false)
        .await
        .unwrap();
    assert_eq!(promoted.role, Role::Admin);
    assert_eq!(h.stored_profile("u-1").role, Role::Admin);

    let entries = h.audit_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["action"], "Role Change");
    assert_eq!(entries[0]["details"]["previousRole"], "user");
    assert_eq!(entries[0]["details"]["newRole"], "admin");
    assert!(h.email.sent().is_empty());
}

#[tokio::test]
async fn test_junior_admins_grant_other_roles() {
    let h = Harness::new();
    let junior = h.admin("admin-1", 1);
    h.user("u-1", Role::User, 0);

    let changed = h
        .platform
        .change_user_role(&junior, &UserId::new("u-1"), Role::Organizer, true)
        .await
        .unwrap();

    assert_eq!(changed.role, Role::Organizer);
    let sent = h.email.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to_email, "u-1@example.com");
}

#[tokio::test]
async fn test_unchanged_role_is_refused() {
    let h = Harness::new();
    let admin = h.admin("admin-3", 3);
    h.organizer("org-1");

    let result = h
        .platform
        .change_user_role(&admin, &UserId::new("org-1"), Role::Organizer, false)
        .await;

    assert!(matches!(result, Err(NaksError::NoChange(_))));
    assert!(h.audit_entries().is_empty());
}

#[tokio::test]
async fn test_callers_without_a_profile_cannot_act() {
    let h = Harness::new();
    h.user("u-1", Role::User, 0);
    let ghost = naks_yetu::types::Actor::new(UserId::new("ghost"));

    let result = h.platform.change_user_role(&ghost, &UserId::new("u-1"), Role::Organizer, false).await;

    assert!(matches!(result, Err(NaksError::PermissionDenied(_))));
}

// ============================================================================
// Account status
// ============================================================================

#[tokio::test]
async fn test_suspension_needs_a_future_end() {
    let h = Harness::new();
    let admin = h.admin("admin-1", 1);
    h.user("u-1", Role::User, 0);
    let now = h.clock.now();

    let past = StatusChange::suspend_until(now - Duration::hours(1));
    let error = h.platform.change_user_status(&admin, &UserId::new("u-1"), past).await.unwrap_err();
    assert_eq!(error.invalid_fields(), vec!["suspendedUntil"]);

    let missing = StatusChange::new(AccountStatus::Suspended);
    let error = h.platform.change_user_status(&admin, &UserId::new("u-1"), missing).await.unwrap_err();
    assert_eq!(error.invalid_fields(), vec!["suspendedUntil"]);

    assert_eq!(h.stored_profile("u-1").status, AccountStatus::Active);
    assert!(h.audit_entries().is_empty());
}

#[tokio::test]
async fn test_suspend_then_reactivate() {
    let h = Harness::new();
    let admin = h.admin("admin-1", 1);
    h.user("u-1", Role::User, 0);
    let until = h.clock.now() + Duration::days(7);

    let change = StatusChange::suspend_until(until).notifying(Some("Spam listings".to_string()));
    let suspended = h.platform.change_user_status(&admin, &UserId::new("u-1"), change).await.unwrap();
    assert_eq!(suspended.status, AccountStatus::Suspended);
    assert_eq!(suspended.suspended_until, Some(until));
    assert_eq!(h.email.sent().len(), 1);

    let entry = &h.audit_entries()[0];
    assert_eq!(entry["action"], "Status Change");
    assert_eq!(entry["details"]["newStatus"], "suspended");
    assert_eq!(entry["details"]["reason"], "Spam listings");

    let reactivated = h
        .platform
        .change_user_status(&admin, &UserId::new("u-1"), StatusChange::new(AccountStatus::Active))
        .await
        .unwrap();
    assert_eq!(reactivated.status, AccountStatus::Active);
    assert_eq!(h.stored_profile("u-1").suspended_until, None);
    assert_eq!(h.audit_entries().len(), 2);
}

#[tokio::test]
async fn test_suspended_admins_lose_their_powers() {
    let h = Harness::new();
    let mut profile = h.profile("admin-9", Role::Admin, 5);
    profile.status = AccountStatus::Banned;
    let banned = h.seed(profile);
    h.user("u-1", Role::User, 0);

    let result = h
        .platform
        .change_user_status(&banned, &UserId::new("u-1"), StatusChange::new(AccountStatus::Banned))
        .await;

    assert!(matches!(result, Err(NaksError::PermissionDenied(_))));
}

#[tokio::test]
async fn test_audit_failure_keeps_the_status_change() {
    let h = Harness::new();
    let admin = h.admin("admin-1", 1);
    h.user("u-1", Role::User, 0);
    h.store.fail_collection(h.collections.audit_logs.clone());

    let banned = h
        .platform
        .change_user_status(&admin, &UserId::new("u-1"), StatusChange::new(AccountStatus::Banned))
        .await
        .unwrap();

    assert_eq!(banned.status, AccountStatus::Banned);
    assert_eq!(h.stored_profile("u-1").status, AccountStatus::Banned);
    assert!(h.audit_entries().is_empty());
}

// ============================================================================
// Profiles
// ============================================================================

#[tokio::test]
async fn test_admin_profiles_are_redacted_below_level_four() {
    let h = Harness::new();
    let level_three = h.admin("admin-3", 3);
    let level_four = h.admin("admin-4", 4);
    let organizer = h.organizer("org-1");

    let redacted = h.platform.view_profile(&level_three, &UserId::new("admin-4")).await.unwrap();
    let ProfileView::Redacted(redacted) = redacted else {
        unreachable!("level 3 sees a redacted admin profile");
    };
    assert_eq!(redacted.display_name, "User admin-4");
    assert_eq!(redacted.badges, vec!["Administrator", "Protected Profile"]);

    let full = h.platform.view_profile(&level_four, &UserId::new("admin-3")).await.unwrap();
    assert!(matches!(full, ProfileView::Full(profile) if profile.admin_level == 3));

    let non_admin = h.platform.view_profile(&organizer, &UserId::new("org-1")).await.unwrap();
    assert!(matches!(non_admin, ProfileView::Full(_)));
}

// ============================================================================
// Audit trail
// ============================================================================

#[tokio::test]
async fn test_audit_trail_is_admin_only_and_newest_first() {
    let h = Harness::new();
    let admin = h.admin("admin-3", 3);
    let organizer = h.organizer("org-1");
    h.user("u-1", Role::User, 0);

    let event = h
        .platform
        .create_event(&organizer, EventDraft::new("Jazz Night", EventCategory::Nightlife))
        .await
        .unwrap();
    h.platform.approve_event(&admin, event.id).await.unwrap();
    h.clock.advance(Duration::minutes(5));
    h.platform
        .change_user_role(&admin, &UserId::new("u-1"), Role::Influencer, false)
        .await
        .unwrap();

    let trail = h.platform.audit_trail(&admin, &AuditFilter::new()).await.unwrap();
    let actions: Vec<_> = trail.iter().map(|entry| entry.action).collect();
    assert_eq!(actions, vec![AuditAction::RoleChange, AuditAction::EventApproved]);

    let roles_only = h
        .platform
        .audit_trail(&admin, &AuditFilter::new().with_action(AuditAction::RoleChange))
        .await
        .unwrap();
    assert_eq!(roles_only.len(), 1);
    assert_eq!(roles_only[0].target_id, "u-1");

    let denied = h.platform.audit_trail(&organizer, &AuditFilter::new()).await;
    assert!(matches!(denied, Err(NaksError::PermissionDenied(_))));
}

// ============================================================================
// Shortlinks
// ============================================================================

#[tokio::test]
async fn test_shortlinks_point_at_the_event_page() {
    let h = Harness::new();
    let organizer = h.organizer("org-1");
    let influencer = h.user("inf-1", Role::Influencer, 0);
    let attendee = h.user("u-1", Role::User, 0);
    let event = h
        .platform
        .create_event(&organizer, EventDraft::new("Jazz Night", EventCategory::Nightlife))
        .await
        .unwrap();

    let link = h
        .platform
        .create_shortlink(&influencer, event.id, Some("jazz".to_string()), None)
        .await
        .unwrap();
    assert_eq!(link.short_url, "https://naks.to/jazz");
    assert_eq!(h.links.destination("jazz"), Some(format!("/events/{}", event.id)));

    let taken = h
        .platform
        .create_shortlink(&organizer, event.id, Some("jazz".to_string()), None)
        .await;
    assert!(matches!(taken, Err(NaksError::Collaborator(_))));

    let malformed = h
        .platform
        .create_shortlink(&organizer, event.id, Some("jazz night!".to_string()), None)
        .await
        .unwrap_err();
    assert_eq!(malformed.invalid_fields(), vec!["customShortId"]);

    let denied = h.platform.create_shortlink(&attendee, event.id, None, None).await;
    assert!(matches!(denied, Err(NaksError::PermissionDenied(_))));

    h.links.set_analytics(
        "jazz",
        ShortlinkAnalytics {
            clicks: 42,
            recent_clicks: Vec::new(),
        },
    );
    let analytics = h.platform.shortlink_analytics(&influencer, "jazz").await.unwrap();
    assert_eq!(analytics.clicks, 42);
}

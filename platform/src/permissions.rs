//! Role and permission gate.
//!
//! Every role and admin-level check lives here. The predicates
//! ([`can_change_role`], [`can_view_full_profile`], ...) answer yes/no; the
//! `authorize_*` functions turn a request into `Ok(())` or the precise
//! [`NaksError`] the caller should see.

use crate::error::{NaksError, Result, ValidationErrors};
use crate::types::{AccountStatus, Event, Role, UserId, UserProfile};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Minimum admin level allowed to promote someone to admin.
pub const ROLE_PROMOTION_MIN_LEVEL: u8 = 3;

/// Minimum admin level allowed to see another admin's full profile.
pub const ADMIN_PROFILE_MIN_LEVEL: u8 = 4;

/// Badges shown on a redacted profile.
pub const REDACTED_BADGES: [&str; 2] = ["Administrator", "Protected Profile"];

/// May `actor` give `_target` the role `new_role`?
///
/// Only promotions to admin are restricted: the actor must itself be an
/// admin of level [`ROLE_PROMOTION_MIN_LEVEL`] or higher.
#[must_use]
pub fn can_change_role(actor: &UserProfile, _target: &UserProfile, new_role: Role) -> bool {
    new_role != Role::Admin || actor.effective_admin_level() >= ROLE_PROMOTION_MIN_LEVEL
}

/// May `actor` see `target`'s full profile?
#[must_use]
pub fn can_view_full_profile(actor: &UserProfile, target: &UserProfile) -> bool {
    !target.is_admin() || actor.effective_admin_level() >= ADMIN_PROFILE_MIN_LEVEL
}

/// May `actor` change anyone's account status?
#[must_use]
pub fn can_change_status(actor: &UserProfile) -> bool {
    actor.is_admin()
}

/// May `actor` approve, reject or take down events?
#[must_use]
pub fn can_moderate(actor: &UserProfile) -> bool {
    actor.is_admin()
}

/// May `actor` edit `event`'s content?
#[must_use]
pub fn can_edit_event(actor: &UserProfile, event: &Event) -> bool {
    actor.is_admin() || (actor.role == Role::Organizer && event.is_organized_by(&actor.id))
}

/// May `actor` submit new events?
#[must_use]
pub fn can_create_event(actor: &UserProfile) -> bool {
    matches!(actor.role, Role::Organizer | Role::Admin)
}

/// May `actor` see the sales of `organizer`'s events?
#[must_use]
pub fn can_view_sales(actor: &UserProfile, organizer: &UserId) -> bool {
    actor.is_admin() || &actor.id == organizer
}

/// May `actor` create shortlinks and read their analytics?
#[must_use]
pub fn can_manage_links(actor: &UserProfile) -> bool {
    matches!(actor.role, Role::Organizer | Role::Influencer | Role::Admin)
}

/// Suspended and banned accounts cannot act at all.
///
/// # Errors
///
/// `PermissionDenied` when the actor's account is not active.
pub fn ensure_active(actor: &UserProfile) -> Result<()> {
    if actor.is_active() {
        Ok(())
    } else {
        Err(NaksError::PermissionDenied(format!(
            "account {} is {}",
            actor.id, actor.status
        )))
    }
}

/// Full check for a role change from the admin console.
///
/// # Errors
///
/// - `PermissionDenied`: actor inactive, not an admin, or below the promotion level
/// - `NoChange`: the target already has `new_role`
pub fn authorize_role_change(
    actor: &UserProfile,
    target: &UserProfile,
    new_role: Role,
) -> Result<()> {
    ensure_active(actor)?;

    if !actor.is_admin() {
        return Err(NaksError::PermissionDenied(
            "only admins can change roles".to_string(),
        ));
    }

    if target.role == new_role {
        return Err(NaksError::NoChange(format!(
            "{} already has role {new_role}",
            target.id
        )));
    }

    if !can_change_role(actor, target, new_role) {
        return Err(NaksError::PermissionDenied(format!(
            "admin level {} cannot grant the admin role (requires {ROLE_PROMOTION_MIN_LEVEL})",
            actor.effective_admin_level()
        )));
    }

    Ok(())
}

/// Full check for an account status change.
///
/// Suspensions must carry an end strictly after `now`.
///
/// # Errors
///
/// - `PermissionDenied`: actor inactive or not an admin
/// - `NoChange`: the target already has `new_status`
/// - `Validation`: suspension without a future end
pub fn authorize_status_change(
    actor: &UserProfile,
    target: &UserProfile,
    new_status: AccountStatus,
    suspended_until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<()> {
    ensure_active(actor)?;

    if !can_change_status(actor) {
        return Err(NaksError::PermissionDenied(
            "only admins can change account status".to_string(),
        ));
    }

    if target.status == new_status {
        return Err(NaksError::NoChange(format!(
            "{} is already {new_status}",
            target.id
        )));
    }

    let mut errors = ValidationErrors::new();
    if new_status == AccountStatus::Suspended {
        match suspended_until {
            None => errors.push("suspendedUntil", "is required when suspending"),
            Some(end) if end <= now => errors.push("suspendedUntil", "must be in the future"),
            Some(_) => {},
        }
    }
    errors.into_result()
}

/// What a caller is allowed to see of a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum ProfileView {
    /// Everything
    Full(UserProfile),
    /// Display name plus fixed badges
    Redacted(RedactedProfile),
}

/// Profile of a protected admin as shown to lower-level viewers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactedProfile {
    /// Public display name
    pub display_name: String,
    /// Always [`REDACTED_BADGES`]
    pub badges: Vec<String>,
}

/// Build the view of `target` that `actor` is entitled to
#[must_use]
pub fn profile_view(actor: &UserProfile, target: &UserProfile) -> ProfileView {
    if can_view_full_profile(actor, target) {
        ProfileView::Full(target.clone())
    } else {
        ProfileView::Redacted(RedactedProfile {
            display_name: target.display_name.clone(),
            badges: REDACTED_BADGES.iter().map(ToString::to_string).collect(),
        })
    }
}

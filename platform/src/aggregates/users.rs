//! User administration aggregate: role and account status changes.
//!
//! Both commands are gated by [`crate::permissions`] and each applied change
//! appends one audit entry (`Role Change` / `Status Change`). The affected
//! user can optionally be told by email; a failed email is recorded but
//! never undoes the change.

use crate::audit::{AuditAction, AuditEntry, AuditLog, TargetType};
use crate::collaborators::{EmailMessage, EmailSender};
use crate::error::NaksError;
use crate::notifications;
use crate::permissions;
use crate::types::{AccountStatus, AuditEntryId, Role, UserId, UserProfile};
use chrono::{DateTime, Utc};
use naks_yetu_core::{
    SmallVec, async_effect, effect::Effect, environment::Clock, reducer::Reducer, smallvec,
};
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// State
// ============================================================================

/// Profiles involved in the current operation
#[derive(Debug, Clone, Default)]
pub struct UserAdminState {
    /// Loaded profiles (actor and target)
    pub users: HashMap<UserId, UserProfile>,
    /// Rejection of the last command
    pub last_error: Option<NaksError>,
    /// Audit entries whose append failed
    pub audit_failures: Vec<AuditEntryId>,
    /// Users whose notice email failed
    pub notification_failures: Vec<UserId>,
}

impl UserAdminState {
    /// State holding the given profiles
    #[must_use]
    pub fn with_users(users: impl IntoIterator<Item = UserProfile>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.id.clone(), u)).collect(),
            ..Self::default()
        }
    }

    /// Look up a loaded profile
    #[must_use]
    pub fn get(&self, id: &UserId) -> Option<&UserProfile> {
        self.users.get(id)
    }
}

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// A requested account status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    /// Status to set
    pub new_status: AccountStatus,
    /// End of the suspension; required when suspending
    pub suspended_until: Option<DateTime<Utc>>,
    /// Email the user about the change
    pub notify: bool,
    /// Reason included in the email
    pub reason: Option<String>,
}

impl StatusChange {
    /// Change to `new_status`, without notification
    #[must_use]
    pub const fn new(new_status: AccountStatus) -> Self {
        Self {
            new_status,
            suspended_until: None,
            notify: false,
            reason: None,
        }
    }

    /// Suspend until `until`
    #[must_use]
    pub const fn suspend_until(until: DateTime<Utc>) -> Self {
        Self {
            new_status: AccountStatus::Suspended,
            suspended_until: Some(until),
            notify: false,
            reason: None,
        }
    }

    /// Email the user, optionally with a reason
    #[must_use]
    pub fn notifying(mut self, reason: Option<String>) -> Self {
        self.notify = true;
        self.reason = reason;
        self
    }
}

/// Actions for the user administration aggregate
#[derive(Debug, Clone, PartialEq)]
pub enum UserAdminAction {
    // Commands
    /// Give a user a new role
    ChangeRole {
        /// Acting admin
        actor_id: UserId,
        /// Affected user
        target_id: UserId,
        /// Role to set
        new_role: Role,
        /// Email the user about the change
        notify: bool,
        /// Actor's device, for the audit trail
        user_agent: String,
    },
    /// Change a user's account status
    ChangeStatus {
        /// Acting admin
        actor_id: UserId,
        /// Affected user
        target_id: UserId,
        /// What to change
        change: StatusChange,
        /// Actor's device, for the audit trail
        user_agent: String,
    },

    // Events
    /// A role was changed
    RoleChanged {
        /// Affected user
        target_id: UserId,
        /// Role before
        from: Role,
        /// Role after
        to: Role,
    },
    /// An account status was changed
    StatusChanged {
        /// Affected user
        target_id: UserId,
        /// Status before
        from: AccountStatus,
        /// Status after
        to: AccountStatus,
        /// Suspension end, when suspended
        suspended_until: Option<DateTime<Utc>>,
    },
    /// A command was rejected
    ValidationFailed {
        /// Why
        error: NaksError,
    },
    /// An audit entry could not be written
    AuditAppendFailed {
        /// Entry that was lost
        entry_id: AuditEntryId,
        /// Store error
        error: String,
    },
    /// The notice email could not be sent
    NotificationFailed {
        /// Addressee
        user_id: UserId,
        /// Collaborator error
        error: String,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Dependencies of the user administration reducer
#[derive(Clone)]
pub struct UserAdminEnvironment {
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Audit trail
    pub audit: AuditLog,
    /// Notice delivery
    pub mailer: Arc<dyn EmailSender>,
}

// ============================================================================
// Reducer
// ============================================================================

/// User administration reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct UserAdminReducer;

impl UserAdminReducer {
    /// Create a reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn profiles<'a>(
        state: &'a UserAdminState,
        actor_id: &UserId,
        target_id: &UserId,
    ) -> Result<(&'a UserProfile, &'a UserProfile), NaksError> {
        let actor = state
            .get(actor_id)
            .ok_or_else(|| NaksError::not_found("user", actor_id))?;
        let target = state
            .get(target_id)
            .ok_or_else(|| NaksError::not_found("user", target_id))?;
        Ok((actor, target))
    }

    fn apply_event(state: &mut UserAdminState, action: &UserAdminAction) {
        match action {
            UserAdminAction::RoleChanged { target_id, to, .. } => {
                if let Some(user) = state.users.get_mut(target_id) {
                    user.role = *to;
                }
                state.last_error = None;
            },
            UserAdminAction::StatusChanged {
                target_id,
                to,
                suspended_until,
                ..
            } => {
                if let Some(user) = state.users.get_mut(target_id) {
                    user.status = *to;
                    user.suspended_until = if *to == AccountStatus::Suspended {
                        *suspended_until
                    } else {
                        None
                    };
                }
                state.last_error = None;
            },
            UserAdminAction::ValidationFailed { error } => state.last_error = Some(error.clone()),
            UserAdminAction::AuditAppendFailed { entry_id, .. } => {
                state.audit_failures.push(*entry_id);
            },
            UserAdminAction::NotificationFailed { user_id, .. } => {
                state.notification_failures.push(user_id.clone());
            },
            UserAdminAction::ChangeRole { .. } | UserAdminAction::ChangeStatus { .. } => {},
        }
    }

    fn audit_failed(entry_id: AuditEntryId, error: String) -> UserAdminAction {
        UserAdminAction::AuditAppendFailed { entry_id, error }
    }

    fn notify(mailer: &Arc<dyn EmailSender>, user_id: UserId, message: EmailMessage) -> Effect<UserAdminAction> {
        let mailer = Arc::clone(mailer);
        async_effect! {
            match mailer.send(message).await {
                Ok(()) => None,
                Err(error) => Some(UserAdminAction::NotificationFailed {
                    user_id,
                    error: error.to_string(),
                }),
            }
        }
    }
}

impl Reducer for UserAdminReducer {
    type State = UserAdminState;
    type Action = UserAdminAction;
    type Environment = UserAdminEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            UserAdminAction::ChangeRole {
                actor_id,
                target_id,
                new_role,
                notify,
                user_agent,
            } => {
                let checked = Self::profiles(state, &actor_id, &target_id).and_then(|(actor, target)| {
                    permissions::authorize_role_change(actor, target, new_role)
                        .map(|()| (actor.clone(), target.role))
                });
                let (actor, from) = match checked {
                    Ok(checked) => checked,
                    Err(error) => {
                        tracing::warn!(%actor_id, %target_id, %new_role, %error, "Role change rejected");
                        Self::apply_event(state, &UserAdminAction::ValidationFailed { error });
                        return SmallVec::new();
                    },
                };

                Self::apply_event(
                    state,
                    &UserAdminAction::RoleChanged {
                        target_id: target_id.clone(),
                        from,
                        to: new_role,
                    },
                );

                let Some(target) = state.get(&target_id).cloned() else {
                    return SmallVec::new();
                };
                let entry = AuditEntry::new(
                    AuditEntryId::new(),
                    AuditAction::RoleChange,
                    actor.id,
                    actor.display_name,
                    env.clock.now(),
                )
                .with_target(TargetType::User, &target.id, target.display_name.clone())
                .with_user_agent(user_agent)
                .with_detail("previousRole", from.to_string())
                .with_detail("newRole", new_role.to_string());

                let mut effects = smallvec![env.audit.append(&entry, Self::audit_failed)];
                if notify {
                    let message = notifications::role_change_notice(&target, new_role);
                    effects.push(Self::notify(&env.mailer, target.id, message));
                }
                effects
            },

            UserAdminAction::ChangeStatus {
                actor_id,
                target_id,
                change,
                user_agent,
            } => {
                let now = env.clock.now();
                let checked = Self::profiles(state, &actor_id, &target_id).and_then(|(actor, target)| {
                    permissions::authorize_status_change(
                        actor,
                        target,
                        change.new_status,
                        change.suspended_until,
                        now,
                    )
                    .map(|()| (actor.clone(), target.status))
                });
                let (actor, from) = match checked {
                    Ok(checked) => checked,
                    Err(error) => {
                        tracing::warn!(%actor_id, %target_id, %error, "Status change rejected");
                        Self::apply_event(state, &UserAdminAction::ValidationFailed { error });
                        return SmallVec::new();
                    },
                };

                Self::apply_event(
                    state,
                    &UserAdminAction::StatusChanged {
                        target_id: target_id.clone(),
                        from,
                        to: change.new_status,
                        suspended_until: change.suspended_until,
                    },
                );

                let Some(target) = state.get(&target_id).cloned() else {
                    return SmallVec::new();
                };
                let mut entry = AuditEntry::new(
                    AuditEntryId::new(),
                    AuditAction::StatusChange,
                    actor.id,
                    actor.display_name,
                    now,
                )
                .with_target(TargetType::User, &target.id, target.display_name.clone())
                .with_user_agent(user_agent)
                .with_detail("previousStatus", from.to_string())
                .with_detail("newStatus", change.new_status.to_string())
                .with_detail("notified", change.notify);
                if let Some(until) = target.suspended_until {
                    entry = entry.with_detail("suspendedUntil", until.to_rfc3339());
                }
                if let Some(reason) = change.reason.as_deref().filter(|r| !r.trim().is_empty()) {
                    entry = entry.with_detail("reason", reason);
                }

                let mut effects = smallvec![env.audit.append(&entry, Self::audit_failed)];
                if change.notify {
                    let message = notifications::status_change_notice(
                        &target,
                        change.new_status,
                        target.suspended_until,
                        change.reason.as_deref(),
                    );
                    effects.push(Self::notify(&env.mailer, target.id, message));
                }
                effects
            },

            // ========== Events ==========
            event => {
                Self::apply_event(state, &event);
                SmallVec::new()
            },
        }
    }
}

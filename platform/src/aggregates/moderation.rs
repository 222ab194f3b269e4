//! Moderation aggregate: event creation, admin decisions and content edits.
//!
//! Status moves only along three edges:
//!
//! | from      | decision  | to       | audit label        |
//! |-----------|-----------|----------|--------------------|
//! | pending   | approve   | live     | `Event Approved`   |
//! | pending   | reject    | rejected | `Event Rejected`   |
//! | live      | take down | archived | `Event Taken Down` |
//!
//! Every other request is an `InvalidTransition` and leaves the record
//! untouched. Each applied decision emits exactly one audit append effect.

use crate::audit::{AuditAction, AuditEntry, AuditLog, TargetType};
use crate::error::{NaksError, Result, ValidationErrors};
use crate::permissions;
use crate::types::{
    AuditEntryId, Event, EventDraft, EventId, EventPatch, EventStatus,
    ModerationDecision, UserProfile,
};
use chrono::{DateTime, Utc};
use naks_yetu_core::{
    SmallVec, effect::Effect, environment::Clock, reducer::Reducer, smallvec,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

// ============================================================================
// State
// ============================================================================

/// Events the current operation works on
#[derive(Debug, Clone, Default)]
pub struct ModerationState {
    /// Loaded events
    pub events: HashMap<EventId, Event>,
    /// Rejection of the last command, if it was rejected
    pub last_error: Option<NaksError>,
    /// Audit entries whose append failed
    pub audit_failures: Vec<AuditEntryId>,
}

impl ModerationState {
    /// Empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State holding one loaded event
    #[must_use]
    pub fn with_event(event: Event) -> Self {
        let mut state = Self::default();
        state.events.insert(event.id, event);
        state
    }

    /// Look up a loaded event
    #[must_use]
    pub fn get(&self, event_id: &EventId) -> Option<&Event> {
        self.events.get(event_id)
    }
}

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the moderation aggregate
#[derive(Debug, Clone, PartialEq)]
pub enum ModerationAction {
    // Commands
    /// An organizer submits a new event
    CreateEvent {
        /// Identifier for the new event
        event_id: EventId,
        /// Submitting organizer
        organizer: UserProfile,
        /// Event content
        draft: EventDraft,
    },

    /// An admin approves, rejects or takes down an event
    Moderate {
        /// Target event
        event_id: EventId,
        /// Requested decision
        decision: ModerationDecision,
        /// Acting admin
        admin: UserProfile,
        /// Admin's device, for the audit trail
        user_agent: String,
    },

    /// An admin or the owning organizer edits event content
    EditEvent {
        /// Target event
        event_id: EventId,
        /// Fields to change
        patch: EventPatch,
        /// Acting user
        editor: UserProfile,
        /// Editor's device, for the audit trail
        user_agent: String,
    },

    // Events
    /// A new event was submitted
    EventCreated {
        /// The event, in `pending`
        event: Event,
    },

    /// A moderation decision was applied
    StatusChanged {
        /// Target event
        event_id: EventId,
        /// Status before
        from: EventStatus,
        /// Status after
        to: EventStatus,
        /// When
        at: DateTime<Utc>,
    },

    /// Event content changed
    EventEdited {
        /// Target event
        event_id: EventId,
        /// Applied patch
        patch: EventPatch,
        /// Fields that actually changed
        changed_fields: Vec<String>,
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
}

// ============================================================================
// Environment
// ============================================================================

/// Dependencies of the moderation reducer
#[derive(Clone)]
pub struct ModerationEnvironment {
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Audit trail
    pub audit: AuditLog,
}

impl ModerationEnvironment {
    /// Create an environment
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, audit: AuditLog) -> Self {
        Self { clock, audit }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Moderation reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct ModerationReducer;

impl ModerationReducer {
    /// Create a reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn validate_draft(organizer: &UserProfile, draft: &EventDraft) -> Result<()> {
        permissions::ensure_active(organizer)?;
        if !permissions::can_create_event(organizer) {
            return Err(NaksError::PermissionDenied(
                "only organizers can create events".to_string(),
            ));
        }

        let mut errors = ValidationErrors::new();
        if draft.name.trim().is_empty() {
            errors.push("name", "is required");
        }
        if !draft.ticket_types.is_empty() && !draft.category.sells_tickets() {
            errors.push("ticketTypes", "only ticketed events can sell tickets");
        }

        let mut keys = HashSet::new();
        for ticket_type in &draft.ticket_types {
            if ticket_type.key.as_str().trim().is_empty() {
                errors.push("ticketTypes", "every ticket type needs a key");
            } else if !keys.insert(ticket_type.key.clone()) {
                errors.push("ticketTypes", format!("duplicate key {}", ticket_type.key));
            }
            if ticket_type.sold != 0 {
                errors.push("ticketTypes", format!("{} cannot start with sales", ticket_type.key));
            }
        }

        if draft.rsvp_config.as_ref().is_some_and(|c| c.confirmed != 0) {
            errors.push("rsvpConfig", "cannot start with confirmed RSVPs");
        }

        errors.into_result()
    }

    fn validate_moderation(
        state: &ModerationState,
        event_id: &EventId,
        decision: ModerationDecision,
        admin: &UserProfile,
    ) -> Result<(EventStatus, EventStatus)> {
        permissions::ensure_active(admin)?;
        if !permissions::can_moderate(admin) {
            return Err(NaksError::PermissionDenied(
                "only admins can moderate events".to_string(),
            ));
        }

        let event = state
            .get(event_id)
            .ok_or_else(|| NaksError::not_found("event", event_id))?;

        event
            .status
            .apply(decision)
            .map(|to| (event.status, to))
            .ok_or(NaksError::InvalidTransition {
                from: event.status,
                decision,
            })
    }

    fn validate_edit(
        state: &ModerationState,
        event_id: &EventId,
        patch: &EventPatch,
        editor: &UserProfile,
    ) -> Result<Vec<&'static str>> {
        permissions::ensure_active(editor)?;

        let event = state
            .get(event_id)
            .ok_or_else(|| NaksError::not_found("event", event_id))?;

        if !permissions::can_edit_event(editor, event) {
            return Err(NaksError::PermissionDenied(
                "only admins and the event's organizer can edit it".to_string(),
            ));
        }

        let changed = patch.changed_fields(event);
        if changed.is_empty() {
            return Err(NaksError::NoChange("the patch changes nothing".to_string()));
        }

        let mut errors = ValidationErrors::new();
        if patch.name.as_ref().is_some_and(|name| name.trim().is_empty()) {
            errors.push("name", "cannot be blank");
        }
        if patch
            .category
            .is_some_and(|category| !category.sells_tickets() && !event.ticket_types.is_empty())
        {
            errors.push("category", "an event with ticket types must stay ticketed");
        }
        if patch
            .gallery
            .iter()
            .flatten()
            .any(|url| !(url.starts_with("https://") || url.starts_with("http://")))
        {
            errors.push("gallery", "every entry must be an http(s) URL");
        }
        errors.into_result()?;

        Ok(changed)
    }

    fn apply_event(state: &mut ModerationState, action: &ModerationAction) {
        match action {
            ModerationAction::EventCreated { event } => {
                state.events.insert(event.id, event.clone());
                state.last_error = None;
            },
            ModerationAction::StatusChanged { event_id, to, .. } => {
                if let Some(event) = state.events.get_mut(event_id) {
                    event.status = *to;
                }
                state.last_error = None;
            },
            ModerationAction::EventEdited {
                event_id, patch, ..
            } => {
                if let Some(event) = state.events.get_mut(event_id) {
                    patch.apply_to(event);
                }
                state.last_error = None;
            },
            ModerationAction::ValidationFailed { error } => {
                state.last_error = Some(error.clone());
            },
            ModerationAction::AuditAppendFailed { entry_id, .. } => {
                state.audit_failures.push(*entry_id);
            },
            ModerationAction::CreateEvent { .. }
            | ModerationAction::Moderate { .. }
            | ModerationAction::EditEvent { .. } => {},
        }
    }

    fn audit_failed(entry_id: AuditEntryId, error: String) -> ModerationAction {
        ModerationAction::AuditAppendFailed { entry_id, error }
    }
}

const fn audit_action(decision: ModerationDecision) -> AuditAction {
    match decision {
        ModerationDecision::Approve => AuditAction::EventApproved,
        ModerationDecision::Reject => AuditAction::EventRejected,
        ModerationDecision::TakeDown => AuditAction::EventTakenDown,
    }
}

impl Reducer for ModerationReducer {
    type State = ModerationState;
    type Action = ModerationAction;
    type Environment = ModerationEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            ModerationAction::CreateEvent {
                event_id,
                organizer,
                draft,
            } => {
                if let Err(error) = Self::validate_draft(&organizer, &draft) {
                    Self::apply_event(state, &ModerationAction::ValidationFailed { error });
                    return SmallVec::new();
                }

                let event = Event {
                    id: event_id,
                    name: draft.name,
                    description: draft.description,
                    category: draft.category,
                    organizer_id: organizer.id,
                    status: EventStatus::Pending,
                    created_at: env.clock.now(),
                    ticket_types: draft.ticket_types,
                    rsvp_config: draft.rsvp_config,
                    gallery: draft.gallery,
                    sponsors: draft.sponsors,
                    refund_policy: draft.refund_policy,
                    requires_payment: draft.requires_payment,
                };
                Self::apply_event(state, &ModerationAction::EventCreated { event });
                SmallVec::new()
            },

            ModerationAction::Moderate {
                event_id,
                decision,
                admin,
                user_agent,
            } => {
                let (from, to) =
                    match Self::validate_moderation(state, &event_id, decision, &admin) {
                        Ok(edge) => edge,
                        Err(error) => {
                            tracing::warn!(%event_id, %decision, %error, "Moderation rejected");
                            Self::apply_event(state, &ModerationAction::ValidationFailed { error });
                            return SmallVec::new();
                        },
                    };

                let now = env.clock.now();
                Self::apply_event(
                    state,
                    &ModerationAction::StatusChanged {
                        event_id,
                        from,
                        to,
                        at: now,
                    },
                );

                let event_name = state.get(&event_id).map(|e| e.name.clone()).unwrap_or_default();
                let entry = AuditEntry::new(
                    AuditEntryId::new(),
                    audit_action(decision),
                    admin.id,
                    admin.display_name,
                    now,
                )
                .with_target(TargetType::Event, event_id, event_name)
                .with_user_agent(user_agent)
                .with_detail("previousStatus", from.to_string())
                .with_detail("newStatus", to.to_string());

                smallvec![env.audit.append(&entry, Self::audit_failed)]
            },

            ModerationAction::EditEvent {
                event_id,
                patch,
                editor,
                user_agent,
            } => {
                let changed = match Self::validate_edit(state, &event_id, &patch, &editor) {
                    Ok(changed) => changed,
                    Err(error) => {
                        Self::apply_event(state, &ModerationAction::ValidationFailed { error });
                        return SmallVec::new();
                    },
                };
                let changed_fields: Vec<String> = changed.iter().map(ToString::to_string).collect();

                Self::apply_event(
                    state,
                    &ModerationAction::EventEdited {
                        event_id,
                        patch,
                        changed_fields: changed_fields.clone(),
                    },
                );

                // Organizers editing their own events are not audited
                if !editor.is_admin() {
                    return SmallVec::new();
                }

                let event_name = state.get(&event_id).map(|e| e.name.clone()).unwrap_or_default();
                let entry = AuditEntry::new(
                    AuditEntryId::new(),
                    AuditAction::EventEdited,
                    editor.id,
                    editor.display_name,
                    env.clock.now(),
                )
                .with_target(TargetType::Event, event_id, event_name)
                .with_user_agent(user_agent)
                .with_detail("changedFields", changed_fields);

                smallvec![env.audit.append(&entry, Self::audit_failed)]
            },

            // ========== Events ==========
            event => {
                Self::apply_event(state, &event);
                SmallVec::new()
            },
        }
    }
}

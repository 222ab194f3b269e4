//! Aggregate services: command handlers that load, decide, commit and settle.
//!
//! Every mutating operation follows the same cycle:
//! 1. Load the documents it touches (decoded, with their revisions)
//! 2. Run the reducer; a rejected command returns its error, nothing is written
//! 3. Commit the new records in one atomic batch guarded by the revisions read
//! 4. Settle the effects (audit appends, emails) against the committed state
//!
//! A commit that loses a revision race is retried from step 1 with bounded
//! exponential backoff. Effects of a lost attempt are dropped unexecuted.

use super::documents::{Attempt, Documents};
use crate::aggregates::inventory::{self, AvailabilityLabel};
use crate::aggregates::{
    CheckoutAction, CheckoutEnvironment, CheckoutReducer, CheckoutState, ModerationAction,
    ModerationEnvironment, ModerationReducer, ModerationState, RsvpAction, RsvpEnvironment,
    RsvpReducer, RsvpState, StatusChange, UserAdminAction, UserAdminEnvironment, UserAdminReducer,
    UserAdminState,
};
use crate::audit::{self, AuditLog};
use crate::collaborators::EmailSender;
use crate::error::{NaksError, Result};
use crate::metrics;
use crate::permissions::{self, ProfileView};
use crate::types::{
    Actor, AttendeeInfo, Buyer, Event, EventDraft, EventId, EventPatch, EventStatus,
    ModerationDecision, Order, OrderId, Role, Rsvp, RsvpId, Selection, TicketKey, UserId,
    UserProfile,
};
use naks_yetu_core::SmallVec;
use naks_yetu_core::effect::Effect;
use naks_yetu_core::environment::Clock;
use naks_yetu_core::reducer::Reducer;
use naks_yetu_runtime::retry::{RetryPolicy, retry_with_predicate};
use naks_yetu_runtime::{DEFAULT_MAX_FEEDBACK_ROUNDS, settle};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

type Effects<A> = SmallVec<[Effect<A>; 4]>;

/// Settle `effects`, logging (not failing) when they never quiesce: the
/// mutation they follow is already committed.
async fn settle_committed<R>(reducer: &R, state: &mut R::State, effects: Effects<R::Action>, env: &R::Environment)
where
    R: Reducer,
    R::Action: Send + 'static,
{
    if let Err(error) = settle(reducer, state, effects, env, DEFAULT_MAX_FEEDBACK_ROUNDS).await {
        tracing::error!(%error, "Effects did not settle after commit");
    }
}

// ============================================================================
// Events: creation, moderation, edits
// ============================================================================

/// Event listing service
pub struct EventService {
    documents: Documents,
    reducer: ModerationReducer,
    env: ModerationEnvironment,
    retry: RetryPolicy,
}

impl EventService {
    /// Create a new event service
    #[must_use]
    pub fn new(documents: Documents, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        let audit = AuditLog::new(
            Arc::clone(documents.store()),
            documents.collections().audit_logs.clone(),
        );
        Self {
            documents,
            reducer: ModerationReducer::new(),
            env: ModerationEnvironment::new(clock, audit),
            retry,
        }
    }

    /// Submit a new event for moderation. It starts `pending`.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for non-organizers, `Validation` for a bad draft.
    #[tracing::instrument(skip(self, actor, draft), fields(actor_id = %actor.user_id))]
    pub async fn create_event(&self, actor: &Actor, draft: EventDraft) -> Result<Event> {
        let organizer = self.documents.actor(actor).await?;
        let event_id = EventId::new();

        let mut state = ModerationState::new();
        let effects = self.reducer.reduce(
            &mut state,
            ModerationAction::CreateEvent {
                event_id,
                organizer,
                draft,
            },
            &self.env,
        );
        if let Some(error) = state.last_error.take() {
            tracing::warn!(%error, "Event submission rejected");
            return Err(error);
        }

        let created = state
            .get(&event_id)
            .ok_or_else(|| NaksError::not_found("event", event_id))?;
        let write = Documents::create(self.documents.event_key(&event_id), created)?;
        self.documents.commit(vec![write]).await?;

        settle_committed(&self.reducer, &mut state, effects, &self.env).await;
        let event = state
            .events
            .remove(&event_id)
            .ok_or_else(|| NaksError::not_found("event", event_id))?;

        tracing::info!(%event_id, name = %event.name, "Event submitted for moderation");
        Ok(event)
    }

    /// Approve a pending event (`pending → live`).
    ///
    /// # Errors
    ///
    /// See [`EventService::moderate`].
    pub async fn approve_event(&self, actor: &Actor, event_id: EventId) -> Result<Event> {
        self.moderate(actor, event_id, ModerationDecision::Approve).await
    }

    /// Reject a pending event (`pending → rejected`).
    ///
    /// # Errors
    ///
    /// See [`EventService::moderate`].
    pub async fn reject_event(&self, actor: &Actor, event_id: EventId) -> Result<Event> {
        self.moderate(actor, event_id, ModerationDecision::Reject).await
    }

    /// Take a live event down (`live → archived`).
    ///
    /// # Errors
    ///
    /// See [`EventService::moderate`].
    pub async fn take_down_event(&self, actor: &Actor, event_id: EventId) -> Result<Event> {
        self.moderate(actor, event_id, ModerationDecision::TakeDown).await
    }

    /// Apply a moderation decision and append its audit entry.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied`: the actor is not an active admin
    /// - `NotFound`: no such event
    /// - `InvalidTransition`: the decision is not legal from the current status
    /// - `Conflict`: another admin changed the status concurrently
    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.user_id))]
    pub async fn moderate(
        &self,
        actor: &Actor,
        event_id: EventId,
        decision: ModerationDecision,
    ) -> Result<Event> {
        let admin = self.documents.actor(actor).await?;
        let action = ModerationAction::Moderate {
            event_id,
            decision,
            admin,
            user_agent: actor.user_agent.clone(),
        };

        let event = self.apply(event_id, action, true).await?;
        metrics::record_moderation_transition(decision);
        tracing::info!(%event_id, %decision, status = %event.status, "Moderation decision applied");
        Ok(event)
    }

    /// Patch an event's content.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied`: neither an admin nor the owning organizer
    /// - `NotFound`: no such event
    /// - `NoChange`: the patch changes nothing
    /// - `Validation`: a patched field is invalid (nothing is applied)
    #[tracing::instrument(skip(self, actor, patch), fields(actor_id = %actor.user_id))]
    pub async fn edit_event(&self, actor: &Actor, event_id: EventId, patch: EventPatch) -> Result<Event> {
        let editor = self.documents.actor(actor).await?;
        let action = ModerationAction::EditEvent {
            event_id,
            patch,
            editor,
            user_agent: actor.user_agent.clone(),
        };

        let event = self.apply(event_id, action, false).await?;
        tracing::info!(%event_id, "Event edited");
        Ok(event)
    }

    /// Run `action` against the stored event with optimistic retries.
    ///
    /// With `status_guard`, a lost race against a status change is final
    /// (`Conflict`); any other concurrent write is retried.
    async fn apply(&self, event_id: EventId, action: ModerationAction, status_guard: bool) -> Result<Event> {
        let (mut state, effects) = retry_with_predicate(
            &self.retry,
            || self.attempt(event_id, action.clone(), status_guard),
            Attempt::is_stale,
        )
        .await
        .map_err(Attempt::into_error)?;

        settle_committed(&self.reducer, &mut state, effects, &self.env).await;
        for entry_id in &state.audit_failures {
            audit::report_append_failure(*entry_id);
        }

        state
            .events
            .remove(&event_id)
            .ok_or_else(|| NaksError::not_found("event", event_id))
    }

    async fn attempt(
        &self,
        event_id: EventId,
        action: ModerationAction,
        status_guard: bool,
    ) -> std::result::Result<(ModerationState, Effects<ModerationAction>), Attempt> {
        let loaded = self.documents.event(&event_id).await?;
        let read_status = loaded.record.status;

        let mut state = ModerationState::with_event(loaded.record);
        let effects = self.reducer.reduce(&mut state, action, &self.env);
        if let Some(error) = state.last_error.take() {
            return Err(Attempt::Fatal(error));
        }

        let event = state
            .get(&event_id)
            .ok_or_else(|| NaksError::not_found("event", event_id))?;
        let write = Documents::replace(self.documents.event_key(&event_id), loaded.revision, event)?;

        match self.documents.commit(vec![write]).await {
            Ok(_) => Ok((state, effects)),
            Err(error) if error.is_conflict() && status_guard => {
                Err(self.status_conflict(event_id, read_status).await)
            },
            Err(error) => Err(Attempt::from_commit(error)),
        }
    }

    async fn status_conflict(&self, event_id: EventId, read_status: EventStatus) -> Attempt {
        match self.documents.event(&event_id).await {
            Ok(current) if current.record.status != read_status => {
                tracing::warn!(%event_id, from = %read_status, now = %current.record.status, "Status changed concurrently");
                Attempt::Fatal(NaksError::Conflict(format!(
                    "event {event_id} changed from {read_status} to {} concurrently",
                    current.record.status
                )))
            },
            Ok(_) => Attempt::Stale(NaksError::Conflict(format!("event {event_id} changed concurrently"))),
            Err(error) => Attempt::Fatal(error),
        }
    }
}

// ============================================================================
// Checkout
// ============================================================================

/// Ticket inventory and checkout service
pub struct CheckoutService {
    documents: Documents,
    reducer: CheckoutReducer,
    env: CheckoutEnvironment,
    retry: RetryPolicy,
}

impl CheckoutService {
    /// Create a new checkout service
    #[must_use]
    pub fn new(
        documents: Documents,
        clock: Arc<dyn Clock>,
        mailer: Arc<dyn EmailSender>,
        site_base_url: String,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            documents,
            reducer: CheckoutReducer::new(),
            env: CheckoutEnvironment {
                clock,
                mailer,
                site_base_url,
            },
            retry,
        }
    }

    /// Current event record
    ///
    /// # Errors
    ///
    /// `NotFound` / `MalformedDocument` / `Storage`.
    pub async fn event(&self, event_id: EventId) -> Result<Event> {
        Ok(self.documents.event(&event_id).await?.record)
    }

    /// Availability label of every ticket type, in event order
    ///
    /// # Errors
    ///
    /// As [`CheckoutService::event`].
    pub async fn availability(&self, event_id: EventId) -> Result<Vec<(TicketKey, AvailabilityLabel)>> {
        let event = self.event(event_id).await?;
        Ok(event
            .ticket_types
            .iter()
            .map(|t| (t.key.clone(), inventory::availability_label(t)))
            .collect())
    }

    /// Change `selection` by `delta` tickets of `ticket_type` against the
    /// stored inventory. Nothing is persisted.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown ticket type, `CapacityExceeded` past the
    /// remaining quantity.
    pub async fn reserve_tickets(
        &self,
        event_id: EventId,
        selection: &Selection,
        ticket_type: &TicketKey,
        delta: i64,
    ) -> Result<Selection> {
        let event = self.event(event_id).await?;
        let quantity = inventory::validate_reserve(&event, selection, ticket_type, delta)?;

        let mut next = selection.clone();
        next.set(ticket_type.clone(), quantity);
        Ok(next)
    }

    /// Buy every ticket in `selection` or none of them.
    ///
    /// Inventory counters and the order are committed together, guarded by
    /// the event's revision; lost races are retried on fresh inventory.
    ///
    /// # Errors
    ///
    /// - `Validation`: empty selection, event not live, off-sale ticket type
    /// - `NotFound`: unknown event or ticket type
    /// - `CapacityExceeded`: some line exceeds what is left
    /// - `Conflict`: still losing races after every retry
    #[tracing::instrument(skip(self, actor, selection))]
    pub async fn checkout(&self, actor: Option<&Actor>, event_id: EventId, selection: Selection) -> Result<Order> {
        let (buyer, buyer_email) = match actor {
            Some(actor) => {
                let email = match self.documents.user(&actor.user_id).await {
                    Ok(profile) => Some(profile.record.email),
                    Err(NaksError::NotFound { .. }) => None,
                    Err(error) => return Err(error),
                };
                (Buyer::User(actor.user_id.clone()), email)
            },
            None => (Buyer::Unauthenticated, None),
        };
        let order_id = OrderId::new();
        let attempts = AtomicU32::new(0);

        let result = retry_with_predicate(
            &self.retry,
            || {
                attempts.fetch_add(1, Ordering::Relaxed);
                self.attempt(event_id, order_id, buyer.clone(), buyer_email.clone(), selection.clone())
            },
            Attempt::is_stale,
        )
        .await;

        let (mut state, effects) = match result {
            Ok(committed) => committed,
            Err(attempt) => {
                let error = attempt.into_error();
                if error.is_user_error() {
                    metrics::record_checkout_rejected();
                    tracing::warn!(%event_id, %error, "Checkout rejected");
                } else {
                    metrics::record_checkout_failed();
                    tracing::error!(%event_id, %error, "Checkout failed");
                }
                return Err(error);
            },
        };

        settle_committed(&self.reducer, &mut state, effects, &self.env).await;
        for failed in &state.notification_failures {
            tracing::warn!(order_id = %failed, "Order confirmation email not delivered");
        }

        let order = state
            .order
            .ok_or_else(|| NaksError::not_found("order", order_id))?;
        let attempts = attempts.load(Ordering::Relaxed);
        metrics::record_checkout_completed(order.ticket_count(), order.total_amount, attempts);
        tracing::info!(
            %event_id,
            %order_id,
            tickets = order.ticket_count(),
            total = %order.total_amount,
            attempts,
            "Checkout completed"
        );
        Ok(order)
    }

    async fn attempt(
        &self,
        event_id: EventId,
        order_id: OrderId,
        buyer: Buyer,
        buyer_email: Option<String>,
        selection: Selection,
    ) -> std::result::Result<(CheckoutState, Effects<CheckoutAction>), Attempt> {
        let loaded = self.documents.event(&event_id).await?;

        let mut state = CheckoutState::new(loaded.record);
        let effects = self.reducer.reduce(
            &mut state,
            CheckoutAction::Checkout {
                order_id,
                buyer,
                buyer_email,
                selection,
            },
            &self.env,
        );
        if let Some(error) = state.last_error.clone() {
            return Err(Attempt::Fatal(error));
        }

        let (Some(event), Some(order)) = (state.event.as_ref(), state.order.as_ref()) else {
            return Err(Attempt::Fatal(NaksError::not_found("order", order_id)));
        };
        let writes = vec![
            Documents::replace(self.documents.event_key(&event_id), loaded.revision, event)?,
            Documents::create(self.documents.order_key(&order.id), order)?,
        ];

        match self.documents.commit(writes).await {
            Ok(_) => Ok((state, effects)),
            Err(error) => {
                let attempt = Attempt::from_commit(error);
                if attempt.is_stale() {
                    metrics::record_checkout_conflict();
                    tracing::debug!(%event_id, %order_id, "Checkout lost a revision race");
                }
                Err(attempt)
            },
        }
    }
}

// ============================================================================
// RSVPs
// ============================================================================

/// RSVP service
pub struct RsvpService {
    documents: Documents,
    reducer: RsvpReducer,
    env: RsvpEnvironment,
    retry: RetryPolicy,
}

impl RsvpService {
    /// Create a new RSVP service
    #[must_use]
    pub fn new(documents: Documents, clock: Arc<dyn Clock>, mailer: Arc<dyn EmailSender>, retry: RetryPolicy) -> Self {
        Self {
            documents,
            reducer: RsvpReducer::new(),
            env: RsvpEnvironment { clock, mailer },
            retry,
        }
    }

    /// Record an RSVP. Capacity is enforced atomically with the record.
    ///
    /// # Errors
    ///
    /// - `Validation`: event not open for RSVPs, or attendee fields missing
    ///   (every missing field is named)
    /// - `CapacityExceeded`: full and no waitlist
    /// - `NotFound`: no such event
    #[tracing::instrument(skip(self, actor, attendee))]
    pub async fn submit_rsvp(&self, actor: Option<&Actor>, event_id: EventId, attendee: AttendeeInfo) -> Result<Rsvp> {
        let buyer = actor.map_or(Buyer::Unauthenticated, |a| Buyer::User(a.user_id.clone()));
        let rsvp_id = RsvpId::new();

        let (mut state, effects) = retry_with_predicate(
            &self.retry,
            || self.attempt(event_id, rsvp_id, buyer.clone(), attendee.clone()),
            Attempt::is_stale,
        )
        .await
        .map_err(|attempt| {
            let error = attempt.into_error();
            tracing::warn!(%event_id, %error, "RSVP not recorded");
            error
        })?;

        settle_committed(&self.reducer, &mut state, effects, &self.env).await;
        for failed in &state.notification_failures {
            tracing::warn!(rsvp_id = %failed, "RSVP acknowledgement not delivered");
        }

        let rsvp = state.rsvp.ok_or_else(|| NaksError::not_found("rsvp", rsvp_id))?;
        metrics::record_rsvp(rsvp.status);
        tracing::info!(%event_id, %rsvp_id, status = rsvp.status.as_str(), "RSVP recorded");
        Ok(rsvp)
    }

    async fn attempt(
        &self,
        event_id: EventId,
        rsvp_id: RsvpId,
        buyer: Buyer,
        attendee: AttendeeInfo,
    ) -> std::result::Result<(RsvpState, Effects<RsvpAction>), Attempt> {
        let loaded = self.documents.event(&event_id).await?;

        let mut state = RsvpState::new(loaded.record);
        let effects = self.reducer.reduce(
            &mut state,
            RsvpAction::Submit {
                rsvp_id,
                buyer,
                attendee,
            },
            &self.env,
        );
        if let Some(error) = state.last_error.clone() {
            return Err(Attempt::Fatal(error));
        }

        let Some(rsvp) = state.rsvp.as_ref() else {
            return Err(Attempt::Fatal(NaksError::not_found("rsvp", rsvp_id)));
        };
        let mut writes = vec![Documents::create(self.documents.rsvp_key(&rsvp.id), rsvp)?];
        if state.event_changed() {
            if let Some(event) = state.event.as_ref() {
                writes.push(Documents::replace(self.documents.event_key(&event_id), loaded.revision, event)?);
            }
        }

        match self.documents.commit(writes).await {
            Ok(_) => Ok((state, effects)),
            Err(error) => Err(Attempt::from_commit(error)),
        }
    }
}

// ============================================================================
// User administration
// ============================================================================

/// Role, status and profile service
pub struct UserAdminService {
    documents: Documents,
    reducer: UserAdminReducer,
    env: UserAdminEnvironment,
    retry: RetryPolicy,
}

impl UserAdminService {
    /// Create a new user administration service
    #[must_use]
    pub fn new(documents: Documents, clock: Arc<dyn Clock>, mailer: Arc<dyn EmailSender>, retry: RetryPolicy) -> Self {
        let audit = AuditLog::new(
            Arc::clone(documents.store()),
            documents.collections().audit_logs.clone(),
        );
        Self {
            documents,
            reducer: UserAdminReducer::new(),
            env: UserAdminEnvironment { clock, audit, mailer },
            retry,
        }
    }

    /// Give `target_id` the role `new_role`.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied`: actor inactive, not an admin, or below level 3
    ///   when granting admin
    /// - `NoChange`: the user already has that role
    /// - `NotFound`: no such user
    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.user_id))]
    pub async fn change_user_role(
        &self,
        actor: &Actor,
        target_id: &UserId,
        new_role: Role,
        notify: bool,
    ) -> Result<UserProfile> {
        let action = UserAdminAction::ChangeRole {
            actor_id: actor.user_id.clone(),
            target_id: target_id.clone(),
            new_role,
            notify,
            user_agent: actor.user_agent.clone(),
        };
        let profile = self.apply(&actor.user_id, target_id, action).await?;
        tracing::info!(%target_id, %new_role, "Role changed");
        Ok(profile)
    }

    /// Change `target_id`'s account status.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied`: actor inactive or not an admin
    /// - `NoChange`: the user already has that status
    /// - `Validation`: suspension without an end in the future
    /// - `NotFound`: no such user
    #[tracing::instrument(skip(self, actor, change), fields(actor_id = %actor.user_id))]
    pub async fn change_user_status(
        &self,
        actor: &Actor,
        target_id: &UserId,
        change: StatusChange,
    ) -> Result<UserProfile> {
        let new_status = change.new_status;
        let action = UserAdminAction::ChangeStatus {
            actor_id: actor.user_id.clone(),
            target_id: target_id.clone(),
            change,
            user_agent: actor.user_agent.clone(),
        };
        let profile = self.apply(&actor.user_id, target_id, action).await?;
        tracing::info!(%target_id, %new_status, "Account status changed");
        Ok(profile)
    }

    /// The view of `target_id` the caller is entitled to. Admin profiles
    /// are redacted for viewers below admin level 4.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for callers without a profile, `NotFound` for an
    /// unknown target.
    pub async fn view_profile(&self, actor: &Actor, target_id: &UserId) -> Result<ProfileView> {
        let viewer = self.documents.actor(actor).await?;
        let target = self.documents.user(target_id).await?.record;
        Ok(permissions::profile_view(&viewer, &target))
    }

    async fn apply(&self, actor_id: &UserId, target_id: &UserId, action: UserAdminAction) -> Result<UserProfile> {
        let (mut state, effects) = retry_with_predicate(
            &self.retry,
            || self.attempt(actor_id, target_id, action.clone()),
            Attempt::is_stale,
        )
        .await
        .map_err(|attempt| {
            let error = attempt.into_error();
            tracing::warn!(%target_id, %error, "User change rejected");
            error
        })?;

        settle_committed(&self.reducer, &mut state, effects, &self.env).await;
        for entry_id in &state.audit_failures {
            audit::report_append_failure(*entry_id);
        }
        for user_id in &state.notification_failures {
            tracing::warn!(%user_id, "Account notice not delivered");
        }

        state
            .users
            .remove(target_id)
            .ok_or_else(|| NaksError::not_found("user", target_id))
    }

    async fn attempt(
        &self,
        actor_id: &UserId,
        target_id: &UserId,
        action: UserAdminAction,
    ) -> std::result::Result<(UserAdminState, Effects<UserAdminAction>), Attempt> {
        let actor = match self.documents.user(actor_id).await {
            Ok(loaded) => loaded.record,
            Err(NaksError::NotFound { .. }) => {
                return Err(Attempt::Fatal(NaksError::PermissionDenied(format!(
                    "no profile for {actor_id}"
                ))));
            },
            Err(error) => return Err(Attempt::Fatal(error)),
        };
        let target = self.documents.user(target_id).await?;

        let mut state = UserAdminState::with_users([actor, target.record]);
        let effects = self.reducer.reduce(&mut state, action, &self.env);
        if let Some(error) = state.last_error.take() {
            return Err(Attempt::Fatal(error));
        }

        let updated = state
            .get(target_id)
            .ok_or_else(|| NaksError::not_found("user", target_id))?;
        let write = Documents::replace(self.documents.user_key(target_id), target.revision, updated)?;

        match self.documents.commit(vec![write]).await {
            Ok(_) => Ok((state, effects)),
            Err(error) => Err(Attempt::from_commit(error)),
        }
    }
}

//! Application coordinator - wires configuration, persistence, clock and
//! collaborators into the services.

use super::documents::Documents;
use super::reports::{LinkService, ReportService};
use super::services::{CheckoutService, EventService, RsvpService, UserAdminService};
use super::session::CheckoutSession;
use crate::aggregates::StatusChange;
use crate::audit::{AuditEntry, AuditFilter};
use crate::collaborators::{
    AnalyticsClient, CollaboratorResult, EmailSender, HttpCollaborators, Shortlink,
    ShortlinkAnalytics, ShortlinkClient,
};
use crate::config::Config;
use crate::error::Result;
use crate::permissions::ProfileView;
use crate::sales::SalesSummary;
use crate::types::{
    Actor, AttendeeInfo, Event, EventDraft, EventId, EventPatch, Order, Role, Rsvp, Selection,
    TicketKey, UserId, UserProfile,
};
use naks_yetu_core::document_store::DocumentStore;
use naks_yetu_core::environment::Clock;
use std::sync::Arc;

/// External collaborators the platform calls out to
#[derive(Clone)]
pub struct Collaborators {
    /// Shortlink creation
    pub shortlinks: Arc<dyn ShortlinkClient>,
    /// Click analytics
    pub analytics: Arc<dyn AnalyticsClient>,
    /// Transactional email
    pub email: Arc<dyn EmailSender>,
}

impl Collaborators {
    /// All three collaborators over HTTP, at the endpoints in `config`
    ///
    /// # Errors
    ///
    /// `Setup` if the HTTP client cannot be built.
    pub fn http(config: &Config) -> CollaboratorResult<Self> {
        let http = Arc::new(HttpCollaborators::new(config)?);
        Ok(Self {
            shortlinks: http.clone(),
            analytics: http.clone(),
            email: http,
        })
    }
}

/// The Naks Yetu platform core.
///
/// One entry point per inbound operation; each delegates to the service
/// owning that aggregate.
pub struct Platform {
    /// Event creation, moderation and edits
    pub events: EventService,
    /// Inventory and checkout
    pub checkout: Arc<CheckoutService>,
    /// RSVPs
    pub rsvps: RsvpService,
    /// Roles, account status and profiles
    pub users: UserAdminService,
    /// Sales summaries and the audit trail
    pub reports: ReportService,
    /// Shortlinks
    pub links: LinkService,
}

impl Platform {
    /// Build the platform.
    #[must_use]
    pub fn new(
        config: &Config,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        collaborators: Collaborators,
    ) -> Self {
        let documents = Documents::new(store, config.collections());
        let retry = config.retry_policy();

        tracing::info!(app_id = %config.app_id, "Initializing Naks Yetu platform");

        Self {
            events: EventService::new(documents.clone(), Arc::clone(&clock), retry.clone()),
            checkout: Arc::new(CheckoutService::new(
                documents.clone(),
                Arc::clone(&clock),
                Arc::clone(&collaborators.email),
                config.site_base_url.clone(),
                retry.clone(),
            )),
            rsvps: RsvpService::new(
                documents.clone(),
                Arc::clone(&clock),
                Arc::clone(&collaborators.email),
                retry.clone(),
            ),
            users: UserAdminService::new(documents.clone(), clock, collaborators.email, retry),
            reports: ReportService::new(documents.clone()),
            links: LinkService::new(documents, collaborators.shortlinks, collaborators.analytics),
        }
    }

    // ========== Events ==========

    /// See [`EventService::create_event`].
    ///
    /// # Errors
    ///
    /// As the service.
    pub async fn create_event(&self, actor: &Actor, draft: EventDraft) -> Result<Event> {
        self.events.create_event(actor, draft).await
    }

    /// See [`EventService::approve_event`].
    ///
    /// # Errors
    ///
    /// As the service.
    pub async fn approve_event(&self, actor: &Actor, event_id: EventId) -> Result<Event> {
        self.events.approve_event(actor, event_id).await
    }

    /// See [`EventService::reject_event`].
    ///
    /// # Errors
    ///
    /// As the service.
    pub async fn reject_event(&self, actor: &Actor, event_id: EventId) -> Result<Event> {
        self.events.reject_event(actor, event_id).await
    }

    /// See [`EventService::take_down_event`].
    ///
    /// # Errors
    ///
    /// As the service.
    pub async fn take_down_event(&self, actor: &Actor, event_id: EventId) -> Result<Event> {
        self.events.take_down_event(actor, event_id).await
    }

    /// See [`EventService::edit_event`].
    ///
    /// # Errors
    ///
    /// As the service.
    pub async fn edit_event(&self, actor: &Actor, event_id: EventId, patch: EventPatch) -> Result<Event> {
        self.events.edit_event(actor, event_id, patch).await
    }

    // ========== Tickets ==========

    /// See [`CheckoutService::reserve_tickets`].
    ///
    /// # Errors
    ///
    /// As the service.
    pub async fn reserve_tickets(
        &self,
        event_id: EventId,
        selection: &Selection,
        ticket_type: &TicketKey,
        delta: i64,
    ) -> Result<Selection> {
        self.checkout
            .reserve_tickets(event_id, selection, ticket_type, delta)
            .await
    }

    /// Start an interactive checkout session on `event_id`.
    ///
    /// # Errors
    ///
    /// As [`CheckoutSession::open`].
    pub async fn open_checkout_session(&self, event_id: EventId) -> Result<CheckoutSession> {
        CheckoutSession::open(Arc::clone(&self.checkout), event_id).await
    }

    /// See [`CheckoutService::checkout`].
    ///
    /// # Errors
    ///
    /// As the service.
    pub async fn checkout(&self, actor: Option<&Actor>, event_id: EventId, selection: Selection) -> Result<Order> {
        self.checkout.checkout(actor, event_id, selection).await
    }

    /// See [`RsvpService::submit_rsvp`].
    ///
    /// # Errors
    ///
    /// As the service.
    pub async fn submit_rsvp(&self, actor: Option<&Actor>, event_id: EventId, attendee: AttendeeInfo) -> Result<Rsvp> {
        self.rsvps.submit_rsvp(actor, event_id, attendee).await
    }

    // ========== Users ==========

    /// See [`UserAdminService::change_user_role`].
    ///
    /// # Errors
    ///
    /// As the service.
    pub async fn change_user_role(
        &self,
        actor: &Actor,
        target_id: &UserId,
        new_role: Role,
        notify: bool,
    ) -> Result<UserProfile> {
        self.users.change_user_role(actor, target_id, new_role, notify).await
    }

    /// See [`UserAdminService::change_user_status`].
    ///
    /// # Errors
    ///
    /// As the service.
    pub async fn change_user_status(
        &self,
        actor: &Actor,
        target_id: &UserId,
        change: StatusChange,
    ) -> Result<UserProfile> {
        self.users.change_user_status(actor, target_id, change).await
    }

    /// See [`UserAdminService::view_profile`].
    ///
    /// # Errors
    ///
    /// As the service.
    pub async fn view_profile(&self, actor: &Actor, target_id: &UserId) -> Result<ProfileView> {
        self.users.view_profile(actor, target_id).await
    }

    // ========== Reports and links ==========

    /// See [`ReportService::sales_summary`].
    ///
    /// # Errors
    ///
    /// As the service.
    pub async fn sales_summary(&self, actor: &Actor, organizer_id: &UserId) -> Result<SalesSummary> {
        self.reports.sales_summary(actor, organizer_id).await
    }

    /// See [`ReportService::audit_trail`].
    ///
    /// # Errors
    ///
    /// As the service.
    pub async fn audit_trail(&self, actor: &Actor, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        self.reports.audit_trail(actor, filter).await
    }

    /// See [`LinkService::create_shortlink`].
    ///
    /// # Errors
    ///
    /// As the service.
    pub async fn create_shortlink(
        &self,
        actor: &Actor,
        event_id: EventId,
        custom_short_id: Option<String>,
        message: Option<String>,
    ) -> Result<Shortlink> {
        self.links
            .create_shortlink(actor, event_id, custom_short_id, message)
            .await
    }

    /// See [`LinkService::shortlink_analytics`].
    ///
    /// # Errors
    ///
    /// As the service.
    pub async fn shortlink_analytics(&self, actor: &Actor, short_id: &str) -> Result<ShortlinkAnalytics> {
        self.links.shortlink_analytics(actor, short_id).await
    }
}

//! Naks Yetu Demo
//!
//! Walks one event through the platform against in-memory persistence and
//! collaborators:
//! - Organizer submits a ticketed event, an admin approves it
//! - A buyer reserves tickets in a checkout session and checks out
//! - An attendee RSVPs to a conference
//! - The organizer reads their sales, the admin reads the audit trail
//! - The organizer shares the event through a shortlink
//!
//! Metrics are exported for Prometheus while the demo runs.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin naks-yetu-demo
//! curl http://localhost:9090/metrics
//! ```

#![allow(missing_docs)]

use chrono::Utc;
use metrics_exporter_prometheus::PrometheusBuilder;
use naks_yetu::mocks::{InMemoryShortlinks, RecordingEmailSender};
use naks_yetu::types::{
    AccountStatus, Actor, AttendeeField, AttendeeInfo, EventCategory, EventDraft, Money, Role,
    RsvpConfig, TicketType, UserId, UserProfile,
};
use naks_yetu::{AuditFilter, Collaborators, Config, Platform};
use naks_yetu_core::document_store::{DocumentKey, encode};
use naks_yetu_core::environment::SystemClock;
use naks_yetu_testing::InMemoryDocumentStore;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // 1. Tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.observability.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Prometheus exporter
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.observability.metrics_port))
        .install()?;
    naks_yetu::metrics::register_business_metrics();
    tracing::info!(
        port = config.observability.metrics_port,
        "Prometheus metrics available at /metrics"
    );

    // 3. In-memory platform with three seeded accounts
    let store = Arc::new(InMemoryDocumentStore::new());
    let users = config.collections().users;
    let admin = seed_user(&store, &users, "admin-1", Role::Admin, 4)?;
    let organizer = seed_user(&store, &users, "organizer-1", Role::Organizer, 0)?;
    let buyer = seed_user(&store, &users, "buyer-1", Role::User, 0)?;

    let email = RecordingEmailSender::new();
    let links = InMemoryShortlinks::new("https://naks.to");
    let collaborators = Collaborators {
        shortlinks: Arc::new(links.clone()),
        analytics: Arc::new(links),
        email: Arc::new(email.clone()),
    };
    let platform = Platform::new(&config, store.clone(), Arc::new(SystemClock), collaborators);

    // 4. Submit and approve a ticketed event
    let draft = EventDraft::new("Summer Sounds Festival", EventCategory::Ticketed)
        .with_description("Two stages, one weekend")
        .with_ticket_type(TicketType::new("regular", Money::from_minor_units(150_000), Some(100)))
        .with_ticket_type(TicketType::new("vip", Money::from_minor_units(500_000), Some(3)));
    let event = platform.create_event(&organizer, draft).await?;
    tracing::info!(event_id = %event.id, status = %event.status, "Event submitted");

    let event = platform.approve_event(&admin, event.id).await?;
    tracing::info!(event_id = %event.id, status = %event.status, "Event approved");

    // 5. Reserve in a session and check out
    let session = platform.open_checkout_session(event.id).await?;
    session.reserve("regular", 2).await?;
    session.reserve("vip", 1).await?;
    if let Err(error) = session.reserve("vip", 5).await {
        tracing::info!(%error, "Over-capacity reservation refused");
    }
    for (ticket_type, label) in session.labels().await {
        tracing::info!(%ticket_type, ?label, "Availability");
    }

    let order = session.checkout(Some(&buyer)).await?;
    tracing::info!(
        order_id = %order.id,
        total = %order.total_amount,
        tickets = order.ticket_count(),
        status = order.status.as_str(),
        "Order placed"
    );

    // 6. RSVP to a conference that needs the attendee's company
    let conference = EventDraft::new("Nairobi Dev Summit", EventCategory::Rsvp).with_rsvp(RsvpConfig {
        required_attendee_info: vec![AttendeeField::Company],
        capacity: Some(200),
        ..RsvpConfig::default()
    });
    let conference = platform.create_event(&organizer, conference).await?;
    platform.approve_event(&admin, conference.id).await?;

    let incomplete = AttendeeInfo::new("Wanjiku", "wanjiku@example.com");
    if let Err(error) = platform.submit_rsvp(None, conference.id, incomplete.clone()).await {
        tracing::info!(%error, "Incomplete RSVP refused");
    }
    let rsvp = platform
        .submit_rsvp(None, conference.id, incomplete.with(AttendeeField::Company, "Acme"))
        .await?;
    tracing::info!(rsvp_id = %rsvp.id, status = rsvp.status.as_str(), "RSVP recorded");

    // 7. Reports
    let summary = platform.sales_summary(&organizer, &organizer.user_id).await?;
    tracing::info!(
        revenue = %summary.total_revenue,
        tickets = summary.total_tickets_sold,
        orders = summary.total_orders,
        "Sales summary"
    );

    for entry in platform.audit_trail(&admin, &AuditFilter::new()).await? {
        tracing::info!(action = entry.action.label(), target = %entry.target_id, "Audit entry");
    }

    // 8. Share the event
    let link = platform
        .create_shortlink(&organizer, event.id, Some("summer-sounds".to_string()), None)
        .await?;
    tracing::info!(url = %link.short_url, "Shortlink created");

    tracing::info!(
        emails = email.sent().len(),
        documents = store.len(),
        commits = store.commit_count(),
        "Demo complete"
    );
    Ok(())
}

fn seed_user(
    store: &InMemoryDocumentStore,
    collection: &str,
    uid: &str,
    role: Role,
    admin_level: u8,
) -> anyhow::Result<Actor> {
    let id = UserId::new(uid);
    let profile = UserProfile {
        id: id.clone(),
        display_name: uid.to_string(),
        email: format!("{uid}@example.com"),
        role,
        admin_level,
        status: AccountStatus::Active,
        suspended_until: None,
        created_at: Utc::now(),
    };
    store.insert_raw(DocumentKey::new(collection, uid), encode(&profile)?);
    Ok(Actor::new(id).with_user_agent("naks-yetu-demo"))
}

//! Shared setup for the platform integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use chrono::Duration;
use naks_yetu::config::Collections;
use naks_yetu::mocks::{InMemoryShortlinks, RecordingEmailSender};
use naks_yetu::types::{
    AccountStatus, Actor, Event, EventCategory, EventDraft, Money, Role, TicketType, UserId,
    UserProfile,
};
use naks_yetu::{Collaborators, Config, Platform};
use naks_yetu_core::document_store::{DocumentKey, encode};
use naks_yetu_core::environment::Clock;
use naks_yetu_testing::{FixedClock, InMemoryDocumentStore, init_test_tracing, test_clock};
use std::sync::Arc;

/// A platform over in-memory persistence and collaborators
pub struct Harness {
    pub platform: Arc<Platform>,
    pub store: Arc<InMemoryDocumentStore>,
    pub email: RecordingEmailSender,
    pub links: InMemoryShortlinks,
    pub clock: FixedClock,
    pub collections: Collections,
}

impl Harness {
    pub fn new() -> Self {
        let mut config = Config::default().with_app_id("naks-test");
        // Contended checkouts need more room than production defaults
        config.checkout.max_retries = 50;
        config.checkout.retry_initial_ms = 1;
        config.checkout.retry_max_ms = 5;
        Self::with_config(&config)
    }

    pub fn with_config(config: &Config) -> Self {
        init_test_tracing();

        let store = Arc::new(InMemoryDocumentStore::new());
        let email = RecordingEmailSender::new();
        let links = InMemoryShortlinks::new("https://naks.to");
        let clock = test_clock();
        let collaborators = Collaborators {
            shortlinks: Arc::new(links.clone()),
            analytics: Arc::new(links.clone()),
            email: Arc::new(email.clone()),
        };
        let platform = Platform::new(config, store.clone(), Arc::new(clock.clone()), collaborators);

        Self {
            platform: Arc::new(platform),
            store,
            email,
            links,
            clock,
            collections: config.collections(),
        }
    }

    /// Seed an active profile and return its caller
    pub fn user(&self, uid: &str, role: Role, admin_level: u8) -> Actor {
        self.seed(self.profile(uid, role, admin_level))
    }

    pub fn admin(&self, uid: &str, level: u8) -> Actor {
        self.user(uid, Role::Admin, level)
    }

    pub fn organizer(&self, uid: &str) -> Actor {
        self.user(uid, Role::Organizer, 0)
    }

    pub fn profile(&self, uid: &str, role: Role, admin_level: u8) -> UserProfile {
        UserProfile {
            id: UserId::new(uid),
            display_name: format!("User {uid}"),
            email: format!("{uid}@example.com"),
            role,
            admin_level,
            status: AccountStatus::Active,
            suspended_until: None,
            created_at: self.clock.now() - Duration::days(30),
        }
    }

    pub fn seed(&self, profile: UserProfile) -> Actor {
        let key = DocumentKey::new(self.collections.users.clone(), profile.id.as_str());
        self.store.insert_raw(key, encode(&profile).unwrap());
        Actor::new(profile.id).with_user_agent("integration-test")
    }

    pub fn stored_profile(&self, uid: &str) -> UserProfile {
        let key = DocumentKey::new(self.collections.users.clone(), uid);
        serde_json::from_value(self.store.document(&key).unwrap()).unwrap()
    }

    pub fn stored_event(&self, event: &Event) -> Event {
        let key = DocumentKey::new(self.collections.events.clone(), event.id.to_string());
        serde_json::from_value(self.store.document(&key).unwrap()).unwrap()
    }

    pub fn audit_entries(&self) -> Vec<serde_json::Value> {
        self.store.documents_in(&self.collections.audit_logs)
    }

    /// Submit and approve a ticketed event with the given tiers
    pub async fn live_event(&self, organizer: &Actor, admin: &Actor, tiers: Vec<TicketType>) -> Event {
        let draft = tiers.into_iter().fold(
            EventDraft::new("Rooftop Sessions", EventCategory::Ticketed),
            EventDraft::with_ticket_type,
        );
        let event = self.platform.create_event(organizer, draft).await.unwrap();
        self.platform.approve_event(admin, event.id).await.unwrap()
    }
}

pub fn tier(key: &str, price: u64, quantity: Option<u32>) -> TicketType {
    TicketType::new(key, Money::from_minor_units(price), quantity)
}

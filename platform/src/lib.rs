//! # Naks Yetu
//!
//! Core of the Naks Yetu event platform: event moderation, ticket inventory,
//! order and RSVP recording, the admin audit trail and the role/permission
//! gate.
//!
//! # Architecture
//!
//! ```text
//!            ┌────────────────────────── Platform ──────────────────────────┐
//!            │ EventService  CheckoutService  RsvpService  UserAdminService │
//!            └──────┬──────────────┬───────────────┬──────────────┬─────────┘
//!                   │   load → reduce → commit (CAS) → settle     │
//!            ┌──────▼──────┐ ┌─────▼─────┐  ┌──────▼─────┐ ┌──────▼──────┐
//!            │ Moderation  │ │ Checkout  │  │    Rsvp    │ │  UserAdmin  │
//!            │  Reducer    │ │  Reducer  │  │  Reducer   │ │   Reducer   │
//!            └─────────────┘ └───────────┘  └────────────┘ └─────────────┘
//!                   │ effects: audit appends, emails
//!                   ▼
//!            DocumentStore (atomic, revision-checked batches)
//! ```
//!
//! Reducers are pure: they validate a command against loaded records, apply
//! the resulting event and describe follow-up I/O as effects. Services own
//! persistence. Each mutation is one atomic commit guarded by the revisions
//! it read, so `sold <= quantity` holds under concurrent checkouts and a
//! moderation decision never overwrites a concurrent one.
//!
//! # Example
//!
//! ```ignore
//! let platform = Platform::new(&config, store, Arc::new(SystemClock), Collaborators::http(&config)?);
//!
//! let event = platform.create_event(&organizer, draft).await?;
//! platform.approve_event(&admin, event.id).await?;
//!
//! let order = platform
//!     .checkout(Some(&buyer), event.id, Selection::new().with("regular", 2))
//!     .await?;
//! ```

pub mod aggregates;
pub mod app;
pub mod audit;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod metrics;
pub mod mocks;
pub mod notifications;
pub mod orders;
pub mod permissions;
pub mod sales;
pub mod types;

pub use app::{CheckoutSession, Collaborators, Platform};
pub use audit::{AuditAction, AuditEntry, AuditFilter};
pub use config::Config;
pub use error::{NaksError, Result};
pub use sales::SalesSummary;

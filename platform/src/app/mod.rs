//! Application layer - wires reducers to persistence and collaborators.
//!
//! This module provides:
//! - Typed document access with revision-guarded commits
//! - Aggregate services (command handlers with optimistic retries)
//! - Read-side reports and shortlinks
//! - Interactive checkout sessions
//! - The [`Platform`] coordinator

mod coordinator;
mod documents;
mod reports;
mod services;
mod session;

pub use coordinator::{Collaborators, Platform};
pub use documents::{Documents, Loaded};
pub use reports::{LinkService, MAX_SHORT_ID_LEN, ReportService};
pub use services::{CheckoutService, EventService, RsvpService, UserAdminService};
pub use session::CheckoutSession;

//! Aggregates: one reducer per consistency boundary.
//!
//! - [`moderation`]: event creation, moderation decisions, content edits
//! - [`inventory`]: availability labels and all-or-nothing checkout
//! - [`selection`]: a buyer's held selection inside a checkout session
//! - [`rsvp`]: RSVP submission against the event's RSVP settings
//! - [`users`]: role and account status administration
//!
//! Reducers only decide. Loading documents, committing the result and
//! running effects is the job of [`crate::app`].

pub mod inventory;
pub mod moderation;
pub mod rsvp;
pub mod selection;
pub mod users;

pub use inventory::{
    AvailabilityLabel, CheckoutAction, CheckoutEnvironment, CheckoutReducer, CheckoutState,
    availability_label,
};
pub use moderation::{ModerationAction, ModerationEnvironment, ModerationReducer, ModerationState};
pub use rsvp::{RsvpAction, RsvpEnvironment, RsvpReducer, RsvpState};
pub use selection::{SelectionAction, SelectionReducer, SelectionState};
pub use users::{
    StatusChange, UserAdminAction, UserAdminEnvironment, UserAdminReducer, UserAdminState,
};

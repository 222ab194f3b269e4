//! A buyer's in-progress ticket selection.
//!
//! The selection lives only in the buyer's session; nothing is persisted
//! until checkout. It is checked against the inventory snapshot the session
//! last loaded, and checkout re-validates against the stored event anyway.

use crate::aggregates::inventory::{AvailabilityLabel, availability_label, validate_reserve};
use crate::error::NaksError;
use crate::types::{Event, Selection, TicketKey};
use naks_yetu_core::{SmallVec, effect::Effect, reducer::Reducer};

/// Session state
#[derive(Debug, Clone)]
pub struct SelectionState {
    /// Inventory snapshot
    pub event: Event,
    /// Held quantities
    pub selection: Selection,
    /// Rejection of the last command
    pub last_error: Option<NaksError>,
}

impl SelectionState {
    /// Fresh session on `event`
    #[must_use]
    pub fn new(event: Event) -> Self {
        Self {
            event,
            selection: Selection::new(),
            last_error: None,
        }
    }

    /// Quantity held for `key`
    #[must_use]
    pub fn quantity_of(&self, key: &TicketKey) -> u32 {
        self.selection.quantity_of(key)
    }

    /// Label of every ticket type in the snapshot, in event order
    #[must_use]
    pub fn labels(&self) -> Vec<(TicketKey, AvailabilityLabel)> {
        self.event
            .ticket_types
            .iter()
            .map(|t| (t.key.clone(), availability_label(t)))
            .collect()
    }
}

/// Session actions
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionAction {
    // Commands
    /// Change the held quantity of one ticket type by `delta`
    Reserve {
        /// Ticket type
        ticket_type: TicketKey,
        /// Signed change
        delta: i64,
    },
    /// Drop everything held
    Clear,
    /// Replace the inventory snapshot (after a reload or a checkout)
    Refresh {
        /// Fresh event record
        event: Event,
    },

    // Events
    /// The held quantity changed
    Reserved {
        /// Ticket type
        ticket_type: TicketKey,
        /// New quantity
        quantity: u32,
    },
    /// A command was rejected
    ValidationFailed {
        /// Why
        error: NaksError,
    },
}

/// Selection reducer. Needs no environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionReducer;

impl SelectionReducer {
    /// Create a reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn apply_event(state: &mut SelectionState, action: SelectionAction) {
        match action {
            SelectionAction::Reserved {
                ticket_type,
                quantity,
            } => {
                state.selection.set(ticket_type, quantity);
                state.last_error = None;
            },
            SelectionAction::ValidationFailed { error } => state.last_error = Some(error),
            SelectionAction::Clear => {
                state.selection.clear();
                state.last_error = None;
            },
            SelectionAction::Refresh { event } => state.event = event,
            SelectionAction::Reserve { .. } => {},
        }
    }
}

impl Reducer for SelectionReducer {
    type State = SelectionState;
    type Action = SelectionAction;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        (): &(),
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            SelectionAction::Reserve { ticket_type, delta } => {
                let next = match validate_reserve(&state.event, &state.selection, &ticket_type, delta) {
                    Ok(quantity) => SelectionAction::Reserved {
                        ticket_type,
                        quantity,
                    },
                    Err(error) => SelectionAction::ValidationFailed { error },
                };
                Self::apply_event(state, next);
            },
            other => Self::apply_event(state, other),
        }
        SmallVec::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{EventCategory, EventId, EventStatus, Money, TicketType, UserId};
    use chrono::Utc;
    use naks_yetu_testing::ReducerTest;

    fn event() -> Event {
        Event {
            id: EventId::new(),
            name: "Rhumba Night".to_string(),
            description: String::new(),
            category: EventCategory::Ticketed,
            organizer_id: UserId::new("org"),
            status: EventStatus::Live,
            created_at: Utc::now(),
            ticket_types: vec![TicketType {
                sold: 7,
                ..TicketType::new("regular", Money::from_minor_units(800), Some(10))
            }],
            rsvp_config: None,
            gallery: Vec::new(),
            sponsors: Vec::new(),
            refund_policy: None,
            requires_payment: false,
        }
    }

    fn reserve(delta: i64) -> SelectionAction {
        SelectionAction::Reserve {
            ticket_type: TicketKey::new("regular"),
            delta,
        }
    }

    #[test]
    fn reserve_accumulates_up_to_remaining() {
        ReducerTest::new(SelectionReducer::new())
            .with_env(())
            .given_state(SelectionState::new(event()))
            .when_action(reserve(2))
            .when_action(reserve(1))
            .then_state(|state| {
                assert_eq!(state.quantity_of(&TicketKey::new("regular")), 3);
                assert!(state.last_error.is_none());
            })
            .run();
    }

    #[test]
    fn over_capacity_leaves_selection_unchanged() {
        ReducerTest::new(SelectionReducer::new())
            .with_env(())
            .given_state(SelectionState::new(event()))
            .when_action(reserve(2))
            .when_action(reserve(2))
            .then_state(|state| {
                assert_eq!(state.quantity_of(&TicketKey::new("regular")), 2);
                assert!(matches!(
                    state.last_error,
                    Some(NaksError::CapacityExceeded { requested: 4, available: 3, .. })
                ));
            })
            .run();
    }

    #[test]
    fn negative_delta_floors_at_zero() {
        ReducerTest::new(SelectionReducer::new())
            .with_env(())
            .given_state(SelectionState::new(event()))
            .when_action(reserve(1))
            .when_action(reserve(-10))
            .then_state(|state| {
                assert!(state.selection.is_empty());
            })
            .run();
    }

    #[test]
    fn labels_follow_snapshot() {
        let state = SelectionState::new(event());
        assert_eq!(
            state.labels(),
            vec![(TicketKey::new("regular"), AvailabilityLabel::FewLeft(3))]
        );
    }
}

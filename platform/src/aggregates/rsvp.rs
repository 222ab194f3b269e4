//! RSVP aggregate.
//!
//! A confirmed RSVP bumps the event's confirmed counter; the service commits
//! the counter and the RSVP record together so capacity holds under
//! concurrent submissions.

use crate::collaborators::EmailSender;
use crate::error::NaksError;
use crate::notifications;
use crate::orders;
use crate::types::{AttendeeField, AttendeeInfo, Buyer, Event, OrderStatus, Rsvp, RsvpId};
use naks_yetu_core::{
    SmallVec, async_effect, effect::Effect, environment::Clock, reducer::Reducer, smallvec,
};
use std::sync::Arc;

/// State of one RSVP submission
#[derive(Debug, Clone, Default)]
pub struct RsvpState {
    /// Event as read from the store
    pub event: Option<Event>,
    /// The RSVP, once recorded
    pub rsvp: Option<Rsvp>,
    /// Rejection of the last command
    pub last_error: Option<NaksError>,
    /// RSVPs whose acknowledgement email failed
    pub notification_failures: Vec<RsvpId>,
}

impl RsvpState {
    /// State for an RSVP to `event`
    #[must_use]
    pub fn new(event: Event) -> Self {
        Self {
            event: Some(event),
            ..Self::default()
        }
    }

    /// Whether recording the RSVP changed the event record
    #[must_use]
    pub fn event_changed(&self) -> bool {
        self.rsvp
            .as_ref()
            .is_some_and(|rsvp| rsvp.status == OrderStatus::Confirmed)
            && self
                .event
                .as_ref()
                .is_some_and(|event| event.rsvp_config.is_some())
    }
}

/// Actions for the RSVP reducer
#[derive(Debug, Clone, PartialEq)]
pub enum RsvpAction {
    // Commands
    /// Submit an RSVP
    Submit {
        /// Identifier for the new RSVP
        rsvp_id: RsvpId,
        /// Submitter
        buyer: Buyer,
        /// Attendee details
        attendee: AttendeeInfo,
    },

    // Events
    /// The RSVP was accepted
    RsvpRecorded {
        /// The record
        rsvp: Rsvp,
    },
    /// The submission was rejected
    ValidationFailed {
        /// Why
        error: NaksError,
    },
    /// The acknowledgement email could not be sent
    ConfirmationFailed {
        /// RSVP concerned
        rsvp_id: RsvpId,
        /// Collaborator error
        error: String,
    },
}

/// Dependencies of the RSVP reducer
#[derive(Clone)]
pub struct RsvpEnvironment {
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Acknowledgement delivery
    pub mailer: Arc<dyn EmailSender>,
}

/// RSVP reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct RsvpReducer;

impl RsvpReducer {
    /// Create a reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn apply_event(state: &mut RsvpState, action: &RsvpAction) {
        match action {
            RsvpAction::RsvpRecorded { rsvp } => {
                if rsvp.status == OrderStatus::Confirmed {
                    if let Some(config) = state.event.as_mut().and_then(|e| e.rsvp_config.as_mut()) {
                        config.confirmed = config.confirmed.saturating_add(1);
                    }
                }
                state.rsvp = Some(rsvp.clone());
                state.last_error = None;
            },
            RsvpAction::ValidationFailed { error } => state.last_error = Some(error.clone()),
            RsvpAction::ConfirmationFailed { rsvp_id, .. } => {
                state.notification_failures.push(*rsvp_id);
            },
            RsvpAction::Submit { .. } => {},
        }
    }
}

impl Reducer for RsvpReducer {
    type State = RsvpState;
    type Action = RsvpAction;
    type Environment = RsvpEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            RsvpAction::Submit {
                rsvp_id,
                buyer,
                attendee,
            } => {
                let recorded = state
                    .event
                    .as_ref()
                    .ok_or_else(|| NaksError::not_found("event", "rsvp target"))
                    .and_then(|event| {
                        orders::record_rsvp(rsvp_id, event, buyer, attendee, env.clock.now())
                            .map(|rsvp| (event.name.clone(), rsvp))
                    });

                let (event_name, rsvp) = match recorded {
                    Ok(recorded) => recorded,
                    Err(error) => {
                        Self::apply_event(state, &RsvpAction::ValidationFailed { error });
                        return SmallVec::new();
                    },
                };

                let message = rsvp
                    .attendee
                    .get(AttendeeField::Email)
                    .map(|email| notifications::rsvp_confirmation(&rsvp, &event_name, email));
                Self::apply_event(state, &RsvpAction::RsvpRecorded { rsvp });

                let Some(message) = message else {
                    return SmallVec::new();
                };
                let mailer = Arc::clone(&env.mailer);
                smallvec![async_effect! {
                    match mailer.send(message).await {
                        Ok(()) => None,
                        Err(error) => Some(RsvpAction::ConfirmationFailed {
                            rsvp_id,
                            error: error.to_string(),
                        }),
                    }
                }]
            },

            event => {
                Self::apply_event(state, &event);
                SmallVec::new()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::RecordingEmailSender;
    use crate::types::{EventCategory, EventId, EventStatus, RsvpConfig, UserId};
    use naks_yetu_testing::{ReducerTest, assertions, test_clock};

    fn event(config: RsvpConfig) -> Event {
        Event {
            id: EventId::new(),
            name: "Founders Breakfast".to_string(),
            description: String::new(),
            category: EventCategory::Rsvp,
            organizer_id: UserId::new("org"),
            status: EventStatus::Live,
            created_at: test_clock().now(),
            ticket_types: Vec::new(),
            rsvp_config: Some(config),
            gallery: Vec::new(),
            sponsors: Vec::new(),
            refund_policy: None,
            requires_payment: false,
        }
    }

    fn env() -> RsvpEnvironment {
        RsvpEnvironment {
            clock: Arc::new(test_clock()),
            mailer: Arc::new(RecordingEmailSender::new()),
        }
    }

    fn submit(attendee: AttendeeInfo) -> RsvpAction {
        RsvpAction::Submit {
            rsvp_id: RsvpId::new(),
            buyer: Buyer::Unauthenticated,
            attendee,
        }
    }

    #[test]
    fn confirmed_rsvp_bumps_counter_and_sends_acknowledgement() {
        let config = RsvpConfig {
            required_attendee_info: vec![AttendeeField::Company],
            capacity: Some(10),
            ..RsvpConfig::default()
        };

        ReducerTest::new(RsvpReducer::new())
            .with_env(env())
            .given_state(RsvpState::new(event(config)))
            .when_action(submit(
                AttendeeInfo::new("Amina", "amina@example.com").with(AttendeeField::Company, "Ushahidi"),
            ))
            .then_state(|state| {
                assert_eq!(state.rsvp.as_ref().unwrap().status, OrderStatus::Confirmed);
                assert_eq!(
                    state.event.as_ref().unwrap().rsvp_config.as_ref().unwrap().confirmed,
                    1
                );
                assert!(state.event_changed());
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn missing_company_records_nothing() {
        let config = RsvpConfig {
            required_attendee_info: vec![AttendeeField::Company],
            ..RsvpConfig::default()
        };

        ReducerTest::new(RsvpReducer::new())
            .with_env(env())
            .given_state(RsvpState::new(event(config)))
            .when_action(submit(AttendeeInfo::new("Amina", "amina@example.com")))
            .then_state(|state| {
                assert!(state.rsvp.is_none());
                assert_eq!(state.last_error.as_ref().unwrap().invalid_fields(), vec!["company"]);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn waitlisted_rsvp_keeps_counter() {
        let config = RsvpConfig {
            capacity: Some(1),
            confirmed: 1,
            waitlist_enabled: true,
            ..RsvpConfig::default()
        };

        ReducerTest::new(RsvpReducer::new())
            .with_env(env())
            .given_state(RsvpState::new(event(config)))
            .when_action(submit(AttendeeInfo::new("Amina", "amina@example.com")))
            .then_state(|state| {
                assert_eq!(state.rsvp.as_ref().unwrap().status, OrderStatus::Waitlisted);
                assert_eq!(
                    state.event.as_ref().unwrap().rsvp_config.as_ref().unwrap().confirmed,
                    1
                );
                assert!(!state.event_changed());
            })
            .run();
    }
}

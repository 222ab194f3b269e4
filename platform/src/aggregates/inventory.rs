//! Inventory aggregate: availability labels, selection checks and checkout.
//!
//! Checkout is all-or-nothing. Every selected line is validated against
//! `quantity - sold` (and its sale window) before anything changes; the
//! reducer then bumps each `sold` counter and builds the order in one step,
//! and the service commits the event and the order in one atomic batch. A
//! concurrent buyer who committed first makes that batch fail on the event's
//! revision, so `sold <= quantity` holds without locks.

use crate::collaborators::EmailSender;
use crate::error::{NaksError, Result};
use crate::notifications;
use crate::orders;
use crate::types::{
    Buyer, Event, EventStatus, Money, Order, OrderId, Selection, TicketKey, TicketType,
};
use chrono::{DateTime, Utc};
use naks_yetu_core::{
    SmallVec, async_effect, effect::Effect, environment::Clock, reducer::Reducer, smallvec,
};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Availability
// ============================================================================

/// Below this many remaining tickets the label counts them down
pub const FEW_LEFT_THRESHOLD: u32 = 100;

/// Buyer-facing availability of a ticket type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityLabel {
    /// Nothing remaining
    SoldOut,
    /// Fewer than [`FEW_LEFT_THRESHOLD`] remaining
    FewLeft(u32),
    /// Partly sold, percentage rounded
    PercentSold(u32),
    /// Unlimited, untouched or nearly so
    Available,
}

impl fmt::Display for AvailabilityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SoldOut => f.write_str("Sold Out"),
            Self::FewLeft(n) => write!(f, "{n} left!"),
            Self::PercentSold(pct) => write!(f, "{pct}% sold"),
            Self::Available => f.write_str("Available"),
        }
    }
}

/// Label for a ticket type
#[must_use]
pub fn availability_label(ticket_type: &TicketType) -> AvailabilityLabel {
    let Some(quantity) = ticket_type.quantity else {
        return AvailabilityLabel::Available;
    };

    let remaining = quantity.saturating_sub(ticket_type.sold);
    if remaining == 0 {
        return AvailabilityLabel::SoldOut;
    }
    if remaining < FEW_LEFT_THRESHOLD {
        return AvailabilityLabel::FewLeft(remaining);
    }

    match percent_sold(ticket_type.sold, quantity) {
        pct @ 1..=99 => AvailabilityLabel::PercentSold(pct),
        _ => AvailabilityLabel::Available,
    }
}

/// `round(100 * sold / quantity)`, half up; `quantity` is non-zero
fn percent_sold(sold: u32, quantity: u32) -> u32 {
    let sold = u64::from(sold.min(quantity));
    let quantity = u64::from(quantity);
    let pct = (200 * sold + quantity) / (2 * quantity);
    u32::try_from(pct).unwrap_or(100)
}

// ============================================================================
// Validation
// ============================================================================

/// Quantity `selection` would hold for `key` after adding `delta`.
///
/// Negative deltas floor at zero and are always accepted. Increases must fit
/// in what is left of the ticket type.
///
/// # Errors
///
/// - `NotFound`: the event has no ticket type `key`
/// - `CapacityExceeded`: the new quantity exceeds `quantity - sold`
pub fn validate_reserve(
    event: &Event,
    selection: &Selection,
    key: &TicketKey,
    delta: i64,
) -> Result<u32> {
    let ticket_type = event
        .ticket_type(key)
        .ok_or_else(|| NaksError::not_found("ticket type", key))?;

    let current = selection.quantity_of(key);
    let wanted = i64::from(current).saturating_add(delta).max(0);
    let wanted = u32::try_from(wanted).unwrap_or(u32::MAX);

    if wanted > current {
        if let Some(remaining) = ticket_type.remaining().filter(|remaining| wanted > *remaining) {
            return Err(NaksError::CapacityExceeded {
                resource: key.to_string(),
                requested: wanted,
                available: remaining,
            });
        }
    }

    Ok(wanted)
}

/// Validate a whole selection for checkout and price it.
///
/// Lines are checked in key order and the first failure aborts.
///
/// # Errors
///
/// - `Validation` on `event`: the event is not live
/// - `Validation` on `selection`: empty, off-sale line, or total overflow
/// - `NotFound`: unknown ticket type
/// - `CapacityExceeded`: a line exceeds `quantity - sold`
pub fn validate_checkout(event: &Event, selection: &Selection, now: DateTime<Utc>) -> Result<Money> {
    if event.status != EventStatus::Live {
        return Err(NaksError::invalid(
            "event",
            format!("tickets are not on sale while the event is {}", event.status),
        ));
    }
    if selection.is_empty() {
        return Err(NaksError::invalid("selection", "select at least one ticket"));
    }

    let mut total = Money::ZERO;
    for (key, quantity) in selection.iter() {
        let ticket_type = event
            .ticket_type(key)
            .ok_or_else(|| NaksError::not_found("ticket type", key))?;

        if !ticket_type.on_sale(now) {
            return Err(NaksError::invalid(
                "selection",
                format!("{key} is outside its sale window"),
            ));
        }

        if let Some(remaining) = ticket_type.remaining().filter(|remaining| quantity > *remaining) {
            return Err(NaksError::CapacityExceeded {
                resource: key.to_string(),
                requested: quantity,
                available: remaining,
            });
        }

        total = ticket_type
            .price
            .checked_mul(quantity)
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| NaksError::invalid("selection", "order total is too large"))?;
    }

    Ok(total)
}

// ============================================================================
// Checkout reducer
// ============================================================================

/// State of one checkout
#[derive(Debug, Clone, Default)]
pub struct CheckoutState {
    /// Event being bought into, as read from the store
    pub event: Option<Event>,
    /// The order, once placed
    pub order: Option<Order>,
    /// Rejection of the last command
    pub last_error: Option<NaksError>,
    /// Orders whose confirmation email failed
    pub notification_failures: Vec<OrderId>,
}

impl CheckoutState {
    /// State for a checkout against `event`
    #[must_use]
    pub fn new(event: Event) -> Self {
        Self {
            event: Some(event),
            ..Self::default()
        }
    }
}

/// Actions for the checkout reducer
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutAction {
    // Commands
    /// Buy the selected tickets
    Checkout {
        /// Identifier for the new order
        order_id: OrderId,
        /// Buyer
        buyer: Buyer,
        /// Where to send the receipt
        buyer_email: Option<String>,
        /// What to buy
        selection: Selection,
    },

    // Events
    /// Inventory was decremented and the order built
    OrderPlaced {
        /// The order
        order: Order,
    },

    /// The checkout was rejected
    ValidationFailed {
        /// Why
        error: NaksError,
    },

    /// The receipt email could not be sent
    ConfirmationFailed {
        /// Order concerned
        order_id: OrderId,
        /// Collaborator error
        error: String,
    },
}

/// Dependencies of the checkout reducer
#[derive(Clone)]
pub struct CheckoutEnvironment {
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Receipt delivery
    pub mailer: Arc<dyn EmailSender>,
    /// Public site root, linked from receipts
    pub site_base_url: String,
}

/// Checkout reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutReducer;

impl CheckoutReducer {
    /// Create a reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn apply_event(state: &mut CheckoutState, action: &CheckoutAction) {
        match action {
            CheckoutAction::OrderPlaced { order } => {
                if let Some(event) = state.event.as_mut() {
                    for line in &order.tickets {
                        if let Some(ticket_type) = event.ticket_type_mut(&line.ticket_type) {
                            ticket_type.sold = ticket_type.sold.saturating_add(line.quantity);
                        }
                    }
                }
                state.order = Some(order.clone());
                state.last_error = None;
            },
            CheckoutAction::ValidationFailed { error } => {
                state.last_error = Some(error.clone());
            },
            CheckoutAction::ConfirmationFailed { order_id, .. } => {
                state.notification_failures.push(*order_id);
            },
            CheckoutAction::Checkout { .. } => {},
        }
    }
}

impl Reducer for CheckoutReducer {
    type State = CheckoutState;
    type Action = CheckoutAction;
    type Environment = CheckoutEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            CheckoutAction::Checkout {
                order_id,
                buyer,
                buyer_email,
                selection,
            } => {
                let now = env.clock.now();
                let priced = state
                    .event
                    .as_ref()
                    .ok_or_else(|| NaksError::not_found("event", "checkout target"))
                    .and_then(|event| {
                        validate_checkout(event, &selection, now)
                            .map(|total| orders::record_order(order_id, event, buyer, &selection, total, now))
                    });

                let order = match priced {
                    Ok(order) => order,
                    Err(error) => {
                        Self::apply_event(state, &CheckoutAction::ValidationFailed { error });
                        return SmallVec::new();
                    },
                };

                let receipt = buyer_email
                    .map(|email| notifications::order_confirmation(&order, &email, &env.site_base_url));
                Self::apply_event(state, &CheckoutAction::OrderPlaced { order });

                let Some(message) = receipt else {
                    return SmallVec::new();
                };
                let mailer = Arc::clone(&env.mailer);
                smallvec![async_effect! {
                    match mailer.send(message).await {
                        Ok(()) => None,
                        Err(error) => Some(CheckoutAction::ConfirmationFailed {
                            order_id,
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
    use crate::types::{EventCategory, EventId, OrderStatus, SaleWindow, UserId};
    use chrono::Duration;
    use naks_yetu_testing::{ReducerTest, assertions, test_clock};
    use proptest::prelude::*;

    fn ticket(quantity: Option<u32>, sold: u32) -> TicketType {
        TicketType {
            sold,
            ..TicketType::new("general", Money::from_minor_units(1000), quantity)
        }
    }

    fn live_event(ticket_types: Vec<TicketType>) -> Event {
        Event {
            id: EventId::new(),
            name: "Sauti Sol Live".to_string(),
            description: String::new(),
            category: EventCategory::Ticketed,
            organizer_id: UserId::new("org"),
            status: EventStatus::Live,
            created_at: test_clock().now(),
            ticket_types,
            rsvp_config: None,
            gallery: Vec::new(),
            sponsors: Vec::new(),
            refund_policy: None,
            requires_payment: false,
        }
    }

    fn env() -> CheckoutEnvironment {
        CheckoutEnvironment {
            clock: Arc::new(test_clock()),
            mailer: Arc::new(RecordingEmailSender::new()),
            site_base_url: "https://naksyetu.com".to_string(),
        }
    }

    fn checkout(selection: Selection, email: Option<&str>) -> CheckoutAction {
        CheckoutAction::Checkout {
            order_id: OrderId::new(),
            buyer: Buyer::User(UserId::new("buyer")),
            buyer_email: email.map(ToString::to_string),
            selection,
        }
    }

    #[test]
    fn labels_match_reference_points() {
        assert_eq!(availability_label(&ticket(Some(100), 100)).to_string(), "Sold Out");
        assert_eq!(availability_label(&ticket(Some(150), 60)).to_string(), "90 left!");
        assert_eq!(availability_label(&ticket(Some(1000), 500)).to_string(), "50% sold");
        assert_eq!(availability_label(&ticket(None, 5000)).to_string(), "Available");
        assert_eq!(availability_label(&ticket(Some(1000), 0)).to_string(), "Available");
        assert_eq!(availability_label(&ticket(Some(0), 0)), AvailabilityLabel::SoldOut);
    }

    #[test]
    fn reserve_respects_remaining_and_floors_at_zero() {
        let event = live_event(vec![ticket(Some(10), 8)]);
        let key = TicketKey::new("general");
        let selection = Selection::new().with("general", 1);

        assert_eq!(validate_reserve(&event, &selection, &key, 1).unwrap(), 2);
        assert_eq!(validate_reserve(&event, &selection, &key, -5).unwrap(), 0);
        assert_eq!(
            validate_reserve(&event, &selection, &key, 2),
            Err(NaksError::CapacityExceeded {
                resource: "general".to_string(),
                requested: 3,
                available: 2,
            })
        );
        assert!(matches!(
            validate_reserve(&event, &selection, &TicketKey::new("vip"), 1),
            Err(NaksError::NotFound { kind: "ticket type", .. })
        ));
    }

    #[test]
    fn checkout_decrements_inventory_and_places_order() {
        let event = live_event(vec![
            ticket(Some(10), 2),
            TicketType::new("vip", Money::from_minor_units(5000), Some(5)),
        ]);

        ReducerTest::new(CheckoutReducer::new())
            .with_env(env())
            .given_state(CheckoutState::new(event))
            .when_action(checkout(
                Selection::new().with("general", 3).with("vip", 1),
                Some("buyer@example.com"),
            ))
            .then_state(|state| {
                let event = state.event.as_ref().unwrap();
                assert_eq!(event.ticket_type(&TicketKey::new("general")).unwrap().sold, 5);
                assert_eq!(event.ticket_type(&TicketKey::new("vip")).unwrap().sold, 1);

                let order = state.order.as_ref().unwrap();
                assert_eq!(order.total_amount, Money::from_minor_units(8000));
                assert_eq!(order.status, OrderStatus::Confirmed);
                assert_eq!(order.ticket_count(), 4);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn one_bad_line_aborts_everything() {
        let event = live_event(vec![
            ticket(Some(10), 0),
            TicketType::new("vip", Money::from_minor_units(5000), Some(1)),
        ]);
        let before = event.clone();

        ReducerTest::new(CheckoutReducer::new())
            .with_env(env())
            .given_state(CheckoutState::new(event))
            .when_action(checkout(Selection::new().with("general", 2).with("vip", 2), None))
            .then_state(move |state| {
                assert_eq!(state.event.as_ref(), Some(&before));
                assert!(state.order.is_none());
                assert!(matches!(
                    state.last_error,
                    Some(NaksError::CapacityExceeded { requested: 2, available: 1, .. })
                ));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn empty_selection_and_non_live_event_are_validation_errors() {
        let mut event = live_event(vec![ticket(Some(10), 0)]);
        let now = test_clock().now();

        let empty = validate_checkout(&event, &Selection::new(), now).unwrap_err();
        assert_eq!(empty.invalid_fields(), vec!["selection"]);

        event.status = EventStatus::Pending;
        let pending = validate_checkout(&event, &Selection::new().with("general", 1), now).unwrap_err();
        assert_eq!(pending.invalid_fields(), vec!["event"]);
    }

    #[test]
    fn sale_window_is_enforced() {
        let now = test_clock().now();
        let mut tier = ticket(Some(10), 0);
        tier.sale_window = Some(SaleWindow {
            starts_at: Some(now + Duration::days(1)),
            ends_at: None,
        });
        let event = live_event(vec![tier]);

        let error = validate_checkout(&event, &Selection::new().with("general", 1), now).unwrap_err();
        assert_eq!(error.invalid_fields(), vec!["selection"]);
    }

    #[test]
    fn paid_events_leave_orders_pending() {
        let mut event = live_event(vec![ticket(None, 0)]);
        event.requires_payment = true;

        ReducerTest::new(CheckoutReducer::new())
            .with_env(env())
            .given_state(CheckoutState::new(event))
            .when_action(checkout(Selection::new().with("general", 1), None))
            .then_state(|state| {
                assert_eq!(state.order.as_ref().unwrap().status, OrderStatus::Pending);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    proptest! {
        #[test]
        fn label_matches_definition(quantity in 0_u32..5000, sold_ratio in 0.0_f64..=1.0) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let sold = (f64::from(quantity) * sold_ratio) as u32;
            let label = availability_label(&ticket(Some(quantity), sold));
            let remaining = quantity - sold;

            match label {
                AvailabilityLabel::SoldOut => prop_assert_eq!(remaining, 0),
                AvailabilityLabel::FewLeft(n) => {
                    prop_assert_eq!(n, remaining);
                    prop_assert!(n > 0 && n < FEW_LEFT_THRESHOLD);
                },
                AvailabilityLabel::PercentSold(pct) => {
                    prop_assert!(remaining >= FEW_LEFT_THRESHOLD);
                    prop_assert!(pct > 0 && pct < 100);
                    let exact = 100.0 * f64::from(sold) / f64::from(quantity);
                    prop_assert!((f64::from(pct) - exact).abs() <= 0.5);
                },
                AvailabilityLabel::Available => prop_assert!(remaining >= FEW_LEFT_THRESHOLD),
            }
        }

        #[test]
        fn sold_never_exceeds_quantity(
            quantity in 0_u32..50,
            requests in prop::collection::vec(1_u32..8, 0..30),
        ) {
            let reducer = CheckoutReducer::new();
            let env = env();
            let mut state = CheckoutState::new(live_event(vec![ticket(Some(quantity), 0)]));

            for requested in requests {
                let _ = reducer.reduce(&mut state, checkout(Selection::new().with("general", requested), None), &env);
                let sold = state.event.as_ref().unwrap().ticket_types[0].sold;
                prop_assert!(sold <= quantity);
            }
        }
    }
}

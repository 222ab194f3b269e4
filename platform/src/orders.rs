//! Order and RSVP recording.
//!
//! Both records are immutable once created; only the payment collaborator
//! moves an order out of `pending`, and that happens outside this crate.

use crate::error::{NaksError, Result, ValidationErrors};
use crate::types::{
    AttendeeField, AttendeeInfo, Buyer, Event, EventCategory, EventStatus, Money, Order, OrderId,
    OrderStatus, Rsvp, RsvpConfig, RsvpId, Selection, TicketLine,
};
use chrono::{DateTime, Utc};

/// Build the order for a validated selection.
///
/// Unit prices are copied from the event at call time. Keys the event does
/// not know are skipped; callers validate the selection first.
#[must_use]
pub fn record_order(
    id: OrderId,
    event: &Event,
    buyer: Buyer,
    selection: &Selection,
    total: Money,
    now: DateTime<Utc>,
) -> Order {
    let tickets = selection
        .iter()
        .filter_map(|(key, quantity)| {
            event.ticket_type(key).map(|ticket_type| TicketLine {
                ticket_type: key.clone(),
                quantity,
                unit_price: ticket_type.price,
            })
        })
        .collect();

    Order {
        id,
        event_id: event.id,
        event_name: event.name.clone(),
        organizer_id: event.organizer_id.clone(),
        buyer,
        tickets,
        total_amount: total,
        status: if event.requires_payment {
            OrderStatus::Pending
        } else {
            OrderStatus::Confirmed
        },
        created_at: now,
    }
}

/// Attendee fields an RSVP to an event with `config` must carry but `info`
/// leaves blank, in check order.
///
/// Name and email are always required. Of the organizer's extra
/// requirements only phone, address, company and job title are honored;
/// dietary requirements are never mandatory.
#[must_use]
pub fn missing_attendee_fields(config: Option<&RsvpConfig>, info: &AttendeeInfo) -> Vec<AttendeeField> {
    let extra = config.map_or(&[][..], |c| c.required_attendee_info.as_slice());

    AttendeeField::ALWAYS_REQUIRED
        .into_iter()
        .chain(
            AttendeeField::CONFIGURABLE
                .into_iter()
                .filter(|field| extra.contains(field)),
        )
        .filter(|field| info.get(*field).is_none())
        .collect()
}

/// Whether `event` takes RSVPs at all
#[must_use]
pub fn accepts_rsvps(event: &Event) -> bool {
    event.rsvp_config.is_some() || matches!(event.category, EventCategory::Rsvp | EventCategory::Free)
}

/// Validate an RSVP and build its record.
///
/// The status is `confirmed`, or `waitlisted` when the event is at capacity
/// and keeps a waitlist.
///
/// # Errors
///
/// - `Validation` on `event`: the event is not live or takes no RSVPs
/// - `Validation`: one entry per missing required field, plus a malformed email
/// - `CapacityExceeded`: the event is full and keeps no waitlist
pub fn record_rsvp(
    id: RsvpId,
    event: &Event,
    buyer: Buyer,
    attendee: AttendeeInfo,
    now: DateTime<Utc>,
) -> Result<Rsvp> {
    if event.status != EventStatus::Live {
        return Err(NaksError::invalid(
            "event",
            format!("RSVPs are closed while the event is {}", event.status),
        ));
    }
    if !accepts_rsvps(event) {
        return Err(NaksError::invalid("event", "this event does not take RSVPs"));
    }

    let mut errors = ValidationErrors::new();
    for field in missing_attendee_fields(event.rsvp_config.as_ref(), &attendee) {
        errors.push(field.as_str(), "is required");
    }
    if attendee
        .get(AttendeeField::Email)
        .is_some_and(|email| !email.contains('@'))
    {
        errors.push(AttendeeField::Email.as_str(), "is not a valid email address");
    }
    errors.into_result()?;

    let status = match &event.rsvp_config {
        Some(config) if config.is_full() => {
            if config.waitlist_enabled {
                OrderStatus::Waitlisted
            } else {
                return Err(NaksError::CapacityExceeded {
                    resource: "rsvp".to_string(),
                    requested: 1,
                    available: 0,
                });
            }
        },
        _ => OrderStatus::Confirmed,
    };

    Ok(Rsvp {
        id,
        event_id: event.id,
        buyer,
        attendee,
        status,
        created_at: now,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{EventId, TicketType, UserId};

    fn event(category: EventCategory) -> Event {
        Event {
            id: EventId::new(),
            name: "Nairobi Tech Week".to_string(),
            description: String::new(),
            category,
            organizer_id: UserId::new("org-1"),
            status: EventStatus::Live,
            created_at: Utc::now(),
            ticket_types: Vec::new(),
            rsvp_config: None,
            gallery: Vec::new(),
            sponsors: Vec::new(),
            refund_policy: None,
            requires_payment: false,
        }
    }

    fn rsvp_event(required: Vec<AttendeeField>) -> Event {
        let mut event = event(EventCategory::Rsvp);
        event.rsvp_config = Some(RsvpConfig {
            required_attendee_info: required,
            ..RsvpConfig::default()
        });
        event
    }

    #[test]
    fn order_copies_prices_and_status() {
        let mut event = event(EventCategory::Ticketed);
        event.ticket_types = vec![
            TicketType::new("vip", Money::from_minor_units(500), Some(10)),
            TicketType::new("regular", Money::from_minor_units(200), None),
        ];
        let selection = Selection::new().with("vip", 2).with("regular", 1);

        let order = record_order(
            OrderId::new(),
            &event,
            Buyer::Unauthenticated,
            &selection,
            Money::from_minor_units(1200),
            Utc::now(),
        );

        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.ticket_count(), 3);
        assert_eq!(order.tickets[0].ticket_type.as_str(), "regular");
        assert_eq!(order.tickets[1].unit_price, Money::from_minor_units(500));

        event.requires_payment = true;
        let pending = record_order(
            OrderId::new(),
            &event,
            Buyer::Unauthenticated,
            &selection,
            Money::from_minor_units(1200),
            Utc::now(),
        );
        assert_eq!(pending.status, OrderStatus::Pending);
    }

    #[test]
    fn missing_company_is_named() {
        let event = rsvp_event(vec![AttendeeField::Company]);

        let error = record_rsvp(
            RsvpId::new(),
            &event,
            Buyer::Unauthenticated,
            AttendeeInfo::new("Amina", "amina@example.com"),
            Utc::now(),
        )
        .unwrap_err();

        assert_eq!(error.invalid_fields(), vec!["company"]);
    }

    #[test]
    fn every_missing_field_is_reported() {
        let event = rsvp_event(vec![AttendeeField::Phone, AttendeeField::JobTitle]);
        let info = AttendeeInfo {
            name: Some("   ".to_string()),
            ..AttendeeInfo::default()
        };

        let missing = missing_attendee_fields(event.rsvp_config.as_ref(), &info);
        assert_eq!(
            missing,
            vec![
                AttendeeField::Name,
                AttendeeField::Email,
                AttendeeField::Phone,
                AttendeeField::JobTitle
            ]
        );
    }

    #[test]
    fn dietary_is_never_required() {
        let event = rsvp_event(vec![AttendeeField::Dietary]);
        let rsvp = record_rsvp(
            RsvpId::new(),
            &event,
            Buyer::User(UserId::new("u1")),
            AttendeeInfo::new("Amina", "amina@example.com"),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(rsvp.status, OrderStatus::Confirmed);
    }

    #[test]
    fn full_event_waitlists_or_refuses() {
        let mut event = rsvp_event(Vec::new());
        if let Some(config) = event.rsvp_config.as_mut() {
            config.capacity = Some(1);
            config.confirmed = 1;
        }
        let attendee = AttendeeInfo::new("Amina", "amina@example.com");

        let refused = record_rsvp(RsvpId::new(), &event, Buyer::Unauthenticated, attendee.clone(), Utc::now());
        assert!(matches!(refused, Err(NaksError::CapacityExceeded { .. })));

        if let Some(config) = event.rsvp_config.as_mut() {
            config.waitlist_enabled = true;
        }
        let waitlisted =
            record_rsvp(RsvpId::new(), &event, Buyer::Unauthenticated, attendee, Utc::now()).unwrap();
        assert_eq!(waitlisted.status, OrderStatus::Waitlisted);
    }

    #[test]
    fn only_live_rsvp_events_accept() {
        let mut pending = rsvp_event(Vec::new());
        pending.status = EventStatus::Pending;
        let attendee = AttendeeInfo::new("Amina", "amina@example.com");

        let closed = record_rsvp(RsvpId::new(), &pending, Buyer::Unauthenticated, attendee.clone(), Utc::now());
        assert_eq!(closed.unwrap_err().invalid_fields(), vec!["event"]);

        let ticketed = event(EventCategory::Ticketed);
        let wrong_kind = record_rsvp(RsvpId::new(), &ticketed, Buyer::Unauthenticated, attendee, Utc::now());
        assert_eq!(wrong_kind.unwrap_err().invalid_fields(), vec!["event"]);
    }

    #[test]
    fn malformed_email_is_rejected() {
        let event = rsvp_event(Vec::new());
        let error = record_rsvp(
            RsvpId::new(),
            &event,
            Buyer::Unauthenticated,
            AttendeeInfo::new("Amina", "not-an-address"),
            Utc::now(),
        )
        .unwrap_err();

        assert_eq!(error.invalid_fields(), vec!["email"]);
    }
}

//! Transactional email templates.

use crate::collaborators::EmailMessage;
use crate::types::{AccountStatus, Order, OrderStatus, Role, Rsvp, UserProfile};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;

/// Receipt sent to the buyer after checkout
#[must_use]
pub fn order_confirmation(order: &Order, to_email: &str, site_base_url: &str) -> EmailMessage {
    let mut lines = String::new();
    for line in &order.tickets {
        let _ = write!(
            lines,
            "<li>{} × {} @ {}</li>",
            line.quantity, line.ticket_type, line.unit_price
        );
    }

    let status_note = match order.status {
        OrderStatus::Pending => "<p>Your order is reserved and awaits payment.</p>",
        OrderStatus::Confirmed | OrderStatus::Waitlisted => "<p>Your tickets are confirmed.</p>",
    };

    EmailMessage {
        to_email: to_email.to_string(),
        subject: format!("Your tickets for {}", order.event_name),
        content: format!(
            "<h1>{}</h1><ul>{lines}</ul><p>Total: {}</p>{status_note}\
             <p><a href=\"{site_base_url}/events/{}\">View event</a></p>",
            order.event_name, order.total_amount, order.event_id
        ),
    }
}

/// Acknowledgement sent to the attendee after an RSVP
#[must_use]
pub fn rsvp_confirmation(rsvp: &Rsvp, event_name: &str, to_email: &str) -> EmailMessage {
    let body = match rsvp.status {
        OrderStatus::Waitlisted => "The event is full; you are on the waitlist.",
        OrderStatus::Confirmed | OrderStatus::Pending => "Your spot is confirmed.",
    };

    EmailMessage {
        to_email: to_email.to_string(),
        subject: format!("RSVP received: {event_name}"),
        content: format!("<p>{body}</p>"),
    }
}

/// Notice sent to a user whose account status an admin changed
#[must_use]
pub fn status_change_notice(
    user: &UserProfile,
    new_status: AccountStatus,
    suspended_until: Option<DateTime<Utc>>,
    reason: Option<&str>,
) -> EmailMessage {
    let mut content = match (new_status, suspended_until) {
        (AccountStatus::Suspended, Some(until)) => format!(
            "<p>Your account has been suspended until {}.</p>",
            until.format("%Y-%m-%d %H:%M UTC")
        ),
        (AccountStatus::Banned, _) => "<p>Your account has been banned.</p>".to_string(),
        (status, _) => format!("<p>Your account is now {status}.</p>"),
    };
    if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
        let _ = write!(content, "<p>Reason: {reason}</p>");
    }

    EmailMessage {
        to_email: user.email.clone(),
        subject: "Your Naks Yetu account status changed".to_string(),
        content,
    }
}

/// Notice sent to a user whose role an admin changed
#[must_use]
pub fn role_change_notice(user: &UserProfile, new_role: Role) -> EmailMessage {
    EmailMessage {
        to_email: user.email.clone(),
        subject: "Your Naks Yetu role changed".to_string(),
        content: format!("<p>Hi {}, your role is now {new_role}.</p>", user.display_name),
    }
}

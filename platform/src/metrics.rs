//! Business metrics for the platform.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `naks_moderation_transitions_total{decision}` - Applied moderation decisions
//! - `naks_checkouts_total{outcome}` - Checkouts by outcome (completed, rejected, failed)
//! - `naks_tickets_sold_total` - Tickets sold
//! - `naks_revenue_minor_units_total` - Order value in minor currency units
//! - `naks_rsvps_total{status}` - RSVPs by status (confirmed, waitlisted)
//! - `naks_audit_append_failures_total` - Audit entries that could not be written
//! - `naks_checkout_conflicts_total` - Revision conflicts hit by checkout
//! - `naks_effects_executed_total{type}` - Effects run by the runtime
//!
//! ## Histograms
//! - `naks_checkout_attempts` - Commit attempts per completed checkout

use crate::types::{ModerationDecision, Money, OrderStatus};
use metrics::{describe_counter, describe_histogram};

/// Initialize and register all business metrics descriptions.
///
/// Call once at startup, before anything is recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "naks_moderation_transitions_total",
        "Moderation decisions applied, by decision (approve, reject, take_down)"
    );

    describe_counter!(
        "naks_checkouts_total",
        "Checkouts by outcome (completed, rejected, failed)"
    );
    describe_counter!("naks_tickets_sold_total", "Total number of tickets sold");
    describe_counter!(
        "naks_revenue_minor_units_total",
        "Total order value in minor currency units"
    );
    describe_counter!(
        "naks_checkout_conflicts_total",
        "Checkout commits that lost a revision race and were retried"
    );
    describe_histogram!(
        "naks_checkout_attempts",
        "Commit attempts needed by each completed checkout"
    );

    describe_counter!("naks_rsvps_total", "RSVPs by status (confirmed, waitlisted)");

    describe_counter!(
        "naks_audit_append_failures_total",
        "Audit entries that could not be written"
    );
    describe_counter!(
        "naks_effects_executed_total",
        "Effects executed by the runtime, by type"
    );

    tracing::info!("Business metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record an applied moderation decision.
pub fn record_moderation_transition(decision: ModerationDecision) {
    metrics::counter!("naks_moderation_transitions_total", "decision" => decision.as_str())
        .increment(1);
}

/// Record a completed checkout.
///
/// # Arguments
///
/// * `tickets` - Tickets in the order
/// * `total` - Order total
/// * `attempts` - Commit attempts it took
pub fn record_checkout_completed(tickets: u64, total: Money, attempts: u32) {
    metrics::counter!("naks_checkouts_total", "outcome" => "completed").increment(1);
    metrics::counter!("naks_tickets_sold_total").increment(tickets);
    metrics::counter!("naks_revenue_minor_units_total").increment(total.minor_units());
    metrics::histogram!("naks_checkout_attempts").record(f64::from(attempts));
    tracing::debug!(tickets, total = %total, attempts, "Recorded checkout_completed metric");
}

/// Record a checkout refused for a user error (capacity, validation, ...).
pub fn record_checkout_rejected() {
    metrics::counter!("naks_checkouts_total", "outcome" => "rejected").increment(1);
}

/// Record a checkout that failed on infrastructure or exhausted its retries.
pub fn record_checkout_failed() {
    metrics::counter!("naks_checkouts_total", "outcome" => "failed").increment(1);
}

/// Record a checkout commit that lost a revision race.
pub fn record_checkout_conflict() {
    metrics::counter!("naks_checkout_conflicts_total").increment(1);
}

/// Record an accepted RSVP.
pub fn record_rsvp(status: OrderStatus) {
    metrics::counter!("naks_rsvps_total", "status" => status.as_str()).increment(1);
}

/// Record an audit entry that could not be written.
pub fn record_audit_append_failure() {
    metrics::counter!("naks_audit_append_failures_total").increment(1);
}

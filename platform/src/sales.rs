//! Sales summaries.
//!
//! Summaries are plain sums over order documents. Order documents written by
//! older clients are not always well formed, so [`SalesSummary::from_documents`]
//! reads them leniently: a missing or malformed `tickets` array contributes
//! zero tickets and a missing or malformed `totalAmount` contributes zero
//! revenue. Neither ever fails the summary.

use crate::types::{Money, Order};
use serde::Serialize;
use serde_json::Value;

/// Totals over a set of orders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    /// Σ `totalAmount`
    pub total_revenue: Money,
    /// Σ Σ ticket quantity
    pub total_tickets_sold: u64,
    /// Number of orders
    pub total_orders: u64,
}

impl SalesSummary {
    /// Summarize typed orders
    #[must_use]
    pub fn from_orders(orders: &[Order]) -> Self {
        orders.iter().fold(Self::default(), |summary, order| {
            summary.add(order.total_amount.minor_units(), order.ticket_count())
        })
    }

    /// Summarize raw order documents, tolerating malformed ones
    #[must_use]
    pub fn from_documents(documents: &[Value]) -> Self {
        documents.iter().fold(Self::default(), |summary, document| {
            summary.add(amount_of(document), tickets_in(document))
        })
    }

    fn add(self, revenue: u64, tickets: u64) -> Self {
        Self {
            total_revenue: Money::from_minor_units(
                self.total_revenue.minor_units().saturating_add(revenue),
            ),
            total_tickets_sold: self.total_tickets_sold.saturating_add(tickets),
            total_orders: self.total_orders + 1,
        }
    }
}

/// `totalAmount` as minor units; negative or missing is 0
fn amount_of(document: &Value) -> u64 {
    match document.get("totalAmount") {
        Some(Value::Number(number)) => number.as_u64().unwrap_or_else(|| {
            number
                .as_f64()
                .filter(|amount| amount.is_finite() && *amount >= 0.0)
                .map_or(0, round_to_units)
        }),
        _ => 0,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_to_units(amount: f64) -> u64 {
    // Saturating float → int conversion
    amount.round() as u64
}

/// Σ `tickets[].quantity`; non-array `tickets` and non-numeric quantities are 0
fn tickets_in(document: &Value) -> u64 {
    document
        .get("tickets")
        .and_then(Value::as_array)
        .map_or(0, |lines| {
            lines
                .iter()
                .filter_map(|line| line.get("quantity").and_then(Value::as_u64))
                .fold(0_u64, u64::saturating_add)
        })
}

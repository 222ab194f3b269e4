//! Interactive checkout session.
//!
//! Holds one buyer's selection in a runtime [`Store`] so concurrent UI
//! actions on the same session are reduced one at a time. The held quantities
//! are advisory; checkout re-validates everything against stored inventory.

use super::services::CheckoutService;
use crate::aggregates::{AvailabilityLabel, SelectionAction, SelectionReducer, SelectionState};
use crate::error::{NaksError, Result};
use crate::types::{Actor, EventId, Order, Selection, TicketKey};
use naks_yetu_runtime::Store;
use std::sync::Arc;

type SelectionStore = Store<SelectionState, SelectionAction, (), SelectionReducer>;

/// A buyer's checkout session on one event
#[derive(Clone)]
pub struct CheckoutSession {
    event_id: EventId,
    store: SelectionStore,
    checkout: Arc<CheckoutService>,
}

impl CheckoutSession {
    /// Open a session on the current inventory of `event_id`.
    ///
    /// # Errors
    ///
    /// `NotFound` / `MalformedDocument` / `Storage` while loading the event.
    pub async fn open(checkout: Arc<CheckoutService>, event_id: EventId) -> Result<Self> {
        let event = checkout.event(event_id).await?;
        Ok(Self {
            event_id,
            store: Store::new(SelectionState::new(event), SelectionReducer::new(), ()),
            checkout,
        })
    }

    /// Event this session buys into
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Change the held quantity of `ticket_type` by `delta`; returns the new
    /// quantity.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown ticket type, `CapacityExceeded` past what is
    /// left. The selection is unchanged on error.
    pub async fn reserve(&self, ticket_type: impl Into<String>, delta: i64) -> Result<u32> {
        let ticket_type = TicketKey::new(ticket_type);
        let key = ticket_type.clone();

        self.store
            .send_and_inspect(SelectionAction::Reserve { ticket_type, delta }, move |state| {
                state
                    .last_error
                    .clone()
                    .map_or_else(|| Ok(state.quantity_of(&key)), Err)
            })
            .await?
    }

    /// Everything currently held
    pub async fn selection(&self) -> Selection {
        self.store.state(|state| state.selection.clone()).await
    }

    /// Availability labels from the session's inventory snapshot
    pub async fn labels(&self) -> Vec<(TicketKey, AvailabilityLabel)> {
        self.store.state(SelectionState::labels).await
    }

    /// Drop everything held
    ///
    /// # Errors
    ///
    /// Only if the runtime fails to settle, which a selection never does.
    pub async fn clear(&self) -> Result<()> {
        Ok(self.store.send(SelectionAction::Clear).await?)
    }

    /// Reload the inventory snapshot
    ///
    /// # Errors
    ///
    /// As [`CheckoutSession::open`].
    pub async fn refresh(&self) -> Result<()> {
        let event = self.checkout.event(self.event_id).await?;
        Ok(self.store.send(SelectionAction::Refresh { event }).await?)
    }

    /// Buy the held selection. On success the selection is cleared; on a
    /// capacity failure the snapshot is refreshed and the selection kept so
    /// the buyer can adjust it.
    ///
    /// # Errors
    ///
    /// See [`CheckoutService::checkout`].
    pub async fn checkout(&self, actor: Option<&Actor>) -> Result<Order> {
        let selection = self.selection().await;
        match self.checkout.checkout(actor, self.event_id, selection).await {
            Ok(order) => {
                self.clear().await?;
                if let Err(error) = self.refresh().await {
                    tracing::warn!(event_id = %self.event_id, %error, "Snapshot refresh failed after checkout");
                }
                Ok(order)
            },
            Err(error @ NaksError::CapacityExceeded { .. }) => {
                if let Err(refresh) = self.refresh().await {
                    tracing::warn!(event_id = %self.event_id, error = %refresh, "Snapshot refresh failed");
                }
                Err(error)
            },
            Err(error) => Err(error),
        }
    }
}

impl std::fmt::Debug for CheckoutSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutSession")
            .field("event_id", &self.event_id)
            .finish_non_exhaustive()
    }
}

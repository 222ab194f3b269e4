//! Typed access to the document store.
//!
//! Every record crosses the persistence boundary here: reads are decoded
//! into their strict schema (a mismatch is `MalformedDocument`, never a
//! silently defaulted record), writes are encoded and committed in atomic
//! batches.

use crate::config::Collections;
use crate::error::{NaksError, Result};
use crate::types::{Actor, Event, EventId, OrderId, RsvpId, UserId, UserProfile};
use naks_yetu_core::document_store::{
    DocumentKey, DocumentStore, DocumentStoreError, DocumentWrite, Revision, decode, encode,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// A record with invariants beyond its schema. A stored record that decodes
/// but breaks them is as malformed as one that does not decode.
pub trait StoredRecord: DeserializeOwned {
    /// First broken invariant, if any
    fn invariant_violation(&self) -> Option<String>;
}

impl StoredRecord for Event {
    fn invariant_violation(&self) -> Option<String> {
        Event::invariant_violation(self)
    }
}

impl StoredRecord for UserProfile {
    fn invariant_violation(&self) -> Option<String> {
        UserProfile::invariant_violation(self)
    }
}

/// A decoded record and the revision it was read at
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    /// The record
    pub record: T,
    /// Revision to pass back when replacing it
    pub revision: Revision,
}

/// Document store plus the collection layout
#[derive(Clone)]
pub struct Documents {
    store: Arc<dyn DocumentStore>,
    collections: Collections,
}

impl Documents {
    /// Wrap `store` with the given layout
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, collections: Collections) -> Self {
        Self { store, collections }
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Collection layout
    #[must_use]
    pub const fn collections(&self) -> &Collections {
        &self.collections
    }

    /// Key of an event document
    #[must_use]
    pub fn event_key(&self, id: &EventId) -> DocumentKey {
        DocumentKey::new(self.collections.events.clone(), id.to_string())
    }

    /// Key of a user profile document
    #[must_use]
    pub fn user_key(&self, id: &UserId) -> DocumentKey {
        DocumentKey::new(self.collections.users.clone(), id.as_str())
    }

    /// Key of an order document
    #[must_use]
    pub fn order_key(&self, id: &OrderId) -> DocumentKey {
        DocumentKey::new(self.collections.orders.clone(), id.to_string())
    }

    /// Key of an RSVP document
    #[must_use]
    pub fn rsvp_key(&self, id: &RsvpId) -> DocumentKey {
        DocumentKey::new(self.collections.rsvps.clone(), id.to_string())
    }

    /// Read and decode one document.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent, `MalformedDocument` when it does not decode
    /// or breaks its invariants, `Storage` when the store fails.
    pub async fn load<T: StoredRecord>(
        &self,
        kind: &'static str,
        key: DocumentKey,
    ) -> Result<Loaded<T>> {
        let Some(stored) = self.store.get(key.clone()).await? else {
            return Err(NaksError::not_found(kind, key.id()));
        };
        let record: T = decode(&key, &stored)?;
        if let Some(reason) = record.invariant_violation() {
            tracing::error!(%key, %reason, "Stored record breaks its invariants");
            return Err(NaksError::MalformedDocument {
                key: key.to_string(),
                reason,
            });
        }
        Ok(Loaded {
            record,
            revision: stored.revision,
        })
    }

    /// Read an event.
    ///
    /// # Errors
    ///
    /// See [`Documents::load`].
    pub async fn event(&self, id: &EventId) -> Result<Loaded<Event>> {
        self.load("event", self.event_key(id)).await
    }

    /// Read a user profile.
    ///
    /// # Errors
    ///
    /// See [`Documents::load`].
    pub async fn user(&self, id: &UserId) -> Result<Loaded<UserProfile>> {
        self.load("user", self.user_key(id)).await
    }

    /// Resolve the profile of an authenticated caller. A caller without a
    /// profile cannot act.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` when the caller has no profile, otherwise as
    /// [`Documents::load`].
    pub async fn actor(&self, actor: &Actor) -> Result<UserProfile> {
        match self.user(&actor.user_id).await {
            Ok(loaded) => Ok(loaded.record),
            Err(NaksError::NotFound { .. }) => Err(NaksError::PermissionDenied(format!(
                "no profile for {}",
                actor.user_id
            ))),
            Err(error) => Err(error),
        }
    }

    /// Raw bodies of every document in `collection`
    ///
    /// # Errors
    ///
    /// `Storage` when the store fails.
    pub async fn list_raw(&self, collection: &str) -> Result<Vec<(String, serde_json::Value)>> {
        let documents = self.store.list(collection.to_string()).await?;
        Ok(documents.into_iter().map(|(id, stored)| (id, stored.data)).collect())
    }

    /// Write that creates a new document
    ///
    /// # Errors
    ///
    /// `Storage` when the record cannot be encoded.
    pub fn create<T: Serialize>(key: DocumentKey, record: &T) -> Result<DocumentWrite> {
        Ok(DocumentWrite::create(key, encode(record)?))
    }

    /// Write that replaces a document read at `revision`
    ///
    /// # Errors
    ///
    /// `Storage` when the record cannot be encoded.
    pub fn replace<T: Serialize>(key: DocumentKey, revision: Revision, record: &T) -> Result<DocumentWrite> {
        Ok(DocumentWrite::replace(key, revision, encode(record)?))
    }

    /// Commit a batch atomically, keeping the store error so callers can
    /// tell a lost race from a real failure
    ///
    /// # Errors
    ///
    /// The store's error, unchanged.
    pub async fn commit(&self, writes: Vec<DocumentWrite>) -> std::result::Result<Vec<Revision>, DocumentStoreError> {
        self.store.commit(writes).await
    }
}

impl fmt::Debug for Documents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Documents")
            .field("collections", &self.collections)
            .finish_non_exhaustive()
    }
}

/// Outcome of one optimistic attempt
#[derive(Debug)]
pub(crate) enum Attempt {
    /// Lost a revision race; run the whole attempt again on fresh data
    Stale(NaksError),
    /// Final answer
    Fatal(NaksError),
}

impl Attempt {
    pub(crate) const fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }

    pub(crate) fn into_error(self) -> NaksError {
        match self {
            Self::Stale(error) | Self::Fatal(error) => error,
        }
    }

    /// Classify a commit failure
    pub(crate) fn from_commit(error: DocumentStoreError) -> Self {
        if error.is_conflict() {
            Self::Stale(error.into())
        } else {
            Self::Fatal(error.into())
        }
    }
}

impl From<NaksError> for Attempt {
    fn from(error: NaksError) -> Self {
        Self::Fatal(error)
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stale(error) => write!(f, "stale: {error}"),
            Self::Fatal(error) => write!(f, "{error}"),
        }
    }
}

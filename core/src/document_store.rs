//! Document store trait and related types.
//!
//! Every record the platform owns (events, orders, RSVPs, user profiles, audit
//! entries) lives in a document store: a keyed collection of JSON documents,
//! each carrying a monotonically increasing [`Revision`].
//!
//! # Design
//!
//! The trait exposes exactly one write primitive, [`DocumentStore::commit`],
//! which applies a batch of writes atomically. Each write carries a
//! [`Precondition`]; if any precondition fails, nothing is written and the
//! store reports [`DocumentStoreError::Conflict`] (or `AlreadyExists`). This
//! is the compare-and-swap primitive checkout uses to keep `sold <= quantity`
//! under concurrent buyers.
//!
//! Documents cross the boundary as `serde_json::Value`. [`decode`] turns them
//! into strict typed records and rejects malformed ones instead of defaulting
//! missing fields.
//!
//! # Example
//!
//! ```no_run
//! use naks_yetu_core::document_store::{DocumentKey, DocumentStore, DocumentWrite};
//!
//! async fn bump<S: DocumentStore>(store: &S) -> Result<(), Box<dyn std::error::Error>> {
//!     let key = DocumentKey::new("events", "evt-1");
//!     let Some(current) = store.get(key.clone()).await? else {
//!         return Ok(());
//!     };
//!
//!     let mut data = current.data.clone();
//!     data["views"] = serde_json::json!(data["views"].as_u64().unwrap_or(0) + 1);
//!
//!     // Fails with Conflict if someone else wrote in between
//!     store
//!         .commit(vec![DocumentWrite::replace(key, current.revision, data)])
//!         .await?;
//!     Ok(())
//! }
//! ```

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by dyn-compatible store methods.
pub type StoreFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, DocumentStoreError>> + Send + 'a>>;

/// Address of a document: collection path plus document id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentKey {
    collection: String,
    id: String,
}

impl DocumentKey {
    /// Create a key for `id` inside `collection`.
    #[must_use]
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Collection path.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Document id within the collection.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Revision of a stored document. The first committed revision is 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Revision(u64);

impl Revision {
    /// Create a revision from its raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Revision assigned to a freshly created document.
    #[must_use]
    pub const fn first() -> Self {
        Self(1)
    }

    /// Raw revision number.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The revision that follows this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document as read from the store.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredDocument {
    /// Revision at read time; pass it back to `DocumentWrite::replace`.
    pub revision: Revision,
    /// Document body.
    pub data: serde_json::Value,
}

/// Condition a write must satisfy for the whole batch to commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precondition {
    /// The document must not exist (append-only creation).
    MustNotExist,
    /// The document must exist at exactly this revision.
    Revision(Revision),
}

/// One write inside an atomic batch.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentWrite {
    /// Target document.
    pub key: DocumentKey,
    /// Condition checked before anything in the batch is applied.
    pub precondition: Precondition,
    /// New document body.
    pub data: serde_json::Value,
}

impl DocumentWrite {
    /// Create a new document; fails if it already exists.
    #[must_use]
    pub const fn create(key: DocumentKey, data: serde_json::Value) -> Self {
        Self {
            key,
            precondition: Precondition::MustNotExist,
            data,
        }
    }

    /// Replace a document last read at `expected`.
    #[must_use]
    pub const fn replace(key: DocumentKey, expected: Revision, data: serde_json::Value) -> Self {
        Self {
            key,
            precondition: Precondition::Revision(expected),
            data,
        }
    }
}

/// Errors that can occur during document store operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentStoreError {
    /// A revision precondition failed: someone else wrote the document first.
    #[error("Revision conflict on {key}: expected {expected}, found {}", display_revision(.actual))]
    Conflict {
        /// Document whose precondition failed.
        key: DocumentKey,
        /// Revision the writer expected.
        expected: Revision,
        /// Revision actually stored (`None` if the document is gone).
        actual: Option<Revision>,
    },

    /// A create write targeted an existing document.
    #[error("Document already exists: {0}")]
    AlreadyExists(DocumentKey),

    /// The stored document does not match the expected schema.
    #[error("Malformed document {key}: {reason}")]
    Malformed {
        /// Offending document.
        key: DocumentKey,
        /// Decoder message.
        reason: String,
    },

    /// A record could not be encoded into a document.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The backing database failed.
    #[error("Database error: {0}")]
    Database(String),
}

fn display_revision(revision: &Option<Revision>) -> String {
    revision.map_or_else(|| "no document".to_string(), |r| r.to_string())
}

impl DocumentStoreError {
    /// Returns `true` when a fresh read-modify-write may succeed.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Document store abstraction.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures so the store can be shared as
/// `Arc<dyn DocumentStore>` inside environments and effects.
pub trait DocumentStore: Send + Sync {
    /// Read one document. Missing documents are `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// - `Database`: the backing store failed
    fn get(&self, key: DocumentKey) -> StoreFuture<'_, Option<StoredDocument>>;

    /// Read every document in a collection, ordered by document id.
    ///
    /// # Errors
    ///
    /// - `Database`: the backing store failed
    fn list(&self, collection: String) -> StoreFuture<'_, Vec<(String, StoredDocument)>>;

    /// Apply a batch of writes atomically.
    ///
    /// Either every precondition holds and every write is applied, or nothing
    /// changes. Returns the new revision of each written document, in order.
    ///
    /// # Errors
    ///
    /// - `Conflict`: a `Revision` precondition did not match
    /// - `AlreadyExists`: a `MustNotExist` precondition did not hold
    /// - `Database`: the backing store failed
    fn commit(&self, writes: Vec<DocumentWrite>) -> StoreFuture<'_, Vec<Revision>>;
}

/// Decode a stored document into a typed record.
///
/// # Errors
///
/// Returns `Malformed` when the document does not match `T`'s schema.
pub fn decode<T: DeserializeOwned>(
    key: &DocumentKey,
    document: &StoredDocument,
) -> Result<T, DocumentStoreError> {
    T::deserialize(&document.data).map_err(|e| DocumentStoreError::Malformed {
        key: key.clone(),
        reason: e.to_string(),
    })
}

/// Encode a typed record into a document body.
///
/// # Errors
///
/// Returns `Serialization` if the record cannot be represented as JSON.
pub fn encode<T: Serialize>(record: &T) -> Result<serde_json::Value, DocumentStoreError> {
    serde_json::to_value(record).map_err(|e| DocumentStoreError::Serialization(e.to_string()))
}

//! In-memory document store for fast, deterministic testing
//!
//! [`InMemoryDocumentStore`] honours the same atomic-commit contract as a
//! production store: preconditions for the whole batch are checked under one
//! write lock before anything is applied. It also lets tests inject storage
//! failures per collection and seed raw (possibly malformed) documents.

#![allow(clippy::missing_panics_doc)]

use naks_yetu_core::document_store::{
    DocumentKey, DocumentStore, DocumentStoreError, DocumentWrite, Precondition, Revision,
    StoreFuture, StoredDocument,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct Inner {
    documents: BTreeMap<DocumentKey, StoredDocument>,
    failing_collections: HashSet<String>,
    interleaved: BTreeMap<DocumentKey, serde_json::Value>,
}

/// In-memory document store.
///
/// # Example
///
/// ```
/// use naks_yetu_testing::InMemoryDocumentStore;
/// use naks_yetu_core::document_store::{DocumentKey, DocumentStore, DocumentWrite};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryDocumentStore::new();
/// let key = DocumentKey::new("events", "e1");
///
/// store
///     .commit(vec![DocumentWrite::create(key.clone(), serde_json::json!({ "name": "Gig" }))])
///     .await?;
///
/// assert!(store.get(key).await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryDocumentStore {
    inner: Arc<RwLock<Inner>>,
    commits: Arc<AtomicUsize>,
}

impl InMemoryDocumentStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document without any precondition (test setup only).
    ///
    /// Useful for planting malformed documents the typed API would refuse
    /// to write.
    pub fn insert_raw(&self, key: DocumentKey, data: serde_json::Value) {
        let mut inner = self.write();
        let revision = inner
            .documents
            .get(&key)
            .map_or_else(Revision::first, |doc| doc.revision.next());
        inner.documents.insert(key, StoredDocument { revision, data });
    }

    /// Land `data` on `key` just before the next commit that touches it, as
    /// if a competing writer committed between that caller's read and its
    /// commit. The caller's revision precondition then fails.
    pub fn interleave_before_next_commit(&self, key: DocumentKey, data: serde_json::Value) {
        self.write().interleaved.insert(key, data);
    }

    /// Make every commit touching `collection` fail with a database error.
    pub fn fail_collection(&self, collection: impl Into<String>) {
        self.write().failing_collections.insert(collection.into());
    }

    /// Undo [`fail_collection`](Self::fail_collection).
    pub fn heal_collection(&self, collection: &str) {
        self.write().failing_collections.remove(collection);
    }

    /// Bodies of every document in `collection`, ordered by id.
    #[must_use]
    pub fn documents_in(&self, collection: &str) -> Vec<serde_json::Value> {
        self.read()
            .documents
            .iter()
            .filter(|(key, _)| key.collection() == collection)
            .map(|(_, doc)| doc.data.clone())
            .collect()
    }

    /// Body of a single document, if present.
    #[must_use]
    pub fn document(&self, key: &DocumentKey) -> Option<serde_json::Value> {
        self.read().documents.get(key).map(|doc| doc.data.clone())
    }

    /// Number of successful commits so far.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Total number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().documents.len()
    }

    /// Whether the store holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().documents.is_empty()
    }

    /// Remove every document (failure injection is kept).
    pub fn clear(&self) {
        self.write().documents.clear();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn apply(&self, writes: Vec<DocumentWrite>) -> Result<Vec<Revision>, DocumentStoreError> {
        let mut inner = self.write();

        for write in &writes {
            if let Some(data) = inner.interleaved.remove(&write.key) {
                let revision = inner
                    .documents
                    .get(&write.key)
                    .map_or_else(Revision::first, |doc| doc.revision.next());
                inner
                    .documents
                    .insert(write.key.clone(), StoredDocument { revision, data });
            }
        }

        if let Some(write) = writes
            .iter()
            .find(|w| inner.failing_collections.contains(w.key.collection()))
        {
            return Err(DocumentStoreError::Database(format!(
                "injected failure for collection {}",
                write.key.collection()
            )));
        }

        // Check every precondition before touching anything
        for write in &writes {
            let current = inner.documents.get(&write.key).map(|doc| doc.revision);
            match (write.precondition, current) {
                (Precondition::MustNotExist, Some(_)) => {
                    return Err(DocumentStoreError::AlreadyExists(write.key.clone()));
                }
                (Precondition::Revision(expected), actual) if actual != Some(expected) => {
                    return Err(DocumentStoreError::Conflict {
                        key: write.key.clone(),
                        expected,
                        actual,
                    });
                }
                _ => {}
            }
        }

        let mut revisions = Vec::with_capacity(writes.len());
        for write in writes {
            let revision = match write.precondition {
                Precondition::MustNotExist => Revision::first(),
                Precondition::Revision(expected) => expected.next(),
            };
            inner.documents.insert(
                write.key,
                StoredDocument {
                    revision,
                    data: write.data,
                },
            );
            revisions.push(revision);
        }

        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(revisions)
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn get(&self, key: DocumentKey) -> StoreFuture<'_, Option<StoredDocument>> {
        Box::pin(async move { Ok(self.read().documents.get(&key).cloned()) })
    }

    fn list(&self, collection: String) -> StoreFuture<'_, Vec<(String, StoredDocument)>> {
        Box::pin(async move {
            Ok(self
                .read()
                .documents
                .iter()
                .filter(|(key, _)| key.collection() == collection)
                .map(|(key, doc)| (key.id().to_string(), doc.clone()))
                .collect())
        })
    }

    fn commit(&self, writes: Vec<DocumentWrite>) -> StoreFuture<'_, Vec<Revision>> {
        Box::pin(async move {
            // Yield first so concurrent committers genuinely interleave in tests
            tokio::task::yield_now().await;
            self.apply(writes)
        })
    }
}

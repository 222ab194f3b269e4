//! Concurrency tests for the in-memory document store.
//!
//! Many writers race a read-modify-write on one document; the atomic commit
//! must let exactly one writer win per revision.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use naks_yetu_core::document_store::{DocumentKey, DocumentStore, DocumentWrite};
use naks_yetu_testing::InMemoryDocumentStore;
use serde_json::json;
use std::sync::Arc;

async fn increment_with_retry(store: Arc<InMemoryDocumentStore>, key: DocumentKey) -> u32 {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let current = store.get(key.clone()).await.unwrap().unwrap();
        let value = current.data["count"].as_u64().unwrap();
        let write = DocumentWrite::replace(key.clone(), current.revision, json!({ "count": value + 1 }));

        match store.commit(vec![write]).await {
            Ok(_) => return attempts,
            Err(error) if error.is_conflict() => {}
            Err(error) => panic!("unexpected store error: {error}"),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_are_never_lost() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let key = DocumentKey::new("counters", "tickets");
    store.insert_raw(key.clone(), json!({ "count": 0 }));

    let tasks: Vec<_> = (0..50)
        .map(|_| tokio::spawn(increment_with_retry(Arc::clone(&store), key.clone())))
        .collect();

    let mut total_attempts = 0;
    for task in tasks {
        total_attempts += task.await.unwrap();
    }

    assert_eq!(store.document(&key), Some(json!({ "count": 50 })));
    assert!(total_attempts >= 50);
}

#[tokio::test]
async fn stale_revision_loses() {
    let store = InMemoryDocumentStore::new();
    let key = DocumentKey::new("events", "e1");
    store.insert_raw(key.clone(), json!({ "status": "pending" }));

    let first_read = store.get(key.clone()).await.unwrap().unwrap();
    let second_read = store.get(key.clone()).await.unwrap().unwrap();

    store
        .commit(vec![DocumentWrite::replace(key.clone(), first_read.revision, json!({ "status": "live" }))])
        .await
        .unwrap();

    let error = store
        .commit(vec![DocumentWrite::replace(key.clone(), second_read.revision, json!({ "status": "rejected" }))])
        .await
        .unwrap_err();

    assert!(error.is_conflict());
    assert_eq!(store.document(&key), Some(json!({ "status": "live" })));
}

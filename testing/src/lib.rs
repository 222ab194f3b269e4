//! # Naks Yetu Testing
//!
//! Testing utilities for the Naks Yetu platform.
//!
//! This crate provides:
//! - [`ReducerTest`]: Given-When-Then harness for reducers
//! - [`InMemoryDocumentStore`]: atomic, revisioned in-memory persistence with
//!   failure injection
//! - [`FixedClock`]: deterministic time
//!
//! ## Example
//!
//! ```ignore
//! use naks_yetu_testing::{test_clock, InMemoryDocumentStore};
//!
//! #[tokio::test]
//! async fn approve_flow() {
//!     let store = Arc::new(InMemoryDocumentStore::new());
//!     let app = Platform::new(&config, store.clone(), Arc::new(test_clock()), collaborators);
//!
//!     app.approve_event(&admin, event_id).await.unwrap();
//!     assert_eq!(store.documents_in(&audit_collection).len(), 1);
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use naks_yetu_core::environment::Clock;
use std::sync::{Arc, RwLock};

pub mod document_mocks;

pub use document_mocks::InMemoryDocumentStore;
pub use reducer_test::{assertions, ReducerTest};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Arc, Clock, DateTime, Duration, RwLock, Utc};

    /// Controllable clock for deterministic tests
    ///
    /// Returns the same instant until advanced. Clones share the same time,
    /// so a test can hold one handle and move time for the code under test.
    ///
    /// # Example
    ///
    /// ```
    /// use naks_yetu_testing::mocks::FixedClock;
    /// use naks_yetu_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let before = clock.now();
    /// clock.advance(Duration::hours(1));
    /// assert_eq!(clock.now() - before, Duration::hours(1));
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock forward (or backward, with a negative duration)
        pub fn advance(&self, by: Duration) {
            if let Ok(mut time) = self.time.write() {
                *time += by;
            }
        }

        /// Jump to an absolute instant
        pub fn set(&self, to: DateTime<Utc>) {
            if let Ok(mut time) = self.time.write() {
                *time = to;
            }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
                .read()
                .map_or_else(|poisoned| *poisoned.into_inner(), |time| *time)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(1_735_689_600))
    }
}

/// Install a `tracing` subscriber that writes to the test harness output.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

pub use mocks::{test_clock, FixedClock};

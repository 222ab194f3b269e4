//! # Naks Yetu Core
//!
//! Core traits and types shared by every Naks Yetu crate.
//!
//! The platform follows a functional-core / imperative-shell layout:
//!
//! - **State**: the slice of domain records an operation works on
//! - **Action**: commands (intent) and events (facts) fed to a reducer
//! - **Reducer**: `(State, Action, Environment) → Effects`, pure and deterministic
//! - **Effect**: a description of I/O (audit append, email send, ...) executed
//!   by the runtime only after the state change has been committed
//! - **Environment**: injected dependencies (clock, document store, collaborators)
//!
//! Persistence goes through the [`document_store::DocumentStore`] trait, whose
//! only write primitive is an atomic, precondition-checked batch commit.
//!
//! ## Example
//!
//! ```
//! use naks_yetu_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! #[derive(Default)]
//! struct CounterState {
//!     sold: u32,
//! }
//!
//! enum CounterAction {
//!     Sell(u32),
//! }
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = CounterState;
//!     type Action = CounterAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CounterState,
//!         action: CounterAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<CounterAction>; 4]> {
//!         match action {
//!             CounterAction::Sell(n) => state.sold += n,
//!         }
//!         smallvec![Effect::None]
//!     }
//! }
//! ```

pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

pub mod document_store;
mod effect_macros;

/// Reducer module - the core trait for business logic
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// A reducer validates an action against the current state, mutates the
    /// state in place when the action is accepted, and returns descriptions of
    /// the side effects that should follow. Rejected commands record their
    /// error on the state and return no effects.
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - side effect descriptions
///
/// Effects are values. Reducers return them; the runtime executes them.
pub mod effect {
    use crate::document_store::{DocumentKey, DocumentStore, DocumentStoreError, Revision};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;

    /// Callback invoked with the revision of a successfully appended document
    pub type OnAppended<Action> = Box<dyn FnOnce(Revision) -> Option<Action> + Send>;

    /// Callback invoked when a document append fails
    pub type OnStoreError<Action> = Box<dyn FnOnce(DocumentStoreError) -> Option<Action> + Send>;

    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects concurrently
        Parallel(Vec<Effect<Action>>),

        /// Run effects one after another
        Sequential(Vec<Effect<Action>>),

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),

        /// Append-only document write (audit entries, notifications)
        Document(DocumentOperation<Action>),
    }

    /// Document operations that can be described as effects
    pub enum DocumentOperation<Action> {
        /// Create a document that must not exist yet
        Append {
            /// Store to write into
            store: Arc<dyn DocumentStore>,
            /// Key of the new document
            key: DocumentKey,
            /// Document body
            document: serde_json::Value,
            /// Feedback on success
            on_success: OnAppended<Action>,
            /// Feedback on failure
            on_error: OnStoreError<Action>,
        },
    }

    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Document(DocumentOperation::Append { key, .. }) => f
                    .debug_struct("Effect::Document::Append")
                    .field("key", key)
                    .finish(),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Returns the key of the document this effect appends, if any
        #[must_use]
        pub const fn appended_key(&self) -> Option<&DocumentKey> {
            match self {
                Effect::Document(DocumentOperation::Append { key, .. }) => Some(key),
                _ => None,
            }
        }
    }
}

/// Environment module - dependency injection traits
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;

    #[test]
    fn merge_and_chain_wrap_effects() {
        let merged = Effect::<()>::merge(vec![Effect::None, Effect::None]);
        assert!(matches!(merged, Effect::Parallel(ref inner) if inner.len() == 2));

        let chained = Effect::<()>::chain(vec![Effect::None]);
        assert!(matches!(chained, Effect::Sequential(ref inner) if inner.len() == 1));
        assert!(chained.appended_key().is_none());
    }
}

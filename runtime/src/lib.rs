//! # Naks Yetu Runtime
//!
//! Executes the effects reducers describe and feeds the resulting actions
//! back into them.
//!
//! ## Core Components
//!
//! - [`run_effects`]: executes a batch of effect descriptions and collects
//!   the feedback actions they produce
//! - [`settle`]: run effects, reduce their feedback, repeat until quiet
//! - [`Store`]: a long-lived state cell for interactive flows (a buyer's
//!   checkout session), serializing reducer access behind a `RwLock`
//! - [`retry`]: bounded exponential backoff for optimistic-concurrency loops
//!
//! ## Example
//!
//! ```ignore
//! use naks_yetu_runtime::Store;
//!
//! let session = Store::new(SelectionState::new(event), SelectionReducer::new(), env);
//!
//! session.send(SelectionAction::Reserve { ticket_type: vip, delta: 2 }).await?;
//! let held = session.state(|s| s.quantity_of(&vip)).await;
//! ```

use futures::future::{BoxFuture, join_all};
use naks_yetu_core::{
    SmallVec,
    document_store::{DocumentWrite, Revision},
    effect::{DocumentOperation, Effect},
    reducer::Reducer,
};
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod retry;

/// Upper bound on effect → action → effect rounds before [`settle`] gives up.
pub const DEFAULT_MAX_FEEDBACK_ROUNDS: usize = 8;

/// Error types for the runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur while settling effects
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Feedback actions kept producing effects past the round limit.
        ///
        /// Usually a reducer that answers its own feedback with the effect
        /// that produced it.
        #[error("Effects still pending after {0} feedback rounds")]
        FeedbackLoop(usize),
    }
}

pub use error::StoreError;

/// Execute effects concurrently and collect every feedback action.
///
/// Top-level effects run as if wrapped in `Effect::Parallel`. Document
/// appends are committed as create-only writes; their callbacks decide what
/// (if anything) flows back. Nothing here fails: failures surface as
/// feedback actions produced by the effect's own error callback.
pub async fn run_effects<A>(effects: impl IntoIterator<Item = Effect<A>>) -> Vec<A>
where
    A: Send + 'static,
{
    join_all(effects.into_iter().map(execute))
        .await
        .into_iter()
        .flatten()
        .collect()
}

fn execute<A>(effect: Effect<A>) -> BoxFuture<'static, Vec<A>>
where
    A: Send + 'static,
{
    Box::pin(async move {
        match effect {
            Effect::None => {
                metrics::counter!("naks_effects_executed_total", "type" => "none").increment(1);
                Vec::new()
            },
            Effect::Future(fut) => {
                metrics::counter!("naks_effects_executed_total", "type" => "future").increment(1);
                fut.await.into_iter().collect()
            },
            Effect::Parallel(effects) => {
                tracing::trace!(count = effects.len(), "Executing Effect::Parallel");
                run_effects(effects).await
            },
            Effect::Sequential(effects) => {
                tracing::trace!(count = effects.len(), "Executing Effect::Sequential");
                let mut feedback = Vec::new();
                for effect in effects {
                    feedback.extend(execute(effect).await);
                }
                feedback
            },
            Effect::Document(DocumentOperation::Append {
                store,
                key,
                document,
                on_success,
                on_error,
            }) => {
                metrics::counter!("naks_effects_executed_total", "type" => "append").increment(1);
                let write = DocumentWrite::create(key.clone(), document);

                match store.commit(vec![write]).await {
                    Ok(revisions) => {
                        tracing::trace!(%key, "Document appended");
                        let revision = revisions.first().copied().unwrap_or_else(Revision::first);
                        on_success(revision).into_iter().collect()
                    },
                    Err(error) => {
                        tracing::warn!(%key, %error, "Document append failed");
                        on_error(error).into_iter().collect()
                    },
                }
            },
        }
    })
}

/// Run `effects`, reduce the actions they feed back into `state`, and repeat
/// until no effects remain.
///
/// Callers commit the state change first and settle afterwards, so effects
/// only ever describe consequences of persisted facts.
///
/// # Errors
///
/// [`StoreError::FeedbackLoop`] when effects are still pending after
/// `max_rounds` rounds.
pub async fn settle<R>(
    reducer: &R,
    state: &mut R::State,
    effects: SmallVec<[Effect<R::Action>; 4]>,
    env: &R::Environment,
    max_rounds: usize,
) -> Result<(), StoreError>
where
    R: Reducer,
    R::Action: Send + 'static,
{
    let mut pending: Vec<Effect<R::Action>> = effects.into_vec();

    for _ in 0..max_rounds {
        if pending.iter().all(|e| matches!(e, Effect::None)) {
            return Ok(());
        }

        let feedback = run_effects(std::mem::take(&mut pending)).await;
        for action in feedback {
            pending.extend(reducer.reduce(state, action, env));
        }
    }

    if pending.iter().all(|e| matches!(e, Effect::None)) {
        Ok(())
    } else {
        Err(StoreError::FeedbackLoop(max_rounds))
    }
}

/// Store module - shared state cell driven by a reducer
pub mod store {
    use super::{
        Arc, DEFAULT_MAX_FEEDBACK_ROUNDS, Effect, Reducer, RwLock, StoreError, run_effects,
    };

    /// Runtime coordinator for one reducer and its state.
    ///
    /// Actions are reduced one at a time under the write lock; effects run
    /// after the lock is released and their feedback is reduced in turn.
    /// Clones share the same state.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: Arc<R>,
        environment: Arc<E>,
        max_feedback_rounds: usize,
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                max_feedback_rounds: self.max_feedback_rounds,
            }
        }
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a store with initial state, reducer and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                max_feedback_rounds: DEFAULT_MAX_FEEDBACK_ROUNDS,
            }
        }

        /// Send an action and wait until its effects have settled.
        ///
        /// # Errors
        ///
        /// [`StoreError::FeedbackLoop`] if effects never settle.
        pub async fn send(&self, action: A) -> Result<(), StoreError> {
            self.send_and_inspect(action, |_| ()).await
        }

        /// Send an action, observe the state right after the reducer ran
        /// (before any other action can interleave), then settle effects.
        ///
        /// # Errors
        ///
        /// [`StoreError::FeedbackLoop`] if effects never settle.
        pub async fn send_and_inspect<T, F>(&self, action: A, inspect: F) -> Result<T, StoreError>
        where
            F: FnOnce(&S) -> T,
        {
            let (effects, observed) = {
                let mut state = self.state.write().await;
                let effects = self.reducer.reduce(&mut state, action, &self.environment);
                (effects, inspect(&state))
            };

            let mut pending: Vec<Effect<A>> = effects.into_vec();
            for _ in 0..self.max_feedback_rounds {
                if pending.iter().all(|e| matches!(e, Effect::None)) {
                    return Ok(observed);
                }

                let feedback = run_effects(std::mem::take(&mut pending)).await;
                let mut state = self.state.write().await;
                for action in feedback {
                    pending.extend(self.reducer.reduce(&mut state, action, &self.environment));
                }
            }

            if pending.iter().all(|e| matches!(e, Effect::None)) {
                Ok(observed)
            } else {
                tracing::error!(rounds = self.max_feedback_rounds, "Effects did not settle");
                Err(StoreError::FeedbackLoop(self.max_feedback_rounds))
            }
        }

        /// Read a projection of the current state
        pub async fn state<T, F>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&state)
        }
    }
}

pub use store::Store;

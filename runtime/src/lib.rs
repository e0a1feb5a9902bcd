//! # Reqflow Runtime
//!
//! Runtime for the reqflow request-lifecycle controller.
//!
//! This crate provides the Store runtime that coordinates reducer execution
//! and effect handling, plus the [`RequestController`] facade external
//! collaborators call.
//!
//! ## Core Components
//!
//! - **Store**: owns state behind a single-writer lock, runs the reducer
//!   synchronously, and executes effect descriptions
//! - **Effect Executor**: spawns effect futures and feeds produced events
//!   back into the reducer
//! - **Event Broadcast**: an observation channel carrying every
//!   effect-produced event, for diagnostics and request/response waiting
//! - **`RequestController`**: the public facade (`run`, `refetch`,
//!   `mutate`, `data`, `loading`)
//!
//! ## Example
//!
//! ```ignore
//! use reqflow_runtime::RequestController;
//!
//! let (controller, started) = RequestController::start(runner, options).await?;
//! let _ = controller.run(Some(params), None).await?;
//! let data = controller.data().await;
//! ```

use reqflow_core::effect::Effect;
use reqflow_core::reducer::Reducer;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Prometheus metrics exposition for the store
pub mod metrics;

/// The request controller facade
pub mod controller;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    ///
    /// Effect execution itself never surfaces here: effects are
    /// fire-and-forget and contained by the reducer's own error handling.
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new events
        ///
        /// This error is returned when `send()` is called after shutdown
        /// initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        ///
        /// Some effects were still running when the timeout elapsed.
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),
    }
}

pub use controller::RequestController;
pub use error::StoreError;
pub use store::Store;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`] to allow waiting for effects to complete.
/// The counter covers the whole feedback cascade of the dispatched event:
/// when an effect produces a follow-up event, the effects of *that* event
/// are awaited before the original handle resolves. For a fetch this means
/// the handle covers the fetcher call, the settlement transition, and the
/// callback effects it produced.
///
/// # Example
///
/// ```ignore
/// let handle = store.send(RequestEvent::Fetch { params, on_complete }).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// // The attempt has fully settled (or been superseded).
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    /// Create a new effect handle together with its internal tracking side.
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: tx,
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    ///
    /// Useful when a dispatch was suppressed (a manual start) or for loop
    /// initialization.
    #[must_use]
    pub fn completed() -> Self {
        let (tx, rx) = watch::channel(());
        let _ = tx.send(());

        Self {
            effects: Arc::new(AtomicUsize::new(0)),
            completion: rx,
        }
    }

    /// Wait for all effects to complete
    ///
    /// Blocks until the effect counter reaches zero.
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            let _ = self.completion.changed().await;
        }
    }

    /// Wait for all effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns `Err(())` if the timeout expires before all effects
    /// complete.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), ()> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| ())
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: effect tracking context passed through effect execution
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: watch::Sender<()>,
}

impl EffectTracking {
    /// Increment the effect counter (effect started)
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement the effect counter (effect completed)
    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Counter reached zero, notify waiters
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: RAII guard that decrements the effect counter on drop
///
/// Ensures the counter is always decremented, even if the effect panics.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store module - the runtime for reducers
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, DecrementGuard, Duration, Effect,
        EffectHandle, EffectTracking, Ordering, Reducer, RwLock, StoreError,
    };
    use tokio::sync::broadcast;

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind an `RwLock`, mutated only by the reducer —
    ///    single-writer)
    /// 2. Reducer (transition logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `E`: Event type
    /// - `Env`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, E, Env, R>
    where
        R: Reducer<State = S, Event = E, Environment = Env>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: Env,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        /// Event broadcast channel for observing events produced by
        /// effects.
        ///
        /// Every event fed back by an effect is broadcast to observers,
        /// decoupling diagnostics from the transition function.
        event_broadcast: broadcast::Sender<E>,
    }

    impl<S, E, Env, R> Store<S, E, Env, R>
    where
        R: Reducer<State = S, Event = E, Environment = Env> + Clone + Send + Sync + 'static,
        E: Clone + Send + 'static,
        S: Send + Sync + 'static,
        Env: Clone + Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        ///
        /// The event broadcast capacity defaults to 16; increase with
        /// [`Store::with_broadcast_capacity`] when observers lag.
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: Env) -> Self {
            Self::with_broadcast_capacity(initial_state, reducer, environment, 16)
        }

        /// Create a new store with a custom event broadcast capacity
        #[must_use]
        pub fn with_broadcast_capacity(
            initial_state: S,
            reducer: R,
            environment: Env,
            capacity: usize,
        ) -> Self {
            let (event_broadcast, _) = broadcast::channel(capacity);

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                event_broadcast,
            }
        }

        /// Send an event to the store
        ///
        /// This is the primary way to interact with the store:
        /// 1. Acquires the write lock on state
        /// 2. Calls the reducer with (state, event, environment)
        /// 3. Executes returned effects asynchronously
        /// 4. Effects may produce more events (feedback loop)
        ///
        /// The reducer executes synchronously while holding the write lock;
        /// effects execute in spawned tasks. `send()` returns after
        /// *starting* effect execution — await the returned
        /// [`EffectHandle`] for completion.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is
        /// shutting down.
        #[tracing::instrument(skip(self, event), name = "store_send")]
        pub async fn send(&self, event: E) -> Result<EffectHandle, StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("rejected event: store is shutting down");
                metrics::counter!("store.shutdown.rejected_events").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            tracing::debug!("processing event");
            metrics::counter!("store.events.total").increment(1);

            let (handle, tracking) = EffectHandle::new();

            let effects = {
                let mut state = self.state.write().await;
                tracing::trace!("acquired write lock on state");

                let span = tracing::debug_span!("reducer_execution");
                let _enter = span.enter();

                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut state, event, &self.environment);
                metrics::histogram!("store.reducer.duration_seconds")
                    .record(start.elapsed().as_secs_f64());

                tracing::trace!("reducer completed, returned {} effects", effects.len());
                effects
            };

            for effect in effects {
                self.execute_effect(effect, tracking.clone());
            }

            Ok(handle)
        }

        /// Read current state via a closure
        ///
        /// Access state through a closure to ensure the lock is released
        /// promptly:
        ///
        /// ```ignore
        /// let loading = store.state(|s| s.phase.is_loading()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&state)
        }

        /// Subscribe to all events produced by effects
        ///
        /// Only effect-produced events are broadcast (not the events sent
        /// via [`Store::send`] directly); a lagging receiver skips old
        /// events.
        #[must_use]
        pub fn subscribe_events(&self) -> broadcast::Receiver<E> {
            self.event_broadcast.subscribe()
        }

        /// Initiate graceful shutdown of the store
        ///
        /// Sets the shutdown flag (rejecting new events), then waits for
        /// pending effects to complete.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires
        /// before all pending effects complete.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("initiating graceful shutdown");
            metrics::counter!("store.shutdown.initiated").increment(1);

            self.shutdown.store(true, Ordering::Release);

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(100);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("all effects completed, shutdown successful");
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(
                        pending_effects = pending,
                        "shutdown timeout: {} effects still running",
                        pending
                    );
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Execute an effect with tracking
        ///
        /// `Effect::Future` runs in a spawned task; when it produces a
        /// feedback event, that event is broadcast, sent back into the
        /// reducer, and its own effects are awaited before this effect
        /// counts as complete — which is what lets one [`EffectHandle`]
        /// cover an entire cascade. [`DecrementGuard`] keeps the counter
        /// correct even if the effect task panics.
        fn execute_effect(&self, effect: Effect<E>, tracking: EffectTracking) {
            match effect {
                Effect::None => {
                    tracing::trace!("executing Effect::None (no-op)");
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                }
                Effect::Future(fut) => {
                    tracing::trace!("executing Effect::Future");
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    tracking.increment();

                    // Track global pending effects for shutdown
                    self.pending_effects.fetch_add(1, Ordering::SeqCst);
                    let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));

                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = DecrementGuard(tracking);
                        let _pending_guard = pending_guard; // Decrement on drop

                        if let Some(event) = fut.await {
                            tracing::trace!("effect produced an event, feeding back");

                            // Broadcast to observers before applying
                            let _ = store.event_broadcast.send(event.clone());

                            if let Ok(mut handle) = store.send(event).await {
                                handle.wait().await;
                            }
                        } else {
                            tracing::trace!("effect completed with no event");
                        }
                    });
                }
            }
        }
    }

    impl<S, E, Env, R> Clone for Store<S, E, Env, R>
    where
        R: Reducer<State = S, Event = E, Environment = Env> + Clone,
        Env: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                event_broadcast: self.event_broadcast.clone(),
            }
        }
    }
}

// Test module
#[cfg(test)]
mod tests {
    use super::*;
    use reqflow_core::{SmallVec, smallvec};
    use std::time::Duration;
    use tokio_test::assert_ok;

    #[derive(Debug, Clone)]
    struct PingState {
        pings: u32,
        pongs: u32,
    }

    #[derive(Debug, Clone)]
    enum PingEvent {
        Ping,
        Pong,
    }

    #[derive(Debug, Clone)]
    struct PingReducer;

    #[derive(Debug, Clone)]
    struct PingEnv;

    impl Reducer for PingReducer {
        type State = PingState;
        type Event = PingEvent;
        type Environment = PingEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            event: Self::Event,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Event>; 4]> {
            match event {
                PingEvent::Ping => {
                    state.pings += 1;
                    smallvec![Effect::Future(Box::pin(async { Some(PingEvent::Pong) }))]
                }
                PingEvent::Pong => {
                    state.pongs += 1;
                    smallvec![Effect::None]
                }
            }
        }
    }

    fn ping_store() -> Store<PingState, PingEvent, PingEnv, PingReducer> {
        Store::new(PingState { pings: 0, pongs: 0 }, PingReducer, PingEnv)
    }

    #[tokio::test]
    async fn handle_covers_the_feedback_cascade() {
        let store = ping_store();

        let mut handle = tokio_test::assert_ok!(store.send(PingEvent::Ping).await);
        tokio_test::assert_ok!(handle.wait_with_timeout(Duration::from_secs(5)).await);

        let (pings, pongs) = store.state(|s| (s.pings, s.pongs)).await;
        assert_eq!(pings, 1);
        assert_eq!(pongs, 1);
    }

    #[tokio::test]
    async fn effect_events_are_broadcast() {
        let store = ping_store();
        let mut events = store.subscribe_events();

        let mut handle = tokio_test::assert_ok!(store.send(PingEvent::Ping).await);
        handle.wait().await;

        let observed = tokio_test::assert_ok!(events.recv().await);
        assert!(matches!(observed, PingEvent::Pong));
    }

    #[tokio::test]
    async fn shutdown_rejects_new_events() {
        let store = ping_store();
        tokio_test::assert_ok!(store.shutdown(Duration::from_secs(1)).await);

        let result = store.send(PingEvent::Ping).await;
        assert!(matches!(result, Err(StoreError::ShutdownInProgress)));
    }

    #[tokio::test]
    async fn completed_handle_resolves_immediately() {
        let mut handle = EffectHandle::completed();
        tokio_test::assert_ok!(handle.wait_with_timeout(Duration::from_millis(10)).await);
    }
}

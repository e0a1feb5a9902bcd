//! # Reqflow Testing
//!
//! Testing utilities and helpers for the reqflow request-lifecycle
//! controller.
//!
//! This crate provides:
//! - Mock fetchers (scripted outcomes, gated settlement)
//! - A callback recorder capturing lifecycle notifications
//! - A fluent Given-When-Then harness for transition-function tests
//!
//! ## Example
//!
//! ```ignore
//! use reqflow_testing::{CallbackRecorder, MockFetcher};
//!
//! #[tokio::test]
//! async fn test_lookup_flow() {
//!     let fetcher = MockFetcher::always(Ok(Envelope::ok(user)));
//!     let recorder = CallbackRecorder::new();
//!     let options = RequestOptions::new()
//!         .with_on_success(recorder.on_success())
//!         .with_on_fail(recorder.on_fail());
//!     // ...
//!     assert_eq!(recorder.successes().len(), 1);
//! }
//! ```


/// Mock fetcher implementations for testing.
pub mod mocks {
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex, PoisonError};

    use tokio::sync::Semaphore;

    use reqflow_core::error::TransportError;
    use reqflow_core::runner::Fetcher;

    fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A fetcher resolving each call from a scripted queue of outcomes.
    ///
    /// Every invocation records the parameters it received. When the script
    /// runs dry the fallback outcome (if any) is used; otherwise the call
    /// rejects with a distinctive transport error.
    pub struct MockFetcher<P, R> {
        script: Arc<Mutex<VecDeque<Result<R, TransportError>>>>,
        fallback: Option<Result<R, TransportError>>,
        calls: Arc<Mutex<Vec<P>>>,
    }

    impl<P, R> MockFetcher<P, R> {
        /// A fetcher resolving every call with the same outcome.
        #[must_use]
        pub fn always(outcome: Result<R, TransportError>) -> Self {
            Self {
                script: Arc::new(Mutex::new(VecDeque::new())),
                fallback: Some(outcome),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// A fetcher resolving calls from a queue of outcomes, in order.
        /// Calls beyond the script reject.
        #[must_use]
        pub fn script(outcomes: impl IntoIterator<Item = Result<R, TransportError>>) -> Self {
            Self {
                script: Arc::new(Mutex::new(outcomes.into_iter().collect())),
                fallback: None,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Append an outcome to the script.
        pub fn push(&self, outcome: Result<R, TransportError>) {
            lock(&self.script).push_back(outcome);
        }

        /// Number of invocations so far.
        #[must_use]
        pub fn call_count(&self) -> usize {
            lock(&self.calls).len()
        }
    }

    impl<P: Clone, R> MockFetcher<P, R> {
        /// Every parameter set this fetcher was invoked with, in order.
        #[must_use]
        pub fn calls(&self) -> Vec<P> {
            lock(&self.calls).clone()
        }
    }

    impl<P, R> Clone for MockFetcher<P, R>
    where
        R: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                script: Arc::clone(&self.script),
                fallback: self.fallback.clone(),
                calls: Arc::clone(&self.calls),
            }
        }
    }

    impl<P, R> Fetcher<P, R> for MockFetcher<P, R>
    where
        P: Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
    {
        fn fetch(
            &self,
            params: P,
        ) -> Pin<Box<dyn Future<Output = Result<R, TransportError>> + Send + '_>> {
            lock(&self.calls).push(params);
            let outcome = lock(&self.script).pop_front().or_else(|| self.fallback.clone());
            Box::pin(async move {
                outcome.unwrap_or_else(|| Err(TransportError::failed("mock fetcher exhausted")))
            })
        }
    }

    /// A fetcher that does not settle until released.
    ///
    /// Each invocation waits for one permit, letting tests observe the
    /// loading phase and control settlement order across overlapping
    /// attempts.
    pub struct GatedFetcher<P, R> {
        gate: Arc<Semaphore>,
        script: Arc<Mutex<VecDeque<Result<R, TransportError>>>>,
        calls: Arc<Mutex<Vec<P>>>,
    }

    impl<P, R> GatedFetcher<P, R> {
        /// A gated fetcher resolving calls from a queue of outcomes once
        /// released.
        #[must_use]
        pub fn script(outcomes: impl IntoIterator<Item = Result<R, TransportError>>) -> Self {
            Self {
                gate: Arc::new(Semaphore::new(0)),
                script: Arc::new(Mutex::new(outcomes.into_iter().collect())),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Release `n` pending (or future) invocations.
        pub fn release(&self, n: usize) {
            self.gate.add_permits(n);
        }

        /// Number of invocations so far (settled or still gated).
        #[must_use]
        pub fn call_count(&self) -> usize {
            lock(&self.calls).len()
        }
    }

    impl<P: Clone, R> GatedFetcher<P, R> {
        /// Every parameter set this fetcher was invoked with, in order.
        #[must_use]
        pub fn calls(&self) -> Vec<P> {
            lock(&self.calls).clone()
        }
    }

    impl<P, R> Clone for GatedFetcher<P, R> {
        fn clone(&self) -> Self {
            Self {
                gate: Arc::clone(&self.gate),
                script: Arc::clone(&self.script),
                calls: Arc::clone(&self.calls),
            }
        }
    }

    impl<P, R> Fetcher<P, R> for GatedFetcher<P, R>
    where
        P: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        fn fetch(
            &self,
            params: P,
        ) -> Pin<Box<dyn Future<Output = Result<R, TransportError>> + Send + '_>> {
            lock(&self.calls).push(params);
            let gate = Arc::clone(&self.gate);
            let script = Arc::clone(&self.script);
            Box::pin(async move {
                match gate.acquire().await {
                    Ok(permit) => permit.forget(),
                    Err(_closed) => return Err(TransportError::failed("gate closed")),
                }
                lock(&script)
                    .pop_front()
                    .unwrap_or_else(|| Err(TransportError::failed("gated fetcher exhausted")))
            })
        }
    }
}

/// Recorder for lifecycle callbacks.
pub mod recorder {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};

    use reqflow_core::options::{CompleteFn, Completion};

    /// Captures every lifecycle notification a controller emits, for
    /// asserting on callback behavior without sprinkling ad-hoc channels
    /// through tests.
    pub struct CallbackRecorder<P, R, S> {
        successes: Arc<Mutex<Vec<(S, Option<P>)>>>,
        fails: Arc<Mutex<Vec<String>>>,
        refetches: Arc<AtomicUsize>,
        completions: Arc<Mutex<Vec<Completion<R, S>>>>,
    }

    fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    impl<P, R, S> CallbackRecorder<P, R, S>
    where
        P: Clone + Send + Sync + 'static,
        R: Send + Sync + 'static,
        S: Clone + Send + Sync + 'static,
    {
        /// A recorder with no notifications captured yet.
        #[must_use]
        pub fn new() -> Self {
            Self {
                successes: Arc::new(Mutex::new(Vec::new())),
                fails: Arc::new(Mutex::new(Vec::new())),
                refetches: Arc::new(AtomicUsize::new(0)),
                completions: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// A success callback recording `(data, params)` pairs.
        #[must_use]
        pub fn on_success(&self) -> impl Fn(&S, Option<&P>) + Send + Sync + 'static {
            let successes = Arc::clone(&self.successes);
            move |data: &S, params: Option<&P>| {
                lock(&successes).push((data.clone(), params.cloned()));
            }
        }

        /// A failure callback recording messages.
        #[must_use]
        pub fn on_fail(&self) -> impl Fn(&str) + Send + Sync + 'static {
            let fails = Arc::clone(&self.fails);
            move |message: &str| {
                lock(&fails).push(message.to_string());
            }
        }

        /// A refetch callback counting notifications.
        #[must_use]
        pub fn on_refetch(&self) -> impl Fn() + Send + Sync + 'static {
            let refetches = Arc::clone(&self.refetches);
            move || {
                refetches.fetch_add(1, Ordering::SeqCst);
            }
        }

        /// A per-call completion callback recording what it received.
        #[must_use]
        pub fn on_complete(&self) -> CompleteFn<R, S> {
            let completions = Arc::clone(&self.completions);
            Arc::new(move |completion: Completion<R, S>| {
                lock(&completions).push(completion);
            })
        }

        /// Recorded `(data, params)` pairs from the success callback.
        #[must_use]
        pub fn successes(&self) -> Vec<(S, Option<P>)> {
            lock(&self.successes).clone()
        }

        /// Recorded messages from the failure callback.
        #[must_use]
        pub fn fails(&self) -> Vec<String> {
            lock(&self.fails).clone()
        }

        /// How many refetch notifications fired.
        #[must_use]
        pub fn refetch_count(&self) -> usize {
            self.refetches.load(Ordering::SeqCst)
        }

        /// Recorded per-call completions.
        #[must_use]
        pub fn completions(&self) -> Vec<Completion<R, S>>
        where
            R: Clone,
        {
            lock(&self.completions).clone()
        }
    }

    impl<P, R, S> Default for CallbackRecorder<P, R, S>
    where
        P: Clone + Send + Sync + 'static,
        R: Send + Sync + 'static,
        S: Clone + Send + Sync + 'static,
    {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<P, R, S> Clone for CallbackRecorder<P, R, S> {
        fn clone(&self) -> Self {
            Self {
                successes: Arc::clone(&self.successes),
                fails: Arc::clone(&self.fails),
                refetches: Arc::clone(&self.refetches),
                completions: Arc::clone(&self.completions),
            }
        }
    }
}

// Re-export commonly used items
pub use mocks::{GatedFetcher, MockFetcher};
pub use recorder::CallbackRecorder;
pub use reducer_test::ReducerTest;

#[cfg(test)]
mod tests {
    use super::*;
    use reqflow_core::error::TransportError;
    use reqflow_core::runner::Fetcher;

    #[test]
    fn mock_fetcher_scripts_in_order() {
        let fetcher: MockFetcher<u64, u64> = MockFetcher::script([Ok(1), Ok(2)]);

        assert_eq!(tokio_test::block_on(fetcher.fetch(10)), Ok(1));
        assert_eq!(tokio_test::block_on(fetcher.fetch(20)), Ok(2));
        assert_eq!(
            tokio_test::block_on(fetcher.fetch(30)),
            Err(TransportError::failed("mock fetcher exhausted"))
        );
        assert_eq!(fetcher.calls(), vec![10, 20, 30]);
    }

    #[test]
    fn mock_fetcher_always_repeats() {
        let fetcher: MockFetcher<(), u64> = MockFetcher::always(Ok(7));
        assert_eq!(tokio_test::block_on(fetcher.fetch(())), Ok(7));
        assert_eq!(tokio_test::block_on(fetcher.fetch(())), Ok(7));
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn gated_fetcher_settles_only_when_released() {
        let fetcher: GatedFetcher<(), u64> = GatedFetcher::script([Ok(1)]);
        let in_flight = fetcher.clone();

        let task = tokio::spawn(async move { in_flight.fetch(()).await });
        tokio::task::yield_now().await;
        assert!(!task.is_finished());

        fetcher.release(1);
        let outcome = task.await.unwrap_or_else(|_| Err(TransportError::failed("join")));
        assert_eq!(outcome, Ok(1));
    }
}

//! The request controller facade.
//!
//! The public surface external collaborators call. Every operation
//! translates into a state-machine event; the facade never mutates context
//! directly, and everything it returns is read from an immutable snapshot.

use std::time::Duration;

use tokio::sync::broadcast;

use reqflow_core::environment::RequestEnvironment;
use reqflow_core::event::RequestEvent;
use reqflow_core::machine::RequestReducer;
use reqflow_core::options::{CompleteFn, RequestOptions};
use reqflow_core::params::Params;
use reqflow_core::payload::{FromRaw, Validity};
use reqflow_core::runner::RequestRunner;
use reqflow_core::state::{RequestPhase, RequestSnapshot, RequestState};

use crate::{EffectHandle, Store, StoreError};

/// The concrete store type driving a request controller.
pub type RequestStore<P, R, S> = Store<
    RequestState<P, R, S>,
    RequestEvent<P, R, S>,
    RequestEnvironment<P, R>,
    RequestReducer<P, R, S>,
>;

/// The request lifecycle controller.
///
/// Wraps one fetcher registry and one state machine. At most one fetch
/// result is authoritative at a time; dispatching a new fetch while one is
/// in flight supersedes it (the stale settlement is discarded).
///
/// # Type Parameters
///
/// - `P`: request parameters
/// - `R`: raw fetch result
/// - `S`: formatted data (`S = R` when no formatting is involved)
///
/// # Example
///
/// ```ignore
/// let runner = RequestRunner::single(fetch_user);
/// let options = RequestOptions::new().with_default_params(params);
/// let (controller, started) = RequestController::start(runner, options).await?;
/// started; // resolves when the auto-fetch has settled
///
/// let data = controller.data().await;
/// let loading = controller.loading().await;
/// ```
pub struct RequestController<P, R, S>
where
    P: Params,
    R: Validity + Clone + std::fmt::Debug + Send + Sync + 'static,
    S: FromRaw<R> + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    store: RequestStore<P, R, S>,
}

impl<P, R, S> RequestController<P, R, S>
where
    P: Params,
    R: Validity + Clone + std::fmt::Debug + Send + Sync + 'static,
    S: FromRaw<R> + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    /// Construct a controller and start its lifecycle.
    ///
    /// Unless `manual` is set in the options, a fetch carrying the default
    /// parameters is dispatched immediately. The returned handle resolves
    /// when that fetch (including its callbacks) has settled; with `manual`
    /// it is already complete.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the auto-fetch cannot be dispatched.
    pub async fn start(
        runner: RequestRunner<P, R>,
        options: RequestOptions<P, R, S>,
    ) -> Result<(Self, EffectHandle), StoreError> {
        let manual = options.manual;
        let default_params = options.default_params.clone();

        let store = Store::new(
            RequestState::new(options),
            RequestReducer::new(),
            RequestEnvironment::new(runner),
        );
        let controller = Self { store };

        let handle = if manual {
            EffectHandle::completed()
        } else {
            controller
                .store
                .send(RequestEvent::Fetch {
                    params: default_params,
                    on_complete: None,
                })
                .await?
        };

        Ok((controller, handle))
    }

    /// Begin a fetch with the given parameters (or the defaults when
    /// `None`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is shutting down.
    pub async fn run(
        &self,
        params: Option<P>,
        on_complete: Option<CompleteFn<R, S>>,
    ) -> Result<EffectHandle, StoreError> {
        self.store
            .send(RequestEvent::Fetch { params, on_complete })
            .await
    }

    /// Begin a fetch with partial parameters merged over the previous
    /// attempt's cached parameters.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is shutting down.
    pub async fn refetch(
        &self,
        on_complete: Option<CompleteFn<R, S>>,
        params: Option<P>,
    ) -> Result<EffectHandle, StoreError> {
        self.store
            .send(RequestEvent::Refetch { params, on_complete })
            .await
    }

    /// Begin a fetch reusing the previous attempt's cached parameters
    /// verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is shutting down.
    pub async fn retry(
        &self,
        on_complete: Option<CompleteFn<R, S>>,
    ) -> Result<EffectHandle, StoreError> {
        self.store.send(RequestEvent::Retry { on_complete }).await
    }

    /// Overwrite `data` locally, bypassing the network entirely.
    ///
    /// Applies only once a fetch has succeeded (the machine ignores local
    /// updates in other phases).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is shutting down.
    pub async fn mutate(&self, data: S) -> Result<EffectHandle, StoreError> {
        self.store.send(RequestEvent::UpdateData(data)).await
    }

    /// The last successfully formatted result, if any.
    pub async fn data(&self) -> Option<S> {
        self.store.state(|s| s.context.data.clone()).await
    }

    /// True while a fetch attempt is in flight.
    pub async fn loading(&self) -> bool {
        self.store.state(|s| s.phase.is_loading()).await
    }

    /// The last failure description; empty outside fail paths.
    pub async fn message(&self) -> String {
        self.store.state(|s| s.context.message.clone()).await
    }

    /// The active lifecycle phase.
    pub async fn phase(&self) -> RequestPhase {
        self.store.state(|s| s.phase).await
    }

    /// The parameters actually sent on the most recent fetch attempt.
    pub async fn last_request_params(&self) -> Option<P> {
        self.store
            .state(|s| s.context.last_request_params.clone())
            .await
    }

    /// An immutable view of the current state.
    pub async fn snapshot(&self) -> RequestSnapshot<P, S> {
        self.store.state(RequestState::snapshot).await
    }

    /// Subscribe to every event produced by effects (settlements and
    /// machine bookkeeping), for diagnostics or request/response waiting.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<RequestEvent<P, R, S>> {
        self.store.subscribe_events()
    }

    /// Gracefully shut the controller down: reject new events, wait for
    /// in-flight effects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if effects are still
    /// running when the timeout elapses.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        self.store.shutdown(timeout).await
    }
}

impl<P, R, S> Clone for RequestController<P, R, S>
where
    P: Params,
    R: Validity + Clone + std::fmt::Debug + Send + Sync + 'static,
    S: FromRaw<R> + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

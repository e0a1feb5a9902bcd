//! The request state machine: the full transition table as a pure reducer.
//!
//! The reducer applies one event at a time, synchronously, and returns
//! effect descriptions for everything asynchronous. The only suspension
//! point of the whole lifecycle is the fetcher call inside the fetch
//! effect; every transition below runs to completion.
//!
//! Transition table (state × event → effect / next):
//!
//! | State   | Event                      | Effect                                   | Next    |
//! |---------|----------------------------|------------------------------------------|---------|
//! | Idle    | Fetch                      | begin fetch with given or default params | Loading |
//! | Loading | CacheParams                | record params actually sent              | Loading |
//! | Loading | Fetch / Refetch / Retry    | begin superseding fetch (new generation) | Loading |
//! | Loading | Settled (guard passes)     | format, update data, success callbacks   | Success |
//! | Loading | Settled (guard fails)      | extract message, failure callbacks       | Fail    |
//! | Loading | Settled (rejected)         | set message from error, no callbacks     | Fail    |
//! | Success | Fetch / Refetch / Retry    | begin new fetch                          | Loading |
//! | Success | UpdateData                 | overwrite data, clear message            | Success |
//! | Success | UpdateErrorMessage         | overwrite message                        | Success |
//! | Fail    | Fetch / Refetch / Retry    | begin new fetch                          | Loading |
//! | Fail    | UpdateErrorMessage         | overwrite message                        | Fail    |
//!
//! Events without a row are ignored where they arrive (traced, no
//! transition). A settlement whose generation is no longer current is
//! discarded the same way regardless of phase.

use std::marker::PhantomData;

use smallvec::{SmallVec, smallvec};

use crate::effect::Effect;
use crate::environment::RequestEnvironment;
use crate::error::TransportError;
use crate::event::RequestEvent;
use crate::options::{CompleteFn, Completion};
use crate::params::Params;
use crate::payload::{FromRaw, Validity};
use crate::reducer::Reducer;
use crate::state::{RequestPhase, RequestState};

/// Which intent began a fetch attempt; decides how effective parameters are
/// computed.
#[derive(Debug, Clone, Copy)]
enum FetchKind {
    Fetch,
    Refetch,
    Retry,
}

impl FetchKind {
    const fn event_name(self) -> &'static str {
        match self {
            Self::Fetch => "FETCH",
            Self::Refetch => "REFETCH",
            Self::Retry => "RETRY",
        }
    }
}

/// The request lifecycle reducer.
///
/// Stateless itself; all state lives in [`RequestState`], all dependencies
/// in [`RequestEnvironment`].
#[derive(Debug, Clone, Copy)]
pub struct RequestReducer<P, R, S> {
    _phantom: PhantomData<(P, R, S)>,
}

impl<P, R, S> RequestReducer<P, R, S> {
    /// Create a new request reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<P, R, S> Default for RequestReducer<P, R, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, R, S> RequestReducer<P, R, S>
where
    P: Params,
    R: Validity + Clone + std::fmt::Debug + Send + Sync + 'static,
    S: FromRaw<R> + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    fn trace(request_key: &str, from: RequestPhase, to: RequestPhase, event: &str) {
        tracing::debug!(request_key, from = %from, to = %to, event, "transition");
    }

    fn ignore(state: &RequestState<P, R, S>, event: &str) {
        tracing::trace!(
            request_key = state.request_key(),
            phase = %state.phase,
            event,
            "event ignored in this phase"
        );
    }

    /// Begin a fetch attempt: compute effective parameters, bump the
    /// generation, cache what is about to be sent, and emit the fetch
    /// effect.
    ///
    /// The `CacheParams` self-dispatch happens before the effect is even
    /// created, so `last_request_params` reflects exactly what was sent no
    /// matter what the caller does with its own parameter value afterwards.
    fn begin_fetch(
        &self,
        state: &mut RequestState<P, R, S>,
        kind: FetchKind,
        params: Option<P>,
        on_complete: Option<CompleteFn<R, S>>,
        env: &RequestEnvironment<P, R>,
    ) -> SmallVec<[Effect<RequestEvent<P, R, S>>; 4]> {
        let from = state.phase;
        let effective = match kind {
            FetchKind::Fetch => params.unwrap_or_else(|| state.context.params.clone()),
            FetchKind::Refetch => {
                let base = state.context.last_request_params.clone().unwrap_or_default();
                match params {
                    Some(patch) => base.merge(patch),
                    None => base,
                }
            }
            FetchKind::Retry => state
                .context
                .last_request_params
                .clone()
                .unwrap_or_else(|| state.context.params.clone()),
        };

        state.phase = RequestPhase::Loading;
        state.context.generation += 1;
        let generation = state.context.generation;
        Self::trace(
            state.request_key(),
            from,
            RequestPhase::Loading,
            kind.event_name(),
        );

        let mut effects: SmallVec<[Effect<RequestEvent<P, R, S>>; 4]> = SmallVec::new();
        if !effective.is_empty() {
            effects.extend(self.reduce(state, RequestEvent::CacheParams(effective.clone()), env));
        }

        let on_refetch = match kind {
            FetchKind::Refetch => state.options.on_refetch.clone(),
            FetchKind::Fetch | FetchKind::Retry => None,
        };
        let runner = env.runner.clone();
        effects.push(Effect::Future(Box::pin(async move {
            if let Some(notify) = on_refetch {
                notify();
            }
            let outcome = runner.invoke_default(effective).await;
            Some(RequestEvent::Settled {
                generation,
                outcome,
                on_complete,
            })
        })));
        effects
    }

    /// Apply a settlement, or discard it when it is no longer
    /// authoritative.
    fn settle(
        &self,
        state: &mut RequestState<P, R, S>,
        generation: u64,
        outcome: Result<R, TransportError>,
        on_complete: Option<CompleteFn<R, S>>,
        env: &RequestEnvironment<P, R>,
    ) -> SmallVec<[Effect<RequestEvent<P, R, S>>; 4]> {
        if state.phase != RequestPhase::Loading || generation != state.context.generation {
            tracing::debug!(
                request_key = state.request_key(),
                phase = %state.phase,
                settled_generation = generation,
                current_generation = state.context.generation,
                "discarding stale settlement"
            );
            return smallvec![Effect::None];
        }

        match outcome {
            Ok(raw) => {
                let valid = state
                    .options
                    .request_valid
                    .as_ref()
                    .map_or_else(|| raw.is_valid(), |guard| guard(&raw));
                if valid {
                    self.settle_valid(state, raw, on_complete, env)
                } else {
                    self.settle_invalid(state, raw, on_complete)
                }
            }
            Err(error) => {
                // Transport rejection updates the message only; lifecycle
                // callbacks fire solely for resolved payloads.
                state.context.message = error.to_string();
                state.phase = RequestPhase::Fail;
                Self::trace(
                    state.request_key(),
                    RequestPhase::Loading,
                    RequestPhase::Fail,
                    "SETTLED",
                );
                smallvec![Effect::None]
            }
        }
    }

    /// Guard passed: format, store data, notify.
    fn settle_valid(
        &self,
        state: &mut RequestState<P, R, S>,
        raw: R,
        on_complete: Option<CompleteFn<R, S>>,
        env: &RequestEnvironment<P, R>,
    ) -> SmallVec<[Effect<RequestEvent<P, R, S>>; 4]> {
        let formatted = match &state.options.format_result {
            Some(format) => format(raw, state.context.last_request_params.as_ref()),
            None => S::from_raw(raw),
        };

        state.phase = RequestPhase::Success;
        Self::trace(
            state.request_key(),
            RequestPhase::Loading,
            RequestPhase::Success,
            "SETTLED",
        );

        match formatted {
            Ok(data) => {
                let mut effects = self.reduce(state, RequestEvent::UpdateData(data.clone()), env);
                let on_success = state.options.on_success.clone();
                let params = state.context.last_request_params.clone();
                effects.push(Effect::Future(Box::pin(async move {
                    if let Some(callback) = on_success {
                        callback(&data, params.as_ref());
                    }
                    if let Some(done) = on_complete {
                        done(Completion::Success(data));
                    }
                    None
                })));
                effects
            }
            Err(error) => {
                // The formatter failure is contained: `data` stays put and
                // the reason surfaces through the message channel.
                self.reduce(
                    state,
                    RequestEvent::UpdateErrorMessage(error.to_string()),
                    env,
                )
            }
        }
    }

    /// Guard rejected the resolved payload: record the failure message and
    /// notify.
    fn settle_invalid(
        &self,
        state: &mut RequestState<P, R, S>,
        raw: R,
        on_complete: Option<CompleteFn<R, S>>,
    ) -> SmallVec<[Effect<RequestEvent<P, R, S>>; 4]> {
        let message = raw.failure_message();
        state.context.message = message.clone();
        state.phase = RequestPhase::Fail;
        Self::trace(
            state.request_key(),
            RequestPhase::Loading,
            RequestPhase::Fail,
            "SETTLED",
        );

        let on_fail = state.options.on_fail.clone();
        smallvec![Effect::Future(Box::pin(async move {
            if let Some(callback) = on_fail {
                callback(&message);
            }
            if let Some(done) = on_complete {
                done(Completion::Fail(raw));
            }
            None
        }))]
    }
}

impl<P, R, S> Reducer for RequestReducer<P, R, S>
where
    P: Params,
    R: Validity + Clone + std::fmt::Debug + Send + Sync + 'static,
    S: FromRaw<R> + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    type State = RequestState<P, R, S>;
    type Event = RequestEvent<P, R, S>;
    type Environment = RequestEnvironment<P, R>;

    fn reduce(
        &self,
        state: &mut Self::State,
        event: Self::Event,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Event>; 4]> {
        match event {
            RequestEvent::Fetch { params, on_complete } => {
                self.begin_fetch(state, FetchKind::Fetch, params, on_complete, env)
            }

            RequestEvent::Refetch { params, on_complete } => {
                if state.phase == RequestPhase::Idle {
                    Self::ignore(state, "REFETCH");
                    return smallvec![Effect::None];
                }
                self.begin_fetch(state, FetchKind::Refetch, params, on_complete, env)
            }

            RequestEvent::Retry { on_complete } => {
                if state.phase == RequestPhase::Idle {
                    Self::ignore(state, "RETRY");
                    return smallvec![Effect::None];
                }
                self.begin_fetch(state, FetchKind::Retry, None, on_complete, env)
            }

            RequestEvent::CacheParams(params) => {
                if state.phase == RequestPhase::Loading {
                    tracing::debug!(
                        request_key = state.request_key(),
                        params = ?params,
                        "caching request params"
                    );
                    state.context.last_request_params = Some(params);
                } else {
                    Self::ignore(state, "CACHE_PARAMS");
                }
                smallvec![Effect::None]
            }

            RequestEvent::UpdateData(data) => {
                if state.phase == RequestPhase::Success {
                    state.context.data = Some(data);
                    state.context.message.clear();
                    Self::trace(
                        state.request_key(),
                        RequestPhase::Success,
                        RequestPhase::Success,
                        "UPDATE_DATA",
                    );
                } else {
                    Self::ignore(state, "UPDATE_DATA");
                }
                smallvec![Effect::None]
            }

            RequestEvent::UpdateErrorMessage(message) => {
                if matches!(state.phase, RequestPhase::Success | RequestPhase::Fail) {
                    state.context.message = message;
                    Self::trace(
                        state.request_key(),
                        state.phase,
                        state.phase,
                        "UPDATE_ERROR_MSG",
                    );
                } else {
                    Self::ignore(state, "UPDATE_ERROR_MSG");
                }
                smallvec![Effect::None]
            }

            RequestEvent::Settled {
                generation,
                outcome,
                on_complete,
            } => self.settle(state, generation, outcome, on_complete, env),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormatError;
    use crate::options::RequestOptions;
    use crate::payload::Envelope;
    use crate::runner::RequestRunner;
    use crate::state::RequestSnapshot;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type TestParams = HashMap<String, i64>;
    type Raw = Envelope<i64>;

    type Machine = RequestReducer<TestParams, Raw, Raw>;
    type Env = RequestEnvironment<TestParams, Raw>;
    type State = RequestState<TestParams, Raw, Raw>;
    type Event = RequestEvent<TestParams, Raw, Raw>;

    fn params(entries: &[(&str, i64)]) -> TestParams {
        entries.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    /// Fetcher that records every parameter set it is invoked with and
    /// resolves each call with the scripted outcome.
    fn recording_env(
        outcome: Result<Raw, TransportError>,
    ) -> (Env, Arc<Mutex<Vec<TestParams>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&calls);
        let runner = RequestRunner::single(move |p: TestParams| {
            let outcome = outcome.clone();
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(p);
                outcome
            }
        });
        (RequestEnvironment::new(runner), calls)
    }

    /// Run the reducer, then drive every produced effect to completion,
    /// feeding resulting events straight back in. Synchronous because test
    /// fetchers settle immediately.
    fn dispatch(machine: &Machine, state: &mut State, env: &Env, event: Event) {
        let effects = machine.reduce(state, event, env);
        drain(machine, state, env, effects);
    }

    fn drain(
        machine: &Machine,
        state: &mut State,
        env: &Env,
        effects: SmallVec<[Effect<Event>; 4]>,
    ) {
        for effect in effects {
            if let Effect::Future(fut) = effect {
                if let Some(event) = tokio_test::block_on(fut) {
                    let next = machine.reduce(state, event, env);
                    drain(machine, state, env, next);
                }
            }
        }
    }

    #[test]
    fn fetch_from_idle_caches_params_and_succeeds() {
        let (env, calls) = recording_env(Ok(Envelope::ok(42)));
        let machine = Machine::new();
        let mut state = State::new(RequestOptions::new());

        dispatch(
            &machine,
            &mut state,
            &env,
            RequestEvent::Fetch {
                params: Some(params(&[("id", 2)])),
                on_complete: None,
            },
        );

        assert_eq!(state.phase, RequestPhase::Success);
        assert_eq!(state.context.data, Some(Envelope::ok(42)));
        assert_eq!(state.context.last_request_params, Some(params(&[("id", 2)])));
        assert_eq!(state.context.generation, 1);
        let recorded = calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert_eq!(recorded.as_slice(), &[params(&[("id", 2)])]);
    }

    #[test]
    fn loading_is_active_while_the_fetch_effect_is_pending() {
        let (env, _calls) = recording_env(Ok(Envelope::ok(1)));
        let machine = Machine::new();
        let mut state = State::new(RequestOptions::new());

        let effects = machine.reduce(
            &mut state,
            RequestEvent::Fetch {
                params: Some(params(&[("id", 1)])),
                on_complete: None,
            },
            &env,
        );

        assert_eq!(state.phase, RequestPhase::Loading);
        assert!(effects.iter().any(|e| matches!(e, Effect::Future(_))));
    }

    #[test]
    fn refetch_merges_partial_params_over_cached_base() {
        let (env, calls) = recording_env(Ok(Envelope::ok(1)));
        let machine = Machine::new();
        let mut state = State::new(RequestOptions::new());

        dispatch(
            &machine,
            &mut state,
            &env,
            RequestEvent::Fetch {
                params: Some(params(&[("a", 1), ("b", 2)])),
                on_complete: None,
            },
        );
        dispatch(
            &machine,
            &mut state,
            &env,
            RequestEvent::Refetch {
                params: Some(params(&[("b", 3)])),
                on_complete: None,
            },
        );

        let recorded = calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[1], params(&[("a", 1), ("b", 3)]));
        assert_eq!(
            state.context.last_request_params,
            Some(params(&[("a", 1), ("b", 3)]))
        );
    }

    #[test]
    fn retry_reuses_cached_params_verbatim() {
        let (env, calls) = recording_env(Ok(Envelope::ok(1)));
        let machine = Machine::new();
        let mut state = State::new(RequestOptions::new());

        dispatch(
            &machine,
            &mut state,
            &env,
            RequestEvent::Fetch {
                params: Some(params(&[("id", 7)])),
                on_complete: None,
            },
        );
        dispatch(&machine, &mut state, &env, RequestEvent::Retry { on_complete: None });

        let recorded = calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert_eq!(recorded.as_slice(), &[params(&[("id", 7)]), params(&[("id", 7)])]);
    }

    #[test]
    fn refetch_in_idle_is_ignored() {
        let (env, calls) = recording_env(Ok(Envelope::ok(1)));
        let machine = Machine::new();
        let mut state = State::new(RequestOptions::new());

        dispatch(
            &machine,
            &mut state,
            &env,
            RequestEvent::Refetch {
                params: None,
                on_complete: None,
            },
        );

        assert_eq!(state.phase, RequestPhase::Idle);
        assert!(calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner).is_empty());
    }

    #[test]
    fn guard_rejection_fails_without_touching_data() {
        let (env, _calls) = recording_env(Ok(Envelope::errored("not found")));
        let machine = Machine::new();
        let fails = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&fails);
        let options = RequestOptions::new()
            .with_initial_data(Envelope::ok(0))
            .with_on_fail(move |msg: &str| {
                seen.lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .push(msg.to_string());
            });
        let mut state = State::new(options);

        dispatch(
            &machine,
            &mut state,
            &env,
            RequestEvent::Fetch {
                params: Some(params(&[("id", 99)])),
                on_complete: None,
            },
        );

        assert_eq!(state.phase, RequestPhase::Fail);
        assert_eq!(state.context.data, Some(Envelope::ok(0)));
        assert_eq!(state.context.message, "not found");
        let recorded = fails.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert_eq!(recorded.as_slice(), &["not found".to_string()]);
    }

    #[test]
    fn transport_rejection_sets_message_without_callbacks() {
        let (env, _calls) = recording_env(Err(TransportError::failed("connection reset")));
        let machine = Machine::new();
        let fails = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&fails);
        let options = RequestOptions::new().with_on_fail(move |msg: &str| {
            seen.lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(msg.to_string());
        });
        let mut state = State::new(options);

        dispatch(
            &machine,
            &mut state,
            &env,
            RequestEvent::Fetch {
                params: None,
                on_complete: None,
            },
        );

        assert_eq!(state.phase, RequestPhase::Fail);
        assert_eq!(state.context.message, "connection reset");
        assert!(fails.lock().unwrap_or_else(std::sync::PoisonError::into_inner).is_empty());
    }

    #[test]
    fn stale_settlement_is_discarded_entirely() {
        let (env, _calls) = recording_env(Ok(Envelope::ok(1)));
        let machine = Machine::new();
        let mut state = State::new(RequestOptions::new());

        // First attempt: hold its effect instead of driving it.
        let first_effects = machine.reduce(
            &mut state,
            RequestEvent::Fetch {
                params: Some(params(&[("id", 1)])),
                on_complete: None,
            },
            &env,
        );
        // Second attempt supersedes it.
        dispatch(
            &machine,
            &mut state,
            &env,
            RequestEvent::Fetch {
                params: Some(params(&[("id", 2)])),
                on_complete: None,
            },
        );
        assert_eq!(state.phase, RequestPhase::Success);
        let before = state.snapshot();

        // Now the first attempt settles late; it must be a no-op.
        drain(&machine, &mut state, &env, first_effects);
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn update_data_is_idempotent_in_success() {
        let (env, _calls) = recording_env(Ok(Envelope::ok(1)));
        let machine = Machine::new();
        let mut state = State::new(RequestOptions::new());
        dispatch(
            &machine,
            &mut state,
            &env,
            RequestEvent::Fetch {
                params: None,
                on_complete: None,
            },
        );

        dispatch(&machine, &mut state, &env, RequestEvent::UpdateData(Envelope::ok(5)));
        dispatch(&machine, &mut state, &env, RequestEvent::UpdateData(Envelope::ok(5)));

        assert_eq!(state.phase, RequestPhase::Success);
        assert_eq!(state.context.data, Some(Envelope::ok(5)));
        assert!(state.context.message.is_empty());
    }

    #[test]
    fn update_data_outside_success_is_ignored() {
        let (env, _calls) = recording_env(Ok(Envelope::ok(1)));
        let machine = Machine::new();
        let mut state = State::new(RequestOptions::new());

        dispatch(&machine, &mut state, &env, RequestEvent::UpdateData(Envelope::ok(5)));

        assert_eq!(state.phase, RequestPhase::Idle);
        assert_eq!(state.context.data, None);
    }

    #[test]
    fn update_error_message_overwrites_in_fail() {
        let (env, _calls) = recording_env(Ok(Envelope::errored("first")));
        let machine = Machine::new();
        let mut state = State::new(RequestOptions::new());
        dispatch(
            &machine,
            &mut state,
            &env,
            RequestEvent::Fetch {
                params: None,
                on_complete: None,
            },
        );
        assert_eq!(state.phase, RequestPhase::Fail);

        dispatch(
            &machine,
            &mut state,
            &env,
            RequestEvent::UpdateErrorMessage("second".into()),
        );
        assert_eq!(state.context.message, "second");
        assert_eq!(state.phase, RequestPhase::Fail);
    }

    #[test]
    fn failing_formatter_lands_in_success_with_message() {
        let (env, _calls) = recording_env(Ok(Envelope::ok(9)));
        let machine = Machine::new();
        let options: RequestOptions<TestParams, Raw, Raw> = RequestOptions::new()
            .with_initial_data(Envelope::ok(0))
            .with_format_result(|_raw, _params| Err(FormatError::new("bad shape")));
        let mut state = State::new(options);

        dispatch(
            &machine,
            &mut state,
            &env,
            RequestEvent::Fetch {
                params: None,
                on_complete: None,
            },
        );

        assert_eq!(state.phase, RequestPhase::Success);
        assert_eq!(state.context.data, Some(Envelope::ok(0)));
        assert_eq!(state.context.message, "bad shape");
    }

    #[test]
    fn guard_override_takes_precedence() {
        let (env, _calls) = recording_env(Ok(Envelope::ok(9)));
        let machine = Machine::new();
        // The envelope is valid by the default guard; the override rejects
        // everything.
        let options: RequestOptions<TestParams, Raw, Raw> =
            RequestOptions::new().with_request_valid(|_raw| false);
        let mut state = State::new(options);

        dispatch(
            &machine,
            &mut state,
            &env,
            RequestEvent::Fetch {
                params: None,
                on_complete: None,
            },
        );

        assert_eq!(state.phase, RequestPhase::Fail);
        assert_eq!(state.context.data, None);
    }

    #[test]
    fn completion_callback_receives_formatted_data_on_success() {
        let (env, _calls) = recording_env(Ok(Envelope::ok(3)));
        let machine = Machine::new();
        let mut state = State::new(RequestOptions::new());
        let completions = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&completions);

        dispatch(
            &machine,
            &mut state,
            &env,
            RequestEvent::Fetch {
                params: None,
                on_complete: Some(Arc::new(move |completion| {
                    seen.lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .push(completion);
                })),
            },
        );

        let recorded = completions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert_eq!(recorded.as_slice(), &[Completion::Success(Envelope::ok(3))]);
    }

    /// Simple event shapes for the stale-settlement property below.
    #[derive(Debug, Clone)]
    enum Op {
        Fetch(i64),
        SettleOk(i64),
        SettleErrored,
        SettleRejected,
        UpdateData(i64),
        UpdateError(String),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<i64>().prop_map(Op::Fetch),
            any::<i64>().prop_map(Op::SettleOk),
            Just(Op::SettleErrored),
            Just(Op::SettleRejected),
            any::<i64>().prop_map(Op::UpdateData),
            "[a-z]{0,6}".prop_map(Op::UpdateError),
        ]
    }

    fn apply(machine: &Machine, state: &mut State, env: &Env, op: Op) {
        let event = match op {
            // Applied without driving the fetch effect, so settlements can
            // be injected with full control over the generation.
            Op::Fetch(id) => RequestEvent::Fetch {
                params: Some(params(&[("id", id)])),
                on_complete: None,
            },
            Op::SettleOk(n) => RequestEvent::Settled {
                generation: state.context.generation,
                outcome: Ok(Envelope::ok(n)),
                on_complete: None,
            },
            Op::SettleErrored => RequestEvent::Settled {
                generation: state.context.generation,
                outcome: Ok(Envelope::errored("errored")),
                on_complete: None,
            },
            Op::SettleRejected => RequestEvent::Settled {
                generation: state.context.generation,
                outcome: Err(TransportError::failed("rejected")),
                on_complete: None,
            },
            Op::UpdateData(n) => RequestEvent::UpdateData(Envelope::ok(n)),
            Op::UpdateError(msg) => RequestEvent::UpdateErrorMessage(msg),
        };
        let _effects = machine.reduce(state, event, env);
    }

    proptest! {
        // A settlement carrying anything but the current generation never
        // changes the observable state, wherever the machine happens to be.
        #[test]
        fn stale_settlements_never_change_the_snapshot(
            ops in proptest::collection::vec(op_strategy(), 0..12),
            offset in 1_u64..5,
            value in any::<i64>(),
        ) {
            let (env, _calls) = recording_env(Ok(Envelope::ok(1)));
            let machine = Machine::new();
            let mut state = State::new(RequestOptions::new());

            for op in ops {
                apply(&machine, &mut state, &env, op);
            }

            let before: RequestSnapshot<TestParams, Raw> = state.snapshot();
            let generation_before = state.context.generation;
            let _effects = machine.reduce(
                &mut state,
                RequestEvent::Settled {
                    generation: generation_before.wrapping_add(offset),
                    outcome: Ok(Envelope::ok(value)),
                    on_complete: None,
                },
                &env,
            );

            prop_assert_eq!(state.snapshot(), before);
            prop_assert_eq!(state.context.generation, generation_before);
        }
    }
}

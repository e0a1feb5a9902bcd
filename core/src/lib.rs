//! # Reqflow Core
//!
//! Core types and the pure transition function for the reqflow
//! request-lifecycle controller.
//!
//! This crate contains everything needed to *describe* a request lifecycle:
//! the finite-state machine (phase, context, events), the configuration
//! surface, the fetcher registry, and the transition function itself. It
//! performs no I/O — asynchronous work is returned as [`effect::Effect`]
//! descriptions and executed by the `reqflow-runtime` crate.
//!
//! ## Core Concepts
//!
//! - **State**: [`state::RequestState`] — exactly one
//!   [`state::RequestPhase`] active, plus the mutable
//!   [`state::RequestContext`]
//! - **Event**: [`event::RequestEvent`] — every input to the machine,
//!   caller intents and fetch settlements alike
//! - **Reducer**: pure function `(State, Event) → (State, Effects)`
//! - **Effect**: side-effect descriptions (not execution)
//! - **Environment**: injected dependencies
//!   ([`environment::RequestEnvironment`] owning the
//!   [`runner::RequestRunner`])
//!
//! ## Example
//!
//! ```
//! use reqflow_core::environment::RequestEnvironment;
//! use reqflow_core::event::RequestEvent;
//! use reqflow_core::machine::RequestReducer;
//! use reqflow_core::options::RequestOptions;
//! use reqflow_core::payload::Envelope;
//! use reqflow_core::reducer::Reducer;
//! use reqflow_core::runner::RequestRunner;
//! use reqflow_core::state::{RequestPhase, RequestState};
//! use std::collections::HashMap;
//!
//! type Params = HashMap<String, i64>;
//!
//! let runner = RequestRunner::single(|_params: Params| async move {
//!     Ok(Envelope::ok(42_i64))
//! });
//! let env = RequestEnvironment::new(runner);
//! let reducer = RequestReducer::new();
//!
//! let options: RequestOptions<Params, Envelope<i64>, Envelope<i64>> =
//!     RequestOptions::new().with_manual(true);
//! let mut state = RequestState::new(options);
//!
//! let effects = reducer.reduce(
//!     &mut state,
//!     RequestEvent::Fetch { params: None, on_complete: None },
//!     &env,
//! );
//! assert_eq!(state.phase, RequestPhase::Loading);
//! assert!(!effects.is_empty());
//! ```

// Re-export commonly used types
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

pub mod environment;
pub mod error;
pub mod event;
pub mod machine;
pub mod options;
pub mod params;
pub mod payload;
pub mod runner;
pub mod state;

/// Reducer module - the core trait for transition logic
///
/// Reducers are pure functions: `(State, Event, Environment) → (State, Effects)`.
/// They contain all transition logic and are deterministic and testable;
/// anything asynchronous is returned as an effect description.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for transition logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The machine state this reducer operates on
    /// - `Event`: The event type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for RequestReducer<P, R, S> {
    ///     type State = RequestState<P, R, S>;
    ///     type Event = RequestEvent<P, R, S>;
    ///     type Environment = RequestEnvironment<P, R>;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut Self::State,
    ///         event: Self::Event,
    ///         env: &Self::Environment,
    ///     ) -> SmallVec<[Effect<Self::Event>; 4]> {
    ///         // Transition logic goes here
    ///         smallvec![Effect::None]
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The event type this reducer processes
        type Event;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an event into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Applies the transition table to the event
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// # Arguments
        ///
        /// - `state`: Mutable reference to current state
        /// - `event`: The event to process
        /// - `env`: Reference to injected dependencies
        ///
        /// # Returns
        ///
        /// A list of effects to be executed by the runtime
        fn reduce(
            &self,
            state: &mut Self::State,
            event: Self::Event,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Event>; 4]>;
    }
}

/// Effect module - side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution) and feed resulting events back
/// into the reducer.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what
    /// should happen, returned from reducers and executed by the Store
    /// runtime.
    ///
    /// # Type Parameters
    ///
    /// - `Event`: The event type that effects can produce (feedback loop)
    pub enum Effect<Event> {
        /// No-op effect
        None,

        /// Arbitrary async computation
        ///
        /// Returns `Option<Event>` - if `Some`, the event is fed back into
        /// the reducer. The fetch invocation itself is modeled this way: the
        /// future awaits the fetcher and yields a settlement event.
        Future(Pin<Box<dyn Future<Output = Option<Event>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Event> std::fmt::Debug for Effect<Event>
    where
        Event: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Event> Effect<Event> {
        /// True for effects that carry no work.
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }
    }
}

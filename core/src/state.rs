//! Machine state: phase, context, and the read-only snapshot.

use serde::{Deserialize, Serialize};

use crate::options::RequestOptions;

/// The lifecycle phase of a request. Exactly one is active at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestPhase {
    /// Constructed, nothing dispatched yet.
    Idle,

    /// A fetch attempt is in flight.
    Loading,

    /// The latest authoritative attempt settled valid.
    Success,

    /// The latest authoritative attempt settled invalid or rejected.
    Fail,
}

impl RequestPhase {
    /// Phase name as it appears in diagnostics output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Fail => "fail",
        }
    }

    /// True while a fetch attempt is in flight.
    #[must_use]
    pub const fn is_loading(self) -> bool {
        matches!(self, Self::Loading)
    }
}

impl std::fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The machine's mutable context.
///
/// Owned exclusively by the state machine; everything outside reads
/// [`RequestSnapshot`]s.
#[derive(Debug, Clone)]
pub struct RequestContext<P, S> {
    /// Fallback parameters for fetches that carry none (the configured
    /// defaults, or empty).
    pub params: P,

    /// Last successfully formatted result.
    pub data: Option<S>,

    /// Last failure description; empty outside fail paths.
    pub message: String,

    /// Parameters actually sent on the most recent fetch attempt — the merge
    /// base for refetch. Updated exactly once per attempt, before the
    /// fetcher is invoked.
    pub last_request_params: Option<P>,

    /// Monotonic counter distinguishing fetch attempts; a settlement applies
    /// only when its captured generation is still current.
    pub generation: u64,
}

/// Full machine state: the active phase, the mutable context, and the
/// immutable per-instance options.
#[derive(Debug, Clone)]
pub struct RequestState<P, R, S> {
    /// The active lifecycle phase.
    pub phase: RequestPhase,

    /// The mutable context.
    pub context: RequestContext<P, S>,

    /// Per-instance configuration, immutable after construction.
    pub options: RequestOptions<P, R, S>,
}

impl<P: Clone + Default, R, S: Clone> RequestState<P, R, S> {
    /// Initialize state from configuration: idle, seeded with
    /// `initial_data`, params defaulting to the configured defaults.
    #[must_use]
    pub fn new(options: RequestOptions<P, R, S>) -> Self {
        Self {
            phase: RequestPhase::Idle,
            context: RequestContext {
                params: options.default_params.clone().unwrap_or_default(),
                data: options.initial_data.clone(),
                message: String::new(),
                last_request_params: None,
                generation: 0,
            },
            options,
        }
    }

    /// Immutable view of the current state for the facade to read.
    #[must_use]
    pub fn snapshot(&self) -> RequestSnapshot<P, S> {
        RequestSnapshot {
            phase: self.phase,
            data: self.context.data.clone(),
            message: self.context.message.clone(),
            last_request_params: self.context.last_request_params.clone(),
        }
    }

    /// The diagnostics key for this instance, or a generic fallback.
    #[must_use]
    pub fn request_key(&self) -> &str {
        self.options.request_key.as_deref().unwrap_or("request")
    }
}

/// Immutable view of phase and context handed out by the machine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSnapshot<P, S> {
    /// The active lifecycle phase.
    pub phase: RequestPhase,

    /// Last successfully formatted result.
    pub data: Option<S>,

    /// Last failure description; empty outside fail paths.
    pub message: String,

    /// Parameters actually sent on the most recent fetch attempt.
    pub last_request_params: Option<P>,
}

impl<P, S> RequestSnapshot<P, S> {
    /// True while a fetch attempt is in flight.
    #[must_use]
    pub const fn loading(&self) -> bool {
        self.phase.is_loading()
    }
}

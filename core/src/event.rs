//! Events: every input the request machine processes.

use crate::error::TransportError;
use crate::options::CompleteFn;

/// A request-machine event.
///
/// One enum unifies caller intents (`Fetch`, `Refetch`, `Retry`,
/// `UpdateData`) and the machine's own bookkeeping (`CacheParams`,
/// `UpdateErrorMessage`, `Settled`). Events are transient: produced by the
/// facade or by effect tasks, consumed by the reducer, never stored.
pub enum RequestEvent<P, R, S> {
    /// Begin a fetch with the given parameters, or the context defaults
    /// when absent.
    Fetch {
        /// Explicit parameters for this attempt.
        params: Option<P>,
        /// Per-call completion callback.
        on_complete: Option<CompleteFn<R, S>>,
    },

    /// Begin a fetch with the given partial parameters merged over the
    /// cached parameters of the previous attempt.
    Refetch {
        /// Partial parameters overlaid on the cached base.
        params: Option<P>,
        /// Per-call completion callback.
        on_complete: Option<CompleteFn<R, S>>,
    },

    /// Begin a fetch reusing the cached parameters of the previous attempt
    /// verbatim.
    Retry {
        /// Per-call completion callback.
        on_complete: Option<CompleteFn<R, S>>,
    },

    /// Overwrite `data` locally, bypassing the network.
    UpdateData(S),

    /// Record the parameters actually sent for the current attempt.
    /// Self-dispatched by the machine before the fetcher is invoked.
    CacheParams(P),

    /// Overwrite the failure message.
    UpdateErrorMessage(String),

    /// A fetch attempt settled. Self-dispatched by the fetch effect.
    ///
    /// Applies only when `generation` is still current; stale settlements
    /// are discarded without touching context or invoking callbacks. A
    /// rejected outcome updates the message only — lifecycle callbacks are
    /// reserved for resolved payloads (the guard branches).
    Settled {
        /// The generation captured when this attempt was dispatched.
        generation: u64,
        /// The resolved payload or the transport rejection.
        outcome: Result<R, TransportError>,
        /// Per-call completion callback carried through the attempt.
        on_complete: Option<CompleteFn<R, S>>,
    },
}

impl<P, R, S> RequestEvent<P, R, S> {
    /// Event name as it appears in diagnostics output.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "FETCH",
            Self::Refetch { .. } => "REFETCH",
            Self::Retry { .. } => "RETRY",
            Self::UpdateData(_) => "UPDATE_DATA",
            Self::CacheParams(_) => "CACHE_PARAMS",
            Self::UpdateErrorMessage(_) => "UPDATE_ERROR_MSG",
            Self::Settled { .. } => "SETTLED",
        }
    }
}

impl<P: Clone, R: Clone, S: Clone> Clone for RequestEvent<P, R, S> {
    fn clone(&self) -> Self {
        match self {
            Self::Fetch { params, on_complete } => Self::Fetch {
                params: params.clone(),
                on_complete: on_complete.clone(),
            },
            Self::Refetch { params, on_complete } => Self::Refetch {
                params: params.clone(),
                on_complete: on_complete.clone(),
            },
            Self::Retry { on_complete } => Self::Retry {
                on_complete: on_complete.clone(),
            },
            Self::UpdateData(data) => Self::UpdateData(data.clone()),
            Self::CacheParams(params) => Self::CacheParams(params.clone()),
            Self::UpdateErrorMessage(msg) => Self::UpdateErrorMessage(msg.clone()),
            Self::Settled {
                generation,
                outcome,
                on_complete,
            } => Self::Settled {
                generation: *generation,
                outcome: outcome.clone(),
                on_complete: on_complete.clone(),
            },
        }
    }
}

impl<P, R, S> std::fmt::Debug for RequestEvent<P, R, S>
where
    P: std::fmt::Debug,
    R: std::fmt::Debug,
    S: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch { params, .. } => {
                f.debug_struct("Fetch").field("params", params).finish_non_exhaustive()
            }
            Self::Refetch { params, .. } => {
                f.debug_struct("Refetch").field("params", params).finish_non_exhaustive()
            }
            Self::Retry { .. } => f.debug_struct("Retry").finish_non_exhaustive(),
            Self::UpdateData(data) => f.debug_tuple("UpdateData").field(data).finish(),
            Self::CacheParams(params) => f.debug_tuple("CacheParams").field(params).finish(),
            Self::UpdateErrorMessage(msg) => {
                f.debug_tuple("UpdateErrorMessage").field(msg).finish()
            }
            Self::Settled {
                generation,
                outcome,
                ..
            } => f
                .debug_struct("Settled")
                .field("generation", generation)
                .field("outcome", outcome)
                .finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_diagnostics() {
        let fetch: RequestEvent<(), i64, i64> = RequestEvent::Fetch {
            params: None,
            on_complete: None,
        };
        assert_eq!(fetch.name(), "FETCH");
        assert_eq!(RequestEvent::<(), i64, i64>::UpdateData(1).name(), "UPDATE_DATA");
        assert_eq!(
            RequestEvent::<(), i64, i64>::UpdateErrorMessage(String::new()).name(),
            "UPDATE_ERROR_MSG"
        );
    }

    #[test]
    fn debug_elides_callbacks() {
        let settled: RequestEvent<(), i64, i64> = RequestEvent::Settled {
            generation: 3,
            outcome: Ok(9),
            on_complete: None,
        };
        let printed = format!("{settled:?}");
        assert!(printed.contains("generation: 3"));
        assert!(!printed.contains("on_complete"));
    }
}

//! Per-instance configuration for a request controller.
//!
//! Options are supplied once at construction and are immutable afterwards.
//! Lifecycle callbacks are shared closures so the machine can hand them to
//! effect tasks without borrowing from state.

use std::sync::Arc;

use crate::error::FormatError;

/// Formatter applied to a valid raw result before it becomes data.
pub type FormatFn<P, R, S> = Arc<dyn Fn(R, Option<&P>) -> Result<S, FormatError> + Send + Sync>;

/// Per-instance override of the validity guard.
pub type ValidFn<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;

/// Callback invoked with formatted data and the params that produced it.
pub type SuccessFn<P, S> = Arc<dyn Fn(&S, Option<&P>) + Send + Sync>;

/// Callback invoked with the failure message on the application-error branch.
pub type FailFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback invoked when a refetch begins, before the fetcher runs.
pub type RefetchFn = Arc<dyn Fn() + Send + Sync>;

/// Per-call completion callback.
pub type CompleteFn<R, S> = Arc<dyn Fn(Completion<R, S>) + Send + Sync>;

/// What a per-call completion callback receives.
///
/// The success branch carries the *formatted* data; the application-failure
/// branch carries the *raw* result, so the caller can inspect the payload
/// the guard rejected. Transport errors never reach a completion callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion<R, S> {
    /// The guard passed; formatted data follows.
    Success(S),

    /// The guard rejected the resolved payload; the raw result follows.
    Fail(R),
}

/// Configuration recognized by the request machine.
///
/// Mirrors the construction-time options of the controller: seed data,
/// default parameters, manual-trigger suppression, a diagnostics key, the
/// result formatter, the validity-guard override, and the lifecycle
/// callbacks.
pub struct RequestOptions<P, R, S> {
    /// Seed for `data` before the first fetch completes.
    pub initial_data: Option<S>,

    /// Parameters used when a fetch carries none and on auto-start.
    pub default_params: Option<P>,

    /// Suppress the automatic fetch on start.
    pub manual: bool,

    /// Stable identifier used in diagnostics output.
    pub request_key: Option<String>,

    /// Formatter applied on the success branch; falls back to
    /// [`crate::payload::FromRaw`] when absent.
    pub format_result: Option<FormatFn<P, R, S>>,

    /// Validity-guard override; falls back to
    /// [`crate::payload::Validity`] when absent.
    pub request_valid: Option<ValidFn<R>>,

    /// Invoked with formatted data after every successful fetch.
    pub on_success: Option<SuccessFn<P, S>>,

    /// Invoked with the failure message after every guard rejection.
    pub on_fail: Option<FailFn>,

    /// Invoked when a refetch begins.
    pub on_refetch: Option<RefetchFn>,
}

impl<P, R, S> RequestOptions<P, R, S> {
    /// Empty configuration: no seed data, no defaults, auto-start enabled.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initial_data: None,
            default_params: None,
            manual: false,
            request_key: None,
            format_result: None,
            request_valid: None,
            on_success: None,
            on_fail: None,
            on_refetch: None,
        }
    }

    /// Seed `data` before the first fetch completes.
    #[must_use]
    pub fn with_initial_data(mut self, data: S) -> Self {
        self.initial_data = Some(data);
        self
    }

    /// Set the parameters used when a fetch carries none.
    #[must_use]
    pub fn with_default_params(mut self, params: P) -> Self {
        self.default_params = Some(params);
        self
    }

    /// Suppress (or restore) the automatic fetch on start.
    #[must_use]
    pub const fn with_manual(mut self, manual: bool) -> Self {
        self.manual = manual;
        self
    }

    /// Set the stable identifier used in diagnostics output.
    #[must_use]
    pub fn with_request_key(mut self, key: impl Into<String>) -> Self {
        self.request_key = Some(key.into());
        self
    }

    /// Set the formatter applied to valid raw results.
    #[must_use]
    pub fn with_format_result<F>(mut self, format: F) -> Self
    where
        F: Fn(R, Option<&P>) -> Result<S, FormatError> + Send + Sync + 'static,
    {
        self.format_result = Some(Arc::new(format));
        self
    }

    /// Override the validity guard for this instance.
    #[must_use]
    pub fn with_request_valid<F>(mut self, guard: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.request_valid = Some(Arc::new(guard));
        self
    }

    /// Register the success callback.
    #[must_use]
    pub fn with_on_success<F>(mut self, on_success: F) -> Self
    where
        F: Fn(&S, Option<&P>) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(on_success));
        self
    }

    /// Register the failure callback.
    #[must_use]
    pub fn with_on_fail<F>(mut self, on_fail: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_fail = Some(Arc::new(on_fail));
        self
    }

    /// Register the refetch notification callback.
    #[must_use]
    pub fn with_on_refetch<F>(mut self, on_refetch: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_refetch = Some(Arc::new(on_refetch));
        self
    }
}

impl<P, R, S> Default for RequestOptions<P, R, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Clone, R, S: Clone> Clone for RequestOptions<P, R, S> {
    fn clone(&self) -> Self {
        Self {
            initial_data: self.initial_data.clone(),
            default_params: self.default_params.clone(),
            manual: self.manual,
            request_key: self.request_key.clone(),
            format_result: self.format_result.clone(),
            request_valid: self.request_valid.clone(),
            on_success: self.on_success.clone(),
            on_fail: self.on_fail.clone(),
            on_refetch: self.on_refetch.clone(),
        }
    }
}

impl<P: std::fmt::Debug, R, S: std::fmt::Debug> std::fmt::Debug for RequestOptions<P, R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("initial_data", &self.initial_data)
            .field("default_params", &self.default_params)
            .field("manual", &self.manual)
            .field("request_key", &self.request_key)
            .field("format_result", &self.format_result.is_some())
            .field("request_valid", &self.request_valid.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_fail", &self.on_fail.is_some())
            .field("on_refetch", &self.on_refetch.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_configuration() {
        let options: RequestOptions<(), i64, i64> = RequestOptions::new()
            .with_initial_data(0)
            .with_manual(true)
            .with_request_key("orders")
            .with_request_valid(|raw| *raw >= 0)
            .with_on_fail(|_msg| {});

        assert_eq!(options.initial_data, Some(0));
        assert!(options.manual);
        assert_eq!(options.request_key.as_deref(), Some("orders"));
        assert!(options.request_valid.is_some());
        assert!(options.on_fail.is_some());
        assert!(options.on_success.is_none());
    }

    #[test]
    fn debug_shows_callback_presence_only() {
        let options: RequestOptions<(), i64, i64> =
            RequestOptions::new().with_on_success(|_data, _params| {});
        let printed = format!("{options:?}");
        assert!(printed.contains("on_success: true"));
        assert!(printed.contains("on_fail: false"));
    }
}

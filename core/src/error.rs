//! Error types for the request lifecycle.
//!
//! Two of the three failure kinds the machine distinguishes live here:
//!
//! - [`TransportError`] — the asynchronous call itself rejected (or no
//!   fetcher was registered under the requested key). Surfaced as the
//!   context message only; lifecycle callbacks are not invoked for it.
//! - [`FormatError`] — the success-path formatter failed. Contained inside
//!   the machine and redirected into an error-message update, never
//!   propagated.
//!
//! The application-level failure kind (a resolved payload rejected by the
//! validity guard) is not an error type at all — it is a regular payload
//! classified by [`crate::payload::Validity`].

use thiserror::Error;

/// Failure of the asynchronous call boundary itself.
///
/// Distinguished from application-level failure: a fetcher that *resolves*
/// with an errored payload does not produce a `TransportError`; the validity
/// guard handles that branch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The underlying asynchronous call rejected.
    #[error("{0}")]
    Failed(String),

    /// No fetcher is registered under the requested key.
    #[error("no fetcher registered under key `{0}`")]
    UnknownFetcher(String),
}

impl TransportError {
    /// Build a rejection from any displayable cause.
    pub fn failed(cause: impl std::fmt::Display) -> Self {
        Self::Failed(cause.to_string())
    }
}

/// Failure raised while converting a raw result into presentable data.
///
/// A failing formatter leaves `data` untouched; the machine surfaces the
/// reason through the context message instead of propagating.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct FormatError(String);

impl FormatError {
    /// Build a format error from any displayable cause.
    pub fn new(cause: impl std::fmt::Display) -> Self {
        Self(cause.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_display() {
        let err = TransportError::failed("connection reset");
        assert_eq!(err.to_string(), "connection reset");

        let err = TransportError::UnknownFetcher("users".into());
        assert_eq!(err.to_string(), "no fetcher registered under key `users`");
    }

    #[test]
    fn format_error_display() {
        let err = FormatError::new("missing field `id`");
        assert_eq!(err.to_string(), "missing field `id`");
    }
}

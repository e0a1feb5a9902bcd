//! Payload classification: the validity guard and raw-result conversion.
//!
//! A fetcher that resolves has only proven *transport* success. Whether the
//! payload is an application-level success is a separate question, answered
//! by the [`Validity`] guard before any data update happens. The common wire
//! convention — an envelope carrying a sentinel failure code next to the
//! actual data — is provided as [`Envelope`].

use serde::{Deserialize, Serialize};

use crate::error::FormatError;

/// Sentinel code marking an envelope as errored even though the call
/// resolved.
pub const ERRORED: i64 = -1;

/// Application-level classification of a resolved payload.
///
/// The default implementation treats every payload as valid, which is right
/// for plain result types that cannot express failure. Types that can — like
/// [`Envelope`] — override both methods. A per-instance closure in
/// [`crate::options::RequestOptions::with_request_valid`] takes precedence
/// over this trait when configured.
pub trait Validity {
    /// True when the payload represents an application-level success.
    fn is_valid(&self) -> bool {
        true
    }

    /// Failure detail shown to the caller when [`Validity::is_valid`] is
    /// false.
    fn failure_message(&self) -> String {
        String::new()
    }
}

/// Conversion from the raw fetch result into the data the controller holds.
///
/// Used when no `format_result` closure is configured. The blanket identity
/// implementation covers the common case of exposing the raw result as-is;
/// a manual implementation unwraps envelopes or reshapes payloads, and may
/// fail the way a formatter may fail.
pub trait FromRaw<R>: Sized {
    /// Convert a raw result into data.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError`] when the raw result cannot be represented as
    /// data; the machine redirects this into the context message.
    fn from_raw(raw: R) -> Result<Self, FormatError>;
}

impl<R> FromRaw<R> for R {
    fn from_raw(raw: R) -> Result<Self, FormatError> {
        Ok(raw)
    }
}

/// Standard response envelope: a status code, a failure message, and the
/// optional payload.
///
/// `code == -1` marks the application-level failure branch; any other code
/// is a success as far as the validity guard is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Application status code; [`ERRORED`] marks failure.
    pub code: i64,

    /// Failure detail; empty on success.
    #[serde(default)]
    pub msg: String,

    /// The payload, when the call produced one.
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Build a successful envelope around a payload.
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            msg: String::new(),
            data: Some(data),
        }
    }

    /// Build an errored envelope carrying a failure message.
    pub fn errored(msg: impl Into<String>) -> Self {
        Self {
            code: ERRORED,
            msg: msg.into(),
            data: None,
        }
    }
}

impl<T> Validity for Envelope<T> {
    fn is_valid(&self) -> bool {
        self.code != ERRORED
    }

    fn failure_message(&self) -> String {
        self.msg.clone()
    }
}

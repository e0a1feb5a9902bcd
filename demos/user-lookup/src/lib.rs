//! # User Lookup Demo
//!
//! A small user-directory lookup driving the reqflow controller end to end.
//!
//! This demo showcases:
//! - A fetcher resolving envelope payloads (sentinel-code failures included)
//! - JSON-object request parameters with refetch merging
//! - Formatting raw envelopes into domain data via [`FromRaw`]
//! - The controller facade (`run`, `refetch`, `mutate`, `data`, `loading`)
//!
//! ## Example
//!
//! ```no_run
//! use reqflow_core::options::RequestOptions;
//! use reqflow_runtime::RequestController;
//! use user_lookup::{User, UserDirectory, lookup_params};
//!
//! # async fn example() -> Result<(), reqflow_runtime::StoreError> {
//! let options: RequestOptions<_, _, User> =
//!     RequestOptions::new().with_default_params(lookup_params(1));
//! let (controller, mut started) =
//!     RequestController::start(UserDirectory::with_sample_data().into_runner(), options).await?;
//! started.wait().await;
//! let user: Option<User> = controller.data().await;
//! # let _ = user;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use reqflow_core::error::{FormatError, TransportError};
use reqflow_core::payload::{Envelope, FromRaw};
use reqflow_core::runner::{Fetcher, RequestRunner};

/// JSON-object request parameters, merged key-by-key on refetch.
pub type LookupParams = serde_json::Map<String, Value>;

/// A directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Directory identifier.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Contact address.
    pub email: String,
}

impl FromRaw<Envelope<User>> for User {
    fn from_raw(raw: Envelope<User>) -> Result<Self, FormatError> {
        let Envelope { msg, data, .. } = raw;
        data.ok_or_else(|| {
            if msg.is_empty() {
                FormatError::new("empty payload")
            } else {
                FormatError::new(msg)
            }
        })
    }
}

/// Parameters selecting a user by id.
#[must_use]
pub fn lookup_params(id: u64) -> LookupParams {
    let mut params = LookupParams::new();
    params.insert("id".to_string(), Value::from(id));
    params
}

/// An in-memory user directory behaving like a remote service: a little
/// latency, envelope payloads, and sentinel-code failures for unknown ids.
pub struct UserDirectory {
    users: Arc<HashMap<u64, User>>,
    latency: Duration,
}

impl UserDirectory {
    /// A directory seeded with a couple of entries.
    #[must_use]
    pub fn with_sample_data() -> Self {
        let users = [
            User {
                id: 1,
                name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
            },
            User {
                id: 2,
                name: "Grace Hopper".to_string(),
                email: "grace@example.com".to_string(),
            },
            User {
                id: 3,
                name: "Annie Easley".to_string(),
                email: "annie@example.com".to_string(),
            },
        ];
        Self::seeded(users)
    }

    /// A directory seeded with the given entries.
    pub fn seeded(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: Arc::new(users.into_iter().map(|u| (u.id, u)).collect()),
            latency: Duration::from_millis(10),
        }
    }

    /// Override the simulated latency.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Wrap this directory into a single-fetcher runner.
    #[must_use]
    pub fn into_runner(self) -> RequestRunner<LookupParams, Envelope<User>> {
        RequestRunner::single(self)
    }
}

impl Fetcher<LookupParams, Envelope<User>> for UserDirectory {
    fn fetch(
        &self,
        params: LookupParams,
    ) -> Pin<Box<dyn Future<Output = Result<Envelope<User>, TransportError>> + Send + '_>> {
        let users = Arc::clone(&self.users);
        let latency = self.latency;
        Box::pin(async move {
            tokio::time::sleep(latency).await;

            let Some(id) = params.get("id").and_then(Value::as_u64) else {
                return Ok(Envelope::errored("missing `id` parameter"));
            };
            Ok(users.get(&id).map_or_else(
                || Envelope::errored(format!("user {id} not found")),
                |user| Envelope::ok(user.clone()),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_id_resolves_the_user() {
        let directory = UserDirectory::with_sample_data().with_latency(Duration::ZERO);
        let result = directory.fetch(lookup_params(1)).await;

        let Ok(envelope) = result else {
            unreachable!("directory never rejects");
        };
        assert_eq!(envelope.code, 0);
        assert_eq!(envelope.data.map(|u| u.name), Some("Ada Lovelace".to_string()));
    }

    #[tokio::test]
    async fn unknown_id_returns_sentinel_failure() {
        let directory = UserDirectory::with_sample_data().with_latency(Duration::ZERO);
        let result = directory.fetch(lookup_params(404)).await;

        let Ok(envelope) = result else {
            unreachable!("directory never rejects");
        };
        assert_eq!(envelope.code, reqflow_core::payload::ERRORED);
        assert_eq!(envelope.msg, "user 404 not found");
        assert_eq!(envelope.data, None);
    }

    #[test]
    fn from_raw_unwraps_the_payload() {
        let user = User {
            id: 9,
            name: "Mary Jackson".to_string(),
            email: "mary@example.com".to_string(),
        };
        assert_eq!(User::from_raw(Envelope::ok(user.clone())), Ok(user));

        let err = User::from_raw(Envelope::errored("user 9 not found"));
        assert_eq!(err, Err(FormatError::new("user 9 not found")));
    }
}

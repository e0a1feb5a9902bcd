//! The request runner: fetcher registry and asynchronous invocation.
//!
//! The runner owns one or more named fetchers and performs the actual
//! asynchronous call. It classifies nothing: a resolved payload is returned
//! unchanged (validity is the machine's job), and only a rejection of the
//! call itself becomes a [`TransportError`]. The runner never retries;
//! retry is a fresh fetch event from the facade layer.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::TransportError;

/// Registry key used for a single unnamed fetcher.
pub const DEFAULT_FETCHER_KEY: &str = "fetcher";

/// A caller-supplied asynchronous fetch function.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
/// `async fn` to enable trait object usage (`Arc<dyn Fetcher>`). This is
/// required for the registry and for effects that capture a fetcher.
///
/// Implementations must not fail synchronously: failures are reported by
/// resolving the returned future with `Err`. Plain async closures implement
/// this trait automatically:
///
/// ```
/// use reqflow_core::runner::{Fetcher, RequestRunner};
/// use reqflow_core::payload::Envelope;
///
/// let runner = RequestRunner::single(|id: u64| async move {
///     Ok(Envelope::ok(id * 2))
/// });
/// # let _ = runner;
/// ```
pub trait Fetcher<P, R>: Send + Sync {
    /// Perform the asynchronous call.
    fn fetch(
        &self,
        params: P,
    ) -> Pin<Box<dyn Future<Output = Result<R, TransportError>> + Send + '_>>;
}

impl<P, R, F, Fut> Fetcher<P, R> for F
where
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, TransportError>> + Send + 'static,
{
    fn fetch(
        &self,
        params: P,
    ) -> Pin<Box<dyn Future<Output = Result<R, TransportError>> + Send + '_>> {
        Box::pin(self(params))
    }
}

/// The fetcher registry: a mapping from a string key to an async fetch
/// function.
///
/// Supplied once at controller construction and immutable thereafter. A
/// single unnamed fetcher registers under [`DEFAULT_FETCHER_KEY`]; named
/// sets exist for future multi-source dispatch.
pub struct RequestRunner<P, R> {
    fetchers: HashMap<String, Arc<dyn Fetcher<P, R>>>,
}

impl<P, R> RequestRunner<P, R> {
    /// Build a registry holding a single unnamed fetcher.
    pub fn single(fetcher: impl Fetcher<P, R> + 'static) -> Self {
        let mut fetchers: HashMap<String, Arc<dyn Fetcher<P, R>>> = HashMap::new();
        fetchers.insert(DEFAULT_FETCHER_KEY.to_string(), Arc::new(fetcher));
        Self { fetchers }
    }

    /// Build a registry from named fetchers.
    pub fn named<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Arc<dyn Fetcher<P, R>>)>,
    {
        Self {
            fetchers: entries
                .into_iter()
                .map(|(key, fetcher)| (key.into(), fetcher))
                .collect(),
        }
    }

    /// Registered fetcher keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fetchers.keys().map(String::as_str)
    }

    /// Invoke the fetcher registered under `key`.
    ///
    /// # Errors
    ///
    /// - [`TransportError::UnknownFetcher`] when no fetcher is registered
    ///   under `key`
    /// - [`TransportError::Failed`] when the underlying call rejects
    pub async fn invoke(&self, key: &str, params: P) -> Result<R, TransportError> {
        let Some(fetcher) = self.fetchers.get(key) else {
            return Err(TransportError::UnknownFetcher(key.to_string()));
        };
        fetcher.fetch(params).await
    }

    /// Invoke the fetcher registered under [`DEFAULT_FETCHER_KEY`].
    ///
    /// # Errors
    ///
    /// Same conditions as [`RequestRunner::invoke`].
    pub async fn invoke_default(&self, params: P) -> Result<R, TransportError> {
        self.invoke(DEFAULT_FETCHER_KEY, params).await
    }
}

impl<P, R> Clone for RequestRunner<P, R> {
    fn clone(&self) -> Self {
        Self {
            fetchers: self.fetchers.clone(),
        }
    }
}

impl<P, R> std::fmt::Debug for RequestRunner<P, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRunner")
            .field("fetchers", &self.fetchers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Envelope;

    #[test]
    fn single_registers_under_default_key() {
        let runner = RequestRunner::single(|id: u64| async move { Ok(Envelope::ok(id)) });
        assert_eq!(runner.keys().collect::<Vec<_>>(), vec![DEFAULT_FETCHER_KEY]);

        let result = tokio_test::block_on(runner.invoke_default(5));
        assert_eq!(result, Ok(Envelope::ok(5)));
    }

    #[test]
    fn unknown_key_is_a_transport_error() {
        let runner = RequestRunner::single(|id: u64| async move { Ok(Envelope::ok(id)) });
        let result = tokio_test::block_on(runner.invoke("users", 5));
        assert_eq!(result, Err(TransportError::UnknownFetcher("users".into())));
    }

    #[test]
    fn rejection_passes_through_unchanged() {
        let runner = RequestRunner::single(|_id: u64| async move {
            Err::<Envelope<u64>, _>(TransportError::failed("connection reset"))
        });
        let result = tokio_test::block_on(runner.invoke_default(5));
        assert_eq!(result, Err(TransportError::failed("connection reset")));
    }

    #[test]
    fn named_registry_dispatches_by_key() {
        let double: Arc<dyn Fetcher<u64, Envelope<u64>>> =
            Arc::new(|id: u64| async move { Ok(Envelope::ok(id * 2)) });
        let triple: Arc<dyn Fetcher<u64, Envelope<u64>>> =
            Arc::new(|id: u64| async move { Ok(Envelope::ok(id * 3)) });
        let runner = RequestRunner::named([("double", double), ("triple", triple)]);

        let result = tokio_test::block_on(runner.invoke("triple", 2));
        assert_eq!(result, Ok(Envelope::ok(6)));
    }
}

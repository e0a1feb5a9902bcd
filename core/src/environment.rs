//! Injected dependencies for the request machine.

use crate::runner::RequestRunner;

/// Environment handed to the reducer: everything external the machine
/// needs, which for a request lifecycle is exactly the runner.
#[derive(Debug, Clone)]
pub struct RequestEnvironment<P, R> {
    /// The fetcher registry performing asynchronous invocations.
    pub runner: RequestRunner<P, R>,
}

impl<P, R> RequestEnvironment<P, R> {
    /// Build an environment around a runner.
    #[must_use]
    pub const fn new(runner: RequestRunner<P, R>) -> Self {
        Self { runner }
    }
}

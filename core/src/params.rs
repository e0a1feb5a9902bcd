//! Request parameters and the refetch merge law.
//!
//! Parameters are opaque to the state machine: it only needs to clone them,
//! overlay a partial update on a cached base (refetch), and decide whether
//! there is anything worth caching. The [`Params`] trait captures exactly
//! that surface.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// Request parameters as the machine sees them.
///
/// # Merge law
///
/// `base.merge(patch)` overlays `patch` on top of `base`: every key present
/// in `patch` wins, every other key keeps its `base` value. Given a cached
/// base `{a:1, b:2}` and a partial update `{b:3}`, the effective parameters
/// are `{a:1, b:3}`.
pub trait Params: Clone + std::fmt::Debug + Default + Send + Sync + 'static {
    /// Overlay `patch` on top of `self`; keys in `patch` win.
    #[must_use]
    fn merge(&self, patch: Self) -> Self;

    /// True when there is nothing to cache for a later refetch.
    fn is_empty(&self) -> bool;
}

impl Params for Map<String, Value> {
    fn merge(&self, patch: Self) -> Self {
        let mut merged = self.clone();
        for (key, value) in patch {
            merged.insert(key, value);
        }
        merged
    }

    fn is_empty(&self) -> bool {
        Map::is_empty(self)
    }
}

impl<V> Params for HashMap<String, V>
where
    V: Clone + std::fmt::Debug + Send + Sync + 'static,
{
    fn merge(&self, patch: Self) -> Self {
        let mut merged = self.clone();
        merged.extend(patch);
        merged
    }

    fn is_empty(&self) -> bool {
        HashMap::is_empty(self)
    }
}

/// Parameter-less requests. Never cached (always empty).
impl Params for () {
    fn merge(&self, (): Self) -> Self {}

    fn is_empty(&self) -> bool {
        true
    }
}

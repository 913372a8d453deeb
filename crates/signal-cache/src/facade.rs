//! Public facade — `spec.md` §4.7.
//!
//! Two entry points glue the decision engine to a concrete key and
//! re-project the result through the caller's original (non-enhanced)
//! selector. Both always yield a JSON object; absent data yields the
//! empty object, never a failure.

use serde_json::Value;
use signal_cache_types::{CacheKey, EntityId, FieldSelector, Headers, Signal};

use crate::cache::SignalCache;
use crate::decision::{last_signal_headers, smart_update, SmartUpdateParams};
use crate::error::CacheError;
use crate::patch;

/// The two glue operations over a [`SignalCache`].
pub struct SignalCacheFacade<'a> {
    cache: &'a SignalCache,
}

impl<'a> SignalCacheFacade<'a> {
    /// Wrap a cache instance.
    pub fn new(cache: &'a SignalCache) -> Self {
        Self { cache }
    }

    /// Retrieve the whole thing, folding `events` against the cache.
    ///
    /// `min_acceptable_revision < 0` forces an unconditional
    /// invalidate-then-load; otherwise this is a `smart_update` with no
    /// selector and no policy-change invalidation.
    pub async fn retrieve_full(
        &self,
        entity_id: EntityId,
        events: Vec<Signal>,
        min_acceptable_revision: i64,
    ) -> Result<Value, CacheError> {
        let headers = last_signal_headers(&events);
        let key = CacheKey::whole(entity_id, headers);

        if min_acceptable_revision < 0 {
            self.cache.invalidate(&key);
            return Ok(self.cache.get(&key).await?.into_value());
        }

        let params = SmartUpdateParams {
            selector: None,
            signals: events,
            invalidate_on_policy_change: false,
            min_acceptable_revision,
        };
        let projection = smart_update(self.cache, &key, params).await?;
        Ok(projection.into_value())
    }

    /// Retrieve a selector-restricted view, folding `concerned_signals`
    /// against the cache, with policy-change invalidation enabled and a
    /// minimum acceptable revision of zero.
    pub async fn retrieve_partial(
        &self,
        entity_id: EntityId,
        selector: FieldSelector,
        headers: Headers,
        concerned_signals: Vec<Signal>,
    ) -> Result<Value, CacheError> {
        let key = CacheKey::partial(entity_id, headers, selector.clone());

        let params = SmartUpdateParams {
            selector: key.selector.clone(),
            signals: concerned_signals,
            invalidate_on_policy_change: true,
            min_acceptable_revision: 0,
        };
        let projection = smart_update(self.cache, &key, params).await?;
        let reprojected = patch::project(projection.as_value(), Some(&selector));
        Ok(reprojected)
    }
}

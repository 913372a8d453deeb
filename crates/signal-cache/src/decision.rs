//! Smart-update decision engine and fold — `spec.md` §4.4, §4.5.

use signal_cache_types::{CacheKey, CachedProjection, FieldSelector, Headers, Signal, ThingEvent, ThingEventKind};
use tracing::debug;

use crate::cache::SignalCache;
use crate::classifier::classify;
use crate::error::CacheError;
use crate::patch;
use crate::sequence::{assess, RunAssessment};

/// Inputs to [`smart_update`].
#[derive(Debug, Clone)]
pub struct SmartUpdateParams {
    /// Field selector bound to the key, if any (used to project before
    /// `put`).
    pub selector: Option<FieldSelector>,
    /// The caller's signal stream.
    pub signals: Vec<Signal>,
    /// Abort a fold and force a reload if `policy_id` changes mid-fold.
    pub invalidate_on_policy_change: bool,
    /// Negative forces an unconditional invalidate-and-reload; otherwise
    /// the floor a classified run's last event must meet.
    pub min_acceptable_revision: i64,
}

/// Decide among USE_CACHED / FOLD / RELOAD for `key` given `params`, and
/// return the resulting projection.
pub async fn smart_update(
    cache: &SignalCache,
    key: &CacheKey,
    params: SmartUpdateParams,
) -> Result<CachedProjection, CacheError> {
    if params.min_acceptable_revision < 0 {
        cache.invalidate(key);
        return cache.get(key).await;
    }

    let run = classify(&params.signals);
    let last_headers = run.last_headers.clone();

    // An empty run after classification is its own branch (`spec.md`
    // §4.4 step 2), distinct from a rejected run — it never goes through
    // the sequence validator at all, so a zero floor can't turn "no
    // events to apply" into a forced reload.
    if run.events.is_empty() {
        return cache.get(key).await;
    }

    match assess(run, params.min_acceptable_revision) {
        RunAssessment::Reject(reason) => {
            debug!(reason, "event run rejected; invalidating and reloading");
            cache.invalidate(key);
            cache.get_with_headers(key, Some(&last_headers)).await
        }
        RunAssessment::Accept(run) => {
            if run.lifecycle_reset {
                return fold(
                    cache,
                    key,
                    &CachedProjection::empty(),
                    &run.events,
                    params.invalidate_on_policy_change,
                    params.selector.as_ref(),
                )
                .await;
            }

            let cached = cache.get(key).await?;
            let floor = patch::revision_of(cached.as_value());
            let pending: Vec<ThingEvent> =
                run.events.into_iter().filter(|event| event.revision > floor).collect();

            match pending.first() {
                None => Ok(cached),
                Some(first) if first.revision == floor + 1 => {
                    fold(cache, key, &cached, &pending, params.invalidate_on_policy_change, params.selector.as_ref()).await
                }
                Some(first) => {
                    debug!(expected = floor + 1, found = first.revision, "gap between cache and events");
                    cache.invalidate(key);
                    cache.get_with_headers(key, Some(&last_headers)).await
                }
            }
        }
    }
}

/// Fold `events` over `base`, per `spec.md` §4.5. Installs the result with
/// `cache.put` and returns it, unless a mid-fold policy change forces a
/// reload instead.
pub async fn fold(
    cache: &SignalCache,
    key: &CacheKey,
    base: &CachedProjection,
    events: &[ThingEvent],
    invalidate_on_policy_change: bool,
    selector: Option<&FieldSelector>,
) -> Result<CachedProjection, CacheError> {
    let cached_policy_id = base.policy_id().map(str::to_string);
    let mut current = base.as_value().clone();

    for event in events {
        current = apply_event(&current, event);

        if invalidate_on_policy_change {
            if let (Some(cached_id), Some(current_id)) =
                (&cached_policy_id, current.get("policy_id").and_then(|v| v.as_str()))
            {
                if cached_id != current_id {
                    debug!(from = %cached_id, to = %current_id, "policy_id changed mid-fold; forcing reload");
                    cache.invalidate(key);
                    return cache.get_with_headers(key, Some(&event.headers)).await;
                }
            }
        }
    }

    let final_revision = events.last().map(|event| event.revision).unwrap_or_else(|| patch::revision_of(&current));
    if let Some(object) = current.as_object_mut() {
        object.insert("revision".to_string(), serde_json::Value::from(final_revision));
    }

    let projected = patch::project(&current, selector);
    let projection = CachedProjection::from_value(projected);
    cache.put(key, projection.clone());
    cache.metrics().record_fold();
    Ok(projection)
}

fn apply_event(base: &serde_json::Value, event: &ThingEvent) -> serde_json::Value {
    match event.kind {
        ThingEventKind::Merged => {
            patch::merge(base, &event.resource_path, event.payload.as_ref().unwrap_or(&serde_json::Value::Null))
        }
        ThingEventKind::Deleted => patch::delete(base, &event.resource_path),
        ThingEventKind::Created | ThingEventKind::Modified => patch::overlay(
            base,
            &event.resource_path,
            event.payload.as_ref().unwrap_or(&serde_json::Value::Null),
        ),
        _ => patch::overlay(
            base,
            &event.resource_path,
            event.payload.as_ref().unwrap_or(&serde_json::Value::Null),
        ),
    }
}

/// Headers of the last signal in a list, or empty headers for an empty
/// list — the correlation context propagated to the loader on a miss.
pub fn last_signal_headers(signals: &[Signal]) -> Headers {
    classify(signals).last_headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use signal_cache_types::{EntityId, Headers};
    use std::sync::Arc;

    use crate::config::CacheConfig;
    use crate::loader::Loader;

    struct FixedLoader(Map<String, Value>);

    #[async_trait]
    impl Loader for FixedLoader {
        async fn load(
            &self,
            _entity_id: &EntityId,
            _selector: Option<&FieldSelector>,
            _headers: &Headers,
        ) -> Result<Map<String, Value>, CacheError> {
            Ok(self.0.clone())
        }
    }

    fn key() -> CacheKey {
        CacheKey::whole(EntityId::new("t:1").unwrap(), Headers::empty())
    }

    fn event(kind: ThingEventKind, revision: i64, path: &str, payload: Value) -> ThingEvent {
        ThingEvent {
            kind,
            revision,
            resource_path: path.to_string(),
            payload: Some(payload),
            headers: Headers::empty(),
            is_live: false,
        }
    }

    fn loaded_cache(body: Value) -> (SignalCache, CacheKey) {
        let object = body.as_object().cloned().unwrap_or_default();
        let cache = SignalCache::new(Arc::new(FixedLoader(object)), CacheConfig::default());
        (cache, key())
    }

    #[tokio::test]
    async fn s1_use_cached_when_event_older_than_cache() {
        let (cache, key) = loaded_cache(json!({"revision": 7, "x": 1}));
        cache.put(&key, CachedProjection::from_value(json!({"revision": 7, "x": 1})));

        let params = SmartUpdateParams {
            selector: None,
            signals: vec![Signal::Thing(event(ThingEventKind::Modified, 6, "/x", json!(2)))],
            invalidate_on_policy_change: false,
            min_acceptable_revision: 0,
        };
        let result = smart_update(&cache, &key, params).await.unwrap();
        assert_eq!(result.as_value(), &json!({"revision": 7, "x": 1}));
    }

    #[tokio::test]
    async fn s2_fold_one_step() {
        let (cache, key) = loaded_cache(json!({"revision": 7, "x": 1}));
        cache.put(&key, CachedProjection::from_value(json!({"revision": 7, "x": 1})));

        let params = SmartUpdateParams {
            selector: None,
            signals: vec![Signal::Thing(event(ThingEventKind::Modified, 8, "/x", json!(2)))],
            invalidate_on_policy_change: false,
            min_acceptable_revision: 0,
        };
        let result = smart_update(&cache, &key, params).await.unwrap();
        assert_eq!(result.as_value(), &json!({"revision": 8, "x": 2}));

        let cached_again = cache.get(&key).await.unwrap();
        assert_eq!(cached_again.as_value(), &json!({"revision": 8, "x": 2}));
    }

    #[tokio::test]
    async fn s3_gap_forces_reload() {
        let (cache, key) = loaded_cache(json!({"revision": 9, "x": 2, "y": "k"}));
        cache.put(&key, CachedProjection::from_value(json!({"revision": 7})));

        let params = SmartUpdateParams {
            selector: None,
            signals: vec![Signal::Thing(event(ThingEventKind::Modified, 9, "/x", json!(2)))],
            invalidate_on_policy_change: false,
            min_acceptable_revision: 0,
        };
        let result = smart_update(&cache, &key, params).await.unwrap();
        assert_eq!(result.as_value(), &json!({"revision": 9, "x": 2, "y": "k"}));
    }

    #[tokio::test]
    async fn s4_lifecycle_reset_folds_from_empty() {
        let (cache, key) = loaded_cache(json!({}));
        cache.put(&key, CachedProjection::from_value(json!({"revision": 7, "x": 1, "y": 2})));

        let params = SmartUpdateParams {
            selector: None,
            signals: vec![
                Signal::Thing(event(ThingEventKind::Modified, 8, "/x", json!(9))),
                Signal::Thing(event(ThingEventKind::Deleted, 9, "", Value::Null)),
            ],
            invalidate_on_policy_change: false,
            min_acceptable_revision: 0,
        };
        let result = smart_update(&cache, &key, params).await.unwrap();
        assert_eq!(result.as_value(), &json!({"revision": 9}));
    }

    #[tokio::test]
    async fn s5_min_revision_not_met_forces_reload() {
        let (cache, key) = loaded_cache(json!({"revision": 42, "from": "loader"}));
        cache.put(&key, CachedProjection::from_value(json!({"revision": 7})));

        let params = SmartUpdateParams {
            selector: None,
            signals: vec![Signal::Thing(event(ThingEventKind::Modified, 8, "/x", json!(1)))],
            invalidate_on_policy_change: false,
            min_acceptable_revision: 10,
        };
        let result = smart_update(&cache, &key, params).await.unwrap();
        assert_eq!(result.as_value(), &json!({"revision": 42, "from": "loader"}));
    }

    #[tokio::test]
    async fn s6_policy_change_mid_fold_forces_reload() {
        let (cache, key) = loaded_cache(json!({"revision": 8, "policy_id": "B", "reloaded": true}));
        cache.put(&key, CachedProjection::from_value(json!({"revision": 7, "policy_id": "A"})));

        let params = SmartUpdateParams {
            selector: None,
            signals: vec![Signal::Thing(event(
                ThingEventKind::Merged,
                8,
                "",
                json!({"policy_id": "B"}),
            ))],
            invalidate_on_policy_change: true,
            min_acceptable_revision: 0,
        };
        let result = smart_update(&cache, &key, params).await.unwrap();
        assert_eq!(result.as_value(), &json!({"revision": 8, "policy_id": "B", "reloaded": true}));
    }

    #[tokio::test]
    async fn empty_run_returns_cached_without_loading() {
        let (cache, key) = loaded_cache(json!({"revision": 99}));
        cache.put(&key, CachedProjection::from_value(json!({"revision": 7})));

        let params = SmartUpdateParams {
            selector: None,
            signals: vec![],
            invalidate_on_policy_change: false,
            min_acceptable_revision: 0,
        };
        let result = smart_update(&cache, &key, params).await.unwrap();
        assert_eq!(result.as_value(), &json!({"revision": 7}));
    }
}

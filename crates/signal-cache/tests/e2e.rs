use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use signal_cache::{CacheConfig, CacheError, EntityId, FieldSelector, Headers, Loader, Signal, SignalCache, SignalCacheFacade};
use signal_cache_types::{ThingEvent, ThingEventKind};

/// A fake authoritative store: returns a fixed object and counts calls,
/// the way `toka-kernel`'s own end-to-end test stubs out `TokenValidator`
/// with an `AllowAll` collaborator instead of a real one.
struct FakeLoader {
    calls: AtomicUsize,
    response: Map<String, Value>,
}

impl FakeLoader {
    fn new(response: Value) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            response: response.as_object().cloned().unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Loader for FakeLoader {
    async fn load(
        &self,
        _entity_id: &EntityId,
        _selector: Option<&FieldSelector>,
        _headers: &Headers,
    ) -> Result<Map<String, Value>, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

fn merged_event(revision: i64, path: &str, payload: Value) -> ThingEvent {
    ThingEvent {
        kind: ThingEventKind::Merged,
        revision,
        resource_path: path.to_string(),
        payload: Some(payload),
        headers: Headers::empty(),
        is_live: false,
    }
}

#[tokio::test]
async fn e2e_retrieve_full_then_fold_then_reload_on_gap() {
    let loader = Arc::new(FakeLoader::new(json!({"revision": 1, "widgets": 3})));
    let cache = SignalCache::new(loader.clone(), CacheConfig::default());
    let facade = SignalCacheFacade::new(&cache);
    let entity = EntityId::new("org.example:widget-42").unwrap();

    // First call is a miss: one loader invocation.
    let first = facade.retrieve_full(entity.clone(), vec![], 0).await.unwrap();
    assert_eq!(first, json!({"revision": 1, "widgets": 3}));
    assert_eq!(loader.calls.load(Ordering::SeqCst), 1);

    // Second call folds a contiguous event locally: no further loader call.
    let folded = facade
        .retrieve_full(
            entity.clone(),
            vec![Signal::Thing(merged_event(2, "/widgets", json!(4)))],
            0,
        )
        .await
        .unwrap();
    assert_eq!(folded, json!({"revision": 2, "widgets": 4}));
    assert_eq!(loader.calls.load(Ordering::SeqCst), 1);

    // A revision gap forces a fresh reload; the loader's (still revision 1)
    // response wins over the fold.
    let reloaded = facade
        .retrieve_full(
            entity,
            vec![Signal::Thing(merged_event(9, "/widgets", json!(9)))],
            0,
        )
        .await
        .unwrap();
    assert_eq!(reloaded, json!({"revision": 1, "widgets": 3}));
    assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn e2e_retrieve_partial_hides_fields_outside_the_original_selector() {
    let loader = Arc::new(FakeLoader::new(json!({"revision": 1, "x": 1, "y": 2, "policy_id": "A"})));
    let cache = SignalCache::new(loader, CacheConfig::default());
    let facade = SignalCacheFacade::new(&cache);
    let entity = EntityId::new("org.example:widget-1").unwrap();
    let selector = FieldSelector::new(["/x".to_string()]).unwrap();

    let result = facade
        .retrieve_partial(entity, selector, Headers::empty(), vec![])
        .await
        .unwrap();

    assert_eq!(result, json!({"x": 1}));
}

#[tokio::test]
async fn e2e_concurrent_retrievals_share_a_single_loader_invocation() {
    let loader = Arc::new(FakeLoader::new(json!({"revision": 1})));
    let cache = Arc::new(SignalCache::new(loader.clone(), CacheConfig::default()));
    let entity = EntityId::new("org.example:widget-7").unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        let entity = entity.clone();
        handles.push(tokio::spawn(async move {
            let facade = SignalCacheFacade::new(&cache);
            facade.retrieve_full(entity, vec![], 0).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
}

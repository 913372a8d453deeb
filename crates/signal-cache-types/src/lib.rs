#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **signal-cache-types** – Shared data model for the signal-enrichment cache.
//!
//! This crate sits at the bottom of the crate graph, the way `toka-types`
//! sits under the rest of the Toka workspace: dependency-light, no I/O, no
//! async, just the value types every other crate in this workspace agrees
//! on. It defines the cache key model, the cached projection contract and
//! the thing-event wire shape, but knows nothing about how any of them are
//! folded, cached or loaded.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

//─────────────────────────────
//  Limits
//─────────────────────────────

/// Maximum length of an entity id, to keep cache keys cheap to hash.
pub const MAX_ENTITY_ID_LEN: usize = 1024;

//─────────────────────────────
//  Entity identifier
//─────────────────────────────

/// Opaque identifier of the thing being enriched.
///
/// Thing identifiers in this system are namespaced strings (e.g.
/// `"org.example:widget-42"`), not raw integers, so this is a thin newtype
/// over `String` rather than a reuse of any numeric entity id from another
/// part of the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Construct an `EntityId`, rejecting empty or oversized identifiers.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::InvalidEntityId("entity id must not be empty".into()));
        }
        if id.len() > MAX_ENTITY_ID_LEN {
            return Err(TypeError::InvalidEntityId(format!(
                "entity id exceeds {MAX_ENTITY_ID_LEN} bytes"
            )));
        }
        Ok(Self(id))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//─────────────────────────────
//  Headers
//─────────────────────────────

/// Opaque caller context carried alongside a request or event
/// (correlation id and similar metadata).
///
/// Backed by a `BTreeMap` rather than a `HashMap` so that `Headers` — and
/// therefore `CacheKey`, which embeds it — has a well-defined `Hash` impl.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(pub BTreeMap<String, String>);

impl Headers {
    /// The empty header set.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Look up a header value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Insert or replace a header value, returning `self` for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// `true` if no headers are carried.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

//─────────────────────────────
//  Field selector
//─────────────────────────────

/// A projection contract: the set of top-level JSON pointers a caller
/// wants to see in the returned projection.
///
/// Selector *parsing* (from a query-language string, a GraphQL selection
/// set, whatever the upstream caller speaks) is out of scope for this
/// crate — see `spec.md` §1. Callers hand us an already-parsed set of
/// pointers; we only know how to honor it.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSelector(BTreeSet<String>);

/// JSON pointer to the revision field, always implicitly included by an
/// enhanced selector.
pub const REVISION_POINTER: &str = "/revision";

impl FieldSelector {
    /// Build a selector from an explicit set of JSON pointers.
    ///
    /// Each pointer must be non-empty and start with `/` (root-level
    /// selection of the whole document is expressed as `None`, not as an
    /// empty selector).
    pub fn new(pointers: impl IntoIterator<Item = String>) -> Result<Self, TypeError> {
        let set: BTreeSet<String> = pointers.into_iter().collect();
        for pointer in &set {
            validate_pointer(pointer)?;
        }
        Ok(Self(set))
    }

    /// The configured pointers.
    pub fn pointers(&self) -> &BTreeSet<String> {
        &self.0
    }

    /// Return a copy of this selector guaranteed to include
    /// [`REVISION_POINTER`], per the "enhanced selector" rule in `spec.md`
    /// §3 — cached projections must always be able to validate themselves
    /// against incoming events.
    pub fn enhanced(&self) -> Self {
        let mut set = self.0.clone();
        set.insert(REVISION_POINTER.to_string());
        Self(set)
    }

    /// `true` if this selector was already enhanced with the revision
    /// pointer (used to avoid double-enhancing).
    pub fn includes_revision(&self) -> bool {
        self.0.contains(REVISION_POINTER)
    }
}

fn validate_pointer(pointer: &str) -> Result<(), TypeError> {
    if pointer.is_empty() || !pointer.starts_with('/') {
        return Err(TypeError::InvalidSelector(format!(
            "selector pointer {pointer:?} must be a non-empty JSON pointer starting with '/'"
        )));
    }
    Ok(())
}

//─────────────────────────────
//  Cache key
//─────────────────────────────

/// Identifies one cache slot: a thing, viewed through a caller's headers
/// and (optionally enhanced) selector.
///
/// Two keys are equal iff all three components are equal — this is a
/// plain structural-equality value type, not an interned handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// The thing being cached.
    pub entity_id: EntityId,
    /// Caller headers and enhanced selector, bundled as the "context" in
    /// `spec.md` §3.
    pub headers: Headers,
    /// `None` means "whole thing"; `Some` is always enhanced (always
    /// includes the revision pointer) by construction.
    pub selector: Option<FieldSelector>,
}

impl CacheKey {
    /// Build a key for the whole thing (no selector), with the given
    /// headers.
    pub fn whole(entity_id: EntityId, headers: Headers) -> Self {
        Self { entity_id, headers, selector: None }
    }

    /// Build a key for a partial projection. `selector` is enhanced to
    /// always include the revision pointer.
    pub fn partial(entity_id: EntityId, headers: Headers, selector: FieldSelector) -> Self {
        Self { entity_id, headers, selector: Some(selector.enhanced()) }
    }
}

//─────────────────────────────
//  Cached projection
//─────────────────────────────

/// A JSON object representing a selector-restricted view of a thing at a
/// known revision.
///
/// The empty object is the sentinel for "no known state" (pre-load or
/// post-delete) — see `spec.md` §3.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CachedProjection(Value);

impl CachedProjection {
    /// The sentinel "no known state" projection.
    pub fn empty() -> Self {
        Self(Value::Object(Map::new()))
    }

    /// Wrap a JSON value as a projection, normalizing non-object values to
    /// the empty projection (a cached projection is always an object, per
    /// `spec.md` §3).
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(Value::Object(map)),
            _ => Self::empty(),
        }
    }

    /// Borrow the underlying JSON object.
    pub fn as_object(&self) -> &Map<String, Value> {
        match &self.0 {
            Value::Object(map) => map,
            _ => unreachable!("CachedProjection invariant: always an object"),
        }
    }

    /// Mutably borrow the underlying JSON object.
    pub fn as_object_mut(&mut self) -> &mut Map<String, Value> {
        match &mut self.0 {
            Value::Object(map) => map,
            _ => unreachable!("CachedProjection invariant: always an object"),
        }
    }

    /// Consume the projection, returning the raw JSON value.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Borrow the raw JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// `true` if this projection carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.as_object().is_empty()
    }

    /// Extract the `revision` field, defaulting to `0` if absent — see
    /// `spec.md` §4.1 `revision_of`.
    pub fn revision(&self) -> i64 {
        self.as_object()
            .get("revision")
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    /// Extract the `policy_id` field, if present.
    pub fn policy_id(&self) -> Option<&str> {
        self.as_object().get("policy_id").and_then(Value::as_str)
    }

    /// Overwrite the `revision` field.
    pub fn set_revision(&mut self, revision: i64) {
        self.as_object_mut()
            .insert("revision".to_string(), Value::from(revision));
    }
}

impl From<Map<String, Value>> for CachedProjection {
    fn from(map: Map<String, Value>) -> Self {
        Self(Value::Object(map))
    }
}

//─────────────────────────────
//  Thing events
//─────────────────────────────

/// The four persisted-change cases a thing event can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum ThingEventKind {
    /// The thing came into existence.
    Created,
    /// The thing was deleted.
    Deleted,
    /// A JSON-merge-patch was applied at `resource_path`.
    Merged,
    /// The subtree at `resource_path` was replaced (or, for the unknown
    /// case, treated identically to this one).
    Modified,
}

/// A persisted change notification for a thing.
///
/// Mirrors the tagged-event shape `toka_bus_core::KernelEvent` uses for
/// its own domain, generalized with the revision/path/payload/liveness
/// fields this cache's fold needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ThingEvent {
    /// Which of the four cases this event represents.
    pub kind: ThingEventKind,
    /// Monotonically assigned revision number.
    pub revision: i64,
    /// JSON pointer addressed by this event; empty means "document root".
    pub resource_path: String,
    /// The changed value. Always `None` for [`ThingEventKind::Deleted`].
    pub payload: Option<Value>,
    /// Correlation headers carried with this specific event.
    pub headers: Headers,
    /// Live events reflect transient messages, not persisted state, and
    /// are ignored by enrichment.
    pub is_live: bool,
}

impl ThingEvent {
    /// Validate the structural invariants of an event that is about to
    /// enter the classifier: resource path syntax and revision sign.
    pub fn validate(&self) -> Result<(), TypeError> {
        if !self.resource_path.is_empty() && !self.resource_path.starts_with('/') {
            return Err(TypeError::MalformedResourcePath(self.resource_path.clone()));
        }
        if self.kind == ThingEventKind::Deleted && self.payload.is_some() {
            return Err(TypeError::MalformedResourcePath(
                "DELETED events must not carry a payload".into(),
            ));
        }
        Ok(())
    }
}

/// A caller-provided signal. Only the `Thing` case carries data this cache
/// acts on; every other signal in the caller's stream is discarded by the
/// classifier untouched (`spec.md` §4.2 step 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Signal {
    /// A thing event relevant to enrichment.
    Thing(ThingEvent),
    /// Any other signal shape the caller's stream may carry (metrics,
    /// unrelated domain events, ...). Opaque to this crate, but its
    /// headers are still tracked since the decision engine propagates the
    /// *last* signal's headers to the loader regardless of its kind.
    Unrelated(Headers),
}

//─────────────────────────────
//  Errors
//─────────────────────────────

/// Errors raised while constructing or validating data-model values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    /// `EntityId` construction rejected the input.
    #[error("invalid entity id: {0}")]
    InvalidEntityId(String),
    /// `FieldSelector` construction rejected a pointer.
    #[error("invalid selector: {0}")]
    InvalidSelector(String),
    /// A `ThingEvent`'s `resource_path` (or other structural field) is
    /// malformed.
    #[error("malformed event: {0}")]
    MalformedResourcePath(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_rejects_empty() {
        assert!(EntityId::new("").is_err());
    }

    #[test]
    fn entity_id_accepts_namespaced_string() {
        let id = EntityId::new("org.example:widget-42").unwrap();
        assert_eq!(id.as_str(), "org.example:widget-42");
    }

    #[test]
    fn selector_enhance_adds_revision_once() {
        let selector = FieldSelector::new(["/x".to_string()]).unwrap();
        assert!(!selector.includes_revision());
        let enhanced = selector.enhanced();
        assert!(enhanced.includes_revision());
        assert_eq!(enhanced.enhanced(), enhanced);
    }

    #[test]
    fn selector_rejects_non_pointer() {
        assert!(FieldSelector::new(["x".to_string()]).is_err());
        assert!(FieldSelector::new(["".to_string()]).is_err());
    }

    #[test]
    fn cached_projection_defaults_revision_to_zero() {
        assert_eq!(CachedProjection::empty().revision(), 0);
    }

    #[test]
    fn cached_projection_normalizes_scalars_to_empty() {
        let projection = CachedProjection::from_value(Value::String("oops".into()));
        assert!(projection.is_empty());
    }

    #[test]
    fn cache_key_partial_always_enhances_selector() {
        let key = CacheKey::partial(
            EntityId::new("t:1").unwrap(),
            Headers::empty(),
            FieldSelector::new(["/x".to_string()]).unwrap(),
        );
        assert!(key.selector.unwrap().includes_revision());
    }

    #[test]
    fn event_validate_rejects_bad_resource_path() {
        let event = ThingEvent {
            kind: ThingEventKind::Modified,
            revision: 1,
            resource_path: "x".to_string(),
            payload: Some(Value::Null),
            headers: Headers::empty(),
            is_live: false,
        };
        assert!(event.validate().is_err());
    }

    #[test]
    fn event_validate_rejects_deleted_with_payload() {
        let event = ThingEvent {
            kind: ThingEventKind::Deleted,
            revision: 1,
            resource_path: String::new(),
            payload: Some(Value::Null),
            headers: Headers::empty(),
            is_live: false,
        };
        assert!(event.validate().is_err());
    }
}

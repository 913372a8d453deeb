//! The loader contract — `spec.md` §6.
//!
//! The authoritative retrieval this cache wraps. Out of scope for this
//! crate: schema/selector parsing, transport, retries. One call is one
//! round-trip.

use async_trait::async_trait;
use serde_json::{Map, Value};
use signal_cache_types::{EntityId, FieldSelector, Headers};

use crate::error::CacheError;

/// Performs one authoritative retrieval of a thing's projection.
///
/// Mirrors the shape of `toka_llm_gateway`'s provider trait: a single
/// async method, object-safe via `async-trait`, so callers can hand the
/// cache a `Arc<dyn Loader>` without knowing the concrete backend.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Fetch the current projection for `entity_id`, restricted to
    /// `selector` (whole thing if `None`), with `headers` forwarded as
    /// correlation context.
    ///
    /// On entity-not-found, resolves with an empty object — not an error.
    /// Network/server failures resolve as [`CacheError::LoaderFailure`].
    async fn load(
        &self,
        entity_id: &EntityId,
        selector: Option<&FieldSelector>,
        headers: &Headers,
    ) -> Result<Map<String, Value>, CacheError>;
}

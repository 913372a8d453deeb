#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **signal-cache** — an async, node-local, read-through signal-enrichment
//! cache with a smart-update protocol over thing events.
//!
//! The crate is organized leaves-first, the way `toka-kernel` layers its
//! own state machine over `toka-bus-core` and `toka-store-core`:
//!
//! - [`patch`] — the pure JSON patch kernel (merge, delete, overlay,
//!   project, revision extraction).
//! - [`classifier`] — reduces a caller's signal list to the thing-event
//!   run worth folding.
//! - [`sequence`] — validates that run against a minimum acceptable
//!   revision and contiguity.
//! - [`decision`] — the smart-update decision engine and the fold.
//! - [`cache`] — the single-flight async cache cell map.
//! - [`loader`] — the authoritative-retrieval contract the cache wraps.
//! - [`facade`] — the two public entry points, `retrieve_full` and
//!   `retrieve_partial`.
//! - [`config`] — cache sizing and eviction knobs.
//! - [`metrics`] — diagnostics counters.

pub mod cache;
pub mod classifier;
pub mod config;
pub mod decision;
pub mod error;
pub mod facade;
pub mod loader;
pub mod metrics;
pub mod patch;
pub mod sequence;

pub use cache::SignalCache;
pub use config::{CacheConfig, CacheConfigBuilder, ConfigError};
pub use error::CacheError;
pub use facade::SignalCacheFacade;
pub use loader::Loader;
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};

pub use signal_cache_types::{
    CacheKey, CachedProjection, EntityId, FieldSelector, Headers, Signal, ThingEvent,
    ThingEventKind, TypeError,
};

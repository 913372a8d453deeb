//! Error kinds for the signal-enrichment cache, per `spec.md` §7.
//!
//! Only [`CacheError::LoaderFailure`] is ever actually constructed and
//! handed back to a facade caller today. `MalformedEvent` and
//! `InvariantViolation` are internal signals the classifier and sequence
//! validator use to fold a bad event run into a
//! [`crate::sequence::RunAssessment::Reject`] outcome — the core never
//! raises on them, matching `spec.md`'s "every branch is a value-returning
//! decision". [`CacheError::SelectorProjectionError`] is reserved for a
//! fallible selector-application path; [`crate::patch::project`] is a
//! total function over an already-validated
//! [`signal_cache_types::FieldSelector`] (pointers are checked at
//! construction in `FieldSelector::new`), so nothing constructs this
//! variant yet.

/// Errors surfaced or tracked by the cache engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The upstream loader failed (network/server error). Propagated to
    /// every awaiter of the same in-flight load; never cached.
    #[error("loader failed: {0}")]
    LoaderFailure(String),

    /// A thing event failed structural validation (e.g. a resource path
    /// that isn't a valid JSON pointer). The containing run is rejected.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// A sequence-level invariant was violated (e.g. a non-positive
    /// revision, or a revision gap). The containing run is rejected.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The caller's field selector could not be applied to a projection.
    /// Surfaced to the caller; the cache itself is left untouched. Not
    /// constructed today — reserved for a future fallible selector path
    /// (see the module docs).
    #[error("selector projection error: {0}")]
    SelectorProjectionError(String),
}

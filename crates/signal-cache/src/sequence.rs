//! Sequence validator — `spec.md` §4.3.
//!
//! Decides whether a classified event run is safe to fold over, or must
//! be rejected in favor of an invalidate-and-reload. Rejection is a value,
//! never a raised error: [`CacheError::MalformedEvent`] and
//! [`CacheError::InvariantViolation`] exist purely to document *why* a run
//! might be rejected, not as propagated errors.

use signal_cache_types::ThingEvent;

use crate::classifier::ClassifiedRun;

/// The outcome of validating a classified run against a minimum
/// acceptable revision and a contiguity check.
#[derive(Debug, Clone, PartialEq)]
pub enum RunAssessment {
    /// The run is safe to fold or use as-is.
    Accept(ClassifiedRun),
    /// The run must be discarded in favor of invalidate-then-reload, with
    /// a human-readable reason for logging.
    Reject(String),
}

/// Validate a classified run against `min_acceptable_revision` (negative
/// means "forced reload", enforced by the caller before this is reached)
/// and revision contiguity.
pub fn assess(run: ClassifiedRun, min_acceptable_revision: i64) -> RunAssessment {
    if min_acceptable_revision >= 0 {
        let meets_floor = run
            .events
            .last()
            .is_some_and(|last| last.revision >= min_acceptable_revision);
        if !meets_floor {
            return RunAssessment::Reject(format!(
                "run does not meet minimum acceptable revision {min_acceptable_revision}"
            ));
        }
    }

    if let Some(gap) = first_gap(&run.events) {
        return RunAssessment::Reject(format!(
            "revision gap: expected {} after {}, found {}",
            gap.expected, gap.previous, gap.found
        ));
    }

    RunAssessment::Accept(run)
}

struct Gap {
    previous: i64,
    expected: i64,
    found: i64,
}

fn first_gap(events: &[ThingEvent]) -> Option<Gap> {
    events.windows(2).find_map(|pair| {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.revision == prev.revision + 1 {
            None
        } else {
            Some(Gap { previous: prev.revision, expected: prev.revision + 1, found: next.revision })
        }
    })
}

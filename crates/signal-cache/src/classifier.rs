//! Event classifier — `spec.md` §4.2.
//!
//! Turns a caller-provided signal list into the ordered run of thing
//! events the sequence validator and fold actually care about: unrelated
//! signals are dropped, live events are dropped, and a lifecycle reset
//! (`CREATED`/`DELETED`) truncates everything before it, since no earlier
//! event in the run can still matter once the thing has been recreated
//! or torn down.

use signal_cache_types::{Headers, Signal, ThingEvent, ThingEventKind};

/// The thing-event run a signal list reduces to, plus the headers of the
/// very last signal in the *original* list (relevant or not) — the
/// correlation context handed to the loader on a cache miss.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRun {
    /// Thing events surviving the drop/truncate rules, oldest first.
    pub events: Vec<ThingEvent>,
    /// Headers of the last signal in the original list, or
    /// [`Headers::empty`] if the list was empty.
    pub last_headers: Headers,
    /// `true` iff the first surviving event is `CREATED` or `DELETED`.
    pub lifecycle_reset: bool,
}

/// Reduce a caller's signal list to a [`ClassifiedRun`].
pub fn classify(signals: &[Signal]) -> ClassifiedRun {
    let last_headers = signals
        .last()
        .map(signal_headers)
        .unwrap_or_else(Headers::empty);

    let mut events: Vec<ThingEvent> = Vec::new();
    for signal in signals {
        let Signal::Thing(event) = signal else {
            continue;
        };
        if event.is_live {
            continue;
        }
        if matches!(event.kind, ThingEventKind::Created | ThingEventKind::Deleted) {
            events.clear();
        }
        events.push(event.clone());
    }

    let lifecycle_reset = events
        .first()
        .is_some_and(|e| matches!(e.kind, ThingEventKind::Created | ThingEventKind::Deleted));

    ClassifiedRun { events, last_headers, lifecycle_reset }
}

fn signal_headers(signal: &Signal) -> Headers {
    match signal {
        Signal::Thing(event) => event.headers.clone(),
        Signal::Unrelated(headers) => headers.clone(),
    }
}

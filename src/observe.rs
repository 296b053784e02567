use crate::errors::UnavailableReason;
use crate::types::Category;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Log target for cache signals, so operators can filter them out of the
/// general log stream.
pub const SIGNAL_TARGET: &str = "media_cache::signal";

/// One signal per lookup that reached the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CacheEvent {
    /// The store answered. `rows == 0` is a genuine miss.
    Answered {
        category: Category,
        term_len: usize,
        rows: usize,
    },
    /// The store could not answer; the caller got an empty result anyway.
    Unavailable {
        category: Category,
        reason: UnavailableReason,
        detail: String,
    },
}

impl CacheEvent {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CacheEvent::Unavailable { .. })
    }
}

pub trait CacheObserver: Send + Sync {
    fn record(&self, event: &CacheEvent);
}

/// Writes every event through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl CacheObserver for LogObserver {
    fn record(&self, event: &CacheEvent) {
        match event {
            CacheEvent::Answered {
                category,
                term_len,
                rows,
            } => {
                log::debug!(
                    target: SIGNAL_TARGET,
                    "cache answered category={} term_len={} rows={}",
                    category,
                    term_len,
                    rows
                );
            }
            CacheEvent::Unavailable {
                category,
                reason,
                detail,
            } => {
                log::warn!(
                    target: SIGNAL_TARGET,
                    "cache unavailable category={} reason={} detail={:?}",
                    category,
                    reason,
                    detail
                );
            }
        }
    }
}

/// Counts events; doubles as a metric source.
#[derive(Debug, Default)]
pub struct CountingObserver {
    answered: AtomicU64,
    unavailable: AtomicU64,
    reasons: Mutex<HashMap<UnavailableReason, u64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub answered: u64,
    pub unavailable: u64,
    pub reasons: HashMap<UnavailableReason, u64>,
}

impl CountingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answered(&self) -> u64 {
        self.answered.load(Ordering::Relaxed)
    }

    pub fn unavailable(&self) -> u64 {
        self.unavailable.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let reasons = self
            .reasons
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone());
        CounterSnapshot {
            answered: self.answered(),
            unavailable: self.unavailable(),
            reasons,
        }
    }
}

impl CacheObserver for CountingObserver {
    fn record(&self, event: &CacheEvent) {
        match event {
            CacheEvent::Answered { .. } => {
                self.answered.fetch_add(1, Ordering::Relaxed);
            }
            CacheEvent::Unavailable { reason, .. } => {
                self.unavailable.fetch_add(1, Ordering::Relaxed);
                let mut reasons = self
                    .reasons
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                *reasons.entry(*reason).or_insert(0) += 1;
            }
        }
    }
}

/// Fan one event out to several observers.
pub struct Observers(pub Vec<std::sync::Arc<dyn CacheObserver>>);

impl CacheObserver for Observers {
    fn record(&self, event: &CacheEvent) {
        for observer in &self.0 {
            observer.record(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn unavailable(reason: UnavailableReason) -> CacheEvent {
        CacheEvent::Unavailable {
            category: Category::Movies,
            reason,
            detail: "test".to_string(),
        }
    }

    #[test]
    fn test_counting_observer_tracks_reasons() {
        let counter = CountingObserver::new();
        counter.record(&CacheEvent::Answered {
            category: Category::Series,
            term_len: 3,
            rows: 0,
        });
        counter.record(&unavailable(UnavailableReason::StoreMissing));
        counter.record(&unavailable(UnavailableReason::StoreMissing));
        counter.record(&unavailable(UnavailableReason::TableMissing));

        let snapshot = counter.snapshot();
        assert_eq!(snapshot.answered, 1);
        assert_eq!(snapshot.unavailable, 3);
        assert_eq!(snapshot.reasons[&UnavailableReason::StoreMissing], 2);
        assert_eq!(snapshot.reasons[&UnavailableReason::TableMissing], 1);
    }

    #[test]
    fn test_fan_out_reaches_every_observer() {
        let a = Arc::new(CountingObserver::new());
        let b = Arc::new(CountingObserver::new());
        let fan = Observers(vec![a.clone() as Arc<dyn CacheObserver>, b.clone(), Arc::new(LogObserver)]);

        fan.record(&unavailable(UnavailableReason::Corrupt));
        assert_eq!(a.unavailable(), 1);
        assert_eq!(b.unavailable(), 1);
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let value = serde_json::to_value(unavailable(UnavailableReason::QueryFailed)).unwrap();
        assert_eq!(value["event"], "unavailable");
        assert_eq!(value["category"], "movies");
        assert_eq!(value["reason"], "query_failed");
    }
}

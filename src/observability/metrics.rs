//! Named counters and duration histograms, addressable by a short key.
//!
//! Registering the same key twice returns the same instrument rather than
//! a second one; there is no unregister.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

pub trait Counter: Send + Sync + 'static {
    fn inc(&self);
    fn add(&self, delta: u64);
    fn value(&self) -> u64;
}

pub trait Histogram: Send + Sync + 'static {
    fn record(&self, value: Duration);
    fn count(&self) -> u64;
    fn sum_micros(&self) -> u64;
}

#[derive(Default)]
struct AtomicCounter(AtomicU64);

impl Counter for AtomicCounter {
    fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    fn add(&self, delta: u64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    fn value(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct AtomicHistogram {
    count: AtomicU64,
    sum_micros: AtomicU64,
}

impl Histogram for AtomicHistogram {
    fn record(&self, value: Duration) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros.fetch_add(value.as_micros() as u64, Ordering::Relaxed);
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn sum_micros(&self) -> u64 {
        self.sum_micros.load(Ordering::Relaxed)
    }
}

/// Registration is chainable and idempotent per key: calling `counter("x")`
/// twice returns handles to the same underlying instrument.
pub trait MetricsProvider: Send + Sync + 'static {
    fn counter(&self, key: &str) -> Arc<dyn Counter>;
    fn duration_histogram(&self, key: &str) -> Arc<dyn Histogram>;
}

/// Read-mostly map with fine-grained locking around registration; recording
/// itself is lock-free (atomics on the already-resolved instrument).
#[derive(Default)]
pub struct MetricsRegistry {
    counters: RwLock<HashMap<String, Arc<AtomicCounter>>>,
    histograms: RwLock<HashMap<String, Arc<AtomicHistogram>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsProvider for MetricsRegistry {
    fn counter(&self, key: &str) -> Arc<dyn Counter> {
        if let Some(existing) = self.counters.read().unwrap().get(key) {
            return Arc::clone(existing) as Arc<dyn Counter>;
        }
        let mut counters = self.counters.write().unwrap();
        let entry = counters.entry(key.to_string()).or_insert_with(|| Arc::new(AtomicCounter::default()));
        Arc::clone(entry) as Arc<dyn Counter>
    }

    fn duration_histogram(&self, key: &str) -> Arc<dyn Histogram> {
        if let Some(existing) = self.histograms.read().unwrap().get(key) {
            return Arc::clone(existing) as Arc<dyn Histogram>;
        }
        let mut histograms = self.histograms.write().unwrap();
        let entry = histograms.entry(key.to_string()).or_insert_with(|| Arc::new(AtomicHistogram::default()));
        Arc::clone(entry) as Arc<dyn Histogram>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_idempotent_per_key() {
        let registry = MetricsRegistry::new();
        let a = registry.counter("responses.dropped");
        let b = registry.counter("responses.dropped");
        a.inc();
        b.inc();
        assert_eq!(a.value(), 2);
    }

    #[test]
    fn histogram_tracks_count_and_sum() {
        let registry = MetricsRegistry::new();
        let hist = registry.duration_histogram("request.latency");
        hist.record(Duration::from_millis(5));
        hist.record(Duration::from_millis(15));
        assert_eq!(hist.count(), 2);
        assert_eq!(hist.sum_micros(), 20_000);
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Minimal operational counters, sampled by the janitor and logged on
/// request. Not a metrics-exporter integration; just cheap shared counters.
#[derive(Clone, Default)]
pub struct Counters {
    pub tasks_dispatched: Arc<AtomicU64>,
    pub tasks_skipped_inactive: Arc<AtomicU64>,

    pub results_processed: Arc<AtomicU64>,
    pub results_skipped_idempotent: Arc<AtomicU64>,
    pub results_dead_lettered: Arc<AtomicU64>,

    pub alerts_high_outflow: Arc<AtomicU64>,
    pub alerts_low_liquidity: Arc<AtomicU64>,
    pub alerts_surge: Arc<AtomicU64>,

    pub tasks_rescued: Arc<AtomicU64>,
    pub tasks_dead_lettered: Arc<AtomicU64>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_accumulate() {
        let c = Counters::new();
        assert_eq!(Counters::get(&c.tasks_dispatched), 0);
        Counters::incr(&c.tasks_dispatched);
        Counters::add(&c.tasks_dispatched, 4);
        assert_eq!(Counters::get(&c.tasks_dispatched), 5);
    }

    #[test]
    fn counters_clone_shares_the_same_atomics() {
        let c = Counters::new();
        let c2 = c.clone();
        Counters::incr(&c.tasks_dispatched);
        assert_eq!(Counters::get(&c2.tasks_dispatched), 1);
    }
}

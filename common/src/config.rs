use std::time::Duration;

/// All tunables the core reads from the environment.
/// One flat struct, documented per field, loaded once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Relational DSN (Postgres) backing the aggregator tables.
    pub database_url: String,
    /// Redis DSN backing the queue fabric, schedule store, and item-state store.
    pub redis_url: String,

    // =========================
    // Scheduler (C7)
    // =========================
    /// Base crawl interval (seconds) a weight of 1.0 maps to.
    pub base_interval_s: u64,
    /// Lower bound on the adjusted crawl interval.
    pub min_interval_s: u64,
    /// Upper bound on the adjusted crawl interval.
    pub max_interval_s: u64,
    /// Default `pagesOnSale` / `pagesSold` requested per task.
    pub pages_on_sale: u32,
    pub pages_sold: u32,
    /// Number of due IPs dispatched per `checkAndSchedule` batch.
    pub batch_size: usize,
    /// Upper bound on in-flight-plus-ready tasks before the scheduler pauses
    /// dispatching the next batch.
    pub backpressure_threshold: usize,
    /// Ceiling on how long the scheduler will wait for the queue to drain
    /// between batches before proceeding anyway.
    pub queue_drain_timeout: Duration,
    /// How often the janitor fiber rescues stuck queue items.
    pub janitor_interval: Duration,
    /// Age after which a processing-list item is considered stuck.
    pub janitor_timeout: Duration,
    /// How often the refresh fiber reloads the active-IP set.
    pub refresh_interval: Duration,
    /// Stagger step used when seeding newly-discovered IPs.
    pub stagger_step: Duration,

    // =========================
    // Queue fabric (C1)
    // =========================
    /// Blocking timeout for a single pop call.
    pub pop_timeout: Duration,
    /// TTL of the idempotency marker for a processed taskID.
    pub processed_marker_ttl: Duration,
    /// Number of rescues before an item is dead-lettered.
    pub max_rescues: u32,

    // =========================
    // Pipeline workers (C6)
    // =========================
    /// Number of concurrent pipeline worker fibers.
    pub worker_count: usize,
    /// Idle sleep after a pop timeout before retrying.
    pub worker_idle_backoff: Duration,
    /// Soft budget for processing a single result; overrun is logged, not fatal.
    pub process_timeout: Duration,

    // =========================
    // Item-state TTLs
    // =========================
    pub item_ttl_available: Duration,
    pub item_ttl_sold: Duration,

    // =========================
    // Alerts (C5)
    // =========================
    pub alert_high_outflow_threshold: i64,
    pub alert_low_liquidity_threshold: f64,
    pub alert_high_liquidity_threshold: f64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env_string("DATABASE_URL", "postgres://localhost/animetop"),
            redis_url: env_string("REDIS_URL", "redis://127.0.0.1/"),

            base_interval_s: env_u64("SCHED_BASE_INTERVAL_S", 2 * 3600),
            min_interval_s: env_u64("SCHED_MIN_INTERVAL_S", 15 * 60),
            max_interval_s: env_u64("SCHED_MAX_INTERVAL_S", 2 * 3600),
            pages_on_sale: env_u32("SCHED_PAGES_ON_SALE", 5),
            pages_sold: env_u32("SCHED_PAGES_SOLD", 5),
            batch_size: env_usize("SCHED_BATCH_SIZE", 50),
            backpressure_threshold: env_usize("SCHED_BACKPRESSURE_THRESHOLD", 25),
            queue_drain_timeout: Duration::from_secs(env_u64("SCHED_DRAIN_TIMEOUT_S", 600)),
            janitor_interval: Duration::from_secs(env_u64("JANITOR_INTERVAL_S", 5 * 60)),
            janitor_timeout: Duration::from_secs(env_u64("JANITOR_TIMEOUT_S", 10 * 60)),
            refresh_interval: Duration::from_secs(env_u64("REFRESH_INTERVAL_S", 30 * 60)),
            stagger_step: Duration::from_secs(env_u64("SCHED_STAGGER_STEP_S", 10)),

            pop_timeout: Duration::from_secs(env_u64("QUEUE_POP_TIMEOUT_S", 5)),
            processed_marker_ttl: Duration::from_secs(env_u64(
                "QUEUE_PROCESSED_TTL_S",
                24 * 3600,
            )),
            max_rescues: env_u32("QUEUE_MAX_RESCUES", 3),

            worker_count: env_usize("PIPELINE_WORKER_COUNT", 2),
            worker_idle_backoff: Duration::from_millis(env_u64(
                "PIPELINE_IDLE_BACKOFF_MS",
                250,
            )),
            process_timeout: Duration::from_secs(env_u64("PIPELINE_PROCESS_TIMEOUT_S", 30)),

            item_ttl_available: Duration::from_secs(env_u64("ITEM_TTL_AVAILABLE_S", 24 * 3600)),
            item_ttl_sold: Duration::from_secs(env_u64("ITEM_TTL_SOLD_S", 48 * 3600)),

            alert_high_outflow_threshold: env_i64("ALERT_HIGH_OUTFLOW", 50),
            alert_low_liquidity_threshold: env_f64("ALERT_LOW_LIQUIDITY", 0.1),
            alert_high_liquidity_threshold: env_f64("ALERT_HIGH_LIQUIDITY", 5.0),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_satisfy_interval_bounds() {
        let cfg = AppConfig::from_env();
        assert!(cfg.min_interval_s <= cfg.base_interval_s);
        assert!(cfg.base_interval_s <= cfg.max_interval_s);
    }

    #[test]
    fn backpressure_threshold_has_a_sane_floor() {
        let cfg = AppConfig::from_env();
        assert!(cfg.backpressure_threshold >= 1);
        assert!(cfg.batch_size >= 1);
    }
}

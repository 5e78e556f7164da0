use std::collections::HashMap;

use async_trait::async_trait;
use domain::schedule::ScheduleEntry;

/// A durable score-ordered set keyed by ipID and scored by next-due Unix
/// second. Survives process restarts; the scheduler caches none of this
/// in-process beyond a single tick.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn schedule(&self, ip_id: u64, next_due_s: u64) -> anyhow::Result<()>;

    /// One round-trip insert/update for many entries.
    async fn schedule_batch(&self, entries: &HashMap<u64, u64>) -> anyhow::Result<()>;

    async fn remove(&self, ip_id: u64) -> anyhow::Result<()>;

    async fn count(&self) -> anyhow::Result<u64>;

    async fn get_all(&self) -> anyhow::Result<Vec<ScheduleEntry>>;

    async fn get_schedule_time(&self, ip_id: u64) -> anyhow::Result<Option<u64>>;

    /// Every member with score <= `now_s`.
    async fn get_due(&self, now_s: u64) -> anyhow::Result<Vec<ScheduleEntry>>;

    /// The smallest score in the set, for precise sleeping. `None` if empty.
    async fn get_next_time(&self) -> anyhow::Result<Option<u64>>;
}

use async_trait::async_trait;
use domain::bucket::{HourlyBucket, PriceStats};
use domain::message::ResultItem;

use crate::alerts::Alert;

/// The per-batch contribution to one `(ipID, hourBucket)` row. Accumulation
/// against the existing row happens inside the store, not here, so that
/// concurrent pipeline workers never race on a read-modify-write.
#[derive(Debug, Clone)]
pub struct HourlyDelta {
    pub inflow: i64,
    pub outflow: i64,
    pub sample_count: i64,
    pub active_count: i64,
    pub price_stats: PriceStats,
}

/// The relational side of the pipeline: item snapshots, accumulating hourly
/// stats, and alert rows.
#[async_trait]
pub trait Aggregator: Send + Sync {
    /// Writes in batches of 100; (ipID, sourceID)-keyed; preserves first_seen.
    async fn upsert_item_snapshots(
        &self,
        ip_id: u64,
        items: &[ResultItem],
        now_s: u64,
    ) -> anyhow::Result<()>;

    /// Accumulating upsert keyed on `(ipID, hourBucket)`. Returns the row as
    /// it stands after this batch's contribution has been folded in.
    async fn aggregate_hourly_stats(
        &self,
        ip_id: u64,
        hour_bucket_s: u64,
        delta: HourlyDelta,
    ) -> anyhow::Result<HourlyBucket>;

    async fn record_alerts(&self, alerts: &[Alert]) -> anyhow::Result<()>;
}

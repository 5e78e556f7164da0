use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use domain::bucket::HourlyBucket;
use domain::ip::IpDescriptor;
use domain::message::ResultItem;

use crate::alerts::Alert;
use crate::descriptors::IpDescriptorRepository;
use crate::repository::{Aggregator, HourlyDelta};

#[derive(Default)]
pub struct MockAggregator {
    hourly: Mutex<HashMap<(u64, u64), HourlyBucket>>,
    snapshot_writes: Mutex<u64>,
    pub alerts: Mutex<Vec<Alert>>,
}

impl MockAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot_write_count(&self) -> u64 {
        *self.snapshot_writes.lock().await
    }

    pub async fn get_hourly(&self, ip_id: u64, hour_bucket_s: u64) -> Option<HourlyBucket> {
        self.hourly.lock().await.get(&(ip_id, hour_bucket_s)).cloned()
    }
}

#[async_trait]
impl Aggregator for MockAggregator {
    async fn upsert_item_snapshots(
        &self,
        _ip_id: u64,
        items: &[ResultItem],
        _now_s: u64,
    ) -> anyhow::Result<()> {
        *self.snapshot_writes.lock().await += items.len() as u64;
        Ok(())
    }

    async fn aggregate_hourly_stats(
        &self,
        ip_id: u64,
        hour_bucket_s: u64,
        delta: HourlyDelta,
    ) -> anyhow::Result<HourlyBucket> {
        let mut hourly = self.hourly.lock().await;
        let row = hourly
            .entry((ip_id, hour_bucket_s))
            .and_modify(|row| {
                row.inflow += delta.inflow;
                row.outflow += delta.outflow;
                row.sample_count += delta.sample_count;
                row.active_count = delta.active_count;
                row.price_stats = delta.price_stats.clone();
                row.liquidity_index = HourlyBucket::liquidity_index_of(row.inflow, row.outflow);
            })
            .or_insert_with(|| HourlyBucket {
                ip_id,
                hour_bucket_s,
                inflow: delta.inflow,
                outflow: delta.outflow,
                active_count: delta.active_count,
                sample_count: delta.sample_count,
                liquidity_index: HourlyBucket::liquidity_index_of(delta.inflow, delta.outflow),
                price_stats: delta.price_stats,
            });
        Ok(row.clone())
    }

    async fn record_alerts(&self, alerts: &[Alert]) -> anyhow::Result<()> {
        self.alerts.lock().await.extend_from_slice(alerts);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockIpDescriptorRepository {
    descriptors: Mutex<HashMap<u64, IpDescriptor>>,
}

impl MockIpDescriptorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, descriptor: IpDescriptor) {
        self.descriptors.lock().await.insert(descriptor.id, descriptor);
    }
}

#[async_trait]
impl IpDescriptorRepository for MockIpDescriptorRepository {
    async fn list_active(&self) -> anyhow::Result<Vec<IpDescriptor>> {
        Ok(self
            .descriptors
            .lock()
            .await
            .values()
            .filter(|d| d.is_active())
            .cloned()
            .collect())
    }

    async fn get(&self, ip_id: u64) -> anyhow::Result<Option<IpDescriptor>> {
        Ok(self.descriptors.lock().await.get(&ip_id).cloned())
    }

    async fn update_last_crawled(&self, ip_id: u64, last_crawled_s: u64) -> anyhow::Result<()> {
        if let Some(d) = self.descriptors.lock().await.get_mut(&ip_id) {
            d.last_crawled_s = Some(last_crawled_s);
        }
        Ok(())
    }

    async fn update_weight(&self, ip_id: u64, weight: f64) -> anyhow::Result<()> {
        if let Some(d) = self.descriptors.lock().await.get_mut(&ip_id) {
            d.weight = weight;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::bucket::PriceStats;

    fn delta(inflow: i64, outflow: i64) -> HourlyDelta {
        HourlyDelta {
            inflow,
            outflow,
            sample_count: inflow + outflow,
            active_count: 1,
            price_stats: PriceStats::default(),
        }
    }

    #[tokio::test]
    async fn accumulates_inflow_and_outflow_across_batches() {
        let agg = MockAggregator::new();
        agg.aggregate_hourly_stats(1, 0, delta(2, 1)).await.unwrap();
        let row = agg.aggregate_hourly_stats(1, 0, delta(3, 2)).await.unwrap();
        assert_eq!(row.inflow, 5);
        assert_eq!(row.outflow, 3);
        assert_eq!(row.sample_count, 6);
    }

    #[tokio::test]
    async fn active_count_and_price_stats_are_replaced_not_summed() {
        let agg = MockAggregator::new();
        agg.aggregate_hourly_stats(
            1,
            0,
            HourlyDelta {
                inflow: 1,
                outflow: 0,
                sample_count: 1,
                active_count: 10,
                price_stats: PriceStats {
                    avg: Some(100.0),
                    ..PriceStats::default()
                },
            },
        )
        .await
        .unwrap();
        let row = agg
            .aggregate_hourly_stats(
                1,
                0,
                HourlyDelta {
                    inflow: 1,
                    outflow: 0,
                    sample_count: 1,
                    active_count: 3,
                    price_stats: PriceStats {
                        avg: Some(200.0),
                        ..PriceStats::default()
                    },
                },
            )
            .await
            .unwrap();
        assert_eq!(row.active_count, 3);
        assert_eq!(row.price_stats.avg, Some(200.0));
    }
}

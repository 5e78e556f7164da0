use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;

use domain::bucket::{HourlyBucket, PriceStats};
use domain::message::ResultItem;

use crate::alerts::Alert;
use crate::repository::{Aggregator, HourlyDelta};

const SNAPSHOT_BATCH_SIZE: usize = 100;

/// `sqlx`/Postgres-backed implementation of [`Aggregator`]. Accumulation
/// for `inflow`/`outflow`/`sample_count` happens inside the `ON CONFLICT`
/// clause so concurrent pipeline workers targeting the same hour never
/// race on a read-modify-write; `active_count` and the price statistics are
/// replaced with the latest batch's numbers rather than accumulated.
pub struct SqlxAggregator {
    pool: PgPool,
}

impl SqlxAggregator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("connect to aggregator database")?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        crate::schema::migrate(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Aggregator for SqlxAggregator {
    #[instrument(skip(self, items), fields(ip_id, count = items.len()))]
    async fn upsert_item_snapshots(
        &self,
        ip_id: u64,
        items: &[ResultItem],
        now_s: u64,
    ) -> anyhow::Result<()> {
        for chunk in items.chunks(SNAPSHOT_BATCH_SIZE) {
            let mut tx = self.pool.begin().await.context("begin snapshot batch")?;
            for item in chunk {
                let is_sold = matches!(item.status, domain::message::ResultItemStatus::Sold);
                sqlx::query(
                    r#"
INSERT INTO item_snapshots (ip_id, source_id, title, price, status, image_url, item_url, first_seen, last_seen, sold_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, CASE WHEN $9 THEN $8 ELSE NULL END)
ON CONFLICT (ip_id, source_id) DO UPDATE SET
  title = EXCLUDED.title,
  price = EXCLUDED.price,
  status = EXCLUDED.status,
  image_url = EXCLUDED.image_url,
  item_url = EXCLUDED.item_url,
  last_seen = EXCLUDED.last_seen,
  sold_at = CASE
    WHEN $9 THEN COALESCE(item_snapshots.sold_at, EXCLUDED.last_seen)
    ELSE item_snapshots.sold_at
  END;
"#,
                )
                .bind(ip_id as i64)
                .bind(&item.source_id)
                .bind(&item.title)
                .bind(item.price)
                .bind(match item.status {
                    domain::message::ResultItemStatus::OnSale => "ON_SALE",
                    domain::message::ResultItemStatus::Sold => "SOLD",
                })
                .bind(&item.image_url)
                .bind(&item.item_url)
                .bind(now_s as i64)
                .bind(is_sold)
                .execute(&mut *tx)
                .await
                .context("upsert item snapshot")?;
            }
            tx.commit().await.context("commit snapshot batch")?;
        }
        Ok(())
    }

    #[instrument(skip(self, delta), fields(ip_id, hour_bucket_s))]
    async fn aggregate_hourly_stats(
        &self,
        ip_id: u64,
        hour_bucket_s: u64,
        delta: HourlyDelta,
    ) -> anyhow::Result<HourlyBucket> {
        let row = sqlx::query(
            r#"
INSERT INTO ip_stats_hourly (
  ip_id, hour_bucket, inflow, outflow, active_count, sample_count, liquidity_index,
  price_avg, price_median, price_min, price_max, price_stddev
)
VALUES (
  $1, $2, $3, $4, $5, $6,
  CASE WHEN $3 > 0 THEN $4::double precision / $3 ELSE NULL END,
  $7, $8, $9, $10, $11
)
ON CONFLICT (ip_id, hour_bucket) DO UPDATE SET
  inflow = ip_stats_hourly.inflow + EXCLUDED.inflow,
  outflow = ip_stats_hourly.outflow + EXCLUDED.outflow,
  sample_count = ip_stats_hourly.sample_count + EXCLUDED.sample_count,
  active_count = EXCLUDED.active_count,
  price_avg = EXCLUDED.price_avg,
  price_median = EXCLUDED.price_median,
  price_min = EXCLUDED.price_min,
  price_max = EXCLUDED.price_max,
  price_stddev = EXCLUDED.price_stddev,
  liquidity_index = CASE
    WHEN (ip_stats_hourly.inflow + EXCLUDED.inflow) > 0
    THEN (ip_stats_hourly.outflow + EXCLUDED.outflow)::double precision / (ip_stats_hourly.inflow + EXCLUDED.inflow)
    ELSE NULL
  END
RETURNING inflow, outflow, active_count, sample_count, liquidity_index,
          price_avg, price_median, price_min, price_max, price_stddev;
"#,
        )
        .bind(ip_id as i64)
        .bind(hour_bucket_s as i64)
        .bind(delta.inflow)
        .bind(delta.outflow)
        .bind(delta.active_count)
        .bind(delta.sample_count)
        .bind(delta.price_stats.avg)
        .bind(delta.price_stats.median)
        .bind(delta.price_stats.min)
        .bind(delta.price_stats.max)
        .bind(delta.price_stats.stddev)
        .fetch_one(&self.pool)
        .await
        .context("accumulating upsert of hourly stats")?;

        Ok(HourlyBucket {
            ip_id,
            hour_bucket_s,
            inflow: row.try_get("inflow")?,
            outflow: row.try_get("outflow")?,
            active_count: row.try_get("active_count")?,
            sample_count: row.try_get("sample_count")?,
            liquidity_index: row.try_get("liquidity_index")?,
            price_stats: PriceStats {
                avg: row.try_get("price_avg")?,
                median: row.try_get("price_median")?,
                min: row.try_get("price_min")?,
                max: row.try_get("price_max")?,
                stddev: row.try_get("price_stddev")?,
            },
        })
    }

    #[instrument(skip(self, alerts), fields(count = alerts.len()))]
    async fn record_alerts(&self, alerts: &[Alert]) -> anyhow::Result<()> {
        for alert in alerts {
            sqlx::query(
                r#"
INSERT INTO ip_alerts (ip_id, hour_bucket, alert_type, severity, message, metric_value, threshold_value, created_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8);
"#,
            )
            .bind(alert.ip_id as i64)
            .bind(alert.hour_bucket_s as i64)
            .bind(kind_str(alert.kind))
            .bind(severity_str(alert.severity))
            .bind(&alert.message)
            .bind(alert.metric_value)
            .bind(alert.threshold_value)
            .bind(common::time::now_s() as i64)
            .execute(&self.pool)
            .await
            .context("insert alert row")?;
        }
        Ok(())
    }
}

fn kind_str(kind: crate::alerts::AlertKind) -> &'static str {
    use crate::alerts::AlertKind::*;
    match kind {
        HighOutflow => "HIGH_OUTFLOW",
        LowLiquidity => "LOW_LIQUIDITY",
        Surge => "SURGE",
    }
}

fn severity_str(severity: crate::alerts::AlertSeverity) -> &'static str {
    use crate::alerts::AlertSeverity::*;
    match severity {
        Info => "INFO",
        Warning => "WARNING",
        Critical => "CRITICAL",
    }
}

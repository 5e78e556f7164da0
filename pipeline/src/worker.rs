//! C6: the pipeline worker. N independent fibers each run the same loop,
//! popping a result, folding it through the state machine and aggregator,
//! recomputing the crawl interval, and closing the loop back to the
//! schedule store.
//!
//! Responsibilities:
//! - Idempotency (skip already-processed task IDs).
//! - Fold one crawl result into item state, hourly stats, and alerts.
//! - Recompute the adjusted interval and reschedule.
//! - Ack only after every durable side effect has landed.
//!
//! Non-responsibilities:
//! - Running the crawl itself (external worker).
//! - Serving read queries over the aggregated data (external API).

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use aggregator::{
    check_and_create_alerts, Aggregator, AlertThresholds, HourlyDelta, IpDescriptorRepository,
};
use aggregator::{adjust, AdjustInput};
use common::cancellation::CancelSignal;
use common::time::{floor_to_hour, now_s};
use common::AppConfig;
use common::Counters;
use domain::bucket::PriceStats;
use domain::message::ResultMessage;
use itemstate::{process_items_batch, ItemStateRepository, TtlPolicy};
use queue::Queue;
use schedulestore::ScheduleStore;

use crate::cache::CacheInvalidator;

/// Everything one worker fiber needs. Cheap to clone: every field is an
/// `Arc`.
#[derive(Clone)]
pub struct PipelineContext {
    pub result_queue: Arc<dyn Queue<ResultMessage>>,
    pub item_states: Arc<dyn ItemStateRepository>,
    pub aggregator: Arc<dyn Aggregator>,
    pub descriptors: Arc<dyn IpDescriptorRepository>,
    pub schedule_store: Arc<dyn ScheduleStore>,
    pub cache_invalidator: Arc<dyn CacheInvalidator>,
    pub counters: Counters,
    pub cfg: Arc<AppConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Processed,
    SkippedIdempotent,
    SkippedCrawlerError,
    Idle,
}

/// Runs until `cancel` fires. `worker_id` is only used for logging.
pub async fn run(ctx: PipelineContext, worker_id: usize, mut cancel: CancelSignal) {
    loop {
        if cancel.is_cancelled() {
            info!(worker_id, "pipeline worker shutting down");
            return;
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                info!(worker_id, "pipeline worker shutting down");
                return;
            }
            result = pop_and_process(&ctx) => result,
        };

        match outcome {
            Ok(Outcome::Idle) => tokio::time::sleep(ctx.cfg.worker_idle_backoff).await,
            Ok(_) => {}
            Err(e) => warn!(worker_id, error = %e, "pipeline worker iteration failed"),
        }
    }
}

async fn pop_and_process(ctx: &PipelineContext) -> anyhow::Result<Outcome> {
    let Some(popped) = ctx.result_queue.pop(ctx.cfg.pop_timeout).await? else {
        return Ok(Outcome::Idle);
    };

    let start = tokio::time::Instant::now();
    let outcome = process_one(ctx, &popped.value).await?;
    ctx.result_queue.ack(&popped).await?;

    let elapsed = start.elapsed();
    if elapsed > ctx.cfg.process_timeout {
        warn!(ip_id = popped.value.ip_id, elapsed_ms = elapsed.as_millis() as u64, "result processing overran its budget");
    }

    Ok(outcome)
}

/// Steps 2-11 of the worker loop. Acking is left to the caller so a failure
/// here leaves the result in the processing list for the janitor to rescue.
#[instrument(skip(ctx, result), fields(ip_id = result.ip_id, task_id = %result.task_id))]
async fn process_one(ctx: &PipelineContext, result: &ResultMessage) -> anyhow::Result<Outcome> {
    if !result.is_recoverable_signal() {
        warn!(error_message = ?result.error_message, "crawler reported a non-recoverable error, skipping");
        return Ok(Outcome::SkippedCrawlerError);
    }

    if ctx.result_queue.is_processed(result.task_id).await? {
        Counters::incr(&ctx.counters.results_skipped_idempotent);
        debug!("task already processed, skipping as duplicate delivery");
        return Ok(Outcome::SkippedIdempotent);
    }

    let descriptor = ctx.descriptors.get(result.ip_id).await?;
    let weight_before = descriptor.as_ref().map(|d| d.weight).unwrap_or(1.0);

    // Keyed on the state-machine's own row count for this IP, not the
    // descriptor's last_crawled_s: once an IP has been crawled once,
    // last_crawled_s never goes back to None, so a fully TTL-expired item
    // state would otherwise be mistaken for a returning, non-first crawl.
    let is_first_crawl = ctx.item_states.count_for_ip(result.ip_id).await? == 0;

    let ttl = TtlPolicy {
        available_s: ctx.cfg.item_ttl_available.as_secs(),
        sold_s: ctx.cfg.item_ttl_sold.as_secs(),
    };
    let now = now_s();
    let batch = process_items_batch(ctx.item_states.as_ref(), result.ip_id, &result.items, now, ttl).await?;

    let (inflow, outflow, sample_count) = if is_first_crawl {
        (0, 0, 0)
    } else {
        (batch.inflow, batch.outflow, batch.transitions.len() as i64)
    };

    let sold_prices: Vec<i64> = if is_first_crawl {
        Vec::new()
    } else {
        batch.transitions.iter().filter_map(|t| t.sold_price()).collect()
    };
    let price_stats = PriceStats::from_prices(&sold_prices);

    let hour_bucket_s = floor_to_hour(now);
    let delta = HourlyDelta {
        inflow,
        outflow,
        sample_count,
        active_count: result.items.len() as i64,
        price_stats,
    };

    let (snapshot_result, hourly_result) = tokio::join!(
        ctx.aggregator.upsert_item_snapshots(result.ip_id, &result.items, now),
        ctx.aggregator.aggregate_hourly_stats(result.ip_id, hour_bucket_s, delta),
    );
    snapshot_result?;
    let hourly = hourly_result?;

    let thresholds = AlertThresholds {
        high_outflow: ctx.cfg.alert_high_outflow_threshold,
        low_liquidity: ctx.cfg.alert_low_liquidity_threshold,
        high_liquidity: ctx.cfg.alert_high_liquidity_threshold,
    };
    let alerts = check_and_create_alerts(result.ip_id, hour_bucket_s, hourly.outflow, hourly.liquidity_index, thresholds);

    let adjust_result = adjust(
        AdjustInput {
            pages_on_sale: ctx.cfg.pages_on_sale,
            pages_sold: ctx.cfg.pages_sold,
            current_weight: weight_before,
            inflow,
            outflow,
            is_first_crawl,
        },
        ctx.cfg.base_interval_s,
        ctx.cfg.min_interval_s,
        ctx.cfg.max_interval_s,
    );

    let (alerts_result, last_crawled_result, weight_result) = tokio::join!(
        async {
            if alerts.is_empty() {
                Ok(())
            } else {
                ctx.aggregator.record_alerts(&alerts).await
            }
        },
        ctx.descriptors.update_last_crawled(result.ip_id, now),
        ctx.descriptors.update_weight(result.ip_id, adjust_result.new_weight),
    );
    alerts_result?;
    last_crawled_result?;
    weight_result?;

    ctx.schedule_store.schedule(result.ip_id, now + adjust_result.new_interval_s).await?;

    ctx.result_queue.mark_processed(result.task_id, ctx.cfg.processed_marker_ttl).await?;
    Counters::incr(&ctx.counters.results_processed);

    ctx.cache_invalidator.invalidate_after_update(result.ip_id);

    info!(
        inflow,
        outflow,
        new_interval_s = adjust_result.new_interval_s,
        alerts = alerts.len(),
        "processed crawl result"
    );

    Ok(Outcome::Processed)
}

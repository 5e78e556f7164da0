use std::sync::Arc;

use aggregator::{SqlxAggregator, SqlxIpDescriptorRepository};
use common::cancellation::new_cancel_pair;
use common::logger::init_tracing;
use common::{AppConfig, Counters};
use itemstate::RedisItemStateRepository;
use pipeline::{CacheInvalidator, PipelineContext, RedisCacheInvalidator};
use schedulestore::RedisScheduleStore;

/// Connects every durable store the core depends on and runs startup
/// migrations against the relational side.
async fn connect_stores(
    cfg: &AppConfig,
) -> anyhow::Result<(
    queue::TaskQueue,
    queue::ResultQueue,
    RedisScheduleStore,
    RedisItemStateRepository,
    SqlxAggregator,
    SqlxIpDescriptorRepository,
    redis::aio::ConnectionManager,
)> {
    let (tasks, results) = queue::connect(&cfg.redis_url).await?;
    let schedule_store = RedisScheduleStore::connect(&cfg.redis_url).await?;
    let item_states = RedisItemStateRepository::connect(&cfg.redis_url).await?;

    let aggregator = SqlxAggregator::connect(&cfg.database_url).await?;
    aggregator.migrate().await?;
    let descriptors = SqlxIpDescriptorRepository::new(aggregator.pool().clone());

    let cache_client = redis::Client::open(cfg.redis_url.as_str())?;
    let cache_conn = redis::aio::ConnectionManager::new(cache_client).await?;

    Ok((tasks, results, schedule_store, item_states, aggregator, descriptors, cache_conn))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    tracing::info!("starting animetop core");

    let cfg = Arc::new(AppConfig::from_env());
    let counters = Counters::new();

    let (tasks, results, schedule_store, item_states, aggregator, descriptors, cache_conn) =
        connect_stores(&cfg).await?;

    let tasks: Arc<dyn queue::Queue<domain::message::TaskMessage>> = Arc::new(tasks);
    let results: Arc<dyn queue::Queue<domain::message::ResultMessage>> = Arc::new(results);
    let schedule_store: Arc<dyn schedulestore::ScheduleStore> = Arc::new(schedule_store);
    let item_states: Arc<dyn itemstate::ItemStateRepository> = Arc::new(item_states);
    let aggregator: Arc<dyn aggregator::Aggregator> = Arc::new(aggregator);
    let descriptors: Arc<dyn aggregator::IpDescriptorRepository> = Arc::new(descriptors);

    let (cancel_handle, cancel) = new_cancel_pair();

    scheduler::initialize(
        schedule_store.as_ref(),
        tasks.as_ref(),
        descriptors.as_ref(),
        &cfg,
        common::time::now_s(),
    )
    .await?;

    spawn_scheduler_fibers(
        schedule_store.clone(),
        tasks.clone(),
        results.clone(),
        descriptors.clone(),
        counters.clone(),
        cfg.clone(),
        cancel.clone(),
    );

    let cache_invalidator: Arc<dyn CacheInvalidator> = Arc::new(RedisCacheInvalidator::new(cache_conn));

    spawn_pipeline_workers(
        results,
        item_states,
        aggregator,
        descriptors,
        schedule_store,
        cache_invalidator,
        counters,
        cfg.clone(),
        cancel.clone(),
    );

    tracing::info!("animetop core started; waiting for shutdown signal");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    cancel_handle.cancel();

    // Give fibers a moment to observe cancellation and stop cleanly.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn spawn_scheduler_fibers(
    schedule_store: Arc<dyn schedulestore::ScheduleStore>,
    tasks: Arc<dyn queue::Queue<domain::message::TaskMessage>>,
    results: Arc<dyn queue::Queue<domain::message::ResultMessage>>,
    descriptors: Arc<dyn aggregator::IpDescriptorRepository>,
    counters: Counters,
    cfg: Arc<AppConfig>,
    cancel: common::cancellation::CancelSignal,
) {
    {
        let (schedule_store, tasks, descriptors, counters, cfg, cancel) =
            (schedule_store.clone(), tasks.clone(), descriptors.clone(), counters.clone(), cfg.clone(), cancel.clone());
        tokio::spawn(async move {
            scheduler::runner::run(
                schedule_store.as_ref(),
                tasks.as_ref(),
                descriptors.as_ref(),
                &counters,
                &cfg,
                cancel,
                common::time::now_s,
            )
            .await;
        });
    }

    {
        let (tasks, results, counters, cfg, cancel) = (tasks, results, counters.clone(), cfg.clone(), cancel.clone());
        tokio::spawn(async move {
            scheduler::janitor::run(tasks.as_ref(), results.as_ref(), &counters, &cfg, cancel).await;
        });
    }

    tokio::spawn(async move {
        scheduler::refresh::run(schedule_store.as_ref(), descriptors.as_ref(), &cfg, cancel, common::time::now_s).await;
    });
}

#[allow(clippy::too_many_arguments)]
fn spawn_pipeline_workers(
    result_queue: Arc<dyn queue::Queue<domain::message::ResultMessage>>,
    item_states: Arc<dyn itemstate::ItemStateRepository>,
    aggregator: Arc<dyn aggregator::Aggregator>,
    descriptors: Arc<dyn aggregator::IpDescriptorRepository>,
    schedule_store: Arc<dyn schedulestore::ScheduleStore>,
    cache_invalidator: Arc<dyn CacheInvalidator>,
    counters: Counters,
    cfg: Arc<AppConfig>,
    cancel: common::cancellation::CancelSignal,
) {
    let ctx = PipelineContext {
        result_queue,
        item_states,
        aggregator,
        descriptors,
        schedule_store,
        cache_invalidator,
        counters,
        cfg: cfg.clone(),
    };

    for worker_id in 0..cfg.worker_count.max(1) {
        let ctx = ctx.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            pipeline::run(ctx, worker_id, cancel).await;
        });
    }
}

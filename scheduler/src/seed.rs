//! Startup sequence: recover orphaned tasks, then seed the schedule store
//! from the descriptor table unless a plan already exists.

use tracing::{info, instrument};

use aggregator::IpDescriptorRepository;
use common::AppConfig;
use domain::message::TaskMessage;
use queue::Queue;
use schedulestore::ScheduleStore;

use crate::interval::interval_from_weight;

/// Runs once before the main loop starts. Returns the number of schedule
/// entries written (0 if an existing plan was kept as-is).
#[instrument(skip(schedule_store, task_queue, descriptors, cfg))]
pub async fn initialize(
    schedule_store: &dyn ScheduleStore,
    task_queue: &dyn Queue<TaskMessage>,
    descriptors: &dyn IpDescriptorRepository,
    cfg: &AppConfig,
    now_s: u64,
) -> anyhow::Result<u64> {
    let recovered = task_queue.recover_orphaned().await?;
    info!(recovered, "recovered orphaned tasks on startup");

    if schedule_store.count().await? > 0 {
        info!("existing schedule plan found, restart preserves it");
        return Ok(0);
    }

    let active = descriptors.list_active().await?;
    let mut entries = std::collections::HashMap::with_capacity(active.len());
    for (i, descriptor) in active.iter().enumerate() {
        let stagger = cfg.stagger_step.as_secs().saturating_mul(i as u64);
        let next_due_s = match descriptor.last_crawled_s {
            Some(last_crawled_s) => {
                let interval = interval_from_weight(
                    descriptor.weight,
                    cfg.base_interval_s,
                    cfg.min_interval_s,
                    cfg.max_interval_s,
                );
                (now_s + stagger).max(last_crawled_s + interval)
            }
            None => now_s + stagger,
        };
        entries.insert(descriptor.id, next_due_s);
    }

    schedule_store.schedule_batch(&entries).await?;
    info!(seeded = entries.len(), "seeded schedule store from descriptor table");
    Ok(entries.len() as u64)
}

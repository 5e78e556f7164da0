//! `checkAndSchedule`: turns the due set into dispatched tasks.
//!
//! Responsibilities:
//! - Drop schedule entries whose descriptor has gone missing or inactive.
//! - Push one task per remaining due IP, ignoring `AlreadyExists`.
//! - Optimistically reschedule; the pipeline overwrites this once the
//!   result for this dispatch lands.
//!
//! Non-responsibilities:
//! - Deciding the adjusted interval from observed traffic (the pipeline's
//!   interval adjuster owns that; this module only uses the descriptor's
//!   currently persisted weight).

use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use aggregator::IpDescriptorRepository;
use common::AppConfig;
use common::Counters;
use domain::message::TaskMessage;
use domain::schedule::ScheduleEntry;
use queue::{PushOutcome, Queue};
use schedulestore::ScheduleStore;

use crate::interval::interval_from_weight;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckAndScheduleReport {
    pub dispatched: u64,
    pub dropped: u64,
}

/// One pass over the due set: `GetDue`, then dispatch in batches of
/// `cfg.batch_size`, waiting for the queue to drain between batches.
#[instrument(skip(schedule_store, task_queue, descriptors, counters, cfg))]
pub async fn check_and_schedule(
    schedule_store: &dyn ScheduleStore,
    task_queue: &dyn Queue<TaskMessage>,
    descriptors: &dyn IpDescriptorRepository,
    counters: &Counters,
    cfg: &AppConfig,
    now_s: u64,
) -> anyhow::Result<CheckAndScheduleReport> {
    let due = schedule_store.get_due(now_s).await?;
    if due.is_empty() {
        return Ok(CheckAndScheduleReport::default());
    }

    let backpressure_threshold = cfg.backpressure_threshold.max(2);
    let mut report = CheckAndScheduleReport::default();

    for batch in due.chunks(cfg.batch_size.max(1)) {
        dispatch_batch(schedule_store, task_queue, descriptors, counters, cfg, now_s, batch, &mut report).await?;

        if batch.len() == cfg.batch_size.max(1) {
            wait_for_drain(task_queue, backpressure_threshold, cfg.queue_drain_timeout).await;
        }
    }

    info!(dispatched = report.dispatched, dropped = report.dropped, "checkAndSchedule pass complete");
    Ok(report)
}

async fn dispatch_batch(
    schedule_store: &dyn ScheduleStore,
    task_queue: &dyn Queue<TaskMessage>,
    descriptors: &dyn IpDescriptorRepository,
    counters: &Counters,
    cfg: &AppConfig,
    now_s: u64,
    batch: &[ScheduleEntry],
    report: &mut CheckAndScheduleReport,
) -> anyhow::Result<()> {
    for entry in batch {
        let descriptor = descriptors.get(entry.ip_id).await?;
        let descriptor = match descriptor {
            Some(d) if d.is_active() => d,
            _ => {
                schedule_store.remove(entry.ip_id).await?;
                report.dropped += 1;
                debug!(ip_id = entry.ip_id, "dropping schedule entry: descriptor missing or inactive");
                continue;
            }
        };

        let task = TaskMessage {
            ip_id: descriptor.id,
            keyword: descriptor.name.clone(),
            task_id: Uuid::new_v4(),
            created_at_s: now_s,
            pages_on_sale: cfg.pages_on_sale,
            pages_sold: cfg.pages_sold,
        };

        match task_queue.push(&task).await? {
            PushOutcome::Pushed => {
                Counters::incr(&counters.tasks_dispatched);
                report.dispatched += 1;
            }
            PushOutcome::AlreadyExists => {
                debug!(ip_id = entry.ip_id, "task already in flight for this ip, skipping push");
            }
        }

        let next_interval = interval_from_weight(
            descriptor.weight,
            cfg.base_interval_s,
            cfg.min_interval_s,
            cfg.max_interval_s,
        );
        schedule_store.schedule(descriptor.id, now_s + next_interval).await?;
    }
    Ok(())
}

/// Blocks until `tasks_ready + tasks_processing` falls to or below
/// `threshold`, or `timeout` elapses, whichever comes first.
async fn wait_for_drain(task_queue: &dyn Queue<TaskMessage>, threshold: usize, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match task_queue.depth().await {
            Ok(depth) if (depth.ready + depth.processing) as usize <= threshold => return,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "failed to read queue depth while waiting for drain");
                return;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            warn!("queue drain wait timed out, proceeding anyway");
            return;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use aggregator::mock::MockIpDescriptorRepository;
    use domain::ip::{IpDescriptor, IpStatus};
    use queue::mock::MockQueue;
    use schedulestore::mock::MockScheduleStore;

    use super::*;

    fn descriptor(id: u64, status: IpStatus) -> IpDescriptor {
        IpDescriptor {
            id,
            name: format!("ip-{id}"),
            status,
            weight: 1.0,
            last_crawled_s: None,
            aliases: vec![],
            category: None,
            tags: vec![],
            external_id: None,
            notes: None,
        }
    }

    fn cfg() -> AppConfig {
        let mut cfg = AppConfig::from_env();
        cfg.batch_size = 50;
        cfg.backpressure_threshold = 2;
        cfg.queue_drain_timeout = StdDuration::from_millis(50);
        cfg.base_interval_s = 7200;
        cfg.min_interval_s = 900;
        cfg.max_interval_s = 7200;
        cfg
    }

    #[tokio::test]
    async fn dispatches_one_task_per_active_due_ip_and_reschedules() {
        let store = MockScheduleStore::new();
        let queue: MockQueue<TaskMessage> = MockQueue::new();
        let descriptors = MockIpDescriptorRepository::new();
        let counters = Counters::new();

        descriptors.seed(descriptor(1, IpStatus::Active)).await;
        store.schedule(1, 100).await.unwrap();

        let report = check_and_schedule(&store, &queue, &descriptors, &counters, &cfg(), 100).await.unwrap();
        assert_eq!(report.dispatched, 1);
        assert_eq!(report.dropped, 0);
        assert_eq!(queue.depth().await.unwrap().ready, 1);
        assert!(store.get_schedule_time(1).await.unwrap().unwrap() > 100);
    }

    #[tokio::test]
    async fn missing_or_inactive_descriptor_drops_the_schedule_entry() {
        let store = MockScheduleStore::new();
        let queue: MockQueue<TaskMessage> = MockQueue::new();
        let descriptors = MockIpDescriptorRepository::new();
        let counters = Counters::new();

        descriptors.seed(descriptor(2, IpStatus::Paused)).await;
        store.schedule(1, 100).await.unwrap();
        store.schedule(2, 100).await.unwrap();

        let report = check_and_schedule(&store, &queue, &descriptors, &counters, &cfg(), 100).await.unwrap();
        assert_eq!(report.dropped, 2);
        assert_eq!(report.dispatched, 0);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn entries_not_yet_due_are_left_alone() {
        let store = MockScheduleStore::new();
        let queue: MockQueue<TaskMessage> = MockQueue::new();
        let descriptors = MockIpDescriptorRepository::new();
        let counters = Counters::new();

        descriptors.seed(descriptor(1, IpStatus::Active)).await;
        store.schedule(1, 500).await.unwrap();

        let report = check_and_schedule(&store, &queue, &descriptors, &counters, &cfg(), 100).await.unwrap();
        assert_eq!(report.dispatched, 0);
        assert_eq!(queue.depth().await.unwrap().ready, 0);
    }
}

//! The scheduler's single-fiber main loop: sleep precisely until the
//! earliest due time, then dispatch a batch.

use std::time::Duration;

use tracing::{info, instrument, warn};

use aggregator::IpDescriptorRepository;
use common::cancellation::CancelSignal;
use common::AppConfig;
use common::Counters;
use domain::message::TaskMessage;
use queue::Queue;
use schedulestore::ScheduleStore;

use crate::checkout::check_and_schedule;

const NO_ENTRY_SLEEP: Duration = Duration::from_secs(5 * 60);
const MAX_SLEEP: Duration = Duration::from_secs(5 * 60);

/// Runs until `cancel` fires. `now_s` is injected so tests can control
/// wall-clock time without sleeping for real.
#[instrument(skip_all)]
pub async fn run(
    schedule_store: &dyn ScheduleStore,
    task_queue: &dyn Queue<TaskMessage>,
    descriptors: &dyn IpDescriptorRepository,
    counters: &Counters,
    cfg: &AppConfig,
    mut cancel: CancelSignal,
    now_s: impl Fn() -> u64,
) {
    loop {
        if cancel.is_cancelled() {
            info!("scheduler main loop shutting down");
            return;
        }

        let sleep_for = match schedule_store.get_next_time().await {
            Ok(Some(next_due_s)) => {
                let now = now_s();
                let remaining = next_due_s.saturating_sub(now);
                Duration::from_secs(remaining).min(MAX_SLEEP)
            }
            Ok(None) => NO_ENTRY_SLEEP,
            Err(e) => {
                warn!(error = %e, "failed to read next due time, backing off");
                NO_ENTRY_SLEEP
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("scheduler main loop shutting down");
                return;
            }
            _ = tokio::time::sleep(sleep_for) => {}
        }

        if cancel.is_cancelled() {
            return;
        }

        if let Err(e) = check_and_schedule(schedule_store, task_queue, descriptors, counters, cfg, now_s()).await {
            warn!(error = %e, "checkAndSchedule pass failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use aggregator::mock::MockIpDescriptorRepository;
    use common::cancellation::new_cancel_pair;
    use domain::ip::{IpDescriptor, IpStatus};
    use queue::mock::MockQueue;
    use schedulestore::mock::MockScheduleStore;

    use super::*;

    fn descriptor(id: u64) -> IpDescriptor {
        IpDescriptor {
            id,
            name: format!("ip-{id}"),
            status: IpStatus::Active,
            weight: 1.0,
            last_crawled_s: None,
            aliases: vec![],
            category: None,
            tags: vec![],
            external_id: None,
            notes: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dispatches_a_due_entry_then_shuts_down_on_cancel() {
        let store = MockScheduleStore::new();
        let queue: MockQueue<TaskMessage> = MockQueue::new();
        let descriptors = MockIpDescriptorRepository::new();
        let counters = Counters::new();
        let mut cfg = AppConfig::from_env();
        cfg.batch_size = 50;
        cfg.backpressure_threshold = 2;

        descriptors.seed(descriptor(1)).await;
        store.schedule(1, 0).await.unwrap();

        let (handle, cancel) = new_cancel_pair();
        let now = Arc::new(AtomicU64::new(0));
        let now_clone = now.clone();

        let run_fut = run(&store, &queue, &descriptors, &counters, &cfg, cancel, move || now_clone.load(Ordering::Relaxed));
        tokio::pin!(run_fut);

        tokio::time::timeout(Duration::from_millis(50), &mut run_fut).await.unwrap_err();
        assert_eq!(queue.depth().await.unwrap().ready, 1);

        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), run_fut).await.unwrap();
    }
}

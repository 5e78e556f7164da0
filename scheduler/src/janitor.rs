//! Periodic rescue of stuck in-flight items plus queue-depth reporting.
//! Runs as its own fiber; never touches the schedule store.

use tracing::{info, instrument, warn};

use common::cancellation::CancelSignal;
use common::AppConfig;
use common::Counters;
use domain::message::{ResultMessage, TaskMessage};
use queue::Queue;

#[instrument(skip_all)]
pub async fn run(
    task_queue: &dyn Queue<TaskMessage>,
    result_queue: &dyn Queue<ResultMessage>,
    counters: &Counters,
    cfg: &AppConfig,
    mut cancel: CancelSignal,
) {
    let mut ticker = tokio::time::interval(cfg.janitor_interval);
    ticker.tick().await; // first tick fires immediately; skip it

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("janitor fiber shutting down");
                return;
            }
            _ = ticker.tick() => {
                tick_once(task_queue, result_queue, counters, cfg.janitor_timeout).await;
            }
        }
    }
}

async fn tick_once(
    task_queue: &dyn Queue<TaskMessage>,
    result_queue: &dyn Queue<ResultMessage>,
    counters: &Counters,
    age: std::time::Duration,
) {
    match task_queue.rescue_stuck(age).await {
        Ok(report) => {
            Counters::add(&counters.tasks_rescued, report.rescued);
            Counters::add(&counters.tasks_dead_lettered, report.dead_lettered);
            if report.rescued > 0 || report.dead_lettered > 0 {
                info!(rescued = report.rescued, dead_lettered = report.dead_lettered, "rescued stuck tasks");
            }
        }
        Err(e) => warn!(error = %e, "failed to rescue stuck tasks"),
    }

    match result_queue.rescue_stuck(age).await {
        Ok(report) => {
            Counters::add(&counters.results_dead_lettered, report.dead_lettered);
            if report.rescued > 0 || report.dead_lettered > 0 {
                info!(rescued = report.rescued, dead_lettered = report.dead_lettered, "rescued stuck results");
            }
        }
        Err(e) => warn!(error = %e, "failed to rescue stuck results"),
    }

    match task_queue.depth().await {
        Ok(depth) => info!(ready = depth.ready, processing = depth.processing, dead = depth.dead, "task queue depth"),
        Err(e) => warn!(error = %e, "failed to read task queue depth"),
    }
    match result_queue.depth().await {
        Ok(depth) => info!(ready = depth.ready, processing = depth.processing, dead = depth.dead, "result queue depth"),
        Err(e) => warn!(error = %e, "failed to read result queue depth"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use domain::message::TaskMessage;
    use queue::mock::MockQueue;
    use uuid::Uuid;

    use super::*;

    fn task() -> TaskMessage {
        TaskMessage {
            ip_id: 1,
            keyword: "demo".into(),
            task_id: Uuid::new_v4(),
            created_at_s: 0,
            pages_on_sale: 1,
            pages_sold: 1,
        }
    }

    #[tokio::test]
    async fn tick_once_rescues_stuck_tasks_and_updates_counters() {
        let tasks: MockQueue<TaskMessage> = MockQueue::new();
        let results: MockQueue<ResultMessage> = MockQueue::new();
        let counters = Counters::new();

        tasks.push(&task()).await.unwrap();
        tasks.pop(Duration::from_millis(10)).await.unwrap();

        tick_once(&tasks, &results, &counters, Duration::from_millis(0)).await;
        assert_eq!(Counters::get(&counters.tasks_rescued), 1);
        assert_eq!(tasks.depth().await.unwrap().ready, 1);
    }
}

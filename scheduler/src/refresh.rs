//! Periodically reconciles the schedule store against the descriptor
//! table: newcomers are added, drops are removed. Runs independently of
//! the main dispatch loop so a slow descriptor read never blocks dispatch.

use std::collections::HashSet;

use tracing::{info, instrument, warn};

use aggregator::IpDescriptorRepository;
use common::cancellation::CancelSignal;
use common::AppConfig;
use schedulestore::ScheduleStore;

#[instrument(skip_all)]
pub async fn run(
    schedule_store: &dyn ScheduleStore,
    descriptors: &dyn IpDescriptorRepository,
    cfg: &AppConfig,
    mut cancel: CancelSignal,
    now_s: impl Fn() -> u64,
) {
    let mut ticker = tokio::time::interval(cfg.refresh_interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("refresh fiber shutting down");
                return;
            }
            _ = ticker.tick() => {
                if let Err(e) = reconcile(schedule_store, descriptors, now_s()).await {
                    warn!(error = %e, "active-IP refresh failed");
                }
            }
        }
    }
}

async fn reconcile(
    schedule_store: &dyn ScheduleStore,
    descriptors: &dyn IpDescriptorRepository,
    now_s: u64,
) -> anyhow::Result<()> {
    let active: HashSet<u64> = descriptors.list_active().await?.into_iter().map(|d| d.id).collect();
    let scheduled: HashSet<u64> = schedule_store.get_all().await?.into_iter().map(|e| e.ip_id).collect();

    let newcomers: Vec<u64> = active.difference(&scheduled).copied().collect();
    let drops: Vec<u64> = scheduled.difference(&active).copied().collect();

    if !newcomers.is_empty() {
        let entries = newcomers.iter().map(|&id| (id, now_s)).collect();
        schedule_store.schedule_batch(&entries).await?;
        info!(count = newcomers.len(), "added newly active ips to schedule");
    }

    for ip_id in &drops {
        schedule_store.remove(*ip_id).await?;
    }
    if !drops.is_empty() {
        info!(count = drops.len(), "removed inactive ips from schedule");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use aggregator::mock::MockIpDescriptorRepository;
    use domain::ip::{IpDescriptor, IpStatus};
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

    #[tokio::test]
    async fn adds_newcomers_and_removes_drops() {
        let store = MockScheduleStore::new();
        let descriptors = MockIpDescriptorRepository::new();

        store.schedule(1, 100).await.unwrap(); // will be dropped, no longer active
        descriptors.seed(descriptor(2, IpStatus::Active)).await; // newcomer

        reconcile(&store, &descriptors, 1000).await.unwrap();

        assert_eq!(store.get_schedule_time(1).await.unwrap(), None);
        assert_eq!(store.get_schedule_time(2).await.unwrap(), Some(1000));
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use domain::schedule::ScheduleEntry;

use crate::client::ScheduleStore;

/// In-memory stand-in for [`crate::redis_store::RedisScheduleStore`].
#[derive(Default)]
pub struct MockScheduleStore {
    entries: Mutex<HashMap<u64, u64>>,
}

impl MockScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for MockScheduleStore {
    async fn schedule(&self, ip_id: u64, next_due_s: u64) -> anyhow::Result<()> {
        self.entries.lock().await.insert(ip_id, next_due_s);
        Ok(())
    }

    async fn schedule_batch(&self, entries: &HashMap<u64, u64>) -> anyhow::Result<()> {
        self.entries.lock().await.extend(entries.iter().map(|(&a, &b)| (a, b)));
        Ok(())
    }

    async fn remove(&self, ip_id: u64) -> anyhow::Result<()> {
        self.entries.lock().await.remove(&ip_id);
        Ok(())
    }

    async fn count(&self) -> anyhow::Result<u64> {
        Ok(self.entries.lock().await.len() as u64)
    }

    async fn get_all(&self) -> anyhow::Result<Vec<ScheduleEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .map(|(&ip_id, &next_due_s)| ScheduleEntry { ip_id, next_due_s })
            .collect())
    }

    async fn get_schedule_time(&self, ip_id: u64) -> anyhow::Result<Option<u64>> {
        Ok(self.entries.lock().await.get(&ip_id).copied())
    }

    async fn get_due(&self, now_s: u64) -> anyhow::Result<Vec<ScheduleEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .filter(|&(_, &due)| due <= now_s)
            .map(|(&ip_id, &next_due_s)| ScheduleEntry { ip_id, next_due_s })
            .collect())
    }

    async fn get_next_time(&self) -> anyhow::Result<Option<u64>> {
        Ok(self.entries.lock().await.values().copied().min())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schedule_overwrites_existing_entry_without_duplicates() {
        let store = MockScheduleStore::new();
        store.schedule(1, 100).await.unwrap();
        store.schedule(1, 200).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get_schedule_time(1).await.unwrap(), Some(200));
    }

    #[tokio::test]
    async fn get_due_returns_only_entries_at_or_before_now() {
        let store = MockScheduleStore::new();
        store.schedule(1, 100).await.unwrap();
        store.schedule(2, 200).await.unwrap();
        let due = store.get_due(150).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].ip_id, 1);
    }

    #[tokio::test]
    async fn get_next_time_is_the_minimum_score() {
        let store = MockScheduleStore::new();
        store.schedule(1, 500).await.unwrap();
        store.schedule(2, 100).await.unwrap();
        assert_eq!(store.get_next_time().await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn get_next_time_on_empty_store_is_none() {
        let store = MockScheduleStore::new();
        assert_eq!(store.get_next_time().await.unwrap(), None);
    }

    #[tokio::test]
    async fn remove_drops_entry() {
        let store = MockScheduleStore::new();
        store.schedule(1, 100).await.unwrap();
        store.remove(1).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}

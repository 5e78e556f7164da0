use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use domain::item::ItemState;

use crate::repository::ItemStateRepository;

/// In-memory stand-in for [`crate::redis_repo::RedisItemStateRepository`].
/// TTLs are accepted but not enforced; nothing in this crate's tests relies
/// on expiry.
#[derive(Default)]
pub struct MockItemStateRepository {
    states: Mutex<HashMap<(u64, String), ItemState>>,
}

impl MockItemStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every row held for `ip_id`, simulating all of its item-state
    /// entries having TTL'd out at once.
    pub async fn clear_ip(&self, ip_id: u64) {
        self.states.lock().await.retain(|(id, _), _| *id != ip_id);
    }
}

#[async_trait]
impl ItemStateRepository for MockItemStateRepository {
    async fn get_batch(
        &self,
        ip_id: u64,
        source_ids: &[String],
    ) -> anyhow::Result<HashMap<String, ItemState>> {
        let states = self.states.lock().await;
        Ok(source_ids
            .iter()
            .filter_map(|source_id| {
                states
                    .get(&(ip_id, source_id.clone()))
                    .map(|s| (source_id.clone(), s.clone()))
            })
            .collect())
    }

    async fn put_batch(
        &self,
        ip_id: u64,
        entries: &[(String, ItemState, u64)],
    ) -> anyhow::Result<()> {
        let mut states = self.states.lock().await;
        for (source_id, state, _ttl_s) in entries {
            states.insert((ip_id, source_id.clone()), state.clone());
        }
        Ok(())
    }

    async fn count_for_ip(&self, ip_id: u64) -> anyhow::Result<u64> {
        let states = self.states.lock().await;
        Ok(states.keys().filter(|(id, _)| *id == ip_id).count() as u64)
    }
}

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::instrument;

use domain::schedule::ScheduleEntry;

use crate::client::ScheduleStore;

const SCHEDULE_KEY: &str = "animetop:schedule:pending";

#[derive(Clone)]
pub struct RedisScheduleStore {
    conn: ConnectionManager,
    key: String,
}

impl RedisScheduleStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            key: SCHEDULE_KEY.to_string(),
        }
    }

    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url).context("open redis client")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("establish redis connection manager")?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl ScheduleStore for RedisScheduleStore {
    #[instrument(skip(self))]
    async fn schedule(&self, ip_id: u64, next_due_s: u64) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        conn.zadd::<_, _, _, ()>(&self.key, ip_id, next_due_s)
            .await
            .context("zadd schedule entry")
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn schedule_batch(&self, entries: &HashMap<u64, u64>) -> anyhow::Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let pairs: Vec<(u64, u64)> = entries.iter().map(|(&ip, &due)| (due, ip)).collect();
        conn.zadd_multiple::<_, _, _, ()>(&self.key, &pairs)
            .await
            .context("zadd multiple schedule entries")
    }

    #[instrument(skip(self))]
    async fn remove(&self, ip_id: u64) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        conn.zrem::<_, _, ()>(&self.key, ip_id)
            .await
            .context("zrem schedule entry")
    }

    #[instrument(skip(self))]
    async fn count(&self) -> anyhow::Result<u64> {
        let mut conn = self.conn.clone();
        conn.zcard(&self.key).await.context("zcard schedule set")
    }

    #[instrument(skip(self))]
    async fn get_all(&self) -> anyhow::Result<Vec<ScheduleEntry>> {
        let mut conn = self.conn.clone();
        let raw: Vec<(u64, u64)> = conn
            .zrange_withscores(&self.key, 0, -1)
            .await
            .context("zrange schedule set")?;
        Ok(raw
            .into_iter()
            .map(|(ip_id, next_due_s)| ScheduleEntry { ip_id, next_due_s })
            .collect())
    }

    #[instrument(skip(self))]
    async fn get_schedule_time(&self, ip_id: u64) -> anyhow::Result<Option<u64>> {
        let mut conn = self.conn.clone();
        let score: Option<u64> = conn
            .zscore(&self.key, ip_id)
            .await
            .context("zscore schedule entry")?;
        Ok(score)
    }

    #[instrument(skip(self))]
    async fn get_due(&self, now_s: u64) -> anyhow::Result<Vec<ScheduleEntry>> {
        let mut conn = self.conn.clone();
        let raw: Vec<(u64, u64)> = conn
            .zrangebyscore_withscores(&self.key, i64::MIN, now_s)
            .await
            .context("zrangebyscore due entries")?;
        Ok(raw
            .into_iter()
            .map(|(ip_id, next_due_s)| ScheduleEntry { ip_id, next_due_s })
            .collect())
    }

    #[instrument(skip(self))]
    async fn get_next_time(&self) -> anyhow::Result<Option<u64>> {
        let mut conn = self.conn.clone();
        let raw: Vec<(u64, u64)> = conn
            .zrange_withscores(&self.key, 0, 0)
            .await
            .context("zrange earliest entry")?;
        Ok(raw.into_iter().next().map(|(_, score)| score))
    }
}

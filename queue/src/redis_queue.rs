use std::marker::PhantomData;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Direction};
use tracing::instrument;
use uuid::Uuid;

use common::time::now_ms;

use crate::client::{PoppedItem, PushOutcome, Queue, QueueDepth, RescueReport};
use crate::framing::{self, QueueMessage};

/// Number of rescues a processing entry survives before it is dead-lettered.
pub const MAX_RESCUES: u32 = 3;

/// Redis-backed implementation of [`Queue`]. One instance owns one logical
/// channel (`tasks` or `results`); its ready/processing/dead-letter lists
/// and idempotency markers all live under the `animetop:` namespace.
pub struct RedisQueue<T> {
    conn: ConnectionManager,
    ready_key: String,
    processing_key: String,
    dead_key: String,
    processed_prefix: String,
    meta_prefix: String,
    max_rescues: u32,
    _marker: PhantomData<T>,
}

impl<T> RedisQueue<T>
where
    T: QueueMessage,
{
    pub fn new(conn: ConnectionManager, channel: &str) -> Self {
        Self {
            conn,
            ready_key: format!("animetop:queue:{channel}"),
            processing_key: format!("animetop:queue:{channel}:processing"),
            dead_key: format!("animetop:queue:{channel}:dead"),
            processed_prefix: "animetop:processed:".to_string(),
            meta_prefix: format!("animetop:queue:{channel}:meta:"),
            max_rescues: MAX_RESCUES,
            _marker: PhantomData,
        }
    }

    fn meta_key(&self, task_id: Uuid) -> String {
        format!("{}{}", self.meta_prefix, task_id)
    }

    fn push_dedupe_redis_key(&self, dedupe_key: &str) -> String {
        format!("{}:inflight:{}", self.ready_key, dedupe_key)
    }
}

#[async_trait]
impl<T> Queue<T> for RedisQueue<T>
where
    T: QueueMessage,
{
    #[instrument(skip(self, item), fields(channel = %self.ready_key))]
    async fn push(&self, item: &T) -> Result<PushOutcome> {
        let mut conn = self.conn.clone();

        if let Some(dedupe_key) = item.push_dedupe_key() {
            let key = self.push_dedupe_redis_key(&dedupe_key);
            let set: bool = redis::cmd("SET")
                .arg(&key)
                .arg(1)
                .arg("NX")
                .arg("EX")
                .arg(7200)
                .query_async::<_, Option<String>>(&mut conn)
                .await
                .context("push dedupe SET NX")?
                .is_some();
            if !set {
                return Ok(PushOutcome::AlreadyExists);
            }
        }

        let framed = framing::encode(item)?;
        conn.rpush::<_, _, ()>(&self.ready_key, framed)
            .await
            .context("rpush onto ready list")?;
        Ok(PushOutcome::Pushed)
    }

    #[instrument(skip(self), fields(channel = %self.ready_key))]
    async fn pop(&self, timeout: Duration) -> Result<Option<PoppedItem<T>>> {
        let mut conn = self.conn.clone();
        let raw: Option<Vec<u8>> = conn
            .blmove(
                &self.ready_key,
                &self.processing_key,
                Direction::Left,
                Direction::Right,
                timeout.as_secs_f64(),
            )
            .await
            .context("blmove ready -> processing")?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let value: T = framing::decode(&raw)?;
        let meta_key = self.meta_key(value.task_id());
        let _: () = conn
            .hset(&meta_key, "popped_at_ms", now_ms())
            .await
            .context("record pop time")?;
        let _: () = conn
            .hset_nx(&meta_key, "retry_count", 0u32)
            .await
            .context("seed retry count")?;

        Ok(Some(PoppedItem { value, raw }))
    }

    #[instrument(skip(self, item), fields(channel = %self.processing_key))]
    async fn ack(&self, item: &PoppedItem<T>) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.lrem::<_, _, ()>(&self.processing_key, 1, item.raw.clone())
            .await
            .context("lrem acked entry")?;
        let meta_key = self.meta_key(item.value.task_id());
        conn.del::<_, ()>(&meta_key).await.context("clear sidecar meta")?;
        Ok(())
    }

    #[instrument(skip(self), fields(channel = %self.processing_key))]
    async fn rescue_stuck(&self, age: Duration) -> Result<RescueReport> {
        let mut conn = self.conn.clone();
        let entries: Vec<Vec<u8>> = conn
            .lrange(&self.processing_key, 0, -1)
            .await
            .context("lrange processing list")?;

        let now = now_ms();
        let age_ms = age.as_millis() as u64;
        let mut report = RescueReport::default();

        for raw in entries {
            let value: T = match framing::decode(&raw) {
                Ok(v) => v,
                Err(_) => continue,
            };
            let meta_key = self.meta_key(value.task_id());
            let popped_at_ms: Option<u64> = conn.hget(&meta_key, "popped_at_ms").await.ok().flatten();
            let Some(popped_at_ms) = popped_at_ms else {
                continue;
            };
            if now.saturating_sub(popped_at_ms) < age_ms {
                continue;
            }

            let removed: i64 = conn
                .lrem(&self.processing_key, 1, raw.clone())
                .await
                .context("lrem stuck entry")?;
            if removed == 0 {
                continue;
            }

            let retry_count: u32 = conn.hget(&meta_key, "retry_count").await.unwrap_or(0);
            if retry_count + 1 >= self.max_rescues {
                conn.rpush::<_, _, ()>(&self.dead_key, raw)
                    .await
                    .context("rpush dead letter")?;
                conn.del::<_, ()>(&meta_key).await.context("clear sidecar meta")?;
                report.dead_lettered += 1;
            } else {
                conn.hset::<_, _, _, ()>(&meta_key, "retry_count", retry_count + 1)
                    .await
                    .context("bump retry count")?;
                conn.rpush::<_, _, ()>(&self.ready_key, raw)
                    .await
                    .context("requeue rescued entry")?;
                report.rescued += 1;
            }
        }

        Ok(report)
    }

    #[instrument(skip(self), fields(channel = %self.processing_key))]
    async fn recover_orphaned(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let mut recovered = 0u64;
        loop {
            let raw: Option<Vec<u8>> = conn
                .lmove(
                    &self.processing_key,
                    &self.ready_key,
                    Direction::Left,
                    Direction::Right,
                )
                .await
                .context("lmove processing -> ready")?;
            match raw {
                Some(raw) => {
                    if let Ok(value) = framing::decode::<T>(&raw) {
                        let meta_key = self.meta_key(value.task_id());
                        conn.del::<_, ()>(&meta_key).await.context("clear sidecar meta")?;
                    }
                    recovered += 1;
                }
                None => break,
            }
        }
        Ok(recovered)
    }

    #[instrument(skip(self))]
    async fn is_processed(&self, task_id: Uuid) -> Result<bool> {
        let mut conn = self.conn.clone();
        let key = format!("{}{}", self.processed_prefix, task_id);
        conn.exists(&key).await.context("check processed marker")
    }

    #[instrument(skip(self))]
    async fn mark_processed(&self, task_id: Uuid, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = format!("{}{}", self.processed_prefix, task_id);
        conn.set_ex::<_, _, ()>(&key, 1, ttl.as_secs().max(1))
            .await
            .context("set processed marker")
    }

    #[instrument(skip(self))]
    async fn depth(&self) -> Result<QueueDepth> {
        let mut conn = self.conn.clone();
        let ready: u64 = conn.llen(&self.ready_key).await.context("llen ready")?;
        let processing: u64 = conn.llen(&self.processing_key).await.context("llen processing")?;
        let dead: u64 = conn.llen(&self.dead_key).await.context("llen dead")?;
        Ok(QueueDepth {
            ready,
            processing,
            dead,
        })
    }
}

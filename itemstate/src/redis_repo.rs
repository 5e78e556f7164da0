use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::instrument;

use domain::item::{ItemState, ItemStatus};

use crate::repository::ItemStateRepository;

/// Redis-backed keyed store: one hash per `(ipID, sourceID)`, TTL'd by the
/// caller-supplied status policy. Reads use a pipeline, not a transaction:
/// correctness only needs the single-writer-per-IP invariant, not
/// cross-key atomicity.
#[derive(Clone)]
pub struct RedisItemStateRepository {
    conn: ConnectionManager,
}

impl RedisItemStateRepository {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url).context("open redis client")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("establish redis connection manager")?;
        Ok(Self::new(conn))
    }

    fn key(ip_id: u64, source_id: &str) -> String {
        format!("animetop:item:{ip_id}:{source_id}")
    }
}

#[async_trait]
impl ItemStateRepository for RedisItemStateRepository {
    #[instrument(skip(self, source_ids), fields(ip_id, count = source_ids.len()))]
    async fn get_batch(
        &self,
        ip_id: u64,
        source_ids: &[String],
    ) -> anyhow::Result<HashMap<String, ItemState>> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for source_id in source_ids {
            pipe.hgetall(Self::key(ip_id, source_id));
        }
        let rows: Vec<HashMap<String, String>> =
            pipe.query_async(&mut conn).await.context("pipelined item-state read")?;

        let mut out = HashMap::with_capacity(source_ids.len());
        for (source_id, fields) in source_ids.iter().zip(rows) {
            if fields.is_empty() {
                continue;
            }
            let status = fields
                .get("status")
                .and_then(|s| ItemStatus::parse(s))
                .context("corrupt status field in item-state hash")?;
            let price: i64 = fields.get("price").context("missing price field")?.parse()?;
            let first_seen_s: u64 = fields
                .get("first_seen")
                .context("missing first_seen field")?
                .parse()?;
            let last_seen_s: u64 = fields
                .get("last_seen")
                .context("missing last_seen field")?
                .parse()?;
            out.insert(
                source_id.clone(),
                ItemState {
                    source_id: source_id.clone(),
                    status,
                    price,
                    first_seen_s,
                    last_seen_s,
                },
            );
        }
        Ok(out)
    }

    #[instrument(skip(self, entries), fields(ip_id, count = entries.len()))]
    async fn put_batch(
        &self,
        ip_id: u64,
        entries: &[(String, ItemState, u64)],
    ) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for (source_id, state, ttl_s) in entries {
            let key = Self::key(ip_id, source_id);
            pipe.hset_multiple(
                &key,
                &[
                    ("status", state.status.as_str().to_string()),
                    ("price", state.price.to_string()),
                    ("first_seen", state.first_seen_s.to_string()),
                    ("last_seen", state.last_seen_s.to_string()),
                ],
            )
            .ignore();
            pipe.expire(&key, *ttl_s as i64).ignore();
        }
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .context("pipelined item-state write")?;
        Ok(())
    }

    #[instrument(skip(self), fields(ip_id))]
    async fn count_for_ip(&self, ip_id: u64) -> anyhow::Result<u64> {
        let mut conn = self.conn.clone();
        let pattern = format!("animetop:item:{ip_id}:*");
        let mut cursor = 0u64;
        let mut count = 0u64;
        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await
                .context("scan item-state keys for ip")?;
            count += batch.len() as u64;
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        Ok(count)
    }
}

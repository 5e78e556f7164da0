//! Fire-and-forget cache invalidation. The read paths that actually serve
//! these keys live outside the core; this module only deletes them so the
//! next read recomputes from the relational store.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

const LEADERBOARD_TYPES: &[&str] = &["top_inflow", "top_outflow", "top_liquidity"];
const LEADERBOARD_WINDOWS_H: &[u64] = &[1, 24, 168];

fn leaderboard_keys() -> Vec<String> {
    let mut keys = Vec::with_capacity(LEADERBOARD_TYPES.len() * LEADERBOARD_WINDOWS_H.len());
    for kind in LEADERBOARD_TYPES {
        for hours in LEADERBOARD_WINDOWS_H {
            keys.push(format!("animetop:leaderboard:{kind}:{hours}"));
        }
    }
    keys
}

/// Invalidates the cache keys a processed crawl result made stale. Kept
/// behind a trait, rather than a bare `ConnectionManager` on the pipeline
/// context, so the worker loop can be driven end to end in tests without a
/// real Redis connection.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate_after_update(&self, ip_id: u64);
}

/// Spawns a background task that deletes the hourly leaderboard keys and
/// every `animetop:ip:<ipId>:*` detail key. Errors are logged, not
/// propagated: a missed invalidation just means one stale read, never a
/// correctness problem for the core.
pub struct RedisCacheInvalidator {
    conn: ConnectionManager,
}

impl RedisCacheInvalidator {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

impl CacheInvalidator for RedisCacheInvalidator {
    fn invalidate_after_update(&self, ip_id: u64) {
        let mut conn = self.conn.clone();
        tokio::spawn(async move {
            let keys = leaderboard_keys();
            if let Err(e) = conn.del::<_, ()>(&keys).await {
                warn!(error = %e, "failed to invalidate leaderboard cache keys");
            }

            let pattern = format!("animetop:ip:{ip_id}:*");
            match scan_keys(&mut conn, &pattern).await {
                Ok(detail_keys) if !detail_keys.is_empty() => {
                    if let Err(e) = conn.del::<_, ()>(&detail_keys).await {
                        warn!(error = %e, ip_id, "failed to invalidate per-ip detail cache keys");
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, ip_id, "failed to scan per-ip detail cache keys"),
            }
        });
    }
}

#[cfg(test)]
pub struct MockCacheInvalidator {
    pub invalidated: std::sync::Mutex<Vec<u64>>,
}

#[cfg(test)]
impl MockCacheInvalidator {
    pub fn new() -> Self {
        Self { invalidated: std::sync::Mutex::new(Vec::new()) }
    }
}

#[cfg(test)]
impl CacheInvalidator for MockCacheInvalidator {
    fn invalidate_after_update(&self, ip_id: u64) {
        self.invalidated.lock().unwrap().push(ip_id);
    }
}

async fn scan_keys(conn: &mut ConnectionManager, pattern: &str) -> anyhow::Result<Vec<String>> {
    let mut cursor = 0u64;
    let mut found = Vec::new();
    loop {
        let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(200)
            .query_async(conn)
            .await?;
        found.extend(batch);
        if next_cursor == 0 {
            break;
        }
        cursor = next_cursor;
    }
    Ok(found)
}

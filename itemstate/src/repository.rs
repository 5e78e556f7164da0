use std::collections::HashMap;

use async_trait::async_trait;
use domain::item::ItemState;

/// The fast keyed store behind one `(ipID, sourceID)` per entry, TTL'd by
/// status. Reads and writes are batched by the caller; this trait only
/// promises a single pipelined round-trip per call, not per-key atomicity
/// across the batch.
#[async_trait]
pub trait ItemStateRepository: Send + Sync {
    async fn get_batch(
        &self,
        ip_id: u64,
        source_ids: &[String],
    ) -> anyhow::Result<HashMap<String, ItemState>>;

    /// `ttl_s` is resolved per-entry by the caller from the new status.
    async fn put_batch(
        &self,
        ip_id: u64,
        entries: &[(String, ItemState, u64)],
    ) -> anyhow::Result<()>;

    /// Number of live (non-expired) item-state rows held for `ip_id`. Zero
    /// means either this IP has never been crawled, or every row crawled
    /// previously has TTL'd out since.
    async fn count_for_ip(&self, ip_id: u64) -> anyhow::Result<u64>;
}

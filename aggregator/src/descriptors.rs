use async_trait::async_trait;
use domain::ip::IpDescriptor;

/// The relational "descriptor table" the scheduler re-seeds its in-memory
/// active-IP view from on startup and on each refresh tick. This is the
/// system of record for which IPs exist and whether they are active;
/// the schedule store only knows about IPs someone has scheduled.
#[async_trait]
pub trait IpDescriptorRepository: Send + Sync {
    async fn list_active(&self) -> anyhow::Result<Vec<IpDescriptor>>;

    async fn get(&self, ip_id: u64) -> anyhow::Result<Option<IpDescriptor>>;

    async fn update_last_crawled(&self, ip_id: u64, last_crawled_s: u64) -> anyhow::Result<()>;

    async fn update_weight(&self, ip_id: u64, weight: f64) -> anyhow::Result<()>;
}

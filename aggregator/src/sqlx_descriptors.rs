use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;

use domain::ip::{IpDescriptor, IpStatus};

use crate::descriptors::IpDescriptorRepository;

pub struct SqlxIpDescriptorRepository {
    pool: PgPool,
}

impl SqlxIpDescriptorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_descriptor(row: &sqlx::postgres::PgRow) -> anyhow::Result<IpDescriptor> {
    let status_str: String = row.try_get("status")?;
    let status = match status_str.as_str() {
        "active" => IpStatus::Active,
        "paused" => IpStatus::Paused,
        "deleted" => IpStatus::Deleted,
        other => anyhow::bail!("unknown ip status in descriptor table: {other}"),
    };
    let id: i64 = row.try_get("id")?;
    let last_crawled: Option<i64> = row.try_get("last_crawled_at")?;
    Ok(IpDescriptor {
        id: id as u64,
        name: row.try_get("name")?,
        status,
        weight: row.try_get("weight")?,
        last_crawled_s: last_crawled.map(|v| v as u64),
        aliases: row.try_get("aliases")?,
        category: row.try_get("category")?,
        tags: row.try_get("tags")?,
        external_id: row.try_get("external_id")?,
        notes: row.try_get("notes")?,
    })
}

#[async_trait]
impl IpDescriptorRepository for SqlxIpDescriptorRepository {
    #[instrument(skip(self))]
    async fn list_active(&self) -> anyhow::Result<Vec<IpDescriptor>> {
        let rows = sqlx::query(r#"SELECT * FROM ip_metadata WHERE status = 'active';"#)
            .fetch_all(&self.pool)
            .await
            .context("list active ip descriptors")?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            match row_to_descriptor(row) {
                Ok(d) => out.push(d),
                Err(e) => tracing::warn!(error = %e, "skipping malformed ip descriptor row"),
            }
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    async fn get(&self, ip_id: u64) -> anyhow::Result<Option<IpDescriptor>> {
        let row = sqlx::query(r#"SELECT * FROM ip_metadata WHERE id = $1;"#)
            .bind(ip_id as i64)
            .fetch_optional(&self.pool)
            .await
            .context("fetch ip descriptor")?;
        row.as_ref().map(row_to_descriptor).transpose()
    }

    #[instrument(skip(self))]
    async fn update_last_crawled(&self, ip_id: u64, last_crawled_s: u64) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE ip_metadata SET last_crawled_at = $1 WHERE id = $2;"#)
            .bind(last_crawled_s as i64)
            .bind(ip_id as i64)
            .execute(&self.pool)
            .await
            .context("update last_crawled")?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_weight(&self, ip_id: u64, weight: f64) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE ip_metadata SET weight = $1 WHERE id = $2;"#)
            .bind(weight)
            .bind(ip_id as i64)
            .execute(&self.pool)
            .await
            .context("update weight")?;
        Ok(())
    }
}

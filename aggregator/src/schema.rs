use sqlx::PgPool;

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS ip_stats_hourly (
  ip_id BIGINT NOT NULL,
  hour_bucket BIGINT NOT NULL,

  inflow BIGINT NOT NULL,
  outflow BIGINT NOT NULL,
  active_count BIGINT NOT NULL,
  sample_count BIGINT NOT NULL,
  liquidity_index DOUBLE PRECISION,

  price_avg DOUBLE PRECISION,
  price_median DOUBLE PRECISION,
  price_min BIGINT,
  price_max BIGINT,
  price_stddev DOUBLE PRECISION,

  PRIMARY KEY (ip_id, hour_bucket)
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS item_snapshots (
  ip_id BIGINT NOT NULL,
  source_id TEXT NOT NULL,

  title TEXT NOT NULL,
  price BIGINT NOT NULL,
  status TEXT NOT NULL,
  image_url TEXT,
  item_url TEXT,

  first_seen BIGINT NOT NULL,
  last_seen BIGINT NOT NULL,
  sold_at BIGINT,

  PRIMARY KEY (ip_id, source_id)
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS ip_alerts (
  id BIGSERIAL PRIMARY KEY,
  ip_id BIGINT NOT NULL,
  hour_bucket BIGINT NOT NULL,
  alert_type TEXT NOT NULL,
  severity TEXT NOT NULL,
  message TEXT NOT NULL,
  metric_value DOUBLE PRECISION NOT NULL,
  threshold_value DOUBLE PRECISION NOT NULL,
  acknowledged BOOLEAN NOT NULL DEFAULT FALSE,
  created_at BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_ip_alerts_ip ON ip_alerts(ip_id);"#)
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS ip_metadata (
  id BIGINT PRIMARY KEY,
  name TEXT NOT NULL UNIQUE,
  status TEXT NOT NULL,
  weight DOUBLE PRECISION NOT NULL,
  last_crawled_at BIGINT,
  aliases TEXT[] NOT NULL DEFAULT '{}',
  category TEXT,
  tags TEXT[] NOT NULL DEFAULT '{}',
  external_id TEXT,
  notes TEXT
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_ip_metadata_status ON ip_metadata(status);"#)
        .execute(pool)
        .await?;

    Ok(())
}

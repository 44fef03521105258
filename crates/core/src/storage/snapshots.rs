use crate::domain::dashboard::DashboardResult;
use crate::domain::property::PropertyId;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};

pub async fn persist_success(
    pool: &sqlx::PgPool,
    dashboard: &DashboardResult,
    generated_at: DateTime<Utc>,
) -> anyhow::Result<uuid::Uuid> {
    let body = serde_json::to_value(dashboard).context("serialize dashboard failed")?;

    let snapshot_id: uuid::Uuid = sqlx::query_scalar(
        "INSERT INTO comp_snapshots (property_id, as_of_date, generated_at, status, error, dashboard) \
         VALUES ($1, $2, $3, 'success', NULL, $4) \
         RETURNING id",
    )
    .persistent(false)
    .bind(dashboard.subject.id)
    .bind(dashboard.as_of_date)
    .bind(generated_at)
    .bind(body)
    .fetch_one(pool)
    .await
    .context("insert comp_snapshots failed")?;

    Ok(snapshot_id)
}

pub async fn persist_failure(
    pool: &sqlx::PgPool,
    property_id: PropertyId,
    as_of_date: NaiveDate,
    generated_at: DateTime<Utc>,
    error: &str,
) -> anyhow::Result<uuid::Uuid> {
    let snapshot_id: uuid::Uuid = sqlx::query_scalar(
        "INSERT INTO comp_snapshots (property_id, as_of_date, generated_at, status, error, dashboard) \
         VALUES ($1, $2, $3, 'error', $4, NULL) \
         RETURNING id",
    )
    .persistent(false)
    .bind(property_id)
    .bind(as_of_date)
    .bind(generated_at)
    .bind(error)
    .fetch_one(pool)
    .await
    .context("insert error comp_snapshots failed")?;

    Ok(snapshot_id)
}

#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    pub id: uuid::Uuid,
    pub generated_at: DateTime<Utc>,
    pub dashboard: DashboardResult,
}

pub async fn fetch_latest_snapshot(
    pool: &sqlx::PgPool,
    property_id: PropertyId,
) -> anyhow::Result<Option<StoredSnapshot>> {
    let row: Option<(uuid::Uuid, DateTime<Utc>, serde_json::Value)> = sqlx::query_as(
        "SELECT id, generated_at, dashboard \
         FROM comp_snapshots \
         WHERE property_id = $1 AND status = 'success' AND dashboard IS NOT NULL \
         ORDER BY generated_at DESC \
         LIMIT 1",
    )
    .persistent(false)
    .bind(property_id)
    .fetch_optional(pool)
    .await
    .context("select latest comp_snapshots failed")?;

    let Some((id, generated_at, body)) = row else {
        return Ok(None);
    };
    let dashboard = serde_json::from_value(body)
        .with_context(|| format!("stored dashboard is malformed (snapshot_id={id})"))?;

    Ok(Some(StoredSnapshot {
        id,
        generated_at,
        dashboard,
    }))
}

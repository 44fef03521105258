pub mod comps;
pub mod lock;
pub mod snapshots;

use anyhow::Context;

pub use comps::PgCompsStore;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

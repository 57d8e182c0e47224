//! Postgres persistence for tracking rows, provider caches and Slack settings.

pub mod cache;
pub mod slack;
pub mod tracking;

pub use cache::{PgIdentificationCache, PgPrefilterCache};
pub use slack::PgSlackStore;
pub use tracking::PgTrackingStore;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn connect(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("Failed to connect to Postgres")
}

/// Run the embedded SQL migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run migrations")?;
    Ok(())
}

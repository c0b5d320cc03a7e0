use anyhow::Result;

use crate::config::Config;
use crate::db;

/// Create the fact table and indexes. Safe to run repeatedly.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let store = db::connect(config).await?;
    let result = store.ensure_schema().await;
    store.close().await;
    result
}

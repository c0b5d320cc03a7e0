//! Store construction from configuration.

use anyhow::Result;

use crate::config::{Config, StoreBackend};
use crate::store::{FactStore, PostgresFactStore, SqliteFactStore};

/// Open the configured backend. The caller owns the handle for the length of
/// a run and should [`close`](FactStore::close) it when done.
pub async fn connect(config: &Config) -> Result<Box<dyn FactStore>> {
    let store_cfg = &config.store;
    let store: Box<dyn FactStore> = match store_cfg.backend {
        StoreBackend::Sqlite => Box::new(
            SqliteFactStore::connect(&store_cfg.path, store_cfg.max_connections).await?,
        ),
        StoreBackend::Postgres => {
            let params = store_cfg.pg_params()?;
            Box::new(PostgresFactStore::connect(&params, store_cfg.max_connections).await?)
        }
    };

    tracing::debug!(backend = store.backend(), "store connected");
    Ok(store)
}

//! PostgreSQL-backed [`FactStore`] implementation.
//!
//! Same table and index layout as the SQLite backend, with native `DATE`
//! and `BOOLEAN` columns. An `ingest_seq` column stands in for SQLite's
//! `rowid` so history can be returned in insertion order.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::sync::atomic::{AtomicBool, Ordering};

use super::FactStore;
use crate::config::PgConnectParams;
use crate::models::{MetadataRecord, StoreStats};

pub struct PostgresFactStore {
    pool: PgPool,
    unique: AtomicBool,
}

impl PostgresFactStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            unique: AtomicBool::new(false),
        }
    }

    pub async fn connect(params: &PgConnectParams, max_connections: u32) -> Result<Self> {
        let mut options = PgConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .database(&params.name)
            .username(&params.user);
        if let Some(password) = &params.password {
            options = options.password(password);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to PostgreSQL at {}:{}/{}",
                    params.host, params.port, params.name
                )
            })?;

        Ok(Self::new(pool))
    }
}

fn row_to_record(row: &PgRow) -> Result<MetadataRecord> {
    Ok(MetadataRecord {
        issn: row.try_get("issn")?,
        title: row.try_get("journal_title")?,
        publisher: row.try_get("publisher")?,
        doi_prefix: row.try_get("doi_prefix")?,
        country_code: row.try_get("country")?,
        is_open_access: row.try_get("open_access")?,
        fetch_date: row.try_get("fetch_date")?,
        fingerprint: row.try_get("record_hash")?,
    })
}

#[async_trait]
impl FactStore for PostgresFactStore {
    fn backend(&self) -> &str {
        "postgres"
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS issn_metadata_fact (
                issn TEXT NOT NULL,
                journal_title TEXT,
                publisher TEXT,
                doi_prefix TEXT,
                country TEXT,
                open_access BOOLEAN,
                fetch_date DATE NOT NULL,
                record_hash TEXT NOT NULL,
                ingest_seq BIGSERIAL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("ALTER TABLE issn_metadata_fact ADD COLUMN IF NOT EXISTS ingest_seq BIGSERIAL")
            .execute(&self.pool)
            .await?;

        let unique = sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_issn_fact_issn_hash ON issn_metadata_fact(issn, record_hash)",
        )
        .execute(&self.pool)
        .await;
        match unique {
            Ok(_) => self.unique.store(true, Ordering::Relaxed),
            Err(e) => {
                // Tables written before the index existed may hold duplicate pairs.
                tracing::warn!(error = %e, "unique index unavailable, using checked inserts");
                sqlx::query(
                    "CREATE INDEX IF NOT EXISTS idx_issn_fact_issn_hash_plain ON issn_metadata_fact(issn, record_hash)",
                )
                .execute(&self.pool)
                .await?;
                self.unique.store(false, Ordering::Relaxed);
            }
        }
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_issn_fact_fetch_date ON issn_metadata_fact(fetch_date DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn exists(&self, issn: &str, fingerprint: &str) -> Result<bool> {
        let found: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM issn_metadata_fact WHERE issn = $1 AND record_hash = $2 LIMIT 1",
        )
        .bind(issn)
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }

    async fn append(&self, record: &MetadataRecord) -> Result<bool> {
        let sql = if self.unique.load(Ordering::Relaxed) {
            r#"
            INSERT INTO issn_metadata_fact
                (issn, journal_title, publisher, doi_prefix, country, open_access, fetch_date, record_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (issn, record_hash) DO NOTHING
            "#
        } else {
            if self.exists(&record.issn, &record.fingerprint).await? {
                return Ok(false);
            }
            r#"
            INSERT INTO issn_metadata_fact
                (issn, journal_title, publisher, doi_prefix, country, open_access, fetch_date, record_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#
        };

        let result = sqlx::query(sql)
            .bind(&record.issn)
            .bind(&record.title)
            .bind(&record.publisher)
            .bind(&record.doi_prefix)
            .bind(&record.country_code)
            .bind(record.is_open_access)
            .bind(record.fetch_date)
            .bind(&record.fingerprint)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn history(&self, issn: &str) -> Result<Vec<MetadataRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT issn, journal_title, publisher, doi_prefix, country, open_access, fetch_date, record_hash
            FROM issn_metadata_fact
            WHERE issn = $1
            ORDER BY fetch_date ASC, ingest_seq ASC
            "#,
        )
        .bind(issn)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn stats(&self) -> Result<StoreStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n, COUNT(DISTINCT issn) AS issns, MAX(fetch_date) AS latest FROM issn_metadata_fact",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreStats {
            rows: row.try_get("n")?,
            distinct_issns: row.try_get("issns")?,
            latest_fetch_date: row.try_get("latest")?,
        })
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::models::AttributeSet;
    use chrono::NaiveDate;

    /// Connects with the `DB_*` variables when `ISSN_HARVEST_PG_TEST` is set.
    async fn open() -> Option<PostgresFactStore> {
        std::env::var("ISSN_HARVEST_PG_TEST").ok()?;
        let params = StoreConfig::default().pg_params().unwrap();
        let store = PostgresFactStore::connect(&params, 2).await.unwrap();
        store.ensure_schema().await.unwrap();
        Some(store)
    }

    fn record(issn: &str, title: &str, day: u32) -> MetadataRecord {
        MetadataRecord::new(
            issn,
            AttributeSet {
                title: Some(title.to_string()),
                ..Default::default()
            },
            NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
        )
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL server; set ISSN_HARVEST_PG_TEST and DB_*"]
    async fn test_append_exists_and_conflict() {
        let Some(store) = open().await else {
            return;
        };
        let issn = format!("pg-{}", std::process::id());
        sqlx::query("DELETE FROM issn_metadata_fact WHERE issn = $1")
            .bind(&issn)
            .execute(&store.pool)
            .await
            .unwrap();

        // Same day, inserted in an order that differs from hash order.
        let (a, b) = (record(&issn, "B", 1), record(&issn, "A", 1));
        let (first, second) = if a.fingerprint > b.fingerprint {
            (a, b)
        } else {
            (b, a)
        };

        assert!(!store.exists(&issn, &first.fingerprint).await.unwrap());
        assert!(store.append(&first).await.unwrap());
        assert!(store.exists(&issn, &first.fingerprint).await.unwrap());
        assert!(!store.append(&first).await.unwrap());
        assert!(store.append(&second).await.unwrap());

        let history = store.history(&issn).await.unwrap();
        assert_eq!(history, vec![first, second]);

        sqlx::query("DELETE FROM issn_metadata_fact WHERE issn = $1")
            .bind(&issn)
            .execute(&store.pool)
            .await
            .unwrap();
        store.close().await;
    }
}

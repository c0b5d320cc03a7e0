//! SQLite-backed [`FactStore`] implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use super::FactStore;
use crate::models::{MetadataRecord, StoreStats};

/// SQLite implementation of the [`FactStore`] trait.
///
/// `unique` records whether [`ensure_schema`](FactStore::ensure_schema)
/// managed to put a unique index on `(issn, record_hash)`. Without it,
/// appends fall back to an existence check followed by a plain insert.
pub struct SqliteFactStore {
    pool: SqlitePool,
    unique: AtomicBool,
}

impl SqliteFactStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            unique: AtomicBool::new(false),
        }
    }

    /// Open (creating if missing) the database file at `path`.
    pub async fn connect(path: &Path, max_connections: u32) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open SQLite database: {}", path.display()))?;

        Ok(Self::new(pool))
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<MetadataRecord> {
    let fetch_date: String = row.try_get("fetch_date")?;
    Ok(MetadataRecord {
        issn: row.try_get("issn")?,
        title: row.try_get("journal_title")?,
        publisher: row.try_get("publisher")?,
        doi_prefix: row.try_get("doi_prefix")?,
        country_code: row.try_get("country")?,
        is_open_access: row.try_get("open_access")?,
        fetch_date: NaiveDate::parse_from_str(&fetch_date, "%Y-%m-%d")
            .with_context(|| format!("Bad fetch_date in store: '{}'", fetch_date))?,
        fingerprint: row.try_get("record_hash")?,
    })
}

#[async_trait]
impl FactStore for SqliteFactStore {
    fn backend(&self) -> &str {
        "sqlite"
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
                record_hash TEXT NOT NULL
            )
            "#,
        )
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
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM issn_metadata_fact WHERE issn = ? AND record_hash = ? LIMIT 1",
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
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(issn, record_hash) DO NOTHING
            "#
        } else {
            if self.exists(&record.issn, &record.fingerprint).await? {
                return Ok(false);
            }
            r#"
            INSERT INTO issn_metadata_fact
                (issn, journal_title, publisher, doi_prefix, country, open_access, fetch_date, record_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#
        };

        let result = sqlx::query(sql)
            .bind(&record.issn)
            .bind(&record.title)
            .bind(&record.publisher)
            .bind(&record.doi_prefix)
            .bind(&record.country_code)
            .bind(record.is_open_access)
            .bind(record.fetch_date.format("%Y-%m-%d").to_string())
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
            WHERE issn = ?
            ORDER BY fetch_date ASC, rowid ASC
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

        let latest: Option<String> = row.try_get("latest")?;
        Ok(StoreStats {
            rows: row.try_get("n")?,
            distinct_issns: row.try_get("issns")?,
            latest_fetch_date: latest
                .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        })
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttributeSet;
    use tempfile::TempDir;

    fn record(issn: &str, title: Option<&str>, day: u32) -> MetadataRecord {
        MetadataRecord::new(
            issn,
            AttributeSet {
                title: title.map(str::to_string),
                is_open_access: Some(false),
                ..Default::default()
            },
            NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
        )
    }

    async fn open(tmp: &TempDir) -> SqliteFactStore {
        let store = SqliteFactStore::connect(&tmp.path().join("data/facts.sqlite"), 2)
            .await
            .unwrap();
        store.ensure_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_schema_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        store.ensure_schema().await.unwrap();
        store.ensure_schema().await.unwrap();
        assert_eq!(store.stats().await.unwrap().rows, 0);
    }

    #[tokio::test]
    async fn test_append_then_exists() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        let rec = record("1234-5678", Some("J"), 1);

        assert!(!store.exists(&rec.issn, &rec.fingerprint).await.unwrap());
        assert!(store.append(&rec).await.unwrap());
        assert!(store.exists(&rec.issn, &rec.fingerprint).await.unwrap());
        assert!(!store.exists("other", &rec.fingerprint).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_append_is_noop() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        let rec = record("1234-5678", Some("J"), 1);

        assert!(store.append(&rec).await.unwrap());
        assert!(!store.append(&rec).await.unwrap());
        assert_eq!(store.stats().await.unwrap().rows, 1);
    }

    #[tokio::test]
    async fn test_history_roundtrips_nulls_and_orders_by_date() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        store.append(&record("1234-5678", Some("New"), 9)).await.unwrap();
        store.append(&record("1234-5678", None, 2)).await.unwrap();

        let history = store.history("1234-5678").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].title, None);
        assert_eq!(history[0].publisher, None);
        assert_eq!(history[0].is_open_access, Some(false));
        assert_eq!(history[1].title.as_deref(), Some("New"));
        assert_eq!(history[0], record("1234-5678", None, 2));
    }

    #[tokio::test]
    async fn test_rows_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let rec = record("0000-0001", Some("J"), 1);
        {
            let store = open(&tmp).await;
            store.append(&rec).await.unwrap();
            store.close().await;
        }
        let store = open(&tmp).await;
        assert!(store.exists(&rec.issn, &rec.fingerprint).await.unwrap());
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.rows, 1);
        assert_eq!(stats.distinct_issns, 1);
        assert_eq!(stats.latest_fetch_date, NaiveDate::from_ymd_opt(2024, 5, 1));
    }

    #[tokio::test]
    async fn test_schema_tolerates_legacy_duplicates() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteFactStore::connect(&tmp.path().join("legacy.sqlite"), 1)
            .await
            .unwrap();
        sqlx::query(
            r#"
            CREATE TABLE issn_metadata_fact (
                issn TEXT NOT NULL,
                journal_title TEXT,
                publisher TEXT,
                doi_prefix TEXT,
                country TEXT,
                open_access BOOLEAN,
                fetch_date DATE NOT NULL,
                record_hash TEXT NOT NULL
            )
            "#,
        )
        .execute(&store.pool)
        .await
        .unwrap();
        let old = record("1234-5678", Some("J"), 1);
        for _ in 0..2 {
            sqlx::query(
                "INSERT INTO issn_metadata_fact (issn, journal_title, fetch_date, record_hash) VALUES (?, ?, '2024-05-01', ?)",
            )
            .bind(&old.issn)
            .bind(&old.title)
            .bind(&old.fingerprint)
            .execute(&store.pool)
            .await
            .unwrap();
        }

        store.ensure_schema().await.unwrap();
        store.ensure_schema().await.unwrap();

        assert!(store.exists(&old.issn, &old.fingerprint).await.unwrap());
        assert!(!store.append(&old).await.unwrap());
        let new = record("1234-5678", Some("J2"), 2);
        assert!(store.append(&new).await.unwrap());
        assert!(!store.append(&new).await.unwrap());

        assert_eq!(store.history("1234-5678").await.unwrap().len(), 3);
        assert_eq!(store.stats().await.unwrap().rows, 3);
    }
}

//! Change-detection store gateway.
//!
//! The [`FactStore`] trait is everything the ingestion loop needs from the
//! persistent fact table: an existence check on `(issn, fingerprint)`, a
//! durable append, and idempotent schema creation. Backends:
//!
//! | Backend | Type | Use |
//! |---------|------|-----|
//! | SQLite | [`SqliteFactStore`] | default, single file |
//! | PostgreSQL | [`PostgresFactStore`] | shared server |
//! | In-memory | [`InMemoryFactStore`] | tests |
//!
//! The table is append-only. Uniqueness of `(issn, record_hash)` is backed
//! by a unique index, and an insert that hits it reports "already stored"
//! instead of failing, so two overlapping runs cannot double-write. A table
//! that already holds duplicate pairs cannot take the index; the SQL
//! backends then log a warning, index the pair without uniqueness, and
//! check for the pair before each insert.

pub mod memory;
pub mod postgres;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{MetadataRecord, StoreStats};

pub use memory::InMemoryFactStore;
pub use postgres::PostgresFactStore;
pub use sqlite::SqliteFactStore;

/// Name of the fact table in every SQL backend.
pub const FACT_TABLE: &str = "issn_metadata_fact";

/// Abstract storage backend for the metadata fact table.
///
/// Every method that writes must have committed before it returns `Ok`, so
/// a subsequent [`exists`](FactStore::exists), in this run or a later one,
/// sees the row.
#[async_trait]
pub trait FactStore: Send + Sync {
    /// Short backend label for logs and `stats` output.
    fn backend(&self) -> &str;

    /// Create the fact table and its indexes if they are absent.
    async fn ensure_schema(&self) -> Result<()>;

    /// True iff a row with exactly this `(issn, fingerprint)` is stored.
    async fn exists(&self, issn: &str, fingerprint: &str) -> Result<bool>;

    /// Append one row.
    ///
    /// Returns `false` when the pair was already present and nothing was
    /// written.
    async fn append(&self, record: &MetadataRecord) -> Result<bool>;

    /// All snapshots for an ISSN, oldest first.
    async fn history(&self, issn: &str) -> Result<Vec<MetadataRecord>>;

    async fn stats(&self) -> Result<StoreStats>;

    /// Release the underlying connections.
    async fn close(&self);
}

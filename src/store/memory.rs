//! In-memory [`FactStore`] implementation for tests.
//!
//! Rows live in a `Vec` behind `std::sync::RwLock`; nothing survives the
//! process.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::FactStore;
use crate::models::{MetadataRecord, StoreStats};

#[derive(Default)]
pub struct InMemoryFactStore {
    rows: RwLock<Vec<MetadataRecord>>,
}

impl InMemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing set of rows.
    pub fn with_rows(rows: Vec<MetadataRecord>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Snapshot of every stored row in insertion order.
    pub fn rows(&self) -> Vec<MetadataRecord> {
        self.rows.read().unwrap().clone()
    }
}

#[async_trait]
impl FactStore for InMemoryFactStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn exists(&self, issn: &str, fingerprint: &str) -> Result<bool> {
        let rows = self.rows.read().unwrap();
        Ok(rows
            .iter()
            .any(|r| r.issn == issn && r.fingerprint == fingerprint))
    }

    async fn append(&self, record: &MetadataRecord) -> Result<bool> {
        let mut rows = self.rows.write().unwrap();
        if rows
            .iter()
            .any(|r| r.issn == record.issn && r.fingerprint == record.fingerprint)
        {
            return Ok(false);
        }
        rows.push(record.clone());
        Ok(true)
    }

    async fn history(&self, issn: &str) -> Result<Vec<MetadataRecord>> {
        let mut out: Vec<MetadataRecord> = self
            .rows
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.issn == issn)
            .cloned()
            .collect();
        // Stable sort keeps insertion order within a day.
        out.sort_by_key(|r| r.fetch_date);
        Ok(out)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let rows = self.rows.read().unwrap();
        let mut issns: Vec<&str> = rows.iter().map(|r| r.issn.as_str()).collect();
        issns.sort_unstable();
        issns.dedup();
        Ok(StoreStats {
            rows: rows.len() as i64,
            distinct_issns: issns.len() as i64,
            latest_fetch_date: rows.iter().map(|r| r.fetch_date).max(),
        })
    }

    async fn close(&self) {}
}

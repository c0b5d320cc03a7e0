//! Core data models used throughout ISSN Harvest.
//!
//! These types represent what the metadata sources return, the records that
//! flow into the fact table, and the summary of a single ingestion run.

use chrono::NaiveDate;
use serde::Serialize;

use crate::fingerprint::{fingerprint, MISSING};

/// Attributes one provider contributed for an ISSN.
///
/// Every field is optional: a provider fills only what it knows, and the
/// remaining fields stay `None` so the fingerprint sees the same sentinel
/// regardless of which provider omitted them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    pub title: Option<String>,
    pub publisher: Option<String>,
    pub doi_prefix: Option<String>,
    pub country_code: Option<String>,
    pub is_open_access: Option<bool>,
}

impl AttributeSet {
    /// Overlay `other` on top of `self`. Fields present in `other` win.
    pub fn merge(mut self, other: AttributeSet) -> Self {
        self.title = other.title.or(self.title);
        self.publisher = other.publisher.or(self.publisher);
        self.doi_prefix = other.doi_prefix.or(self.doi_prefix);
        self.country_code = other.country_code.or(self.country_code);
        self.is_open_access = other.is_open_access.or(self.is_open_access);
        self
    }
}

/// Result of a single provider lookup.
///
/// A fault is kept apart from "the provider has nothing for this ISSN" so the
/// ingestion loop can decide whether a fault should produce a record at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(AttributeSet),
    NotFound,
    TransientFault(String),
}

impl LookupOutcome {
    pub fn is_fault(&self) -> bool {
        matches!(self, LookupOutcome::TransientFault(_))
    }

    /// Attributes to feed into the record, treating a fault as "no data".
    pub fn into_attributes(self) -> AttributeSet {
        match self {
            LookupOutcome::Found(attrs) => attrs,
            LookupOutcome::NotFound | LookupOutcome::TransientFault(_) => AttributeSet::default(),
        }
    }
}

/// One row of the `issn_metadata_fact` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataRecord {
    pub issn: String,
    pub title: Option<String>,
    pub publisher: Option<String>,
    pub doi_prefix: Option<String>,
    pub country_code: Option<String>,
    pub is_open_access: Option<bool>,
    pub fetch_date: NaiveDate,
    pub fingerprint: String,
}

impl MetadataRecord {
    /// Build a record and compute its fingerprint.
    ///
    /// The record is immutable afterwards; nothing exposes a way to change an
    /// attribute without going through here again.
    pub fn new(issn: &str, attrs: AttributeSet, fetch_date: NaiveDate) -> Self {
        let fingerprint = fingerprint(fingerprint_fields(issn, &attrs));
        Self {
            issn: issn.to_string(),
            title: attrs.title,
            publisher: attrs.publisher,
            doi_prefix: attrs.doi_prefix,
            country_code: attrs.country_code,
            is_open_access: attrs.is_open_access,
            fetch_date,
            fingerprint,
        }
    }
}

/// The fixed-order tuple the fingerprint is computed over:
/// `[issn, title, publisher, doi_prefix, country_code, is_open_access]`.
pub fn fingerprint_fields(issn: &str, attrs: &AttributeSet) -> [String; 6] {
    fn text(v: &Option<String>) -> String {
        v.clone().unwrap_or_else(|| MISSING.to_string())
    }

    [
        issn.to_string(),
        text(&attrs.title),
        text(&attrs.publisher),
        text(&attrs.doi_prefix),
        text(&attrs.country_code),
        attrs
            .is_open_access
            .map(|b| b.to_string())
            .unwrap_or_else(|| MISSING.to_string()),
    ]
}

/// Counters for one pass of the ingestion loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// ISSNs taken from the input.
    pub processed: u64,
    /// New rows appended.
    pub appended: u64,
    /// ISSNs whose fingerprint was already stored.
    pub unchanged: u64,
    /// ISSNs left for a later run because a provider faulted.
    pub deferred: u64,
    /// Individual provider lookups that faulted.
    pub faults: u64,
    /// Pauses taken between batches.
    pub pauses: u64,
}

/// Aggregate figures about the fact table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub rows: i64,
    pub distinct_issns: i64,
    pub latest_fetch_date: Option<NaiveDate>,
}

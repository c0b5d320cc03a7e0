//! # ISSN Harvest
//!
//! Incremental ingestion of journal metadata keyed by ISSN.
//!
//! Every run looks each ISSN up in Crossref (title, publisher, DOI prefix)
//! and OpenAlex (country, open-access flag), fingerprints the combined
//! attributes, and appends a dated row to an append-only fact table only
//! when that fingerprint has not been stored for the ISSN before. Re-running
//! daily therefore adds nothing for unchanged journals and exactly one row
//! per journal whose metadata moved.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ ISSN list  │──▶│ Crossref     │──▶│ Fingerprint │──▶│  Fact table  │
//! │ (CSV)      │   │ + OpenAlex   │   │  (SHA-256)  │   │ SQLite / PG  │
//! └────────────┘   └──────────────┘   └─────────────┘   └──────────────┘
//!                          ▲                                   │
//!                          └──────── ingestion loop ◀──────────┘
//!                                   (check, then append)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! issn-harvest init                  # create the fact table
//! issn-harvest run                   # one full pass over the ISSN list
//! issn-harvest history 1234-5678     # stored snapshots for one journal
//! issn-harvest stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`fingerprint`] | Content digest for change detection |
//! | [`sources`] | Metadata source trait and shared HTTP plumbing |
//! | [`connector_crossref`] | Crossref journals adapter |
//! | [`connector_openalex`] | OpenAlex sources adapter |
//! | [`store`] | Fact table gateway and backends |
//! | [`input`] | ISSN list reader |
//! | [`ingest`] | The ingestion loop |
//! | [`progress`] | Progress reporting |
//! | [`history`] | Per-ISSN snapshot listing |
//! | [`stats`] | Fact table summary |
//! | [`db`] | Store connection |
//! | [`migrate`] | Schema bootstrap |

pub mod config;
pub mod connector_crossref;
pub mod connector_openalex;
pub mod db;
pub mod fingerprint;
pub mod history;
pub mod ingest;
pub mod input;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod sources;
pub mod stats;
pub mod store;

//! Incremental ingestion loop.
//!
//! For every ISSN, in input order:
//!
//! ```text
//! Fetching → Fingerprinting → Checking ─┬─ stored ──▶ Skipping ──┬─▶ Done
//!                                        └─ absent ──▶ Persisting ┘
//! ```
//!
//! Both providers are queried for the ISSN and must answer before the
//! record is fingerprinted. If the store already holds `(issn, fingerprint)`
//! nothing is written; otherwise a row dated today is appended and committed
//! before the next ISSN starts.
//!
//! The input is walked in fixed-size batches with a pause between
//! consecutive batches to keep the aggregate request rate to the providers
//! down. `N` ISSNs with batch size `B` take exactly `ceil(N / B) - 1` pauses.
//!
//! A provider fault is handled according to [`FaultPolicy`]: by default the
//! ISSN is deferred (nothing written, retried on the next run) so an outage
//! never masquerades as "this journal has no data".

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, FaultPolicy, IngestConfig};
use crate::db;
use crate::input::read_issns;
use crate::models::{LookupOutcome, MetadataRecord, RunSummary};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, ProgressMode};
use crate::sources::SourcePair;
use crate::store::FactStore;

/// Knobs for one pass of the loop.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub batch_size: usize,
    pub inter_chunk_delay: Duration,
    pub fault_policy: FaultPolicy,
    /// Date stamped on every row appended by this run.
    pub fetch_date: NaiveDate,
    /// Fetch and fingerprint but never write.
    pub dry_run: bool,
}

impl IngestOptions {
    pub fn from_config(config: &IngestConfig, fetch_date: NaiveDate) -> Self {
        Self {
            batch_size: config.batch_size,
            inter_chunk_delay: config.inter_chunk_delay(),
            fault_policy: config.fault_policy,
            fetch_date,
            dry_run: false,
        }
    }
}

/// Terminal state of a single ISSN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssnOutcome {
    /// A new row was written (or would have been, in a dry run).
    Persisted,
    /// The fingerprint was already stored.
    Skipped,
    /// A provider faulted and the fault policy held the ISSN back.
    Deferred,
}

/// CLI-level overrides for `run`.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub input: Option<PathBuf>,
    pub limit: Option<usize>,
    pub dry_run: bool,
    pub batch_size: Option<usize>,
    pub delay_secs: Option<u64>,
    pub progress: Option<ProgressMode>,
}

/// Read the input, open the store, and run one full pass.
pub async fn run_ingest(config: &Config, args: RunArgs) -> Result<RunSummary> {
    let input = args.input.clone().unwrap_or_else(|| config.ingest.input.clone());
    let mut issns = read_issns(&input)?;
    if let Some(limit) = args.limit {
        issns.truncate(limit);
    }

    let fetch_date = chrono::Local::now().date_naive();
    let mut opts = IngestOptions::from_config(&config.ingest, fetch_date);
    opts.dry_run = args.dry_run;
    if let Some(batch_size) = args.batch_size {
        anyhow::ensure!(batch_size > 0, "--batch-size must be > 0");
        opts.batch_size = batch_size;
    }
    if let Some(secs) = args.delay_secs {
        opts.inter_chunk_delay = Duration::from_secs(secs);
    }

    let sources = SourcePair::from_config(config)?;
    let progress = args
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    let store = db::connect(config).await?;
    let result = async {
        store
            .ensure_schema()
            .await
            .context("Failed to prepare fact table")?;
        ingest_issns(&issns, &sources, store.as_ref(), &opts, progress.as_ref()).await
    }
    .await;
    store.close().await;
    let summary = result?;

    if opts.dry_run {
        println!("ingest {} (dry-run)", input.display());
    } else {
        println!("ingest {}", input.display());
    }
    println!("  processed: {}", summary.processed);
    if opts.dry_run {
        println!("  would append: {}", summary.appended);
    } else {
        println!("  appended: {}", summary.appended);
    }
    println!("  unchanged: {}", summary.unchanged);
    println!("  deferred: {}", summary.deferred);
    println!("  provider faults: {}", summary.faults);
    println!("  fetch date: {}", opts.fetch_date);
    println!("ok");

    Ok(summary)
}

/// Run the loop over `issns` against explicit sources and store.
///
/// Store errors abort the pass; provider faults never do.
pub async fn ingest_issns(
    issns: &[String],
    sources: &SourcePair,
    store: &dyn FactStore,
    opts: &IngestOptions,
    progress: &dyn IngestProgressReporter,
) -> Result<RunSummary> {
    let batch_size = opts.batch_size.max(1);
    let total = issns.len() as u64;
    let batches = issns.len().div_ceil(batch_size) as u64;
    let mut summary = RunSummary::default();

    tracing::info!(
        total,
        batch_size,
        fetch_date = %opts.fetch_date,
        dry_run = opts.dry_run,
        "ingest started"
    );
    progress.report(IngestProgressEvent::Started { total });

    for (i, batch) in issns.chunks(batch_size).enumerate() {
        if i > 0 {
            tracing::debug!(delay = ?opts.inter_chunk_delay, "pausing between batches");
            tokio::time::sleep(opts.inter_chunk_delay).await;
            summary.pauses += 1;
        }

        for issn in batch {
            let (outcome, faults) = process_issn(issn, sources, store, opts).await?;
            summary.processed += 1;
            summary.faults += faults;
            match outcome {
                IssnOutcome::Persisted => summary.appended += 1,
                IssnOutcome::Skipped => summary.unchanged += 1,
                IssnOutcome::Deferred => summary.deferred += 1,
            }
        }

        progress.report(IngestProgressEvent::BatchDone {
            batch: i as u64 + 1,
            batches,
            n: summary.processed,
            total,
        });
    }

    tracing::info!(
        processed = summary.processed,
        appended = summary.appended,
        unchanged = summary.unchanged,
        deferred = summary.deferred,
        faults = summary.faults,
        "ingest finished"
    );
    Ok(summary)
}

/// Take one ISSN from fetch to done. Returns its outcome and how many
/// provider lookups faulted.
pub async fn process_issn(
    issn: &str,
    sources: &SourcePair,
    store: &dyn FactStore,
    opts: &IngestOptions,
) -> Result<(IssnOutcome, u64)> {
    let (biblio, class) = sources.lookup(issn).await;
    let faults = biblio.is_fault() as u64 + class.is_fault() as u64;

    if faults > 0 && opts.fault_policy == FaultPolicy::Skip {
        tracing::info!(issn, faults, "deferring after provider fault");
        return Ok((IssnOutcome::Deferred, faults));
    }

    let record = build_record(issn, biblio, class, opts.fetch_date);

    let stored = store
        .exists(&record.issn, &record.fingerprint)
        .await
        .with_context(|| format!("existence check failed for {}", issn))?;
    if stored {
        tracing::debug!(issn, fingerprint = %record.fingerprint, "unchanged");
        return Ok((IssnOutcome::Skipped, faults));
    }

    if opts.dry_run {
        tracing::info!(issn, fingerprint = %record.fingerprint, "would append (dry-run)");
        return Ok((IssnOutcome::Persisted, faults));
    }

    let written = store
        .append(&record)
        .await
        .with_context(|| format!("append failed for {}", issn))?;
    if !written {
        // Another writer stored the same pair between the check and the insert.
        tracing::debug!(issn, fingerprint = %record.fingerprint, "already stored on append");
        return Ok((IssnOutcome::Skipped, faults));
    }

    tracing::debug!(issn, fingerprint = %record.fingerprint, "appended");
    Ok((IssnOutcome::Persisted, faults))
}

/// Combine both providers' answers into a fingerprinted record.
pub fn build_record(
    issn: &str,
    bibliographic: LookupOutcome,
    classification: LookupOutcome,
    fetch_date: NaiveDate,
) -> MetadataRecord {
    let attrs = bibliographic
        .into_attributes()
        .merge(classification.into_attributes());
    MetadataRecord::new(issn, attrs, fetch_date)
}

//! Fact table statistics.
//!
//! Provides a quick summary of what has been ingested: row counts, distinct
//! ISSNs, and the most recent fetch date. Used by `issn-harvest stats`.

use anyhow::Result;

use crate::config::Config;
use crate::db;

/// Run the stats command: query the store and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = db::connect(config).await?;
    let result = async {
        store.ensure_schema().await?;
        store.stats().await
    }
    .await;
    let backend = store.backend().to_string();
    store.close().await;
    let stats = result?;

    println!("ISSN Harvest — Fact Table Stats");
    println!("===============================");
    println!();
    println!("  Backend:        {}", backend);
    println!("  Rows:           {}", stats.rows);
    println!("  Distinct ISSNs: {}", stats.distinct_issns);
    println!(
        "  Last change:    {}",
        stats
            .latest_fetch_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "never".to_string())
    );
    if stats.distinct_issns > 0 {
        println!(
            "  Snapshots/ISSN: {:.2}",
            stats.rows as f64 / stats.distinct_issns as f64
        );
    }
    Ok(())
}

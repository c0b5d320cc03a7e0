//! Snapshot history for one ISSN.
//!
//! Used by the `issn-harvest history <issn>` command to show every dated
//! record stored for a journal, oldest first.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::models::MetadataRecord;

/// Core lookup returning structured data.
pub async fn get_history(config: &Config, issn: &str) -> Result<Vec<MetadataRecord>> {
    let store = db::connect(config).await?;
    let result = async {
        store.ensure_schema().await?;
        store.history(issn).await
    }
    .await;
    store.close().await;
    result
}

/// CLI entry point for `issn-harvest history`.
pub async fn run_history(config: &Config, issn: &str, json: bool) -> Result<()> {
    let records = get_history(config, issn).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No records for {}.", issn);
        return Ok(());
    }

    println!("{} ({} snapshots)", issn, records.len());
    for r in &records {
        println!();
        println!("  fetch date:  {}", r.fetch_date);
        println!("  title:       {}", display(&r.title));
        println!("  publisher:   {}", display(&r.publisher));
        println!("  doi prefix:  {}", display(&r.doi_prefix));
        println!("  country:     {}", display(&r.country_code));
        println!(
            "  open access: {}",
            r.is_open_access
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
        println!("  hash:        {}", r.fingerprint);
    }
    Ok(())
}

fn display(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("-")
}

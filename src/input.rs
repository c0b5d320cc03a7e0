//! ISSN master list reader.
//!
//! The input is a CSV file with a header row containing an `issn` column;
//! other columns are ignored. ISSNs are returned in file order, with
//! surrounding whitespace stripped and blank cells skipped. No checksum
//! validation is done.

use anyhow::{bail, Context, Result};
use std::io::Read;
use std::path::Path;

const ISSN_COLUMN: &str = "issn";

/// Read ISSNs from a CSV file.
pub fn read_issns(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open ISSN input: {}", path.display()))?;
    read_issns_from(file).with_context(|| format!("Failed to read ISSN input: {}", path.display()))
}

/// Read ISSNs from any CSV source.
pub fn read_issns_from<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let Some(column) = headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').eq_ignore_ascii_case(ISSN_COLUMN))
    else {
        bail!("input has no '{}' column (found: {:?})", ISSN_COLUMN, headers);
    };

    let mut issns = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("bad CSV record at data row {}", line + 1))?;
        match record.get(column).map(str::trim) {
            Some(issn) if !issn.is_empty() => issns.push(issn.to_string()),
            _ => {}
        }
    }

    Ok(issns)
}

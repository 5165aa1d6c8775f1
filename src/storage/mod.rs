use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Context;
use indexmap::IndexMap;
use tracing::debug;

use crate::scrape::models::{Record, RunSummary};

pub const LISTING_PREFIX: &str = "pct_classes_";
pub const LISTING_SUFFIX: &str = ".csv";
pub const ERROR_PAGE_FILE: &str = "error_page.html";
pub const RESPONSE_FILE: &str = "response.html";

/// Saves a raw HTML capture under a fixed well-known name for offline
/// inspection of error and empty-result responses.
pub async fn save_diagnostic(dir: &Path, name: &str, html: &str) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, html)
        .await
        .with_context(|| format!("writing diagnostic capture {}", path.display()))?;
    Ok(path)
}

/// Writes the bulk listing as CSV, one file per run. Columns are the
/// union of field names across records in first-seen order; postback
/// targets are not part of the record fields and never appear here.
pub async fn write_listing_csv(
    dir: &Path,
    run_stamp: &str,
    records: &[Record],
) -> anyhow::Result<PathBuf> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.fields.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns)?;
    for record in records {
        let row: Vec<&str> = columns
            .iter()
            .map(|c| record.fields.get(c).map(String::as_str).unwrap_or(""))
            .collect();
        writer.write_record(&row)?;
    }
    let data = writer.into_inner()?;

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{LISTING_PREFIX}{run_stamp}{LISTING_SUFFIX}"));
    tokio::fs::write(&path, data)
        .await
        .with_context(|| format!("writing listing {}", path.display()))?;
    Ok(path)
}

pub async fn write_run_summary(
    dir: &Path,
    run_stamp: &str,
    summary: &RunSummary,
) -> anyhow::Result<PathBuf> {
    let path = dir.join(format!("run_summary_{run_stamp}.json"));
    let data = serde_json::to_vec_pretty(summary)?;
    tokio::fs::write(&path, data)
        .await
        .with_context(|| format!("writing run summary {}", path.display()))?;
    Ok(path)
}

/// Most recently created listing export, or `None` when no run has
/// completed yet.
pub fn latest_listing(dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        // missing output directory just means no run has happened
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(LISTING_PREFIX) || !name.ends_with(LISTING_SUFFIX) {
            continue;
        }
        let metadata = entry.metadata()?;
        let created = metadata.created().or_else(|_| metadata.modified())?;
        if newest.as_ref().is_none_or(|(t, _)| created > *t) {
            newest = Some((created, entry.path()));
        }
    }

    if let Some((_, path)) = &newest {
        debug!(path = %path.display(), "resolved latest listing");
    }
    Ok(newest.map(|(_, path)| path))
}

/// Reads a listing CSV back into ordered records for the JSON API.
pub fn read_listing_records(path: &Path) -> anyhow::Result<Vec<IndexMap<String, String>>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening listing {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut fields = IndexMap::with_capacity(headers.len());
        for (header, value) in headers.iter().zip(row.iter()) {
            fields.insert(header.to_string(), value.to_string());
        }
        records.push(fields);
    }
    Ok(records)
}

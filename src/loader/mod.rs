//! Crawl-directory discovery and snapshot CSV I/O.
//!
//! A snapshot CSV is one crawl's canonical rows plus the `_timestamp`
//! column; the loader refuses rows whose timestamp does not parse, so a
//! malformed crawl can never skew the latest-wins merge downstream.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::{Row, TIMESTAMP_COL};
use crate::normalize::date::{format_timestamp, parse_timestamp};
use crate::storage::BlobStore;

/// Collect the `.html` files of one crawl directory, sorted.
pub fn discover_html_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file()
            && path
                .extension()
                .map(|e| e == "html" || e == "htm")
                .unwrap_or(false)
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// The crawl time for a directory of pages: the explicit override, or
/// the directory's `YYYY-MM-DD` name at midnight.
pub fn crawl_timestamp(dir: &Path, explicit: Option<&str>) -> Result<NaiveDateTime> {
    if let Some(ts) = explicit {
        return Ok(parse_timestamp(ts)?);
    }

    let name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("crawl dir {dir:?} has no usable name"))?;
    if let Ok(d) = NaiveDate::parse_from_str(name, "%Y-%m-%d") {
        return Ok(d.and_hms_opt(0, 0, 0).unwrap());
    }
    bail!("cannot derive crawl time from directory name '{name}' — pass --timestamp");
}

/// Tag every row with the crawl time.
pub fn stamp_rows(rows: &mut [Row], ts: NaiveDateTime) {
    for row in rows.iter_mut() {
        row.insert(TIMESTAMP_COL.to_string(), format_timestamp(ts));
    }
}

// ── CSV round-trip ────────────────────────────────────────────────────────────

/// Serialize rows to CSV. Columns are the union across rows in
/// first-seen order; a row missing a column writes an empty cell.
pub fn rows_to_csv(rows: &[Row]) -> Result<Vec<u8>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut columns: Vec<&String> = Vec::new();
    for row in rows {
        for name in row.keys() {
            if !columns.contains(&name) {
                columns.push(name);
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns)?;
    for row in rows {
        writer.write_record(
            columns
                .iter()
                .map(|c| row.get(*c).map(String::as_str).unwrap_or("")),
        )?;
    }
    writer.into_inner().context("finish csv")
}

pub fn csv_to_rows(bytes: &[u8]) -> Result<Vec<Row>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect(),
        );
    }
    Ok(rows)
}

// ── Snapshot store layout ─────────────────────────────────────────────────────

pub fn snapshot_key(prefix: &str, slug: &str, ts: NaiveDateTime) -> String {
    format!("{prefix}/{slug}/{}.csv", ts.format("%Y%m%dT%H%M%S"))
}

pub fn save_snapshot(
    store: &dyn BlobStore,
    prefix: &str,
    slug: &str,
    ts: NaiveDateTime,
    rows: &[Row],
) -> Result<String> {
    let key = snapshot_key(prefix, slug, ts);
    store.put(&key, &rows_to_csv(rows)?)?;
    debug!("saved {} rows to {}", rows.len(), key);
    Ok(key)
}

/// Load every stored snapshot for an entity, validating timestamps.
pub fn load_snapshots(store: &dyn BlobStore, prefix: &str, slug: &str) -> Result<Vec<Row>> {
    let mut all = Vec::new();
    for key in store.list(&format!("{prefix}/{slug}/"))? {
        let Some(bytes) = store.get(&key)? else {
            continue;
        };
        let rows = csv_to_rows(&bytes).with_context(|| format!("parse snapshot '{key}'"))?;
        for row in &rows {
            let ts = row
                .get(TIMESTAMP_COL)
                .with_context(|| format!("snapshot '{key}' has a row without {TIMESTAMP_COL}"))?;
            parse_timestamp(ts).with_context(|| format!("snapshot '{key}'"))?;
        }
        all.extend(rows);
    }
    Ok(all)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_csv_roundtrip_preserves_columns_and_fills_gaps() {
        let rows = vec![
            row(&[("A", "1"), ("B", "2")]),
            row(&[("A", "3"), ("C", "4")]),
        ];
        let bytes = rows_to_csv(&rows).unwrap();
        let back = csv_to_rows(&bytes).unwrap();
        assert_eq!(back[0]["A"], "1");
        assert_eq!(back[0]["C"], "");
        assert_eq!(back[1]["C"], "4");
        assert_eq!(back[1]["B"], "");
    }

    #[test]
    fn test_empty_rows_roundtrip() {
        let bytes = rows_to_csv(&[]).unwrap();
        assert!(bytes.is_empty());
        assert!(csv_to_rows(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_crawl_timestamp_sources() {
        let ts = crawl_timestamp(Path::new("crawls/2023-06-01"), None).unwrap();
        assert_eq!(format_timestamp(ts), "2023-06-01 00:00:00");

        let ts = crawl_timestamp(Path::new("whatever"), Some("2023-06-01 12:00:00")).unwrap();
        assert_eq!(format_timestamp(ts), "2023-06-01 12:00:00");

        assert!(crawl_timestamp(Path::new("not-a-date"), None).is_err());
    }

    #[test]
    fn test_save_and_load_snapshots() {
        let store = MemoryStore::new();
        let ts = parse_timestamp("2023-06-01 00:00:00").unwrap();
        let mut rows = vec![row(&[("Company url", "/c/1")])];
        stamp_rows(&mut rows, ts);

        let key = save_snapshot(&store, "snapshots", "company", ts, &rows).unwrap();
        assert_eq!(key, "snapshots/company/20230601T000000.csv");

        let loaded = load_snapshots(&store, "snapshots", "company").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0][TIMESTAMP_COL], "2023-06-01 00:00:00");
    }

    #[test]
    fn test_load_rejects_malformed_timestamp() {
        let store = MemoryStore::new();
        store
            .put(
                "snapshots/company/bad.csv",
                b"Company url,_timestamp\n/c/1,June 2023\n",
            )
            .unwrap();
        assert!(load_snapshots(&store, "snapshots", "company").is_err());
    }
}

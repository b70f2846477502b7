//! Batch post-processing: singleton collapse, unnamed-column drop,
//! anchor-splitting helpers, and the two deduplication passes (within a
//! parse batch, and "latest snapshot wins" across crawls).

use std::collections::HashSet;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::models::{Anchor, Collapsed, Field, Record, Row, Value, TIMESTAMP_COL};
use crate::normalize::date::parse_timestamp;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("column '{column}' holds {count} anchors where exactly one is required")]
    AmbiguousAnchor { column: String, count: usize },

    #[error("column '{0}' has no anchor to take")]
    MissingAnchor(String),

    #[error("column '{0}' is not anchor-valued")]
    NotAnchor(String),

    #[error("column '{0}' still holds raw anchors after derivation")]
    UnsplitAnchor(String),

    #[error("snapshot row is missing the _timestamp column")]
    MissingTimestamp,
}

// ── Collapse passes ───────────────────────────────────────────────────────────

/// Batch-wide singleton collapse.
///
/// A column collapses to scalar form only when *no* record in the batch
/// holds more than one element in it — all-or-nothing across the batch.
/// A zero-element list collapses to the empty string.
pub fn collapse_singletons(batch: Vec<Record>) -> Vec<Collapsed> {
    let mut columns: Vec<String> = Vec::new();
    for record in &batch {
        for name in record.keys() {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        }
    }

    let collapsible: HashSet<&String> = columns
        .iter()
        .filter(|col| {
            batch
                .iter()
                .all(|r| r.get(*col).map_or(true, |v| v.len() <= 1))
        })
        .collect();

    batch
        .into_iter()
        .map(|record| {
            record
                .into_iter()
                .map(|(name, value)| {
                    let field = if collapsible.contains(&name) {
                        collapse_value(value)
                    } else {
                        match value {
                            Value::Text(v) => Field::TextList(v),
                            Value::Anchors(v) => Field::Anchors(v),
                        }
                    };
                    (name, field)
                })
                .collect()
        })
        .collect()
}

fn collapse_value(value: Value) -> Field {
    match value {
        Value::Text(mut v) if v.len() == 1 => Field::Text(v.remove(0)),
        Value::Anchors(mut v) if v.len() == 1 => Field::Anchor(v.remove(0)),
        _ => Field::Text(String::new()),
    }
}

/// Drop every column whose name is empty.
pub fn drop_unnamed_columns(batch: &mut [Collapsed]) {
    for record in batch.iter_mut() {
        record.retain(|name, _| !name.is_empty());
    }
}

// ── Derivation helpers ────────────────────────────────────────────────────────

/// The single anchor of a column. A column that still holds a list after
/// the collapse is ambiguous and fails rather than picking an element.
pub fn take_anchor(record: &Collapsed, column: &str) -> Result<Anchor, ProcessError> {
    match record.get(column) {
        Some(Field::Anchor(a)) => Ok(a.clone()),
        Some(Field::Anchors(v)) => Err(ProcessError::AmbiguousAnchor {
            column: column.to_string(),
            count: v.len(),
        }),
        Some(Field::Text(s)) if s.is_empty() => Err(ProcessError::MissingAnchor(column.to_string())),
        None => Err(ProcessError::MissingAnchor(column.to_string())),
        Some(_) => Err(ProcessError::NotAnchor(column.to_string())),
    }
}

/// The first anchor of a possibly-multi column — the deliberate
/// "primary entity" selection used for company-name columns.
pub fn take_first_anchor(record: &Collapsed, column: &str) -> Result<Anchor, ProcessError> {
    match record.get(column) {
        Some(Field::Anchor(a)) => Ok(a.clone()),
        Some(Field::Anchors(v)) => v
            .first()
            .cloned()
            .ok_or_else(|| ProcessError::MissingAnchor(column.to_string())),
        Some(Field::Text(s)) if s.is_empty() => Err(ProcessError::MissingAnchor(column.to_string())),
        None => Err(ProcessError::MissingAnchor(column.to_string())),
        Some(_) => Err(ProcessError::NotAnchor(column.to_string())),
    }
}

/// Every anchor of a column, scalar or list form.
pub fn all_anchors(record: &Collapsed, column: &str) -> Result<Vec<Anchor>, ProcessError> {
    match record.get(column) {
        Some(Field::Anchor(a)) => Ok(vec![a.clone()]),
        Some(Field::Anchors(v)) => Ok(v.clone()),
        Some(Field::Text(s)) if s.is_empty() => Ok(vec![]),
        None => Ok(vec![]),
        Some(_) => Err(ProcessError::NotAnchor(column.to_string())),
    }
}

/// Flatten a fully-derived record into a canonical row. Text lists that
/// escaped the collapse are joined with `"; "`; any anchor content left
/// at this point means a derivation forgot to split it — hard error.
pub fn finalize(record: Collapsed) -> Result<Row, ProcessError> {
    record
        .into_iter()
        .map(|(name, field)| match field {
            Field::Text(s) => Ok((name, s)),
            Field::TextList(v) => Ok((name, v.join("; "))),
            Field::Anchor(_) | Field::Anchors(_) => Err(ProcessError::UnsplitAnchor(name)),
        })
        .collect()
}

// ── Deduplication ─────────────────────────────────────────────────────────────

/// Within-batch dedup by natural key: the first occurrence wins.
pub fn dedup_by_key(rows: Vec<Row>, key_cols: &[&str]) -> Vec<Row> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(key_of(row, key_cols)))
        .collect()
}

/// Cross-crawl dedup: stable-sort by `_timestamp` descending, keep the
/// first occurrence of each natural key, strip `_timestamp` from the
/// output. Equal timestamps resolve by input order — the sort's
/// stability is load-bearing, not incidental.
pub fn latest_snapshot_wins(
    snapshots: Vec<Row>,
    key_cols: &[&str],
) -> Result<Vec<Row>, anyhow::Error> {
    let mut stamped: Vec<(NaiveDateTime, Row)> = snapshots
        .into_iter()
        .map(|row| {
            let ts = row
                .get(TIMESTAMP_COL)
                .ok_or(ProcessError::MissingTimestamp)?;
            let ts = parse_timestamp(ts)?;
            Ok((ts, row))
        })
        .collect::<Result<_, anyhow::Error>>()?;

    stamped.sort_by(|a, b| b.0.cmp(&a.0));

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (_, mut row) in stamped {
        if seen.insert(key_of(&row, key_cols)) {
            row.shift_remove(TIMESTAMP_COL);
            out.push(row);
        }
    }
    Ok(out)
}

fn key_of(row: &Row, key_cols: &[&str]) -> Vec<String> {
    key_cols
        .iter()
        .map(|col| row.get(*col).cloned().unwrap_or_default())
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Generic HTML-to-record extraction.
//!
//! Two layouts are supported: header/body tables (`parse_table`) and
//! label/value shapes — definition-list cards (`parse_card`) and
//! horizontal two-cell tables (`parse_keyed_rows`). Cell content is
//! classified by the *declared* anchor-column set, never by sniffing the
//! DOM, so a declared anchor cell with zero links is an empty list, not
//! an error.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::models::{Anchor, Record, Value};

static TH_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("thead tr th").unwrap());
static TR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tbody tr").unwrap());
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static A_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static DT_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("dt").unwrap());
static DD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("dd").unwrap());
static TABLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("anchor column '{column}' not found in headers {headers:?}")]
    AnchorColumnMissing {
        column: String,
        headers: Vec<String>,
    },

    #[error("anchor element has no text node (href: '{href}')")]
    AnchorWithoutText { href: String },

    #[error("anchor element '{name}' has no href attribute")]
    AnchorWithoutHref { name: String },

    #[error("page has no <table> element")]
    NoTable,

    #[error("label cell has no text node")]
    EmptyLabel,

    #[error("keyed row has {cells} cell(s), need a label and a value")]
    MalformedKeyedRow { cells: usize },
}

// ── Cell extractor ────────────────────────────────────────────────────────────

/// Strip zero-width spaces and no-break spaces, then trim.
pub fn clean_text(text: &str) -> String {
    text.replace('\u{200b}', "").replace('\u{a0}', "").trim().to_string()
}

/// All descendant text nodes of a cell, cleaned; fragments that clean
/// down to nothing are dropped. Order and duplicates preserved.
pub fn cell_text(cell: ElementRef) -> Vec<String> {
    cell.text()
        .map(clean_text)
        .filter(|t| !t.is_empty())
        .collect()
}

/// All descendant anchors of a cell in document order. An anchor with no
/// text node or no `href` is a hard parse error, not a skip.
pub fn cell_anchors(cell: ElementRef) -> Result<Vec<Anchor>, ExtractError> {
    let mut anchors = Vec::new();
    for a in cell.select(&A_SEL) {
        let href = a.value().attr("href");
        let text = a.text().next().map(clean_text);
        match (text, href) {
            (Some(name), Some(url)) => anchors.push(Anchor {
                name,
                url: url.to_string(),
            }),
            (None, href) => {
                return Err(ExtractError::AnchorWithoutText {
                    href: href.unwrap_or_default().to_string(),
                });
            }
            (Some(name), None) => return Err(ExtractError::AnchorWithoutHref { name }),
        }
    }
    Ok(anchors)
}

// ── Table converter ───────────────────────────────────────────────────────────

/// First `<table>` of the document.
pub fn first_table(doc: &Html) -> Result<ElementRef<'_>, ExtractError> {
    doc.select(&TABLE_SEL).next().ok_or(ExtractError::NoTable)
}

/// Header column names: one per `thead tr th` cell, each the `.`-joined
/// concatenation of the cell's raw text nodes (multi-line headers keep
/// every fragment).
pub fn header_names(table: ElementRef) -> Vec<String> {
    table
        .select(&TH_SEL)
        .map(|th| th.text().collect::<Vec<_>>().join("."))
        .collect()
}

/// Convert one table into records, one per `tbody tr`.
///
/// Every declared anchor column must appear in the headers (the page
/// layout diverged otherwise — fail fast). When a row has more cells
/// than headers or vice versa, the zip truncates to the shorter side.
/// A duplicate header label resolves to its first occurrence; later
/// same-named cells are discarded.
pub fn parse_table(table: ElementRef, anchor_cols: &[&str]) -> Result<Vec<Record>, ExtractError> {
    let headers = header_names(table);
    let anchor_idx = anchor_indexes(&headers, anchor_cols)?;

    let mut records = Vec::new();
    for tr in table.select(&TR_SEL) {
        let mut record = Record::new();
        for (i, (name, cell)) in headers.iter().zip(tr.select(&TD_SEL)).enumerate() {
            let value = if anchor_idx.contains(&i) {
                Value::Anchors(cell_anchors(cell)?)
            } else {
                Value::Text(cell_text(cell))
            };
            if !record.contains_key(name) {
                record.insert(name.clone(), value);
            }
        }
        records.push(record);
    }
    Ok(records)
}

fn anchor_indexes(headers: &[String], anchor_cols: &[&str]) -> Result<Vec<usize>, ExtractError> {
    anchor_cols
        .iter()
        .map(|col| {
            headers
                .iter()
                .position(|h| h == col)
                .ok_or_else(|| ExtractError::AnchorColumnMissing {
                    column: col.to_string(),
                    headers: headers.to_vec(),
                })
        })
        .collect()
}

// ── Label/value converters ────────────────────────────────────────────────────

/// Convert a definition-list card (`dt` labels, `dd` values) into one
/// record. Labels are translated through `label_map` (unmapped labels
/// pass through), and anchor classification runs on the translated
/// label. `dt`/`dd` sequences zip-truncate; a repeated label keeps its
/// first value.
pub fn parse_card(
    scope: ElementRef,
    label_map: &[(&str, &str)],
    anchor_cols: &[&str],
) -> Result<Record, ExtractError> {
    let labels: Vec<String> = scope
        .select(&DT_SEL)
        .map(|dt| {
            dt.text()
                .next()
                .map(clean_text)
                .ok_or(ExtractError::EmptyLabel)
                .map(|l| map_label(&l, label_map))
        })
        .collect::<Result<_, _>>()?;

    let mut record = Record::new();
    for (label, dd) in labels.iter().zip(scope.select(&DD_SEL)) {
        let value = if anchor_cols.contains(&label.as_str()) {
            Value::Anchors(cell_anchors(dd)?)
        } else {
            Value::Text(cell_text(dd))
        };
        if !record.contains_key(label) {
            record.insert(label.clone(), value);
        }
    }
    Ok(record)
}

/// Convert horizontal label/value tables (each `tr` = label cell then
/// value cell) into one record, scanning every `<table>` under `scope`.
/// A repeated label keeps its first value — seen on acquisition pages
/// where two tables carry the same field.
pub fn parse_keyed_rows(
    doc: &Html,
    label_map: &[(&str, &str)],
    anchor_cols: &[&str],
) -> Result<Record, ExtractError> {
    let mut record = Record::new();
    for table in doc.select(&TABLE_SEL) {
        for tr in table.select(&ROW_SEL) {
            let mut tds = tr.select(&TD_SEL);
            let (label_cell, value_cell) = match (tds.next(), tds.next()) {
                (Some(l), Some(v)) => (l, v),
                (Some(_), None) => return Err(ExtractError::MalformedKeyedRow { cells: 1 }),
                _ => return Err(ExtractError::MalformedKeyedRow { cells: 0 }),
            };

            let label = label_cell
                .text()
                .next()
                .map(clean_text)
                .ok_or(ExtractError::EmptyLabel)?;
            let label = map_label(&label, label_map);

            let value = if anchor_cols.contains(&label.as_str()) {
                Value::Anchors(cell_anchors(value_cell)?)
            } else {
                Value::Text(cell_text(value_cell))
            };
            if !record.contains_key(&label) {
                record.insert(label, value);
            }
        }
    }
    Ok(record)
}

fn map_label(label: &str, label_map: &[(&str, &str)]) -> String {
    label_map
        .iter()
        .find(|(from, _)| *from == label)
        .map(|(_, to)| to.to_string())
        .unwrap_or_else(|| label.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

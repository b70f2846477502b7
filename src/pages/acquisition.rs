//! Acquisition news pages. A very different DOM from the listing
//! pages: a definition-list "news card" describing the startup plus
//! horizontal label/value tables carrying the deal facts. One record
//! per page.

use anyhow::{anyhow, Result};
use scraper::{Html, Selector};
use std::sync::LazyLock;

use crate::extract;
use crate::models::{Field, Record, Row};
use crate::process;

static NEWS_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.finance-news").unwrap());

const NEWS_LABELS: &[(&str, &str)] = &[
    ("スタートアップ", "Startup"),
    ("業種", "Industry"),
    ("設立", "Founded Date"),
    ("事業内容", "Description"),
];
const NEWS_ANCHOR_COLS: &[&str] = &["Startup"];

const TABLE_LABELS: &[(&str, &str)] = &[
    ("年月日", "Date"),
    ("買収額", "Acquisition amount"),
    ("買収先", "acquirer"),
    ("ニュースURL", "News URL"),
];
const TABLE_ANCHOR_COLS: &[&str] = &["acquirer"];

pub fn parse(html: &str) -> Result<Vec<Record>> {
    let doc = Html::parse_document(html);
    let news = doc
        .select(&NEWS_SEL)
        .next()
        .ok_or_else(|| anyhow!("acquisition page has no finance-news section"))?;

    let mut record = extract::parse_card(news, NEWS_LABELS, NEWS_ANCHOR_COLS)?;

    // Deal facts live in horizontal tables; on label collision the
    // table value replaces the card value.
    let keyed = extract::parse_keyed_rows(&doc, TABLE_LABELS, TABLE_ANCHOR_COLS)?;
    for (label, value) in keyed {
        record.insert(label, value);
    }

    Ok(vec![record])
}

pub fn post_process(batch: Vec<Record>) -> Result<Vec<Row>> {
    // Pages without an acquirer are press noise, not acquisitions.
    let batch: Vec<Record> = batch
        .into_iter()
        .filter(|r| r.get("acquirer").is_some_and(|v| !v.is_empty()))
        .collect();

    let mut batch = process::collapse_singletons(batch);
    process::drop_unnamed_columns(&mut batch);

    let mut rows = Vec::with_capacity(batch.len());
    for mut record in batch {
        let startup = process::take_first_anchor(&record, "Startup")?;
        record.shift_remove("Startup");
        record.insert("Startup Url".to_string(), Field::Text(startup.url));
        record.insert("Startup Name".to_string(), Field::Text(startup.name));

        let acquirer = process::take_anchor(&record, "acquirer")?;
        record.shift_remove("acquirer");
        record.insert("Acquirer Url".to_string(), Field::Text(acquirer.url));
        record.insert("Acquirer Name".to_string(), Field::Text(acquirer.name));

        rows.push(process::finalize(record)?);
    }

    Ok(process::dedup_by_key(
        rows,
        &["Startup Url", "Acquirer Url", "Date"],
    ))
}

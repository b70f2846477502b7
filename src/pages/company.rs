//! Company listing pages: one standard header/body table where the
//! company-name cell links to the company's detail page.

use anyhow::Result;
use scraper::Html;

use crate::extract;
use crate::models::{Field, Record, Row};
use crate::process;

const ANCHOR_COLS: &[&str] = &["Company name"];

pub fn parse(html: &str) -> Result<Vec<Record>> {
    let doc = Html::parse_document(html);
    let table = extract::first_table(&doc)?;
    Ok(extract::parse_table(table, ANCHOR_COLS)?)
}

pub fn post_process(batch: Vec<Record>) -> Result<Vec<Row>> {
    let mut batch = process::collapse_singletons(batch);
    process::drop_unnamed_columns(&mut batch);

    let mut rows = Vec::with_capacity(batch.len());
    for mut record in batch {
        let company = process::take_anchor(&record, "Company name")?;
        record.insert("Company name".to_string(), Field::Text(company.name));
        record.insert("Company url".to_string(), Field::Text(company.url));
        rows.push(process::finalize(record)?);
    }

    Ok(process::dedup_by_key(rows, &["Company url"]))
}

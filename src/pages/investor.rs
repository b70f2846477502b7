//! Investor listing pages: one table with a single link-valued
//! investor cell per row.

use anyhow::Result;
use scraper::Html;

use crate::extract;
use crate::models::{Field, Record, Row};
use crate::process;

const ANCHOR_COLS: &[&str] = &["Investors"];

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
        let investor = process::take_anchor(&record, "Investors")?;
        record.shift_remove("Investors");
        record.insert("Investor Url".to_string(), Field::Text(investor.url));
        record.insert("Investor Name".to_string(), Field::Text(investor.name));
        rows.push(process::finalize(record)?);
    }

    Ok(process::dedup_by_key(rows, &["Investor Url"]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<html><body><table>\
        <thead><tr><th>Investors</th><th>Type</th></tr></thead>\
        <tbody>\
          <tr><td><a href='/investors/alpha'>Alpha Fund</a></td><td>VC</td></tr>\
          <tr><td><a href='/investors/alpha'>Alpha Fund</a></td><td>VC</td></tr>\
        </tbody></table></body></html>";

    #[test]
    fn test_investor_page_roundtrip() {
        let rows = post_process(parse(PAGE).unwrap()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Investor Url"], "/investors/alpha");
        assert_eq!(rows[0]["Investor Name"], "Alpha Fund");
        assert!(!rows[0].contains_key("Investors"));
        assert_eq!(rows[0]["Type"], "VC");
    }
}

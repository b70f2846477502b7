//! Funding-round pages. The company cell links to the round's own
//! detail page (`/companies/<id>/rounds/<id>`), so both the round URL
//! and its parent company URL derive from that anchor.

use anyhow::Result;
use scraper::Html;

use crate::extract;
use crate::models::{Field, Record, Row};
use crate::process;

const ANCHOR_COLS: &[&str] = &["Company Name", "Investors"];

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
        // The first anchor is the primary entity; secondary anchors in
        // the same cell are related companies, not the round's owner.
        let company = process::take_first_anchor(&record, "Company Name")?;
        let investors = process::all_anchors(&record, "Investors")?;

        let round_url = company.url;
        record.insert("Company Name".to_string(), Field::Text(company.name));
        record.insert("Round Url".to_string(), Field::Text(round_url.clone()));
        record.insert("Company Url".to_string(), Field::Text(parent_url(&round_url)));

        record.shift_remove("Investors");
        let names: Vec<String> = investors.iter().map(|a| a.name.clone()).collect();
        let urls: Vec<String> = investors.iter().map(|a| a.url.clone()).collect();
        record.insert("Investor Names".to_string(), Field::Text(names.join("; ")));
        record.insert("Investor Urls".to_string(), Field::Text(urls.join("; ")));

        rows.push(process::finalize(record)?);
    }

    Ok(process::dedup_by_key(rows, &["Round Url"]))
}

/// Truncate a round URL to its first two path segments — the parent
/// company page. `/companies/acme/rounds/r1` → `/companies/acme`.
fn parent_url(url: &str) -> String {
    url.split('/').take(3).collect::<Vec<_>>().join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<html><body><table>\
        <thead><tr><th>Company Name</th><th>Series</th><th>Amount</th><th>Date</th><th>Investors</th></tr></thead>\
        <tbody>\
          <tr><td><a href='/companies/acme/rounds/r1'>Acme</a></td>\
              <td>Series A</td><td>1,000千円</td><td>March 2021</td>\
              <td><a href='/investors/alpha'>Alpha</a><a href='/investors/beta'>Beta</a></td></tr>\
        </tbody></table></body></html>";

    #[test]
    fn test_round_derivations() {
        let rows = post_process(parse(PAGE).unwrap()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Round Url"], "/companies/acme/rounds/r1");
        assert_eq!(rows[0]["Company Url"], "/companies/acme");
        assert_eq!(rows[0]["Company Name"], "Acme");
        assert_eq!(rows[0]["Investor Names"], "Alpha; Beta");
        assert_eq!(rows[0]["Investor Urls"], "/investors/alpha; /investors/beta");
        assert_eq!(rows[0]["Amount"], "1,000千円");
    }

    #[test]
    fn test_parent_url_truncation() {
        assert_eq!(parent_url("/companies/acme/rounds/r1"), "/companies/acme");
        assert_eq!(parent_url("/companies/acme"), "/companies/acme");
    }
}

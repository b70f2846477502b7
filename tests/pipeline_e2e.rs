use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;

use jpstartup_etl::config::AppConfig;
use jpstartup_etl::fx::RateProvider;
use jpstartup_etl::loader;
use jpstartup_etl::pages::PageKind;
use jpstartup_etl::pipeline::Pipeline;
use jpstartup_etl::storage::{BlobStore, MemoryStore};

fn crawl_dir(name: &str, date: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("jpstartup_e2e_{}_{}", name, std::process::id()));
    p.push(date);
    let _ = fs::remove_dir_all(&p);
    fs::create_dir_all(&p).unwrap();
    p
}

struct FixedProvider {
    rate: f64,
    calls: std::cell::Cell<usize>,
}

impl FixedProvider {
    fn new(rate: f64) -> Self {
        Self {
            rate,
            calls: std::cell::Cell::new(0),
        }
    }
}

impl RateProvider for FixedProvider {
    fn rate(&self, _base: &str, _quote: &str, _date: NaiveDate) -> Result<f64> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.rate)
    }
}

const POSTAL_TABLE: &str = "code,prefecture,city\n1500001,tokyo,Shibuya\n";

fn company_page(status: &str) -> String {
    format!(
        "<html><body><table>\
         <thead><tr><th>Company name</th><th>Address</th><th>Status</th></tr></thead>\
         <tbody><tr>\
           <td><a href='/companies/acme'>Acme</a></td>\
           <td>〒150-0001 Shibuya, Tokyo</td>\
           <td>{status}</td>\
         </tr></tbody></table></body></html>"
    )
}

#[test]
fn company_crawls_merge_to_latest_enriched_export() {
    let config = AppConfig::default();
    let pipeline = Pipeline::new(config.clone());
    let primary = MemoryStore::new();
    let mirror = MemoryStore::new();
    primary
        .put(&config.storage.postal_key, POSTAL_TABLE.as_bytes())
        .unwrap();

    // Two crawls observe the same company; the June one is current.
    let dir1 = crawl_dir("company", "2023-01-01");
    fs::write(dir1.join("page1.html"), company_page("Under Investigation")).unwrap();
    let stats = pipeline
        .parse_crawl_into(&primary, PageKind::Company, &dir1, None)
        .unwrap();
    assert_eq!((stats.pages, stats.rows, stats.errors), (1, 1, 0));

    let dir2 = crawl_dir("company", "2023-06-01");
    fs::write(
        dir2.join("page1.html"),
        company_page("Survey completed (IPO domestic market)"),
    )
    .unwrap();
    pipeline
        .parse_crawl_into(&primary, PageKind::Company, &dir2, None)
        .unwrap();

    let provider = FixedProvider::new(0.009);
    let stats = pipeline
        .merge_with(PageKind::Company, &primary, &mirror, &provider)
        .unwrap();
    assert_eq!(stats.snapshots, 2);
    assert_eq!(stats.rows, 1);

    let exported = primary.get("exports/companies.csv").unwrap().unwrap();
    let mirrored = mirror.get("companies.csv").unwrap().unwrap();
    assert_eq!(exported, mirrored);

    let rows = loader::csv_to_rows(&exported).unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row["Company name"], "Acme");
    assert_eq!(row["Company url"], "/companies/acme");
    // latest snapshot won, and its status was canonicalized
    assert_eq!(row["Status"], "ipo");
    // geo enrichment from the postal table
    assert_eq!(row["Prefecture"], "Tokyo");
    assert_eq!(row["City"], "Shibuya");
    // stable id attached, crawl stamp stripped
    assert!(!row["Id"].is_empty());
    assert!(!row.contains_key("_timestamp"));
}

#[test]
fn round_merge_converts_amounts_through_rate_cache() {
    let config = AppConfig::default();
    let pipeline = Pipeline::new(config.clone());
    let primary = MemoryStore::new();
    let mirror = MemoryStore::new();

    let page = "<html><body><table>\
        <thead><tr><th>Company Name</th><th>Amount</th><th>Date</th><th>Investors</th></tr></thead>\
        <tbody>\
          <tr><td><a href='/companies/acme/rounds/r1'>Acme</a></td>\
              <td>1,000千円</td><td>March 2021</td>\
              <td><a href='/investors/alpha'>Alpha</a></td></tr>\
          <tr><td><a href='/companies/beta/rounds/r7'>Beta</a></td>\
              <td>金額不明</td><td>April 2021</td><td></td></tr>\
        </tbody></table></body></html>";

    let dir = crawl_dir("round", "2023-06-01");
    fs::write(dir.join("rounds.html"), page).unwrap();
    pipeline
        .parse_crawl_into(&primary, PageKind::Round, &dir, None)
        .unwrap();

    let provider = FixedProvider::new(0.009);
    let stats = pipeline
        .merge_with(PageKind::Round, &primary, &mirror, &provider)
        .unwrap();
    assert_eq!(stats.rows, 2);

    let rows = loader::csv_to_rows(&primary.get("exports/funding_rounds.csv").unwrap().unwrap())
        .unwrap();
    let acme = rows
        .iter()
        .find(|r| r["Round Url"] == "/companies/acme/rounds/r1")
        .unwrap();
    assert_eq!(acme["Company Url"], "/companies/acme");
    assert_eq!(acme["Date"], "2021-03-01");
    assert_eq!(acme["Amount"], "1000000");
    assert_eq!(acme["Amount Usd"], "9000.00");
    assert_eq!(acme["Investor Names"], "Alpha");

    // the unknown-amount sentinel converts to zero without a fetch
    let beta = rows
        .iter()
        .find(|r| r["Round Url"] == "/companies/beta/rounds/r7")
        .unwrap();
    assert_eq!(beta["Amount"], "0");
    assert_eq!(beta["Amount Usd"], "0.00");

    // one fetch for Acme's date, none for the zero amount
    assert_eq!(provider.calls.get(), 1);

    // the fetched rate was persisted back to the cache blob
    let cache = primary.get(&config.storage.forex_key).unwrap().unwrap();
    assert!(String::from_utf8(cache).unwrap().contains("2021-03-01,JPY,USD,0.009"));
}

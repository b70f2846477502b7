//! Pipeline orchestrator: ties extraction → post-processing → merge →
//! enrichment → export together.
//!
//! ## Run modes
//!
//! `parse_crawl()` — per crawl directory: parse every page of one
//!   entity type, post-process into canonical rows, stamp the crawl
//!   time, and store the batch as a snapshot CSV.
//! `merge()` — per entity type: load all stored snapshots, resolve each
//!   natural key to its most recent observation, enrich
//!   (status/geo/date/currency), attach stable ids, and publish the
//!   export to the primary and mirror stores.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::fx::{FxCache, HttpRateProvider, RateProvider};
use crate::loader;
use crate::models::Row;
use crate::normalize::date::{parse_month_date, validate_date_str};
use crate::normalize::geo::{self, PostalTable};
use crate::normalize::{amount, status};
use crate::pages::PageKind;
use crate::process;
use crate::storage::{BlobStore, Exporter, LocalStore};
use crate::utils::record_uuid;

pub struct Pipeline {
    config: AppConfig,
}

#[derive(Debug)]
pub struct ParseStats {
    pub pages: usize,
    pub rows: usize,
    pub errors: usize,
}

#[derive(Debug)]
pub struct MergeStats {
    pub snapshots: usize,
    pub rows: usize,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    // ── Parse one crawl ───────────────────────────────────────────────────────

    pub fn parse_crawl(
        &self,
        kind: PageKind,
        dir: &Path,
        timestamp: Option<&str>,
    ) -> Result<ParseStats> {
        let primary = LocalStore::open(&self.config.storage.primary_root)?;
        self.parse_crawl_into(&primary, kind, dir, timestamp)
    }

    /// Store-injected variant of `parse_crawl`.
    pub fn parse_crawl_into(
        &self,
        primary: &dyn BlobStore,
        kind: PageKind,
        dir: &Path,
        timestamp: Option<&str>,
    ) -> Result<ParseStats> {
        let ts = loader::crawl_timestamp(dir, timestamp)?;
        let files = loader::discover_html_files(dir)?;
        info!("Found {} {} page(s) in {:?}", files.len(), kind.slug(), dir);

        let mut rows: Vec<Row> = Vec::new();
        let mut errors = 0usize;
        for path in &files {
            let html =
                std::fs::read_to_string(path).with_context(|| format!("read {path:?}"))?;
            match kind
                .parse_page(&html)
                .and_then(|batch| kind.post_process(batch))
            {
                Ok(page_rows) => rows.extend(page_rows),
                Err(e) => {
                    warn!("{:?}: {:#}", path, e);
                    errors += 1;
                }
            }
        }

        loader::stamp_rows(&mut rows, ts);
        let key = loader::save_snapshot(
            primary,
            &self.config.pipeline.snapshots_prefix,
            kind.slug(),
            ts,
            &rows,
        )?;
        info!("{}: {} row(s) → {}", kind.slug(), rows.len(), key);

        Ok(ParseStats {
            pages: files.len(),
            rows: rows.len(),
            errors,
        })
    }

    // ── Merge all crawls ──────────────────────────────────────────────────────

    pub fn merge(&self, kind: PageKind) -> Result<MergeStats> {
        let primary = LocalStore::open(&self.config.storage.primary_root)?;
        let mirror = LocalStore::open(&self.config.storage.mirror_root)?;
        let provider = HttpRateProvider::new(&self.config.provider)?;
        self.merge_with(kind, &primary, &mirror, &provider)
    }

    /// Store- and provider-injected variant of `merge`.
    pub fn merge_with(
        &self,
        kind: PageKind,
        primary: &dyn BlobStore,
        mirror: &dyn BlobStore,
        provider: &dyn RateProvider,
    ) -> Result<MergeStats> {
        let snapshots = loader::load_snapshots(
            primary,
            &self.config.pipeline.snapshots_prefix,
            kind.slug(),
        )?;
        let total = snapshots.len();

        let snapshots: Vec<Row> = snapshots
            .into_iter()
            .filter(|row| kind.snapshot_filter(row))
            .collect();
        let mut rows = process::latest_snapshot_wins(snapshots, kind.key_columns())?;

        self.enrich(kind, &mut rows, primary, provider)?;

        for row in rows.iter_mut() {
            let key: Vec<String> = kind
                .key_columns()
                .iter()
                .map(|col| row.get(*col).cloned().unwrap_or_default())
                .collect();
            row.insert(
                "Id".to_string(),
                record_uuid(kind.slug(), &key.join("-")),
            );
        }

        let bytes = loader::rows_to_csv(&rows)?;
        Exporter::new(primary, mirror, &self.config.storage.exports_prefix)
            .publish(kind.export_file(), &bytes)?;
        info!(
            "{}: merged {} snapshot row(s) into {} record(s)",
            kind.slug(),
            total,
            rows.len()
        );

        Ok(MergeStats {
            snapshots: total,
            rows: rows.len(),
        })
    }

    // ── Enrichment ────────────────────────────────────────────────────────────

    fn enrich(
        &self,
        kind: PageKind,
        rows: &mut [Row],
        primary: &dyn BlobStore,
        provider: &dyn RateProvider,
    ) -> Result<()> {
        match kind {
            PageKind::Company => self.enrich_companies(rows, primary),
            PageKind::Round => self.enrich_amounts(rows, primary, provider, "Date", "Amount"),
            PageKind::Acquisition => {
                for row in rows.iter_mut() {
                    let founded = row.get("Founded Date").map(|s| parse_month_date(s));
                    if let Some(canonical) = founded {
                        row.insert("Founded Date".to_string(), canonical);
                    }
                }
                self.enrich_amounts(rows, primary, provider, "Date", "Acquisition amount")
            }
            PageKind::Investor => Ok(()),
        }
    }

    fn enrich_companies(&self, rows: &mut [Row], primary: &dyn BlobStore) -> Result<()> {
        let postal_bytes = primary
            .get(&self.config.storage.postal_key)?
            .with_context(|| {
                format!("postal table '{}' not found", self.config.storage.postal_key)
            })?;
        let postal = PostalTable::from_csv(&postal_bytes)?;

        for row in rows.iter_mut() {
            let mapped = status::map_status(row.get("Status").map(String::as_str))?;
            row.insert("Status".to_string(), mapped.as_str().to_string());

            let addr = row.get("Address").cloned().unwrap_or_default();
            let prefecture = postal
                .prefecture_by_addr(&addr)
                .map(|p| geo::canonical_prefecture(&p))
                .unwrap_or_default();
            let city = postal.city_by_addr(&addr).unwrap_or_default();
            row.insert("Prefecture".to_string(), prefecture);
            row.insert("City".to_string(), city);
        }
        Ok(())
    }

    /// Canonicalize the date column, parse the yen amount, and derive
    /// its USD value through the rate cache. Amounts on this site are
    /// always yen-denominated.
    fn enrich_amounts(
        &self,
        rows: &mut [Row],
        primary: &dyn BlobStore,
        provider: &dyn RateProvider,
        date_col: &str,
        amount_col: &str,
    ) -> Result<()> {
        let mut cache = FxCache::load(primary, &self.config.storage.forex_key)?;

        for row in rows.iter_mut() {
            let canonical_date = parse_month_date(row.get(date_col).map_or("", String::as_str));
            row.insert(date_col.to_string(), canonical_date.clone());

            let yen: Option<i64> = match row.get(amount_col) {
                Some(s) if !s.is_empty() => Some(amount::parse_amount(s)?),
                _ => None,
            };
            if let Some(yen) = yen {
                row.insert(amount_col.to_string(), yen.to_string());
            }

            let date = if validate_date_str(&canonical_date, false) {
                NaiveDate::parse_from_str(&canonical_date, "%Y-%m-%d").ok()
            } else {
                None
            };

            let usd = cache.convert_to_usd(provider, Some("JPY"), date, yen.map(|y| y as f64))?;
            row.insert(
                "Amount Usd".to_string(),
                usd.map(|v| format!("{v:.2}")).unwrap_or_default(),
            );
        }
        Ok(())
    }
}

//! Read-through currency-rate cache.
//!
//! The cache maps (base currency, date) to a USD rate, is loaded in
//! full from the backing blob at start, and is flushed back as a whole
//! blob every time an online fetch adds an entry. Entries are only ever
//! appended, never updated or deleted.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::config::ProviderConfig;
use crate::models::FxRate;
use crate::storage::BlobStore;

#[derive(Debug, Error)]
pub enum FxError {
    #[error("duplicate fx rate for {base}/USD on {date} — cache is corrupt")]
    DuplicateRate { base: String, date: NaiveDate },

    #[error("invalid currency code '{0}'")]
    BadCurrency(String),

    #[error("rate provider returned no {quote} rate for {base} on {date}")]
    MissingRate {
        base: String,
        quote: String,
        date: NaiveDate,
    },
}

// ── Provider ──────────────────────────────────────────────────────────────────

/// External source of truth for exchange rates. One request per
/// (base, quote, date); any non-success response is a hard failure.
pub trait RateProvider {
    fn rate(&self, base: &str, quote: &str, date: NaiveDate) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
struct RateResponse {
    rates: HashMap<String, f64>,
}

/// exchangerate.host-style HTTP provider: `GET {base_url}/{date}` with
/// `base`/`symbols` query parameters.
pub struct HttpRateProvider {
    client: reqwest::blocking::Client,
    base_url: Url,
}

impl HttpRateProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build rate-provider client")?;
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Bad provider base url '{}'", config.base_url))?;
        Ok(Self { client, base_url })
    }
}

impl RateProvider for HttpRateProvider {
    fn rate(&self, base: &str, quote: &str, date: NaiveDate) -> Result<f64> {
        for cur in [base, quote] {
            if cur.len() != 3 || !cur.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(FxError::BadCurrency(cur.to_string()).into());
            }
        }

        let url = self
            .base_url
            .join(&date.to_string())
            .context("Bad provider request url")?;
        let response = self
            .client
            .get(url)
            .query(&[("base", base), ("symbols", quote), ("amount", "1")])
            .send()
            .with_context(|| format!("rate request {base}->{quote} on {date}"))?
            .error_for_status()
            .with_context(|| format!("rate provider rejected {base}->{quote} on {date}"))?;

        let body: RateResponse =
            serde_json::from_slice(&response.bytes().context("rate provider body")?)
                .context("rate provider body is not the expected shape")?;
        body.rates.get(quote).copied().ok_or_else(|| {
            FxError::MissingRate {
                base: base.to_string(),
                quote: quote.to_string(),
                date,
            }
            .into()
        })
    }
}

// ── Cache ─────────────────────────────────────────────────────────────────────

pub struct FxCache<'a> {
    store: &'a dyn BlobStore,
    key: String,
    rows: Vec<FxRate>,
    // (base_cur, date) → rate, USD-quoted rows only
    index: HashMap<(String, NaiveDate), f64>,
}

impl<'a> FxCache<'a> {
    /// Load the whole backing table. A missing blob is an empty cache;
    /// a duplicated (base, date) USD row is corruption and fails here,
    /// where the in-memory index makes it detectable.
    pub fn load(store: &'a dyn BlobStore, key: &str) -> Result<Self> {
        let rows: Vec<FxRate> = match store.get(key)? {
            Some(bytes) => {
                let mut reader = csv::Reader::from_reader(bytes.as_slice());
                reader
                    .deserialize()
                    .collect::<std::result::Result<_, _>>()
                    .with_context(|| format!("parse fx table '{key}'"))?
            }
            None => {
                warn!("fx table '{}' not found, starting empty", key);
                Vec::new()
            }
        };

        let mut index = HashMap::new();
        for row in rows.iter().filter(|r| r.dest_cur == "USD") {
            if index
                .insert((row.base_cur.clone(), row.date), row.rate)
                .is_some()
            {
                return Err(FxError::DuplicateRate {
                    base: row.base_cur.clone(),
                    date: row.date,
                }
                .into());
            }
        }

        Ok(Self {
            store,
            key: key.to_string(),
            rows,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Convert an amount to USD at the rate for its date.
    ///
    /// Missing currency, date or amount yields `None`; a zero amount is
    /// zero without any lookup. The date is clamped to
    /// [1999-02-01, yesterday] before the cache is consulted. On a
    /// miss the provider is asked once and the whole table is flushed
    /// back to the store.
    pub fn convert_to_usd(
        &mut self,
        provider: &dyn RateProvider,
        currency: Option<&str>,
        date: Option<NaiveDate>,
        amount: Option<f64>,
    ) -> Result<Option<f64>> {
        let (Some(currency), Some(date), Some(amount)) = (currency, date, amount) else {
            return Ok(None);
        };
        if amount == 0.0 {
            return Ok(Some(0.0));
        }

        // The provider has no data before 1999-02-01, and same-day
        // rates are unstable.
        let floor = NaiveDate::from_ymd_opt(1999, 2, 1).unwrap();
        let yesterday = Utc::now().date_naive() - chrono::Duration::days(1);
        let date = date.max(floor).min(yesterday);

        let rate = match self.index.get(&(currency.to_string(), date)) {
            Some(rate) => *rate,
            None => {
                info!("missing rate for {} to USD on {}, fetching", currency, date);
                let rate = provider.rate(currency, "USD", date)?;
                self.rows.push(FxRate {
                    date,
                    base_cur: currency.to_string(),
                    dest_cur: "USD".to_string(),
                    rate,
                });
                self.index.insert((currency.to_string(), date), rate);
                self.flush()?;
                rate
            }
        };

        Ok(Some(amount * rate))
    }

    /// Rewrite the entire backing blob — not an incremental append.
    fn flush(&self) -> Result<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in &self.rows {
            writer.serialize(row)?;
        }
        let bytes = writer.into_inner().context("finish fx csv")?;
        self.store
            .put(&self.key, &bytes)
            .with_context(|| format!("flush fx table '{}'", self.key))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::cell::Cell;

    struct CountingProvider {
        rate: f64,
        calls: Cell<usize>,
        last_date: Cell<Option<NaiveDate>>,
    }

    impl CountingProvider {
        fn new(rate: f64) -> Self {
            Self {
                rate,
                calls: Cell::new(0),
                last_date: Cell::new(None),
            }
        }
    }

    impl RateProvider for CountingProvider {
        fn rate(&self, _base: &str, _quote: &str, date: NaiveDate) -> Result<f64> {
            self.calls.set(self.calls.get() + 1);
            self.last_date.set(Some(date));
            Ok(self.rate)
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_missing_inputs_yield_none() {
        let store = MemoryStore::new();
        let mut cache = FxCache::load(&store, "forexrec.csv").unwrap();
        let provider = CountingProvider::new(0.009);
        assert_eq!(
            cache
                .convert_to_usd(&provider, None, Some(date("2020-01-01")), Some(1.0))
                .unwrap(),
            None
        );
        assert_eq!(
            cache
                .convert_to_usd(&provider, Some("JPY"), None, Some(1.0))
                .unwrap(),
            None
        );
        assert_eq!(provider.calls.get(), 0);
    }

    #[test]
    fn test_zero_amount_skips_lookup() {
        let store = MemoryStore::new();
        let mut cache = FxCache::load(&store, "forexrec.csv").unwrap();
        let provider = CountingProvider::new(0.009);
        assert_eq!(
            cache
                .convert_to_usd(&provider, Some("JPY"), Some(date("2020-01-01")), Some(0.0))
                .unwrap(),
            Some(0.0)
        );
        assert_eq!(provider.calls.get(), 0);
    }

    #[test]
    fn test_repeated_conversion_fetches_once() {
        let store = MemoryStore::new();
        let mut cache = FxCache::load(&store, "forexrec.csv").unwrap();
        let provider = CountingProvider::new(0.009);
        for _ in 0..3 {
            let usd = cache
                .convert_to_usd(&provider, Some("JPY"), Some(date("2020-01-01")), Some(1000.0))
                .unwrap();
            assert_eq!(usd, Some(9.0));
        }
        assert_eq!(provider.calls.get(), 1);
    }

    #[test]
    fn test_future_date_clamps_to_yesterday() {
        let store = MemoryStore::new();
        let mut cache = FxCache::load(&store, "forexrec.csv").unwrap();
        let provider = CountingProvider::new(1.1);
        cache
            .convert_to_usd(&provider, Some("EUR"), Some(date("2030-01-01")), Some(1.0))
            .unwrap();
        let yesterday = Utc::now().date_naive() - chrono::Duration::days(1);
        assert_eq!(provider.last_date.get(), Some(yesterday));
    }

    #[test]
    fn test_ancient_date_clamps_to_floor() {
        let store = MemoryStore::new();
        let mut cache = FxCache::load(&store, "forexrec.csv").unwrap();
        let provider = CountingProvider::new(1.1);
        cache
            .convert_to_usd(&provider, Some("DEM"), Some(date("1980-01-01")), Some(1.0))
            .unwrap();
        assert_eq!(provider.last_date.get(), Some(date("1999-02-01")));
    }

    #[test]
    fn test_miss_flushes_whole_table() {
        let store = MemoryStore::new();
        store
            .put(
                "forexrec.csv",
                b"date,base_cur,dest_cur,rate\n2019-01-01,JPY,USD,0.0091\n",
            )
            .unwrap();
        let mut cache = FxCache::load(&store, "forexrec.csv").unwrap();
        assert_eq!(cache.len(), 1);

        let provider = CountingProvider::new(0.009);
        cache
            .convert_to_usd(&provider, Some("JPY"), Some(date("2020-01-01")), Some(1.0))
            .unwrap();

        let flushed = String::from_utf8(store.get("forexrec.csv").unwrap().unwrap()).unwrap();
        assert!(flushed.contains("2019-01-01,JPY,USD,0.0091"));
        assert!(flushed.contains("2020-01-01,JPY,USD,0.009"));
    }

    #[test]
    fn test_duplicate_row_is_corruption() {
        let store = MemoryStore::new();
        store
            .put(
                "forexrec.csv",
                b"date,base_cur,dest_cur,rate\n2019-01-01,JPY,USD,0.0091\n2019-01-01,JPY,USD,0.0092\n",
            )
            .unwrap();
        assert!(FxCache::load(&store, "forexrec.csv").is_err());
    }
}

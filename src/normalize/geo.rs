//! Address → prefecture/city via the postal-code gazetteer.
//!
//! Lookups never raise: an address without a `DDD-DDDD` postal code, or
//! a code absent from the reference table, degrades to `None`.

use std::collections::HashMap;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::utils::capitalize;

static POSTAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{3}-\d{4})\b").unwrap());

/// Pull the first `DDD-DDDD` postal code out of an address string.
pub fn extract_postal(addr: &str) -> Option<String> {
    POSTAL_RE
        .captures(addr)
        .map(|caps| caps[1].to_string())
}

// ── Reference table ───────────────────────────────────────────────────────────

/// The postal-code → geography reference table, loaded fully into
/// memory at start and injected into whatever needs it.
pub struct PostalTable {
    by_code: HashMap<u32, (String, String)>,
}

impl PostalTable {
    /// Read the gazetteer CSV. Expected columns: `code`, `prefecture`,
    /// `city` (extra columns ignored). A duplicated code keeps its
    /// first row.
    pub fn from_csv(bytes: &[u8]) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(bytes);
        let headers = reader.headers()?.clone();
        let idx = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .with_context(|| format!("postal table is missing the '{name}' column"))
        };
        let (code_i, pref_i, city_i) = (idx("code")?, idx("prefecture")?, idx("city")?);

        let mut by_code = HashMap::new();
        for record in reader.records() {
            let record = record?;
            let code: u32 = record
                .get(code_i)
                .unwrap_or_default()
                .trim()
                .parse()
                .with_context(|| format!("bad postal code row: {record:?}"))?;
            by_code.entry(code).or_insert_with(|| {
                (
                    record.get(pref_i).unwrap_or_default().to_string(),
                    record.get(city_i).unwrap_or_default().to_string(),
                )
            });
        }
        Ok(Self { by_code })
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Prefecture for an address, capitalized display form.
    pub fn prefecture_by_addr(&self, addr: &str) -> Option<String> {
        self.lookup(addr).map(|(pref, _)| capitalize(pref))
    }

    /// City for an address, as stored in the table.
    pub fn city_by_addr(&self, addr: &str) -> Option<String> {
        self.lookup(addr).map(|(_, city)| city.to_string())
    }

    fn lookup(&self, addr: &str) -> Option<(&str, &str)> {
        let postal = extract_postal(addr)?;
        let code: u32 = postal.replace('-', "").parse().ok()?;
        self.by_code
            .get(&code)
            .map(|(p, c)| (p.as_str(), c.as_str()))
    }
}

// ── Prefecture display names ──────────────────────────────────────────────────

static PREFECTURE_MAP: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("東京都", "Tokyo"),
        ("大阪府", "Osaka"),
        ("神奈川県", "Kanagawa"),
        ("京都府", "Kyoto"),
        ("愛知県", "Aichi"),
        ("兵庫県", "Hyogo"),
        ("千葉県", "Chiba"),
        ("熊本県", "Kumamoto"),
        ("新潟県", "Niigata"),
        ("大分県", "Oita"),
        ("沖縄県", "Okinawa"),
        ("福井県", "Fukui"),
        ("北海道", "Hokkaido"),
        ("宮城県", "Miyagi"),
        ("岡山県", "Okayama"),
    ])
});

/// Canonicalize a mixed Japanese/English prefecture value to its fixed
/// English display form: lowercase, strip a "prefecture" suffix, trim,
/// capitalize, then map Japanese names through the table. Values the
/// table does not know pass through cleaned but otherwise unchanged.
pub fn canonical_prefecture(name: &str) -> String {
    let cleaned = capitalize(name.to_lowercase().replace("prefecture", "").trim());
    PREFECTURE_MAP
        .get(cleaned.as_str())
        .map(|s| s.to_string())
        .unwrap_or(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "code,prefecture,city\n1500001,tokyo,Shibuya\n5300001,osaka,Kita\n";

    #[test]
    fn test_extract_postal() {
        assert_eq!(extract_postal("Tokyo, 150-0001").as_deref(), Some("150-0001"));
        assert_eq!(extract_postal("no postal here"), None);
    }

    #[test]
    fn test_lookup_by_address() {
        let table = PostalTable::from_csv(TABLE.as_bytes()).unwrap();
        assert_eq!(
            table.prefecture_by_addr("〒150-0001 Shibuya, Tokyo").as_deref(),
            Some("Tokyo")
        );
        assert_eq!(table.city_by_addr("150-0001").as_deref(), Some("Shibuya"));
    }

    #[test]
    fn test_no_postal_means_none_from_both_lookups() {
        let table = PostalTable::from_csv(TABLE.as_bytes()).unwrap();
        assert_eq!(table.prefecture_by_addr("Somewhere in Kyoto"), None);
        assert_eq!(table.city_by_addr("Somewhere in Kyoto"), None);
    }

    #[test]
    fn test_unknown_code_means_none() {
        let table = PostalTable::from_csv(TABLE.as_bytes()).unwrap();
        assert_eq!(table.prefecture_by_addr("999-9999"), None);
    }

    #[test]
    fn test_canonical_prefecture() {
        assert_eq!(canonical_prefecture("東京都"), "Tokyo");
        assert_eq!(canonical_prefecture("Osaka Prefecture"), "Osaka");
        assert_eq!(canonical_prefecture("TOKYO"), "Tokyo");
        assert_eq!(canonical_prefecture("Atlantis"), "Atlantis");
    }
}

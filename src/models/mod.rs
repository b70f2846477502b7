use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ── Cell content ──────────────────────────────────────────────────────────────

/// A link pulled out of a cell: anchor text plus the raw `href`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub name: String,
    pub url: String,
}

/// Raw cell content as extracted from the DOM.
///
/// Whether a cell is text- or anchor-valued is decided by the declared
/// anchor-column set, never by what the cell happens to contain — an
/// anchor-declared cell with no links is an empty `Anchors` list.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(Vec<String>),
    Anchors(Vec<Anchor>),
}

impl Value {
    pub fn len(&self) -> usize {
        match self {
            Value::Text(v) => v.len(),
            Value::Anchors(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cell content after the batch-wide singleton collapse.
///
/// Columns whose lists never exceed one element across the whole batch
/// become `Text`/`Anchor` scalars; everything else keeps its list form.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Text(String),
    Anchor(Anchor),
    TextList(Vec<String>),
    Anchors(Vec<Anchor>),
}

// ── Records ───────────────────────────────────────────────────────────────────

/// One parsed table row or definition-list card, columns in header order.
pub type Record = IndexMap<String, Value>;

/// A record mid-way through post-processing: collapsed but not yet flat.
pub type Collapsed = IndexMap<String, Field>;

/// Canonical flat record: column name → scalar string. No raw anchors
/// survive into a `Row`; they are split into `… Name` / `… Url` columns.
pub type Row = IndexMap<String, String>;

/// Column carrying the crawl time on snapshot rows (`%Y-%m-%d %H:%M:%S`).
pub const TIMESTAMP_COL: &str = "_timestamp";

// ── Currency rates ────────────────────────────────────────────────────────────

/// One row of the durable exchange-rate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxRate {
    pub date: NaiveDate,
    pub base_cur: String,
    pub dest_cur: String,
    pub rate: f64,
}

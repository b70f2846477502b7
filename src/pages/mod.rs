//! Page-type dispatch.
//!
//! The four source-page shapes form a closed variant set selected by an
//! explicit tag — never by sniffing the DOM — so the converter and
//! post-processor stay generic and testable on their own.

pub mod acquisition;
pub mod company;
pub mod investor;
pub mod round;

use anyhow::Result;
use clap::ValueEnum;

use crate::models::{Record, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PageKind {
    Company,
    Round,
    Investor,
    Acquisition,
}

impl PageKind {
    /// Raw HTML → ordered record batch.
    pub fn parse_page(&self, html: &str) -> Result<Vec<Record>> {
        match self {
            PageKind::Company => company::parse(html),
            PageKind::Round => round::parse(html),
            PageKind::Investor => investor::parse(html),
            PageKind::Acquisition => acquisition::parse(html),
        }
    }

    /// Record batch → canonical rows (collapse, derive, dedup).
    pub fn post_process(&self, batch: Vec<Record>) -> Result<Vec<Row>> {
        match self {
            PageKind::Company => company::post_process(batch),
            PageKind::Round => round::post_process(batch),
            PageKind::Investor => investor::post_process(batch),
            PageKind::Acquisition => acquisition::post_process(batch),
        }
    }

    /// Natural key identifying one logical entity across crawls.
    pub fn key_columns(&self) -> &'static [&'static str] {
        match self {
            PageKind::Company => &["Company url"],
            PageKind::Round => &["Round Url"],
            PageKind::Investor => &["Investor Url"],
            PageKind::Acquisition => &["Startup Url", "Acquirer Url", "Date"],
        }
    }

    /// Structural validity filter applied to loaded snapshots before
    /// the latest-wins merge.
    pub fn snapshot_filter(&self, row: &Row) -> bool {
        match self {
            PageKind::Acquisition => row.get("Acquirer Url").is_some_and(|v| !v.is_empty()),
            _ => true,
        }
    }

    pub fn export_file(&self) -> &'static str {
        match self {
            PageKind::Company => "companies.csv",
            PageKind::Round => "funding_rounds.csv",
            PageKind::Investor => "investors.csv",
            PageKind::Acquisition => "acquisitions.csv",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            PageKind::Company => "company",
            PageKind::Round => "round",
            PageKind::Investor => "investor",
            PageKind::Acquisition => "acquisition",
        }
    }
}

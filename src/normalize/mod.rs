//! Site-vocabulary normalizers.
//!
//! Status and amount mapping are strict: an unrecognized phrase is a
//! hard error, the system refuses to guess. Date and geo lookups are
//! deliberately lenient and degrade to empty/`None`. The asymmetry is a
//! design choice, not an oversight.

pub mod amount;
pub mod date;
pub mod geo;
pub mod status;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("unrecognized company status: '{0}'")]
    UnknownStatus(String),

    #[error("unrecognized amount format: '{0}'")]
    BadAmount(String),

    #[error("invalid timestamp '{0}', expected %Y-%m-%d %H:%M:%S")]
    BadTimestamp(String),
}

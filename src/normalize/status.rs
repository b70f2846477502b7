//! Company survey-status vocabulary → canonical status.
//!
//! The source site reports statuses in a mix of English and Japanese
//! phrasings. The mapping is a closed table; a phrase outside it aborts
//! the batch rather than defaulting.

use std::collections::HashMap;
use std::sync::LazyLock;

use super::NormalizeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Operating,
    Closed,
    Acquired,
    Ipo,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Operating => "operating",
            Status::Closed => "closed",
            Status::Acquired => "acquired",
            Status::Ipo => "ipo",
        }
    }
}

static STATUS_MAP: LazyLock<HashMap<&'static str, Status>> = LazyLock::new(|| {
    use Status::*;
    HashMap::from([
        ("Under Investigation", Operating),
        ("", Operating),
        ("Preparation (company registration only)", Operating),
        ("Unable to investigate (for reasons such as inability to access HP)", Operating),
        ("Survey completed (other reasons)", Closed),
        ("Survey completed (dissolution)", Closed),
        ("Survey completed (subsidiary of listed company)", Acquired),
        ("Survey completed (IPO domestic market)", Ipo),
        ("Not subject to investigation (other reasons)", Closed),
        ("Survey completed (merger)", Acquired),
        ("Survey completed (disappeared)", Closed),
        ("Not subject to survey (wholly owned subsidiary of listed company)", Acquired),
        ("調査継続", Operating),
        ("Under Investigation (energetic small and medium-sized enterprises)", Operating),
        ("Survey completed (acquisition)", Acquired),
        ("Survey completed (company dissolved due to business transfer)", Acquired),
        ("未評価(会社登録のみ)", Operating),
        ("Survey completed (consolidated merger)", Acquired),
        ("調査終了(その他の事由)", Closed),
        ("Not subject to survey (Overseas VB)", Acquired),
        ("Survey completed (IPO overseas market)", Ipo),
        ("調査不能(HPアクセス不能などの事由)", Operating),
        ("調査終了(上場企業の子会社化)", Acquired),
    ])
});

/// Map a raw status phrase to its canonical status. A missing value is
/// an operating company; an unknown phrase is a hard error naming it.
pub fn map_status(status: Option<&str>) -> Result<Status, NormalizeError> {
    match status {
        None => Ok(Status::Operating),
        Some(s) => STATUS_MAP
            .get(s)
            .copied()
            .ok_or_else(|| NormalizeError::UnknownStatus(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_status_is_operating() {
        assert_eq!(map_status(None).unwrap(), Status::Operating);
        assert_eq!(map_status(Some("")).unwrap(), Status::Operating);
    }

    #[test]
    fn test_known_phrases() {
        assert_eq!(
            map_status(Some("Survey completed (IPO domestic market)")).unwrap(),
            Status::Ipo
        );
        assert_eq!(map_status(Some("調査終了(上場企業の子会社化)")).unwrap(), Status::Acquired);
        assert_eq!(map_status(Some("Survey completed (dissolution)")).unwrap(), Status::Closed);
    }

    #[test]
    fn test_unknown_phrase_is_hard_error() {
        let err = map_status(Some("unknown phrase")).unwrap_err();
        assert!(err.to_string().contains("unknown phrase"));
    }
}

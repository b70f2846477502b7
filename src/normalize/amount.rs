//! Funding-amount strings → yen.
//!
//! Amounts arrive unit-suffixed ("1,000千円", "5,000,000 yen") or as the
//! site's unknown-amount sentinel. Any other unit is a hard error.

use super::NormalizeError;

/// Parse a unit-suffixed amount string into yen.
///
/// "1,000千円" → 1_000_000 | "2,500 thousand yen" → 2_500_000 |
/// "金額不明" → 0. Thousands separators are stripped before parsing.
pub fn parse_amount(raw: &str) -> Result<i64, NormalizeError> {
    let s = raw.trim();

    if s == "金額不明" || s.eq_ignore_ascii_case("amount unknown") {
        return Ok(0);
    }

    let (digits, multiplier) = if let Some(p) = s.strip_suffix("千円") {
        (p, 1000)
    } else if let Some(p) = strip_suffix_ci(s, "thousand yen") {
        (p, 1000)
    } else if let Some(p) = s.strip_suffix("円") {
        (p, 1)
    } else if let Some(p) = strip_suffix_ci(s, "yen") {
        (p, 1)
    } else {
        return Err(NormalizeError::BadAmount(raw.to_string()));
    };

    let n: i64 = digits
        .trim()
        .replace(',', "")
        .parse()
        .map_err(|_| NormalizeError::BadAmount(raw.to_string()))?;
    Ok(n * multiplier)
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    if s.is_char_boundary(split) && s[split..].eq_ignore_ascii_case(suffix) {
        Some(&s[..split])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thousand_yen_suffix() {
        assert_eq!(parse_amount("1,000千円").unwrap(), 1_000_000);
        assert_eq!(parse_amount("2,500 thousand yen").unwrap(), 2_500_000);
    }

    #[test]
    fn test_plain_yen_suffix() {
        assert_eq!(parse_amount("5,000,000円").unwrap(), 5_000_000);
        assert_eq!(parse_amount("300 yen").unwrap(), 300);
    }

    #[test]
    fn test_unknown_amount_sentinel() {
        assert_eq!(parse_amount("金額不明").unwrap(), 0);
        assert_eq!(parse_amount("amount unknown").unwrap(), 0);
    }

    #[test]
    fn test_foreign_unit_is_hard_error() {
        assert!(parse_amount("5 dollars").is_err());
        assert!(parse_amount("1000").is_err());
    }
}

//! Surface patterns for markers and significance values.
//!
//! Shared by the rule-based entity recognizer and the table column
//! classifier, so both agree on what an rsID or a p-value looks like.

use regex::Regex;
use std::sync::OnceLock;

fn rsid_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\brs[0-9]+\b").unwrap())
}

fn rsid_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^rs[0-9]+$").unwrap())
}

fn integer_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]+$").unwrap())
}

fn p_value_regexes() -> &'static [Regex; 3] {
    static RE: OnceLock<[Regex; 3]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            // 2.3×10-8, 1.2x10-5(2), 4*10^-6
            Regex::new(r"\d(?:\.\d+)?\s*[×xX*]\s*\d+\s*\^?\s*[-−–]\s*\d+(?:\(\d\))?").unwrap(),
            // 1e-5, 2.3E-08
            Regex::new(r"\d(?:\.\d+)?\s*[eE]\s*[-−–]\s*\d+").unwrap(),
            // trailing decimal: 0.003, P = 0.04
            Regex::new(r"\d\.\d+\s*$").unwrap(),
        ]
    })
}

fn p_value_parts_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(\d+(?:\.\d+)?)\s*(?:[×xX*]\s*10\s*\^?\s*([-−–+]?)\s*(\d+)|[eE]\s*([-−–+]?)\s*(\d+))?",
        )
        .unwrap()
    })
}

/// Text contains an rsID anywhere (`rs[0-9]+`).
pub fn is_rsid(text: &str) -> bool {
    rsid_regex().is_match(text)
}

/// Text is exactly one rsID token.
pub fn is_rsid_token(text: &str) -> bool {
    rsid_token_regex().is_match(text.trim())
}

pub fn is_integer(text: &str) -> bool {
    integer_regex().is_match(text.trim())
}

/// Scientific-notation-like or trailing-decimal significance value.
pub fn is_p_value(text: &str) -> bool {
    let text = text.trim();
    p_value_regexes().iter().any(|re| re.is_match(text))
}

/// Numeric value of a p-value string, if it can be read.
///
/// Leading qualifiers (`P =`, `<`, `≤`) are ignored.
pub fn parse_p_value(text: &str) -> Option<f64> {
    let caps = p_value_parts_regex().captures(text)?;
    let mantissa: f64 = caps.get(1)?.as_str().parse().ok()?;

    let exponent = match (caps.get(3), caps.get(5)) {
        (Some(exp), _) => signed_exponent(caps.get(2).map(|m| m.as_str()), exp.as_str())?,
        (None, Some(exp)) => signed_exponent(caps.get(4).map(|m| m.as_str()), exp.as_str())?,
        (None, None) => 0,
    };

    Some(mantissa * 10f64.powi(exponent))
}

fn signed_exponent(sign: Option<&str>, digits: &str) -> Option<i32> {
    let value: i32 = digits.parse().ok()?;
    match sign {
        Some("-") | Some("−") | Some("–") => Some(-value),
        _ => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsid_patterns() {
        assert!(is_rsid("rs1801133"));
        assert!(is_rsid("rs123 (A/G)"));
        assert!(!is_rsid("chr1:12345"));
        assert!(is_rsid_token("RS42"));
        assert!(!is_rsid_token("rs42a"));
    }

    #[test]
    fn test_p_value_patterns() {
        assert!(is_p_value("2.3×10-8"));
        assert!(is_p_value("1.2x10-5(2)"));
        assert!(is_p_value("1e-5"));
        assert!(is_p_value("0.003"));
        assert!(!is_p_value("ObesityRisk"));
        assert!(!is_p_value("12"));
    }

    #[test]
    fn test_parse_p_value() {
        let close = |a: f64, b: f64| (a - b).abs() < b.abs() * 1e-9;
        assert!(close(parse_p_value("2.3×10-8").unwrap(), 2.3e-8));
        assert!(close(parse_p_value("5.0E-08").unwrap(), 5.0e-8));
        assert!(close(parse_p_value("P = 0.003").unwrap(), 0.003));
        assert!(close(parse_p_value("<0.05").unwrap(), 0.05));
        assert!(close(parse_p_value("4 x 10^-6").unwrap(), 4e-6));
        assert_eq!(parse_p_value("n.s."), None);
    }
}

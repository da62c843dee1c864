//! Strict parsing of comma-grouped numeric cell text.
//!
//! Only ASCII digits, commas and periods are accepted. Commas are thousands
//! separators and are dropped before parsing; anything else (signs, exponents,
//! currency symbols, "N/A") is an error rather than a default.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ExtractCause;

static NUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9.,]+$").unwrap());

fn normalize(raw: &str) -> Result<String, ExtractCause> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ExtractCause::Empty);
    }
    if !NUMERIC_RE.is_match(text) {
        return Err(ExtractCause::InvalidCharacters);
    }
    Ok(text.replace(',', ""))
}

/// `"1,234,567"` → `1234567`. Result is always non-negative.
pub fn parse_integer(raw: &str) -> Result<i64, ExtractCause> {
    let digits = normalize(raw)?;
    Ok(digits.parse::<i64>()?)
}

/// `"1,012.50"` → `1012.5`, narrowed to single precision.
pub fn parse_decimal(raw: &str) -> Result<f32, ExtractCause> {
    let digits = normalize(raw)?;
    let wide = digits.parse::<f64>()?;
    let narrow = wide as f32;
    if !narrow.is_finite() {
        return Err(ExtractCause::OutOfRange);
    }
    Ok(narrow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_with_thousands() {
        assert_eq!(parse_integer("1,234,567").unwrap(), 1_234_567);
        assert_eq!(parse_integer(" 500 ").unwrap(), 500);
        assert_eq!(parse_integer("0").unwrap(), 0);
    }

    #[test]
    fn integer_rejects_text() {
        assert!(matches!(parse_integer("N/A"), Err(ExtractCause::InvalidCharacters)));
        assert!(matches!(parse_integer("-5"), Err(ExtractCause::InvalidCharacters)));
        assert!(matches!(parse_integer("+5"), Err(ExtractCause::InvalidCharacters)));
        assert!(matches!(parse_integer(""), Err(ExtractCause::Empty)));
        assert!(matches!(parse_integer("   "), Err(ExtractCause::Empty)));
    }

    #[test]
    fn integer_rejects_decimal_point() {
        assert!(matches!(parse_integer("12.5"), Err(ExtractCause::InvalidInteger(_))));
    }

    #[test]
    fn integer_overflow() {
        assert!(matches!(
            parse_integer("9,223,372,036,854,775,808"),
            Err(ExtractCause::InvalidInteger(_))
        ));
        assert_eq!(
            parse_integer("9,223,372,036,854,775,807").unwrap(),
            i64::MAX
        );
    }

    #[test]
    fn decimal_values() {
        assert_eq!(parse_decimal("12.50").unwrap(), 12.5_f32);
        assert_eq!(parse_decimal("1,012.75").unwrap(), 1012.75_f32);
        assert_eq!(parse_decimal("20").unwrap(), 20.0_f32);
    }

    #[test]
    fn decimal_rejects_exponent_and_words() {
        assert!(matches!(parse_decimal("1e5"), Err(ExtractCause::InvalidCharacters)));
        assert!(matches!(parse_decimal("inf"), Err(ExtractCause::InvalidCharacters)));
        assert!(matches!(parse_decimal("R12.50"), Err(ExtractCause::InvalidCharacters)));
        assert!(matches!(parse_decimal("1.2.3"), Err(ExtractCause::InvalidDecimal(_))));
        assert!(matches!(parse_decimal(""), Err(ExtractCause::Empty)));
    }

    #[test]
    fn decimal_out_of_f32_range() {
        let huge = format!("1{}", "0".repeat(40));
        assert!(matches!(parse_decimal(&huge), Err(ExtractCause::OutOfRange)));
    }
}

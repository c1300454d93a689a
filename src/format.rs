//! Presentation-boundary formatting for integer minor-unit money.
//!
//! Money is `i64` cents everywhere internally; this module is the only
//! place a cents value is turned into a human-facing string.

/// Format cents as a signed decimal string with a currency-agnostic "$"
/// prefix, e.g. `-123456` -> `"-$1,234.56"`.
pub fn format_cents(cents: i64) -> String {
    let negative = cents < 0;
    let abs = cents.unsigned_abs();
    let whole = abs / 100;
    let frac = abs % 100;

    let whole_str = whole.to_string();
    let with_separators: String = whole_str
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| std::str::from_utf8(chunk).unwrap())
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "{}${}.{:02}",
        if negative { "-" } else { "" },
        with_separators,
        frac
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_small_positive_values() {
        assert_eq!(format_cents(0), "$0.00");
        assert_eq!(format_cents(1), "$0.01");
        assert_eq!(format_cents(12345), "$123.45");
    }

    #[test]
    fn formats_with_thousands_separators() {
        assert_eq!(format_cents(123_456_789), "$1,234,567.89");
    }

    #[test]
    fn formats_negative_values() {
        assert_eq!(format_cents(-80000), "-$800.00");
    }
}

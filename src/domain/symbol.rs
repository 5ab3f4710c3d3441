//! Ticker symbol validation.

use crate::domain::error::AnalyticsError;

/// Validate a ticker symbol against `[A-Z0-9.-]+`.
///
/// Symbols are not case-folded here; callers that accept user input upper-case
/// it first.
pub fn validate_symbol(symbol: &str) -> Result<&str, AnalyticsError> {
    let valid = !symbol.is_empty()
        && symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '-');
    if valid {
        Ok(symbol)
    } else {
        Err(AnalyticsError::InvalidSymbol {
            symbol: symbol.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_tickers() {
        for s in ["AAPL", "BRK.B", "BF-B", "7203.T", "RELIANCE.NS"] {
            assert_eq!(validate_symbol(s).unwrap(), s);
        }
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(
            validate_symbol(""),
            Err(AnalyticsError::InvalidSymbol { .. })
        ));
    }

    #[test]
    fn rejects_lowercase_and_punctuation() {
        for s in ["aapl", "AA PL", "^GSPC", "AAPL/", "EUR=X"] {
            assert!(validate_symbol(s).is_err(), "{s} should be rejected");
        }
    }
}

//! Exact conversion of USD prices to stablecoin base units.
//!
//! Prices are authored as decimal strings (`"0.002"`, `"1.50"`) to keep the
//! service catalog human-editable; everything past that boundary is integer
//! arithmetic over [`alloy_primitives::U256`]. No floats are used anywhere in
//! this conversion — on-chain amounts are opaque big integers, never lossy
//! floating point.

use alloy_primitives::U256;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecimalError {
    #[error("empty price string")]
    Empty,
    #[error("price has more than one decimal point: {0:?}")]
    MultipleDecimalPoints(String),
    #[error("price contains a non-digit character: {0:?}")]
    NonDigit(String),
    #[error("price is negative")]
    Negative,
}

/// Converts a decimal USD price string into base units of a stablecoin with
/// `decimals` decimal places.
///
/// `"1.50"` at 6 decimals becomes `1_500_000`. `"0.000001"` at 6 decimals becomes `1`.
/// Fractional digits beyond `decimals` are truncated rather than rejected (`"1.0000001"`
/// at 6 decimals becomes `1_000_000`), matching how the wallets on the other end of
/// these rails truncate sub-unit precision instead of erroring on it.
pub fn price_to_base_units(price: &str, decimals: u8) -> Result<U256, DecimalError> {
    let price = price.trim();
    if price.is_empty() {
        return Err(DecimalError::Empty);
    }
    let price = price.strip_prefix('$').unwrap_or(price);
    let price = price.strip_prefix('+').unwrap_or(price);
    if let Some(rest) = price.strip_prefix('-') {
        if rest.chars().any(|c| c.is_ascii_digit()) {
            return Err(DecimalError::Negative);
        }
    }

    let mut parts = price.splitn(2, '.');
    let integer_part = parts.next().unwrap_or("");
    let fractional_part = parts.next();

    if price.matches('.').count() > 1 {
        return Err(DecimalError::MultipleDecimalPoints(price.to_string()));
    }

    let integer_part = if integer_part.is_empty() {
        "0"
    } else {
        integer_part
    };
    if !integer_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(DecimalError::NonDigit(price.to_string()));
    }

    let fractional_part = fractional_part.unwrap_or("");
    if !fractional_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(DecimalError::NonDigit(price.to_string()));
    }
    let fractional_part = if fractional_part.len() > decimals as usize {
        &fractional_part[..decimals as usize]
    } else {
        fractional_part
    };

    let padded_fraction = format!(
        "{fractional_part:0<width$}",
        width = decimals as usize
    );
    let digits = format!("{integer_part}{padded_fraction}");
    let digits = digits.trim_start_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };

    U256::from_str_radix(digits, 10).map_err(|_| DecimalError::NonDigit(price.to_string()))
}

/// Formats base units back into a decimal string, for display/logging only.
/// Not used on the verification hot path, which compares `U256` directly.
pub fn base_units_to_price(amount: U256, decimals: u8) -> String {
    let digits = amount.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }
    if digits.len() <= decimals {
        let padded = format!("{digits:0>width$}", width = decimals);
        format!("0.{padded}")
    } else {
        let split = digits.len() - decimals;
        format!("{}.{}", &digits[..split], &digits[split..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_dollar_amount() {
        assert_eq!(
            price_to_base_units("1", 6).unwrap(),
            U256::from(1_000_000u64)
        );
    }

    #[test]
    fn fractional_amount_at_full_precision() {
        assert_eq!(
            price_to_base_units("1.50", 6).unwrap(),
            U256::from(1_500_000u64)
        );
    }

    #[test]
    fn smallest_unit() {
        assert_eq!(
            price_to_base_units("0.000001", 6).unwrap(),
            U256::from(1u64)
        );
    }

    #[test]
    fn leading_dot_is_accepted() {
        assert_eq!(price_to_base_units(".5", 6).unwrap(), U256::from(500_000u64));
    }

    #[test]
    fn eighteen_decimals() {
        assert_eq!(
            price_to_base_units("0.002", 18).unwrap(),
            U256::from(2_000_000_000_000_000u64)
        );
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(price_to_base_units("", 6), Err(DecimalError::Empty));
    }

    #[test]
    fn truncates_excess_fractional_digits() {
        assert_eq!(
            price_to_base_units("1.0000001", 6).unwrap(),
            U256::from(1_000_000u64)
        );
    }

    #[test]
    fn rejects_non_digit() {
        assert!(matches!(
            price_to_base_units("1.5e3", 6),
            Err(DecimalError::NonDigit(_))
        ));
    }

    #[test]
    fn rejects_multiple_dots() {
        assert!(matches!(
            price_to_base_units("1.5.0", 6),
            Err(DecimalError::MultipleDecimalPoints(_))
        ));
    }

    #[test]
    fn rejects_negative() {
        assert_eq!(price_to_base_units("-1", 6), Err(DecimalError::Negative));
    }

    #[test]
    fn strips_leading_dollar_sign() {
        assert_eq!(
            price_to_base_units("$1.50", 6).unwrap(),
            U256::from(1_500_000u64)
        );
    }

    #[test]
    fn round_trips_through_display() {
        let amount = price_to_base_units("12.345", 6).unwrap();
        assert_eq!(base_units_to_price(amount, 6), "12.345000");
    }
}

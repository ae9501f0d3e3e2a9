//! Ledger primitives - monetary amount validation and formatting.
//!
//! Amounts are `rust_decimal::Decimal` everywhere so that sums of expenses compare
//! exactly against face amounts. Currency values carry at most two decimal places.

use crate::errors::{Error, Result};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

/// Number of decimal places a currency amount may carry.
pub const CURRENCY_SCALE: u32 = 2;

/// Accepts zero or positive amounts with at most two decimal places.
pub fn ensure_non_negative(amount: Decimal) -> Result<Decimal> {
    if amount < Decimal::ZERO || amount.scale() > CURRENCY_SCALE {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(amount)
}

/// Accepts strictly positive amounts with at most two decimal places.
pub fn ensure_positive(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }
    ensure_non_negative(amount)
}

/// Sums a sequence of amounts.
pub fn total<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().sum()
}

/// Formats an amount with two decimal places and thousands separators, e.g. `-1,234.50`.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp(CURRENCY_SCALE);
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded < Decimal::ZERO { "-" } else { "" };
    format!("{sign}{grouped}.{fraction}")
}

/// Today's date in UTC, the date stamped on settlements.
#[must_use]
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ensure_non_negative() {
        assert!(ensure_non_negative(dec!(0)).is_ok());
        assert!(ensure_non_negative(dec!(1000.50)).is_ok());
        assert!(matches!(
            ensure_non_negative(dec!(-0.01)),
            Err(Error::InvalidAmount { .. })
        ));
        assert!(matches!(
            ensure_non_negative(dec!(1.005)),
            Err(Error::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_ensure_positive() {
        assert!(ensure_positive(dec!(0.01)).is_ok());
        assert!(matches!(
            ensure_positive(Decimal::ZERO),
            Err(Error::InvalidAmount { amount }) if amount == Decimal::ZERO
        ));
        assert!(ensure_positive(dec!(-5)).is_err());
    }

    #[test]
    fn test_total() {
        assert_eq!(total([dec!(100), dec!(250.50), dec!(0.25)]), dec!(350.75));
        assert_eq!(total(Vec::new()), Decimal::ZERO);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec!(0)), "0.00");
        assert_eq!(format_amount(dec!(1000)), "1,000.00");
        assert_eq!(format_amount(dec!(1234567.5)), "1,234,567.50");
        assert_eq!(format_amount(dec!(-200)), "-200.00");
        assert_eq!(format_amount(dec!(999.999)), "1,000.00");
    }
}

//! Money and quantity helpers.
//!
//! Amounts are integer minor units (two decimal places). Quantities are
//! [`Decimal`] so fractional units of measure (kg, litre) are exact.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{DomainError, DomainResult};

/// Decimal places kept on computed quantities (BOM requirements, wastage).
pub const QUANTITY_SCALE: u32 = 4;

/// Render minor units as `1,234.50` (`-1,234.50` for negatives).
pub fn format_amount(minor: i128) -> String {
    let abs = minor.unsigned_abs();
    let whole = (abs / 100).to_string();
    let frac = abs % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if minor < 0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac:02}")
}

/// Value of `quantity` units at `unit_price` minor units, rounded half away from zero.
pub fn extend(quantity: Decimal, unit_price: i64) -> DomainResult<i64> {
    to_minor(quantity * Decimal::from(unit_price))
}

/// `rate` percent of `amount`, rounded half away from zero.
pub fn percent_of(amount: i64, rate: Decimal) -> DomainResult<i64> {
    to_minor(Decimal::from(amount) * rate / Decimal::ONE_HUNDRED)
}

/// Round a computed quantity to [`QUANTITY_SCALE`] decimal places.
pub fn round_quantity(quantity: Decimal) -> Decimal {
    quantity.round_dp_with_strategy(QUANTITY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

fn to_minor(value: Decimal) -> DomainResult<i64> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| DomainError::validation("amount out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_thousands_separators() {
        assert_eq!(format_amount(0), "0.00");
        assert_eq!(format_amount(5), "0.05");
        assert_eq!(format_amount(123_450), "1,234.50");
        assert_eq!(format_amount(100_000_000), "1,000,000.00");
        assert_eq!(format_amount(-99_999), "-999.99");
    }

    #[test]
    fn extends_fractional_quantities() {
        // 2.5 kg at 40.10 per kg
        assert_eq!(extend(Decimal::new(25, 1), 4_010).unwrap(), 10_025);
        // 0.333 units at 1.00 rounds to the nearest minor unit
        assert_eq!(extend(Decimal::new(333, 3), 100).unwrap(), 33);
    }

    #[test]
    fn percent_rounds_half_away_from_zero() {
        assert_eq!(percent_of(1_050, Decimal::new(10, 0)).unwrap(), 105);
        assert_eq!(percent_of(5, Decimal::new(50, 0)).unwrap(), 3);
        assert_eq!(percent_of(-5, Decimal::new(50, 0)).unwrap(), -3);
    }

    #[test]
    fn quantities_round_to_four_places() {
        assert_eq!(round_quantity(Decimal::new(123_456_789, 8)), Decimal::new(12_346, 4));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn formatting_keeps_every_digit(minor in -1_000_000_000_000i128..1_000_000_000_000i128) {
                let rendered = format_amount(minor);
                let digits: String = rendered.chars().filter(|c| c.is_ascii_digit()).collect();
                prop_assert_eq!(digits.parse::<i128>().unwrap(), minor.abs());
                prop_assert_eq!(rendered.starts_with('-'), minor < 0);
            }

            #[test]
            fn whole_quantities_extend_exactly(qty in 0i64..10_000, price in -1_000_000i64..1_000_000) {
                prop_assert_eq!(extend(Decimal::from(qty), price).unwrap(), qty * price);
            }
        }
    }
}

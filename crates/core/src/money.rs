use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A monetary amount as printed on a receipt, always rendered with two
/// fraction digits (`12.50`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal.round_dp(2))
    }

    /// Parse a receipt price literal such as `12,50` or `7.99`.
    /// A comma is read as the decimal point and digits must be ASCII.
    ///
    /// Returns `None` for amounts beyond the 28 significant digits a
    /// `Decimal` holds. No receipt carries such an amount; they come from OCR
    /// noise gluing digit runs together, and are dropped rather than rounded.
    pub fn parse_receipt_amount(raw: &str) -> Option<Self> {
        let normalized = raw.trim().replace(',', ".");
        Decimal::from_str(&normalized).ok().map(Self::from_decimal)
    }

}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_is_decimal_point() {
        let m = Money::parse_receipt_amount("12,50").unwrap();
        assert_eq!(m.to_string(), "12.50");
    }

    #[test]
    fn period_is_decimal_point() {
        assert_eq!(Money::parse_receipt_amount("7.99").unwrap().to_string(), "7.99");
    }

    #[test]
    fn display_pads_to_two_digits() {
        assert_eq!(Money::from_decimal(Decimal::from(3)).to_string(), "3.00");
        assert_eq!(Money::from_decimal(Decimal::ZERO).to_string(), "0.00");
    }

    #[test]
    fn ordering_follows_value() {
        let a = Money::parse_receipt_amount("10,00").unwrap();
        let b = Money::parse_receipt_amount("9.99").unwrap();
        assert!(a > b);
    }

    #[test]
    fn overflowing_digits_are_rejected() {
        let raw = format!("{},00", "9".repeat(40));
        assert!(Money::parse_receipt_amount(&raw).is_none());
        assert!(Money::parse_receipt_amount("abc").is_none());
    }

    #[test]
    fn serializes_as_two_digit_string() {
        let m = Money::parse_receipt_amount("12,5").unwrap();
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"12.50\"");
    }
}

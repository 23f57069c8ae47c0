//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are kept as `rust_decimal::Decimal` rounded to cents so that order
//! totals are exact. On the wire they are plain JSON numbers, which is what the
//! storefront SPA sends and expects.

use core::fmt;
use std::iter::Sum;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// Prices cannot be negative.
    #[error("price cannot be negative: {0}")]
    Negative(Decimal),
}

/// A non-negative monetary amount in the store currency, rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "WirePrice", into = "WirePrice")]
pub struct Price(Decimal);

impl Price {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Number of fractional digits kept.
    pub const SCALE: u32 = 2;

    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if the amount is below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(round(amount)))
    }

    /// Create a price from an integer number of cents.
    #[must_use]
    pub fn from_cents(cents: u32) -> Self {
        Self(Decimal::new(i64::from(cents), Self::SCALE))
    }

    /// The decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units at this unit price.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(round(self.0 * Decimal::from(quantity)))
    }

    /// Whether two prices differ by no more than `tolerance`.
    #[must_use]
    pub fn within(self, other: Self, tolerance: Decimal) -> bool {
        (self.0 - other.0).abs() <= tolerance
    }
}

fn round(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(Price::SCALE, RoundingStrategy::MidpointAwayFromZero)
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(round(iter.map(|p| p.0).sum()))
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

/// JSON number representation of a price.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct WirePrice(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl TryFrom<WirePrice> for Price {
    type Error = PriceError;

    fn try_from(wire: WirePrice) -> Result<Self, Self::Error> {
        Self::new(wire.0)
    }
}

impl From<Price> for WirePrice {
    fn from(price: Price) -> Self {
        Self(price.0)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_negative() {
        assert!(matches!(
            Price::new(Decimal::new(-1, 2)),
            Err(PriceError::Negative(_))
        ));
    }

    #[test]
    fn test_rounds_to_cents() {
        let price = Price::new(Decimal::new(19_995, 3)).unwrap();
        assert_eq!(price.amount(), Decimal::new(2000, 2));
    }

    #[test]
    fn test_sum_and_times() {
        let total: Price = [Price::from_cents(10_000), Price::from_cents(5_000)]
            .into_iter()
            .sum();
        assert_eq!(total, Price::from_cents(15_000));
        assert_eq!(Price::from_cents(250).times(3), Price::from_cents(750));
    }

    #[test]
    fn test_within_tolerance() {
        let tolerance = Decimal::new(1, 2);
        assert!(Price::from_cents(1000).within(Price::from_cents(1001), tolerance));
        assert!(!Price::from_cents(1000).within(Price::from_cents(1002), tolerance));
    }

    #[test]
    fn test_json_number_wire_format() {
        let price: Price = serde_json::from_str("100").unwrap();
        assert_eq!(price, Price::from_cents(10_000));

        let price: Price = serde_json::from_str("19.99").unwrap();
        assert_eq!(price, Price::from_cents(1999));

        let json = serde_json::to_value(Price::from_cents(1999)).unwrap();
        assert!(json.is_number());
    }

    #[test]
    fn test_json_rejects_negative() {
        assert!(serde_json::from_str::<Price>("-5").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::from_cents(15_000).to_string(), "$150.00");
    }
}

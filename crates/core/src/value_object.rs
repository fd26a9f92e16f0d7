//! Value object trait: equality by value, not identity.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" a
/// value object, create a new one.
///
/// - **Value Object**: `Money(1999)` equals any other `Money(1999)`
/// - **Entity**: a `Cart` keyed by its owner stays the same cart as its lines change
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Amount in the smallest currency unit (e.g. cents).
///
/// Prices are snapshotted into carts and orders as `Money`, so later catalog
/// price changes never reach historical lines.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(minor_units: u64) -> Self {
        Self(minor_units)
    }

    pub fn minor_units(self) -> u64 {
        self.0
    }

    /// `self * quantity`, rejecting overflow.
    pub fn times(self, quantity: u32) -> DomainResult<Money> {
        self.0
            .checked_mul(u64::from(quantity))
            .map(Money)
            .ok_or_else(|| DomainError::validation("line total overflows"))
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflows"))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn displays_major_and_minor_units() {
        assert_eq!(Money::from_minor(1999).to_string(), "19.99");
        assert_eq!(Money::from_minor(5).to_string(), "0.05");
    }

    #[test]
    fn overflowing_line_total_is_rejected() {
        let err = Money::from_minor(u64::MAX).times(2).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    proptest! {
        /// Property: multiplying never silently wraps.
        #[test]
        fn times_matches_wide_multiplication(price in 0u64..10_000_000, qty in 0u32..10_000) {
            let total = Money::from_minor(price).times(qty).unwrap();
            prop_assert_eq!(u128::from(total.minor_units()), u128::from(price) * u128::from(qty));
        }
    }
}

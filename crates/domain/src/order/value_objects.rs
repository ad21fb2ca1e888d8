//! Value objects for the order domain.

use serde::{Deserialize, Serialize};

/// Declares a string-backed identifier issued by another subsystem.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the identifier is empty or only whitespace.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of the buyer who placed an order.
    BuyerId
);

string_id!(
    /// Identifier of the seller fulfilling part of an order.
    SellerId
);

string_id!(
    /// Catalog product identifier.
    ProductId
);

string_id!(
    /// Catalog variant identifier.
    VariantId
);

/// Currency used when the buyer does not specify one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Money amount in minor currency units (cents for USD).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates an amount from minor units.
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in minor units.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies by a quantity, or `None` on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn checked_sub(&self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    pub fn saturating_add(&self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }

    /// Sums amounts, or `None` if any partial sum overflows.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}{}.{:02}", (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

/// Shipping address captured at checkout. Never edited after the order exists.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    pub full_name: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country_code: String,
    #[serde(default)]
    pub phone: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_ids_detect_blank_values() {
        assert!(BuyerId::new("").is_blank());
        assert!(SellerId::new("  ").is_blank());
        assert!(!ProductId::new("SKU-001").is_blank());
    }

    #[test]
    fn test_string_id_conversion() {
        let id: SellerId = "S1".into();
        assert_eq!(id.as_str(), "S1");
        assert_eq!(id.to_string(), "S1");
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!(a.checked_add(b), Some(Money::from_cents(1500)));
        assert_eq!(a.checked_sub(b), Some(Money::from_cents(500)));
        assert_eq!(b.checked_multiply(3), Some(Money::from_cents(1500)));
    }

    #[test]
    fn test_money_overflow_is_detected() {
        let big = Money::from_cents(i64::MAX / 2 + 1);
        assert_eq!(big.checked_multiply(2), None);
        assert_eq!(big.checked_add(big), None);
        assert_eq!(Money::from_cents(i64::MIN).checked_sub(Money::from_cents(1)), None);
        assert_eq!(Money::checked_sum([big, big]), None);
    }

    #[test]
    fn test_money_sum() {
        let total = Money::checked_sum([100, 250, 650].into_iter().map(Money::from_cents));
        assert_eq!(total, Some(Money::from_cents(1000)));
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "12.34");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-12.34");
    }

    #[test]
    fn test_money_serializes_as_bare_integer() {
        assert_eq!(serde_json::to_string(&Money::from_cents(2000)).unwrap(), "2000");
    }

    #[test]
    fn test_address_optional_lines_default_to_empty() {
        let json = r#"{
            "full_name": "Ada Buyer",
            "address_line1": "1 Main St",
            "city": "Springfield",
            "state": "IL",
            "postal_code": "62701",
            "country_code": "US"
        }"#;
        let address: Address = serde_json::from_str(json).unwrap();
        assert_eq!(address.address_line2, "");
        assert_eq!(address.phone, "");
    }
}

//! Human-readable order numbers.

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};

const PREFIX: &str = "ORD";
const SUFFIX_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 4;

/// Order number of the form `ORD-<YYYYMMDD>-<XXXX>`.
///
/// The suffix is drawn uniformly from `[A-Z0-9]`. Uniqueness is enforced by
/// the store, not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Generates a number for an order created on `date`.
    pub fn generate<R: Rng>(date: NaiveDate, rng: &mut R) -> Self {
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect();
        Self(format!("{PREFIX}-{}-{suffix}", date.format("%Y%m%d")))
    }

    /// Wraps an existing number, e.g. one read back from storage.
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    /// Returns the number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the number matches `ORD-\d{8}-[A-Z0-9]{4}`.
    pub fn is_well_formed(&self) -> bool {
        let mut parts = self.0.splitn(3, '-');
        let (Some(prefix), Some(date), Some(suffix)) = (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };

        prefix == PREFIX
            && date.len() == 8
            && date.bytes().all(|b| b.is_ascii_digit())
            && suffix.len() == SUFFIX_LEN
            && suffix.bytes().all(|b| SUFFIX_ALPHABET.contains(&b))
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for OrderNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

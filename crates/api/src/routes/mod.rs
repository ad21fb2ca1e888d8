//! HTTP route handlers.

pub mod health;
pub mod metrics;
pub mod orders;
pub mod seller_orders;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a UUID-backed identifier from a path segment.
pub(crate) fn parse_id<T: FromStr>(kind: &str, raw: &str) -> Result<T, ApiError>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {kind} id '{raw}': {e}")))
}

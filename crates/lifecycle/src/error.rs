//! Lifecycle error types.

use common::OrderId;
use domain::{BuyerId, OrderError};
use store::StoreError;
use thiserror::Error;

/// Errors returned by [`OrderLifecycleService`](crate::OrderLifecycleService).
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The request was rejected before anything was written.
    #[error(transparent)]
    Validation(OrderError),

    /// The order or seller order does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The requested status is unknown or not reachable from the current one.
    #[error(transparent)]
    InvalidTransition(OrderError),

    /// The caller does not own the order.
    #[error("Buyer {buyer_id} is not allowed to modify order {order_id}")]
    Unauthorized { order_id: OrderId, buyer_id: BuyerId },

    /// The row changed between read and write.
    #[error("{entity} {id} was modified concurrently")]
    ConcurrentModification { entity: &'static str, id: String },

    /// The store failed.
    #[error("Failed to {operation}: {source}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

/// Coarse classification of a [`LifecycleError`] for adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InvalidTransition,
    Unauthorized,
    Conflict,
    Persistence,
}

impl LifecycleError {
    /// Wraps a store error, keeping not-found, version conflicts and rejected
    /// aggregates distinct.
    pub(crate) fn from_store(operation: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => LifecycleError::NotFound { entity, id },
            StoreError::Invariant(e) => LifecycleError::Validation(e),
            StoreError::ConcurrencyConflict { entity, id, .. } => {
                LifecycleError::ConcurrentModification { entity, id }
            }
            source => LifecycleError::Persistence { operation, source },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::Validation(_) => ErrorKind::Validation,
            LifecycleError::NotFound { .. } => ErrorKind::NotFound,
            LifecycleError::InvalidTransition(_) => ErrorKind::InvalidTransition,
            LifecycleError::Unauthorized { .. } => ErrorKind::Unauthorized,
            LifecycleError::ConcurrentModification { .. } => ErrorKind::Conflict,
            LifecycleError::Persistence { .. } => ErrorKind::Persistence,
        }
    }
}

/// Convenience type alias for lifecycle results.
pub type Result<T> = std::result::Result<T, LifecycleError>;

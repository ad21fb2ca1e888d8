use common::{SellerOrderId, Version};
use domain::OrderError;
use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The row was modified since it was read.
    #[error("Concurrency conflict on {entity} {id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        entity: &'static str,
        id: String,
        expected: Version,
        actual: Version,
    },

    /// A row with this ID already exists.
    #[error("{entity} already exists: {id}")]
    Duplicate { entity: &'static str, id: String },

    /// Another order already uses this order number.
    #[error("Order number already in use: {0}")]
    DuplicateOrderNumber(String),

    /// The aggregate handed to the store is internally inconsistent.
    #[error("Order rejected: {0}")]
    Invariant(#[from] OrderError),

    /// A seller order could not be written while creating its order.
    #[error("Failed to create seller order {seller_order_id}: {source}")]
    SellerOrderCreate {
        seller_order_id: SellerOrderId,
        #[source]
        source: Box<StoreError>,
    },

    /// A value does not fit the column it is written to.
    #[error("Value {value} out of range for {column}")]
    OutOfRange { column: &'static str, value: String },

    /// A stored row could not be mapped back to a domain value.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// The backing store refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true if the error means the row does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

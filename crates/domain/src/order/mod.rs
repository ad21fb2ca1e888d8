//! Order aggregate and related types.

mod aggregate;
mod commands;
pub mod events;
mod factory;
mod number;
mod status;
mod value_objects;

pub use aggregate::{Order, OrderItem, SellerOrder};
pub use commands::{MAX_ITEM_QUANTITY, NewOrder, NewOrderItem};
pub use events::{OrderCreatedItem, OrderCreatedPayload, OrderStatusPayload, subject_for};
pub use factory::OrderFactory;
pub use number::OrderNumber;
pub use status::{OrderStatus, StatusScope, can_transition_order, can_transition_seller_order};
pub use value_objects::{
    Address, BuyerId, DEFAULT_CURRENCY, Money, ProductId, SellerId, VariantId,
};

use common::{OrderItemId, SellerOrderId};
use thiserror::Error;

/// Errors raised by order validation and status checks.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Buyer ID is required.
    #[error("Buyer ID is required")]
    BuyerIdRequired,

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// Invalid quantity.
    #[error(
        "Invalid quantity for {product_id}: {quantity} (must be between 1 and {max})",
        max = MAX_ITEM_QUANTITY
    )]
    InvalidQuantity {
        product_id: ProductId,
        quantity: u32,
    },

    /// Invalid price.
    #[error("Invalid price for {product_id}: {price} (must be greater than 0)")]
    InvalidPrice { product_id: ProductId, price: i64 },

    /// A line or order total does not fit in the amount range.
    #[error("Order amounts exceed the supported range")]
    AmountOverflow,

    /// Item has no seller.
    #[error("Seller ID is required for {product_id}")]
    SellerIdRequired { product_id: ProductId },

    /// Status string is not part of the vocabulary.
    #[error("Unknown status: {0:?}")]
    UnknownStatus(String),

    /// The state machine has no edge for the requested change.
    #[error("Invalid {scope} status transition: cannot move from {from} to {to}")]
    InvalidTransition {
        scope: StatusScope,
        from: OrderStatus,
        to: String,
    },

    /// Total does not equal subtotal + shipping + tax - discount.
    #[error("Total mismatch: expected {expected}, found {actual}")]
    TotalMismatch { expected: Money, actual: Money },

    /// A subtotal does not equal the sum of its line totals.
    #[error("Subtotal mismatch: expected {expected}, found {actual}")]
    SubtotalMismatch { expected: Money, actual: Money },

    /// A line total does not equal unit price times quantity.
    #[error("Line total mismatch on item {0}")]
    LineTotalMismatch(OrderItemId),

    /// An item belongs to another order.
    #[error("Item {0} belongs to another order")]
    ForeignItem(OrderItemId),

    /// A seller order belongs to another order.
    #[error("Seller order {0} belongs to another order")]
    ForeignSellerOrder(SellerOrderId),

    /// Seller orders do not partition the items exactly.
    #[error("Seller orders do not partition the order items")]
    PartitionMismatch,
}

impl OrderError {
    /// Returns true for errors caused by invalid caller input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OrderError::BuyerIdRequired
                | OrderError::NoItems
                | OrderError::InvalidQuantity { .. }
                | OrderError::InvalidPrice { .. }
                | OrderError::SellerIdRequired { .. }
                | OrderError::AmountOverflow
        )
    }

    /// Returns true for rejected status changes, including unknown statuses.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(
            self,
            OrderError::InvalidTransition { .. } | OrderError::UnknownStatus(_)
        )
    }
}

/// Resolves a requested status string against `scope`'s table.
///
/// Unknown strings and missing edges are both reported as
/// [`OrderError::InvalidTransition`] naming the current and requested status.
pub fn resolve_transition(
    scope: StatusScope,
    from: OrderStatus,
    requested: &str,
) -> Result<OrderStatus, OrderError> {
    requested
        .parse::<OrderStatus>()
        .ok()
        .filter(|to| scope.can_transition(from, *to))
        .ok_or_else(|| OrderError::InvalidTransition {
            scope,
            from,
            to: requested.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_allowed_transition() {
        let to = resolve_transition(StatusScope::Order, OrderStatus::Pending, "confirmed");
        assert_eq!(to.unwrap(), OrderStatus::Confirmed);
    }

    #[test]
    fn test_resolve_rejects_missing_edge_with_both_statuses_in_message() {
        let err = resolve_transition(StatusScope::SellerOrder, OrderStatus::Shipped, "cancelled")
            .unwrap_err();
        assert!(err.is_invalid_transition());
        let message = err.to_string();
        assert!(message.contains("shipped"), "{message}");
        assert!(message.contains("cancelled"), "{message}");
    }

    #[test]
    fn test_resolve_rejects_unknown_status_as_invalid_transition() {
        let err =
            resolve_transition(StatusScope::Order, OrderStatus::Pending, "CONFIRMED").unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition { ref to, .. } if to == "CONFIRMED"
        ));
    }

    #[test]
    fn test_resolve_rejects_self_transition() {
        for status in OrderStatus::ALL {
            assert!(resolve_transition(StatusScope::Order, status, status.as_str()).is_err());
        }
    }

    #[test]
    fn test_error_classification() {
        assert!(OrderError::NoItems.is_validation());
        assert!(OrderError::AmountOverflow.is_validation());
        assert!(!OrderError::NoItems.is_invalid_transition());
        assert!(OrderError::UnknownStatus("x".into()).is_invalid_transition());
        assert!(!OrderError::PartitionMismatch.is_validation());
    }
}

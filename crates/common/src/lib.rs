//! Shared identifier types for the order lifecycle engine.

mod types;

pub use types::{OrderId, OrderItemId, OutboxMessageId, SellerOrderId, Version};

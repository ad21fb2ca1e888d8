//! Domain layer for the order lifecycle engine.
//!
//! This crate provides:
//! - the status vocabulary and the order / seller order transition tables
//! - the Order aggregate with its line items and seller partitions
//! - `OrderFactory`, which builds and partitions new orders
//! - outbound event subjects and payload contracts

pub mod order;

pub use order::{
    Address, BuyerId, DEFAULT_CURRENCY, MAX_ITEM_QUANTITY, Money, NewOrder, NewOrderItem, Order,
    OrderCreatedItem, OrderCreatedPayload, OrderError, OrderFactory, OrderItem, OrderNumber,
    OrderStatus, OrderStatusPayload, ProductId, SellerId, SellerOrder, StatusScope, VariantId,
    can_transition_order, can_transition_seller_order, resolve_transition, subject_for,
};

use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, SellerOrderId, Version};
use domain::{Order, OrderNumber, OrderStatus, SellerId, SellerOrder};

use crate::{OrderFilter, PageRequest, Result};

/// Persistence port for order aggregates.
///
/// Orders returned by reads are fully hydrated: line items in their original
/// order and seller orders in creation order.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts the order row and its line items. Seller orders are not
    /// written.
    ///
    /// Fails with `DuplicateOrderNumber` if the number is taken.
    async fn create(&self, order: &Order) -> Result<()>;

    /// Inserts the order, its line items and every seller order in one
    /// transaction. Nothing is written if any step fails.
    ///
    /// Seller orders are inserted one at a time; a failure names the seller
    /// order through `SellerOrderCreate`.
    async fn create_with_seller_orders(&self, order: &Order) -> Result<()>;

    /// Loads an order by ID.
    async fn get_by_id(&self, id: OrderId) -> Result<Order>;

    /// Loads an order by its human-readable number.
    async fn get_by_order_number(&self, number: &OrderNumber) -> Result<Order>;

    /// Lists orders matching `filter`, newest first, with the total match
    /// count before paging.
    async fn list(&self, filter: &OrderFilter) -> Result<(Vec<Order>, u64)>;

    /// Sets the order status if the stored version equals `expected`.
    ///
    /// Returns the new version. Fails with `ConcurrencyConflict` when the
    /// row moved on since it was read.
    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        expected: Version,
    ) -> Result<Version>;

    /// Writes the mutable fields of `order` (status and pricing components)
    /// if the stored version equals `order.version`.
    ///
    /// `order` must be fully hydrated; it is rejected with
    /// `StoreError::Invariant` unless its totals and seller partition agree.
    async fn update(&self, order: &Order) -> Result<Version>;
}

/// Persistence port for seller orders.
#[async_trait]
pub trait SellerOrderRepository: Send + Sync {
    /// Inserts a single seller order.
    async fn create(&self, seller_order: &SellerOrder) -> Result<()>;

    /// Loads a seller order by ID.
    async fn get_by_id(&self, id: SellerOrderId) -> Result<SellerOrder>;

    /// Lists the seller orders of an order in creation order.
    async fn list_by_order(&self, order_id: OrderId) -> Result<Vec<SellerOrder>>;

    /// Lists a seller's orders, newest first, with the total count.
    async fn list_by_seller(
        &self,
        seller_id: &SellerId,
        page: PageRequest,
    ) -> Result<(Vec<SellerOrder>, u64)>;

    /// Sets the seller order status if the stored version equals `expected`.
    async fn update_status(
        &self,
        id: SellerOrderId,
        status: OrderStatus,
        expected: Version,
    ) -> Result<Version>;
}

#[async_trait]
impl<T: OrderRepository + ?Sized> OrderRepository for Arc<T> {
    async fn create(&self, order: &Order) -> Result<()> {
        (**self).create(order).await
    }

    async fn create_with_seller_orders(&self, order: &Order) -> Result<()> {
        (**self).create_with_seller_orders(order).await
    }

    async fn get_by_id(&self, id: OrderId) -> Result<Order> {
        (**self).get_by_id(id).await
    }

    async fn get_by_order_number(&self, number: &OrderNumber) -> Result<Order> {
        (**self).get_by_order_number(number).await
    }

    async fn list(&self, filter: &OrderFilter) -> Result<(Vec<Order>, u64)> {
        (**self).list(filter).await
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        expected: Version,
    ) -> Result<Version> {
        (**self).update_status(id, status, expected).await
    }

    async fn update(&self, order: &Order) -> Result<Version> {
        (**self).update(order).await
    }
}

#[async_trait]
impl<T: SellerOrderRepository + ?Sized> SellerOrderRepository for Arc<T> {
    async fn create(&self, seller_order: &SellerOrder) -> Result<()> {
        (**self).create(seller_order).await
    }

    async fn get_by_id(&self, id: SellerOrderId) -> Result<SellerOrder> {
        (**self).get_by_id(id).await
    }

    async fn list_by_order(&self, order_id: OrderId) -> Result<Vec<SellerOrder>> {
        (**self).list_by_order(order_id).await
    }

    async fn list_by_seller(
        &self,
        seller_id: &SellerId,
        page: PageRequest,
    ) -> Result<(Vec<SellerOrder>, u64)> {
        (**self).list_by_seller(seller_id, page).await
    }

    async fn update_status(
        &self,
        id: SellerOrderId,
        status: OrderStatus,
        expected: Version,
    ) -> Result<Version> {
        (**self).update_status(id, status, expected).await
    }
}

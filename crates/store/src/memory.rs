use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, OutboxMessageId, SellerOrderId, Version};
use domain::{Order, OrderNumber, OrderStatus, SellerId, SellerOrder};
use tokio::sync::RwLock;

use crate::{
    OrderFilter, OrderRepository, OutboxMessage, OutboxRepository, PageRequest, Result,
    SellerOrderRepository, StoreError,
};

const ORDER: &str = "Order";
const SELLER_ORDER: &str = "SellerOrder";
const OUTBOX_MESSAGE: &str = "OutboxMessage";

/// Faults the in-memory store can be told to produce.
#[derive(Debug, Default)]
struct Faults {
    /// Number of upcoming order inserts to reject as order number collisions.
    duplicate_order_numbers: u32,
    /// Reject seller order inserts for this seller.
    seller_order_create: Option<SellerId>,
    /// Reject status updates of this seller order.
    seller_order_update: Option<SellerOrderId>,
    /// Reject every order read.
    order_reads: bool,
    /// Reject every outbox write.
    outbox_writes: bool,
}

#[derive(Debug, Default)]
struct StoreState {
    /// Orders without their seller orders; those live in `seller_orders`.
    orders: Vec<Order>,
    seller_orders: Vec<SellerOrder>,
    outbox: Vec<OutboxMessage>,
    faults: Faults,
}

impl StoreState {
    fn hydrate(&self, order: &Order) -> Order {
        let mut order = order.clone();
        order.seller_orders = self
            .seller_orders
            .iter()
            .filter(|so| so.order_id == order.id)
            .cloned()
            .collect();
        order
    }

    fn check_order_reads(&self) -> Result<()> {
        if self.faults.order_reads {
            return Err(StoreError::Unavailable("order reads disabled".to_string()));
        }
        Ok(())
    }

    fn check_order_insert(&mut self, order: &Order) -> Result<()> {
        if self.orders.iter().any(|o| o.id == order.id) {
            return Err(StoreError::Duplicate {
                entity: ORDER,
                id: order.id.to_string(),
            });
        }
        if self.faults.duplicate_order_numbers > 0 {
            self.faults.duplicate_order_numbers -= 1;
            return Err(StoreError::DuplicateOrderNumber(
                order.order_number.to_string(),
            ));
        }
        if self
            .orders
            .iter()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(StoreError::DuplicateOrderNumber(
                order.order_number.to_string(),
            ));
        }
        Ok(())
    }

    fn check_seller_order_insert(&self, seller_order: &SellerOrder) -> Result<()> {
        if self.seller_orders.iter().any(|so| so.id == seller_order.id) {
            return Err(StoreError::Duplicate {
                entity: SELLER_ORDER,
                id: seller_order.id.to_string(),
            });
        }
        if self.faults.seller_order_create.as_ref() == Some(&seller_order.seller_id) {
            return Err(StoreError::Unavailable(format!(
                "seller order writes disabled for seller {}",
                seller_order.seller_id
            )));
        }
        Ok(())
    }

    fn insert_order(&mut self, order: &Order) {
        let mut row = order.clone();
        row.seller_orders.clear();
        self.orders.push(row);
    }
}

/// In-memory order store for tests and local runs.
///
/// Cheap to clone; clones share the same tables. Repository handles obtained
/// from [`orders`](Self::orders), [`seller_orders`](Self::seller_orders) and
/// [`outbox`](Self::outbox) all see the same data.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the order repository handle.
    pub fn orders(&self) -> InMemoryOrderRepository {
        InMemoryOrderRepository {
            store: self.clone(),
        }
    }

    /// Returns the seller order repository handle.
    pub fn seller_orders(&self) -> InMemorySellerOrderRepository {
        InMemorySellerOrderRepository {
            store: self.clone(),
        }
    }

    /// Returns the outbox repository handle.
    pub fn outbox(&self) -> InMemoryOutboxRepository {
        InMemoryOutboxRepository {
            store: self.clone(),
        }
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the number of stored seller orders.
    pub async fn seller_order_count(&self) -> usize {
        self.state.read().await.seller_orders.len()
    }

    /// Returns every outbox message, delivered or not.
    pub async fn outbox_messages(&self) -> Vec<OutboxMessage> {
        self.state.read().await.outbox.clone()
    }

    /// Rejects the next `count` order inserts as order number collisions.
    pub async fn fail_next_order_numbers(&self, count: u32) {
        self.state.write().await.faults.duplicate_order_numbers = count;
    }

    /// Rejects seller order inserts for `seller_id` (`None` clears the fault).
    pub async fn fail_seller_order_create(&self, seller_id: Option<SellerId>) {
        self.state.write().await.faults.seller_order_create = seller_id;
    }

    /// Rejects status updates of one seller order (`None` clears the fault).
    pub async fn fail_seller_order_update(&self, id: Option<SellerOrderId>) {
        self.state.write().await.faults.seller_order_update = id;
    }

    /// Rejects every order read while `fail` is set.
    pub async fn fail_order_reads(&self, fail: bool) {
        self.state.write().await.faults.order_reads = fail;
    }

    /// Rejects every outbox write while `fail` is set.
    pub async fn fail_outbox_writes(&self, fail: bool) {
        self.state.write().await.faults.outbox_writes = fail;
    }
}

/// [`OrderRepository`] over an [`InMemoryStore`].
#[derive(Clone)]
pub struct InMemoryOrderRepository {
    store: InMemoryStore,
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: &Order) -> Result<()> {
        let mut state = self.store.state.write().await;
        state.check_order_insert(order)?;
        state.insert_order(order);
        Ok(())
    }

    async fn create_with_seller_orders(&self, order: &Order) -> Result<()> {
        order.check_invariants()?;
        let mut state = self.store.state.write().await;

        // Validate every write before applying any of them.
        state.check_order_insert(order)?;
        for seller_order in &order.seller_orders {
            state
                .check_seller_order_insert(seller_order)
                .map_err(|e| StoreError::SellerOrderCreate {
                    seller_order_id: seller_order.id,
                    source: Box::new(e),
                })?;
        }

        state.insert_order(order);
        state
            .seller_orders
            .extend(order.seller_orders.iter().cloned());
        Ok(())
    }

    async fn get_by_id(&self, id: OrderId) -> Result<Order> {
        let state = self.store.state.read().await;
        state.check_order_reads()?;
        state
            .orders
            .iter()
            .find(|o| o.id == id)
            .map(|o| state.hydrate(o))
            .ok_or_else(|| StoreError::not_found(ORDER, id))
    }

    async fn get_by_order_number(&self, number: &OrderNumber) -> Result<Order> {
        let state = self.store.state.read().await;
        state.check_order_reads()?;
        state
            .orders
            .iter()
            .find(|o| &o.order_number == number)
            .map(|o| state.hydrate(o))
            .ok_or_else(|| StoreError::not_found(ORDER, number))
    }

    async fn list(&self, filter: &OrderFilter) -> Result<(Vec<Order>, u64)> {
        let state = self.store.state.read().await;
        state.check_order_reads()?;

        let mut matching: Vec<&Order> = state
            .orders
            .iter()
            .filter(|o| {
                if let Some(ref buyer_id) = filter.buyer_id
                    && &o.buyer_id != buyer_id
                {
                    return false;
                }
                if let Some(status) = filter.status
                    && o.status != status
                {
                    return false;
                }
                true
            })
            .collect();

        // Newest first; ties go to the later insert.
        matching.reverse();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let orders = matching
            .into_iter()
            .skip(filter.page.offset() as usize)
            .take(filter.page.limit() as usize)
            .map(|o| state.hydrate(o))
            .collect();

        Ok((orders, total))
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        expected: Version,
    ) -> Result<Version> {
        let mut state = self.store.state.write().await;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| StoreError::not_found(ORDER, id))?;

        if order.version != expected {
            return Err(StoreError::ConcurrencyConflict {
                entity: ORDER,
                id: id.to_string(),
                expected,
                actual: order.version,
            });
        }

        order.status = status;
        order.version = order.version.next();
        order.updated_at = Utc::now();
        Ok(order.version)
    }

    async fn update(&self, order: &Order) -> Result<Version> {
        order.check_invariants()?;
        let mut state = self.store.state.write().await;
        let row = state
            .orders
            .iter_mut()
            .find(|o| o.id == order.id)
            .ok_or_else(|| StoreError::not_found(ORDER, order.id))?;

        if row.version != order.version {
            return Err(StoreError::ConcurrencyConflict {
                entity: ORDER,
                id: order.id.to_string(),
                expected: order.version,
                actual: row.version,
            });
        }

        row.status = order.status;
        row.subtotal_cents = order.subtotal_cents;
        row.shipping_cents = order.shipping_cents;
        row.tax_cents = order.tax_cents;
        row.discount_cents = order.discount_cents;
        row.total_cents = order.total_cents;
        row.version = row.version.next();
        row.updated_at = Utc::now();
        Ok(row.version)
    }
}

/// [`SellerOrderRepository`] over an [`InMemoryStore`].
#[derive(Clone)]
pub struct InMemorySellerOrderRepository {
    store: InMemoryStore,
}

#[async_trait]
impl SellerOrderRepository for InMemorySellerOrderRepository {
    async fn create(&self, seller_order: &SellerOrder) -> Result<()> {
        let mut state = self.store.state.write().await;
        state.check_seller_order_insert(seller_order)?;
        state.seller_orders.push(seller_order.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: SellerOrderId) -> Result<SellerOrder> {
        let state = self.store.state.read().await;
        state
            .seller_orders
            .iter()
            .find(|so| so.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(SELLER_ORDER, id))
    }

    async fn list_by_order(&self, order_id: OrderId) -> Result<Vec<SellerOrder>> {
        let state = self.store.state.read().await;
        Ok(state
            .seller_orders
            .iter()
            .filter(|so| so.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_by_seller(
        &self,
        seller_id: &SellerId,
        page: PageRequest,
    ) -> Result<(Vec<SellerOrder>, u64)> {
        let state = self.store.state.read().await;
        let mut matching: Vec<&SellerOrder> = state
            .seller_orders
            .iter()
            .filter(|so| &so.seller_id == seller_id)
            .collect();
        matching.reverse();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let seller_orders = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();
        Ok((seller_orders, total))
    }

    async fn update_status(
        &self,
        id: SellerOrderId,
        status: OrderStatus,
        expected: Version,
    ) -> Result<Version> {
        let mut state = self.store.state.write().await;
        if state.faults.seller_order_update == Some(id) {
            return Err(StoreError::Unavailable(format!(
                "seller order {id} writes disabled"
            )));
        }

        let seller_order = state
            .seller_orders
            .iter_mut()
            .find(|so| so.id == id)
            .ok_or_else(|| StoreError::not_found(SELLER_ORDER, id))?;

        if seller_order.version != expected {
            return Err(StoreError::ConcurrencyConflict {
                entity: SELLER_ORDER,
                id: id.to_string(),
                expected,
                actual: seller_order.version,
            });
        }

        seller_order.status = status;
        seller_order.version = seller_order.version.next();
        seller_order.updated_at = Utc::now();
        Ok(seller_order.version)
    }
}

/// [`OutboxRepository`] over an [`InMemoryStore`].
#[derive(Clone)]
pub struct InMemoryOutboxRepository {
    store: InMemoryStore,
}

#[async_trait]
impl OutboxRepository for InMemoryOutboxRepository {
    async fn enqueue(&self, message: &OutboxMessage) -> Result<()> {
        let mut state = self.store.state.write().await;
        if state.faults.outbox_writes {
            return Err(StoreError::Unavailable("outbox writes disabled".to_string()));
        }
        state.outbox.push(message.clone());
        Ok(())
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>> {
        let state = self.store.state.read().await;
        let mut pending: Vec<&OutboxMessage> =
            state.outbox.iter().filter(|m| !m.is_delivered()).collect();
        // Stable, so insertion order holds within an attempt count.
        pending.sort_by_key(|m| m.attempts);
        Ok(pending.into_iter().take(limit).cloned().collect())
    }

    async fn mark_delivered(&self, id: OutboxMessageId, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.store.state.write().await;
        let message = state
            .outbox
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| StoreError::not_found(OUTBOX_MESSAGE, id))?;
        message.delivered_at = Some(at);
        Ok(())
    }

    async fn record_failure(&self, id: OutboxMessageId, error: &str) -> Result<()> {
        let mut state = self.store.state.write().await;
        if state.faults.outbox_writes {
            return Err(StoreError::Unavailable("outbox writes disabled".to_string()));
        }
        let message = state
            .outbox
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| StoreError::not_found(OUTBOX_MESSAGE, id))?;
        message.attempts += 1;
        message.last_error = Some(error.to_string());
        Ok(())
    }
}

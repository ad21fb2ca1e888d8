//! The order lifecycle service.

use std::time::Instant;

use chrono::Utc;
use common::{OrderId, SellerOrderId};
use domain::order::events::{ORDER_CANCELLED, ORDER_CREATED};
use domain::{
    BuyerId, NewOrder, Order, OrderCreatedPayload, OrderError, OrderFactory, OrderNumber,
    OrderStatus, OrderStatusPayload, SellerId, SellerOrder, StatusScope, can_transition_order,
    can_transition_seller_order, resolve_transition, subject_for,
};
use serde::{Deserialize, Serialize};
use store::{OrderFilter, OrderRepository, SellerOrderRepository, StoreError};

use crate::{EventPublisher, LifecycleConfig, LifecycleError, Result};

/// Filter and paging input for [`OrderLifecycleService::list`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderQuery {
    pub buyer_id: Option<BuyerId>,
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// A seller order the cascade left alone because it cannot be cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSellerOrder {
    pub id: SellerOrderId,
    pub status: OrderStatus,
}

/// A seller order the cascade tried and failed to cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedSellerOrder {
    pub id: SellerOrderId,
    pub error: String,
}

/// Result of [`OrderLifecycleService::cancel`].
///
/// The order itself is always cancelled when this is returned; the seller
/// order lists describe how far the cascade got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancellationOutcome {
    pub order: Order,
    pub cancelled: Vec<SellerOrderId>,
    pub skipped: Vec<SkippedSellerOrder>,
    pub failed: Vec<FailedSellerOrder>,
}

impl CancellationOutcome {
    /// Returns true if every seller order ended up cancelled.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }
}

/// Drives orders and seller orders through their lifecycle.
///
/// Holds no mutable state of its own; every operation is a sequence of
/// repository calls followed by at most one event publication.
pub struct OrderLifecycleService<O, S, P> {
    orders: O,
    seller_orders: S,
    publisher: P,
    config: LifecycleConfig,
}

impl<O, S, P> OrderLifecycleService<O, S, P>
where
    O: OrderRepository,
    S: SellerOrderRepository,
    P: EventPublisher,
{
    /// Creates a service with the default configuration.
    pub fn new(orders: O, seller_orders: S, publisher: P) -> Self {
        Self {
            orders,
            seller_orders,
            publisher,
            config: LifecycleConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Validates and persists a new order with its seller orders, then
    /// publishes `order.created`.
    ///
    /// Nothing is written when validation fails. Order number collisions are
    /// retried with a fresh number up to `order_number_max_attempts` inserts.
    #[tracing::instrument(
        skip(self, input),
        fields(buyer_id = %input.buyer_id, items = input.items.len())
    )]
    pub async fn create(&self, input: NewOrder) -> Result<Order> {
        let started = Instant::now();
        input.validate().map_err(LifecycleError::Validation)?;

        let mut order = OrderFactory::new_order(input).map_err(LifecycleError::Validation)?;
        order
            .check_invariants()
            .map_err(LifecycleError::Validation)?;
        let max_attempts = self.config.order_number_max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = self.orders.create_with_seller_orders(&order).await;
            match result {
                Ok(()) => break,
                Err(StoreError::DuplicateOrderNumber(number)) if attempt < max_attempts => {
                    tracing::warn!(%number, attempt, "order number collision; regenerating");
                    OrderFactory::regenerate_order_number(&mut order, &mut rand::rng());
                    attempt += 1;
                }
                Err(e) => return Err(LifecycleError::from_store("create order", e)),
            }
        }

        metrics::counter!("orders_created_total").increment(1);
        metrics::histogram!("order_create_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            seller_orders = order.seller_orders.len(),
            "order created"
        );

        self.publish(ORDER_CREATED, &OrderCreatedPayload::from(&order))
            .await;
        Ok(order)
    }

    /// Loads an order with its items and seller orders.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: OrderId) -> Result<Order> {
        self.orders
            .get_by_id(id)
            .await
            .map_err(|e| LifecycleError::from_store("load order", e))
    }

    /// Loads an order by its human-readable number.
    #[tracing::instrument(skip(self))]
    pub async fn get_by_order_number(&self, number: &str) -> Result<Order> {
        self.orders
            .get_by_order_number(&OrderNumber::new(number))
            .await
            .map_err(|e| LifecycleError::from_store("load order", e))
    }

    /// Lists orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, query: OrderQuery) -> Result<Page<Order>> {
        let page = self.config.page(query.page, query.page_size);
        let filter = OrderFilter {
            buyer_id: query.buyer_id,
            status: query.status,
            page,
        };

        let (items, total) = self
            .orders
            .list(&filter)
            .await
            .map_err(|e| LifecycleError::from_store("list orders", e))?;

        Ok(Page {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_seller_order(&self, id: SellerOrderId) -> Result<SellerOrder> {
        self.seller_orders
            .get_by_id(id)
            .await
            .map_err(|e| LifecycleError::from_store("load seller order", e))
    }

    /// Lists an order's seller orders in creation order.
    #[tracing::instrument(skip(self))]
    pub async fn list_seller_orders_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<SellerOrder>> {
        self.seller_orders
            .list_by_order(order_id)
            .await
            .map_err(|e| LifecycleError::from_store("list seller orders", e))
    }

    /// Lists a seller's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_seller_orders_for_seller(
        &self,
        seller_id: &SellerId,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Page<SellerOrder>> {
        let page = self.config.page(page, page_size);
        let (items, total) = self
            .seller_orders
            .list_by_seller(seller_id, page)
            .await
            .map_err(|e| LifecycleError::from_store("list seller orders", e))?;

        Ok(Page {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }

    /// Moves an order to `requested` and publishes the mapped event, if any.
    ///
    /// `requested` is matched case-sensitively against the status
    /// vocabulary; unknown values are rejected like missing edges.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(&self, id: OrderId, requested: &str) -> Result<Order> {
        let mut order = self.get(id).await?;
        let from = order.status;
        let to = resolve_transition(StatusScope::Order, from, requested)
            .map_err(LifecycleError::InvalidTransition)?;

        order.version = self
            .orders
            .update_status(id, to, order.version)
            .await
            .map_err(|e| LifecycleError::from_store("update order status", e))?;
        order.status = to;
        order.updated_at = Utc::now();

        metrics::counter!(
            "order_status_transitions_total",
            "entity" => StatusScope::Order.as_str(),
            "to" => to.as_str()
        )
        .increment(1);
        tracing::info!(order_id = %id, %from, %to, "order status changed");

        if let Some(subject) = subject_for(to) {
            self.publish(subject, &OrderStatusPayload::new(&order, to))
                .await;
        }
        Ok(order)
    }

    /// Moves a seller order to `requested` and publishes the mapped event, if
    /// any, in the context of the parent order.
    ///
    /// If the parent order cannot be loaded the transition still stands and
    /// the event is skipped.
    #[tracing::instrument(skip(self))]
    pub async fn update_seller_order_status(
        &self,
        id: SellerOrderId,
        requested: &str,
    ) -> Result<SellerOrder> {
        let mut seller_order = self.get_seller_order(id).await?;
        let from = seller_order.status;
        let to = resolve_transition(StatusScope::SellerOrder, from, requested)
            .map_err(LifecycleError::InvalidTransition)?;

        seller_order.version = self
            .seller_orders
            .update_status(id, to, seller_order.version)
            .await
            .map_err(|e| LifecycleError::from_store("update seller order status", e))?;
        seller_order.status = to;
        seller_order.updated_at = Utc::now();

        metrics::counter!(
            "order_status_transitions_total",
            "entity" => StatusScope::SellerOrder.as_str(),
            "to" => to.as_str()
        )
        .increment(1);
        tracing::info!(
            seller_order_id = %id,
            order_id = %seller_order.order_id,
            %from,
            %to,
            "seller order status changed"
        );

        if let Some(subject) = subject_for(to) {
            match self.orders.get_by_id(seller_order.order_id).await {
                Ok(parent) => {
                    self.publish(subject, &OrderStatusPayload::new(&parent, to))
                        .await;
                }
                Err(e) => {
                    tracing::warn!(
                        order_id = %seller_order.order_id,
                        subject,
                        error = %e,
                        "parent order unavailable; event skipped"
                    );
                }
            }
        }
        Ok(seller_order)
    }

    /// Cancels an order on behalf of its buyer, then cancels every seller
    /// order that can still be cancelled.
    ///
    /// Ownership and the order's own transition are checked before anything
    /// is written. Once the order is cancelled the cascade is best effort and
    /// `order.cancelled` is published regardless of its outcome.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(
        &self,
        order_id: OrderId,
        buyer_id: &BuyerId,
    ) -> Result<CancellationOutcome> {
        let mut order = self.get(order_id).await?;

        if !order.is_owned_by(buyer_id) {
            return Err(LifecycleError::Unauthorized {
                order_id,
                buyer_id: buyer_id.clone(),
            });
        }
        if !can_transition_order(order.status, OrderStatus::Cancelled) {
            return Err(LifecycleError::InvalidTransition(
                OrderError::InvalidTransition {
                    scope: StatusScope::Order,
                    from: order.status,
                    to: OrderStatus::Cancelled.to_string(),
                },
            ));
        }

        order.version = self
            .orders
            .update_status(order_id, OrderStatus::Cancelled, order.version)
            .await
            .map_err(|e| LifecycleError::from_store("cancel order", e))?;
        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        metrics::counter!(
            "order_status_transitions_total",
            "entity" => StatusScope::Order.as_str(),
            "to" => OrderStatus::Cancelled.as_str()
        )
        .increment(1);

        let mut cancelled = Vec::new();
        let mut skipped = Vec::new();
        let mut failed = Vec::new();

        for seller_order in &mut order.seller_orders {
            if !can_transition_seller_order(seller_order.status, OrderStatus::Cancelled) {
                skipped.push(SkippedSellerOrder {
                    id: seller_order.id,
                    status: seller_order.status,
                });
                metrics::counter!("order_cancellation_cascade_total", "outcome" => "skipped")
                    .increment(1);
                continue;
            }

            match self
                .seller_orders
                .update_status(seller_order.id, OrderStatus::Cancelled, seller_order.version)
                .await
            {
                Ok(version) => {
                    seller_order.status = OrderStatus::Cancelled;
                    seller_order.version = version;
                    seller_order.updated_at = Utc::now();
                    cancelled.push(seller_order.id);
                    metrics::counter!("order_cancellation_cascade_total", "outcome" => "cancelled")
                        .increment(1);
                }
                Err(e) => {
                    tracing::warn!(
                        seller_order_id = %seller_order.id,
                        error = %e,
                        "failed to cancel seller order"
                    );
                    failed.push(FailedSellerOrder {
                        id: seller_order.id,
                        error: e.to_string(),
                    });
                    metrics::counter!("order_cancellation_cascade_total", "outcome" => "failed")
                        .increment(1);
                }
            }
        }

        tracing::info!(
            order_id = %order_id,
            cancelled = cancelled.len(),
            skipped = skipped.len(),
            failed = failed.len(),
            "order cancelled"
        );

        self.publish(
            ORDER_CANCELLED,
            &OrderStatusPayload::new(&order, OrderStatus::Cancelled),
        )
        .await;

        Ok(CancellationOutcome {
            order,
            cancelled,
            skipped,
            failed,
        })
    }

    /// Publishes an event, logging and counting failures instead of
    /// returning them.
    async fn publish<T: Serialize + Sync>(&self, subject: &str, payload: &T) {
        let payload = match serde_json::to_value(payload) {
            Ok(payload) => payload,
            Err(e) => {
                metrics::counter!("order_event_publish_failures_total").increment(1);
                tracing::warn!(subject, error = %e, "failed to serialize event payload");
                return;
            }
        };

        match self.publisher.publish(subject, &payload).await {
            Ok(()) => {
                metrics::counter!("order_events_published_total").increment(1);
            }
            Err(e) => {
                metrics::counter!("order_event_publish_failures_total").increment(1);
                tracing::warn!(subject, error = %e, "failed to publish event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use domain::{Address, Money, NewOrderItem};
    use store::{InMemoryOrderRepository, InMemorySellerOrderRepository, InMemoryStore};

    use super::*;
    use crate::InMemoryEventPublisher;

    type TestService = OrderLifecycleService<
        InMemoryOrderRepository,
        InMemorySellerOrderRepository,
        InMemoryEventPublisher,
    >;

    fn service() -> (TestService, InMemoryStore, InMemoryEventPublisher) {
        let store = InMemoryStore::new();
        let publisher = InMemoryEventPublisher::new();
        let service =
            OrderLifecycleService::new(store.orders(), store.seller_orders(), publisher.clone());
        (service, store, publisher)
    }

    fn input() -> NewOrder {
        NewOrder::new(
            "b1",
            Address::default(),
            vec![NewOrderItem::new("p1", "Mug", 1, Money::from_cents(500), "s1")],
        )
    }

    #[tokio::test]
    async fn test_validation_failure_writes_nothing() {
        let (service, store, publisher) = service();
        let mut bad = input();
        bad.items[0].quantity = 0;

        let err = service.create(bad).await.unwrap_err();

        assert!(matches!(err, LifecycleError::Validation(OrderError::InvalidQuantity { .. })));
        assert_eq!(store.order_count().await, 0);
        assert!(publisher.events().is_empty());
    }

    #[tokio::test]
    async fn test_overflowing_amounts_write_nothing() {
        let (service, store, publisher) = service();
        let huge = NewOrder::new(
            "b1",
            Address::default(),
            vec![NewOrderItem::new(
                "p1",
                "Mug",
                2,
                Money::from_cents(i64::MAX / 2 + 1),
                "s1",
            )],
        );

        let err = service.create(huge).await.unwrap_err();

        assert!(matches!(err, LifecycleError::Validation(OrderError::AmountOverflow)));
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.seller_order_count().await, 0);
        assert!(publisher.events().is_empty());
    }

    #[tokio::test]
    async fn test_collision_retry_regenerates_number() {
        let (service, store, _) = service();
        store.fail_next_order_numbers(2).await;

        let order = service.create(input()).await.unwrap();

        assert!(order.order_number.is_well_formed());
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_collision_retry_gives_up_after_max_attempts() {
        let (service, store, publisher) = service();
        store.fail_next_order_numbers(3).await;

        let err = service.create(input()).await.unwrap_err();

        assert!(matches!(
            err,
            LifecycleError::Persistence {
                source: StoreError::DuplicateOrderNumber(_),
                ..
            }
        ));
        assert_eq!(store.order_count().await, 0);
        assert!(publisher.events().is_empty());
    }

    #[tokio::test]
    async fn test_list_normalizes_paging() {
        let (service, _, _) = service();
        service.create(input()).await.unwrap();

        let page = service
            .list(OrderQuery {
                page: Some(0),
                page_size: Some(1000),
                ..OrderQuery::default()
            })
            .await
            .unwrap();

        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 100);
        assert_eq!(page.total, 1);
    }

    #[test]
    fn test_cancellation_outcome_completeness() {
        let order = OrderFactory::new_order(input()).unwrap();
        let mut outcome = CancellationOutcome {
            cancelled: vec![order.seller_orders[0].id],
            order,
            skipped: Vec::new(),
            failed: Vec::new(),
        };
        assert!(outcome.is_complete());

        outcome.failed.push(FailedSellerOrder {
            id: SellerOrderId::new(),
            error: "boom".to_string(),
        });
        assert!(!outcome.is_complete());
    }
}

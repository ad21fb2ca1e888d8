//! Integration tests for the order lifecycle service over the in-memory store.

use common::{OrderId, SellerOrderId, Version};
use domain::{
    Address, BuyerId, Money, NewOrder, NewOrderItem, Order, OrderError, OrderStatus, SellerId,
};
use lifecycle::{
    ErrorKind, InMemoryEventPublisher, LifecycleError, OrderLifecycleService, OrderQuery,
    OutboxEventPublisher, OutboxRelay,
};
use store::{InMemoryOrderRepository, InMemorySellerOrderRepository, InMemoryStore};

type TestService = OrderLifecycleService<
    InMemoryOrderRepository,
    InMemorySellerOrderRepository,
    InMemoryEventPublisher,
>;

struct TestHarness {
    service: TestService,
    store: InMemoryStore,
    publisher: InMemoryEventPublisher,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryStore::new();
        let publisher = InMemoryEventPublisher::new();
        let service =
            OrderLifecycleService::new(store.orders(), store.seller_orders(), publisher.clone());

        Self {
            service,
            store,
            publisher,
        }
    }

    /// Buyer B1 orders item A from S1 (2 x 500) and item B from S2 (1 x 1000).
    async fn create_order(&self) -> Order {
        self.service
            .create(NewOrder::new(
                "B1",
                address(),
                vec![
                    NewOrderItem::new("A", "Item A", 2, Money::from_cents(500), "S1"),
                    NewOrderItem::new("B", "Item B", 1, Money::from_cents(1000), "S2"),
                ],
            ))
            .await
            .unwrap()
    }

    async fn advance_seller_order(&self, id: SellerOrderId, path: &[&str]) {
        for status in path {
            self.service
                .update_seller_order_status(id, status)
                .await
                .unwrap();
        }
    }
}

fn address() -> Address {
    Address {
        full_name: "Bea Buyer".to_string(),
        address_line1: "9 Elm St".to_string(),
        city: "Portland".to_string(),
        state: "OR".to_string(),
        postal_code: "97201".to_string(),
        country_code: "US".to_string(),
        ..Address::default()
    }
}

#[tokio::test]
async fn test_create_order_end_to_end() {
    let h = TestHarness::new();
    let order = h.create_order().await;

    assert_eq!(order.subtotal_cents, Money::from_cents(2000));
    assert_eq!(order.total_cents, Money::from_cents(2000));
    assert_eq!(order.currency, "USD");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.seller_orders.len(), 2);
    for seller_order in &order.seller_orders {
        assert_eq!(seller_order.subtotal_cents, Money::from_cents(1000));
        assert_eq!(seller_order.status, OrderStatus::Pending);
    }
    assert!(order.check_invariants().is_ok());

    let stored = h.service.get(order.id).await.unwrap();
    assert_eq!(stored, order);

    let events = h.publisher.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].subject, "order.created");
    let payload = &events[0].payload;
    assert_eq!(payload["buyer_id"], "B1");
    assert_eq!(payload["total_cents"], 2000);
    assert_eq!(payload["items"].as_array().unwrap().len(), 2);
    assert_eq!(payload["items"][0]["seller_id"], "S1");
}

#[tokio::test]
async fn test_create_survives_publish_failure() {
    let h = TestHarness::new();
    h.publisher.set_fail(true);

    let order = h.create_order().await;

    assert!(h.service.get(order.id).await.is_ok());
    assert!(h.publisher.events().is_empty());
}

#[tokio::test]
async fn test_create_is_atomic_when_a_seller_order_fails() {
    let h = TestHarness::new();
    h.store
        .fail_seller_order_create(Some(SellerId::new("S2")))
        .await;

    let err = h
        .service
        .create(NewOrder::new(
            "B1",
            address(),
            vec![
                NewOrderItem::new("A", "Item A", 2, Money::from_cents(500), "S1"),
                NewOrderItem::new("B", "Item B", 1, Money::from_cents(1000), "S2"),
            ],
        ))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.store.seller_order_count().await, 0);
    assert!(h.publisher.events().is_empty());
}

#[tokio::test]
async fn test_order_status_walk_publishes_mapped_subjects() {
    let h = TestHarness::new();
    let order = h.create_order().await;
    h.publisher.clear();

    for status in ["confirmed", "processing", "shipped", "delivered", "completed"] {
        let updated = h
            .service
            .update_order_status(order.id, status)
            .await
            .unwrap();
        assert_eq!(updated.status.as_str(), status);
    }

    let subjects: Vec<String> = h.publisher.events().into_iter().map(|e| e.subject).collect();
    assert_eq!(
        subjects,
        vec![
            "order.confirmed",
            "order.shipped",
            "order.delivered",
            "order.completed"
        ]
    );

    let stored = h.service.get(order.id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Completed);
    assert_eq!(stored.version, Version::new(6));
}

#[tokio::test]
async fn test_self_transition_is_rejected_without_mutation() {
    let h = TestHarness::new();
    let order = h.create_order().await;
    h.publisher.clear();

    let err = h
        .service
        .update_order_status(order.id, "pending")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    let stored = h.service.get(order.id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.version, Version::first());
    assert!(h.publisher.events().is_empty());
}

#[tokio::test]
async fn test_unknown_status_is_rejected_case_sensitively() {
    let h = TestHarness::new();
    let order = h.create_order().await;

    let err = h
        .service
        .update_order_status(order.id, "Confirmed")
        .await
        .unwrap_err();

    match err {
        LifecycleError::InvalidTransition(OrderError::InvalidTransition { from, to, .. }) => {
            assert_eq!(from, OrderStatus::Pending);
            assert_eq!(to, "Confirmed");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_entities_are_not_found() {
    let h = TestHarness::new();

    let err = h
        .service
        .update_order_status(OrderId::new(), "confirmed")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h
        .service
        .update_seller_order_status(SellerOrderId::new(), "confirmed")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h.service.get_by_order_number("ORD-20240101-ZZZZ").await;
    assert!(matches!(err, Err(LifecycleError::NotFound { .. })));
}

#[tokio::test]
async fn test_seller_order_update_publishes_in_parent_context() {
    let h = TestHarness::new();
    let order = h.create_order().await;
    let seller_order = order.seller_orders[0].id;
    h.publisher.clear();

    h.advance_seller_order(seller_order, &["confirmed", "processing"])
        .await;

    let events = h.publisher.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].subject, "order.confirmed");
    assert_eq!(events[0].payload["order_id"], order.id.to_string());
    assert_eq!(events[0].payload["order_number"], order.order_number.as_str());
    assert_eq!(events[0].payload["status"], "confirmed");

    // The parent order keeps its own status.
    let parent = h.service.get(order.id).await.unwrap();
    assert_eq!(parent.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_seller_order_update_skips_event_when_parent_unavailable() {
    let h = TestHarness::new();
    let order = h.create_order().await;
    let seller_order = order.seller_orders[1].id;
    h.publisher.clear();
    h.store.fail_order_reads(true).await;

    let updated = h
        .service
        .update_seller_order_status(seller_order, "confirmed")
        .await
        .unwrap();

    assert_eq!(updated.status, OrderStatus::Confirmed);
    assert!(h.publisher.events().is_empty());
}

#[tokio::test]
async fn test_cancel_cascade_boundary() {
    let h = TestHarness::new();
    let order = h.create_order().await;
    let pending = order.seller_orders[0].id;
    let shipped = order.seller_orders[1].id;
    h.advance_seller_order(shipped, &["confirmed", "processing", "shipped"])
        .await;
    h.publisher.clear();

    let outcome = h
        .service
        .cancel(order.id, &BuyerId::new("B1"))
        .await
        .unwrap();

    assert_eq!(outcome.order.status, OrderStatus::Cancelled);
    assert_eq!(outcome.cancelled, vec![pending]);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].id, shipped);
    assert_eq!(outcome.skipped[0].status, OrderStatus::Shipped);
    assert!(outcome.failed.is_empty());

    let stored = h.service.get(order.id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Cancelled);
    let statuses: Vec<OrderStatus> = stored.seller_orders.iter().map(|so| so.status).collect();
    assert_eq!(statuses, vec![OrderStatus::Cancelled, OrderStatus::Shipped]);

    let cancelled = h.publisher.events_for("order.cancelled");
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].payload["status"], "cancelled");
}

#[tokio::test]
async fn test_cancel_cascade_records_failures_and_still_publishes() {
    let h = TestHarness::new();
    let order = h.create_order().await;
    let broken = order.seller_orders[1].id;
    h.store.fail_seller_order_update(Some(broken)).await;

    let outcome = h
        .service
        .cancel(order.id, &BuyerId::new("B1"))
        .await
        .unwrap();

    assert_eq!(outcome.order.status, OrderStatus::Cancelled);
    assert_eq!(outcome.cancelled, vec![order.seller_orders[0].id]);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].id, broken);
    assert!(!outcome.is_complete());
    assert_eq!(h.publisher.events_for("order.cancelled").len(), 1);
}

#[tokio::test]
async fn test_cancel_requires_ownership() {
    let h = TestHarness::new();
    let order = h.create_order().await;

    let err = h
        .service
        .cancel(order.id, &BuyerId::new("B2"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    let stored = h.service.get(order.id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert!(
        stored
            .seller_orders
            .iter()
            .all(|so| so.status == OrderStatus::Pending)
    );
}

#[tokio::test]
async fn test_cancel_rejected_once_shipped() {
    let h = TestHarness::new();
    let order = h.create_order().await;
    for status in ["confirmed", "processing", "shipped"] {
        h.service
            .update_order_status(order.id, status)
            .await
            .unwrap();
    }

    let err = h
        .service
        .cancel(order.id, &BuyerId::new("B1"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    assert!(err.to_string().contains("shipped"));
}

#[tokio::test]
async fn test_listing_and_lookups() {
    let h = TestHarness::new();
    let first = h.create_order().await;
    let second = h.create_order().await;
    h.service
        .update_order_status(second.id, "confirmed")
        .await
        .unwrap();

    let all = h.service.list(OrderQuery::default()).await.unwrap();
    assert_eq!(all.total, 2);

    let confirmed = h
        .service
        .list(OrderQuery {
            status: Some(OrderStatus::Confirmed),
            ..OrderQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(confirmed.total, 1);
    assert_eq!(confirmed.items[0].id, second.id);

    let by_number = h
        .service
        .get_by_order_number(first.order_number.as_str())
        .await
        .unwrap();
    assert_eq!(by_number.id, first.id);

    let for_order = h
        .service
        .list_seller_orders_for_order(first.id)
        .await
        .unwrap();
    assert_eq!(for_order.len(), 2);

    let for_seller = h
        .service
        .list_seller_orders_for_seller(&SellerId::new("S1"), None, Some(1))
        .await
        .unwrap();
    assert_eq!(for_seller.total, 2);
    assert_eq!(for_seller.items.len(), 1);
}

#[tokio::test]
async fn test_outbox_publisher_with_relay_delivers_events() {
    let store = InMemoryStore::new();
    let downstream = InMemoryEventPublisher::new();
    let service = OrderLifecycleService::new(
        store.orders(),
        store.seller_orders(),
        OutboxEventPublisher::new(store.outbox()),
    );
    let relay = OutboxRelay::new(store.outbox(), downstream.clone());

    let order = service
        .create(NewOrder::new(
            "B1",
            address(),
            vec![NewOrderItem::new("A", "Item A", 1, Money::from_cents(500), "S1")],
        ))
        .await
        .unwrap();
    service
        .update_order_status(order.id, "confirmed")
        .await
        .unwrap();

    assert!(downstream.events().is_empty());
    let report = relay.drain_once(10).await.unwrap();
    assert_eq!(report.delivered, 2);

    let subjects: Vec<String> = downstream.events().into_iter().map(|e| e.subject).collect();
    assert_eq!(subjects, vec!["order.created", "order.confirmed"]);
}

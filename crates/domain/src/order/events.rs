//! Outbound integration event subjects and payloads.
//!
//! Field names of the payloads are a contract with downstream consumers and
//! must not change.

use common::OrderId;
use serde::{Deserialize, Serialize};

use super::{BuyerId, Money, Order, OrderNumber, OrderStatus, ProductId, SellerId, VariantId};

pub const ORDER_CREATED: &str = "order.created";
pub const ORDER_CONFIRMED: &str = "order.confirmed";
pub const ORDER_CANCELLED: &str = "order.cancelled";
pub const ORDER_SHIPPED: &str = "order.shipped";
pub const ORDER_DELIVERED: &str = "order.delivered";
pub const ORDER_COMPLETED: &str = "order.completed";

/// Maps a status reached by a transition to the subject announcing it.
///
/// Returns `None` for statuses nobody downstream listens for; callers must
/// not publish anything in that case.
pub fn subject_for(status: OrderStatus) -> Option<&'static str> {
    match status {
        OrderStatus::Confirmed => Some(ORDER_CONFIRMED),
        OrderStatus::Cancelled => Some(ORDER_CANCELLED),
        OrderStatus::Shipped => Some(ORDER_SHIPPED),
        OrderStatus::Delivered => Some(ORDER_DELIVERED),
        OrderStatus::Completed => Some(ORDER_COMPLETED),
        OrderStatus::Pending | OrderStatus::Processing | OrderStatus::Refunded => None,
    }
}

/// Payload of `order.created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedPayload {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub buyer_id: BuyerId,
    pub total_cents: Money,
    pub currency: String,
    pub items: Vec<OrderCreatedItem>,
}

/// One line of [`OrderCreatedPayload`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedItem {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    pub unit_price_cents: Money,
    pub seller_id: SellerId,
}

impl From<&Order> for OrderCreatedPayload {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            order_number: order.order_number.clone(),
            buyer_id: order.buyer_id.clone(),
            total_cents: order.total_cents,
            currency: order.currency.clone(),
            items: order
                .items
                .iter()
                .map(|item| OrderCreatedItem {
                    product_id: item.product_id.clone(),
                    variant_id: item.variant_id.clone(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price_cents,
                    seller_id: item.seller_id.clone(),
                })
                .collect(),
        }
    }
}

/// Payload of every `order.<status>` subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusPayload {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub buyer_id: BuyerId,
    pub status: OrderStatus,
}

impl OrderStatusPayload {
    /// Builds the payload from the parent order and the status just reached.
    ///
    /// For seller order transitions `status` is the seller order's new
    /// status, not the parent's.
    pub fn new(order: &Order, status: OrderStatus) -> Self {
        Self {
            order_id: order.id,
            order_number: order.order_number.clone(),
            buyer_id: order.buyer_id.clone(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Address, NewOrder, NewOrderItem, OrderFactory};

    fn sample_order() -> Order {
        OrderFactory::new_order(NewOrder::new(
            "B1",
            Address::default(),
            vec![
                NewOrderItem::new("A", "Widget", 2, Money::from_cents(500), "S1")
                    .with_variant("A-RED", "Red"),
                NewOrderItem::new("B", "Gadget", 1, Money::from_cents(1000), "S2"),
            ],
        ))
        .unwrap()
    }

    #[test]
    fn test_notable_statuses_have_distinct_subjects() {
        let subjects: Vec<_> = [
            OrderStatus::Confirmed,
            OrderStatus::Cancelled,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Completed,
        ]
        .into_iter()
        .map(|s| subject_for(s).unwrap())
        .collect();

        let unique: std::collections::HashSet<_> = subjects.iter().collect();
        assert_eq!(unique.len(), 5);
        assert!(subjects.iter().all(|s| !s.is_empty()));
        assert_eq!(subject_for(OrderStatus::Shipped), Some("order.shipped"));
    }

    #[test]
    fn test_quiet_statuses_have_no_subject() {
        assert_eq!(subject_for(OrderStatus::Pending), None);
        assert_eq!(subject_for(OrderStatus::Processing), None);
        assert_eq!(subject_for(OrderStatus::Refunded), None);
    }

    #[test]
    fn test_created_payload_shape() {
        let order = sample_order();
        let json = serde_json::to_value(OrderCreatedPayload::from(&order)).unwrap();

        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 6, "unexpected payload fields: {keys:?}");
        assert_eq!(json["order_id"], order.id.to_string());
        assert_eq!(json["order_number"], order.order_number.as_str());
        assert_eq!(json["buyer_id"], "B1");
        assert_eq!(json["total_cents"], 2000);
        assert_eq!(json["currency"], "USD");

        let items = json["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0],
            serde_json::json!({
                "product_id": "A",
                "variant_id": "A-RED",
                "quantity": 2,
                "unit_price_cents": 500,
                "seller_id": "S1"
            })
        );
        assert_eq!(items[1]["variant_id"], serde_json::Value::Null);
    }

    #[test]
    fn test_status_payload_shape() {
        let order = sample_order();
        let json =
            serde_json::to_value(OrderStatusPayload::new(&order, OrderStatus::Shipped)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "order_id": order.id.to_string(),
                "order_number": order.order_number.as_str(),
                "buyer_id": "B1",
                "status": "shipped"
            })
        );
    }
}

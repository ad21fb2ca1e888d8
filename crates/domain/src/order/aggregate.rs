//! Order aggregate, its line items and per-seller partitions.

use chrono::{DateTime, Utc};
use common::{OrderId, OrderItemId, SellerOrderId, Version};
use serde::{Deserialize, Serialize};

use super::{
    Address, BuyerId, Money, OrderError, OrderNumber, OrderStatus, ProductId, SellerId, VariantId,
};

/// A single line of an order. Written once at creation and never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price_cents: Money,
    /// `unit_price_cents * quantity`.
    pub total_cents: Money,
    pub seller_id: SellerId,
    pub image_url: Option<String>,
}

/// The portion of an order that belongs to one seller.
///
/// Its status is progressed independently of the parent order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerOrder {
    pub id: SellerOrderId,
    pub order_id: OrderId,
    pub seller_id: SellerId,
    pub status: OrderStatus,
    pub subtotal_cents: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: Version,
}

/// Order aggregate root.
///
/// Holds one checkout for one buyer, possibly spanning several sellers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub buyer_id: BuyerId,
    pub status: OrderStatus,
    pub subtotal_cents: Money,
    pub shipping_cents: Money,
    pub tax_cents: Money,
    pub discount_cents: Money,
    pub total_cents: Money,
    pub currency: String,
    pub shipping_address: Address,
    pub items: Vec<OrderItem>,
    pub seller_orders: Vec<SellerOrder>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: Version,
}

impl Order {
    /// Returns the number of line items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the seller order for `seller_id`, if the order has one.
    pub fn seller_order_for(&self, seller_id: &SellerId) -> Option<&SellerOrder> {
        self.seller_orders.iter().find(|so| &so.seller_id == seller_id)
    }

    /// Returns true if `buyer_id` placed this order.
    pub fn is_owned_by(&self, buyer_id: &BuyerId) -> bool {
        &self.buyer_id == buyer_id
    }

    /// Total implied by the pricing components.
    pub fn expected_total(&self) -> Result<Money, OrderError> {
        self.subtotal_cents
            .checked_add(self.shipping_cents)
            .and_then(|m| m.checked_add(self.tax_cents))
            .and_then(|m| m.checked_sub(self.discount_cents))
            .ok_or(OrderError::AmountOverflow)
    }

    /// Verifies the numeric and ownership invariants of the aggregate.
    pub fn check_invariants(&self) -> Result<(), OrderError> {
        let expected = self.expected_total()?;
        if self.total_cents != expected {
            return Err(OrderError::TotalMismatch {
                expected,
                actual: self.total_cents,
            });
        }

        let items_total = sum(self.items.iter().map(|i| i.total_cents))?;
        if items_total != self.subtotal_cents {
            return Err(OrderError::SubtotalMismatch {
                expected: items_total,
                actual: self.subtotal_cents,
            });
        }

        for item in &self.items {
            if item.order_id != self.id {
                return Err(OrderError::ForeignItem(item.id));
            }
            if Some(item.total_cents) != item.unit_price_cents.checked_multiply(item.quantity) {
                return Err(OrderError::LineTotalMismatch(item.id));
            }
        }

        for seller_order in &self.seller_orders {
            if seller_order.order_id != self.id {
                return Err(OrderError::ForeignSellerOrder(seller_order.id));
            }
            let group = sum(
                self.items
                    .iter()
                    .filter(|i| i.seller_id == seller_order.seller_id)
                    .map(|i| i.total_cents),
            )?;
            if group != seller_order.subtotal_cents {
                return Err(OrderError::SubtotalMismatch {
                    expected: group,
                    actual: seller_order.subtotal_cents,
                });
            }
        }
        let partitioned = sum(self.seller_orders.iter().map(|so| so.subtotal_cents))?;

        let every_item_partitioned = self.items.iter().all(|item| {
            self.seller_orders
                .iter()
                .filter(|so| so.seller_id == item.seller_id)
                .count()
                == 1
        });
        if !every_item_partitioned || partitioned != self.subtotal_cents {
            return Err(OrderError::PartitionMismatch);
        }

        Ok(())
    }
}

fn sum(amounts: impl IntoIterator<Item = Money>) -> Result<Money, OrderError> {
    Money::checked_sum(amounts).ok_or(OrderError::AmountOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{NewOrder, NewOrderItem, OrderFactory};

    fn order() -> Order {
        OrderFactory::new_order(NewOrder::new(
            "B1",
            Address::default(),
            vec![
                NewOrderItem::new("A", "Widget", 2, Money::from_cents(500), "S1"),
                NewOrderItem::new("B", "Gadget", 1, Money::from_cents(1000), "S2"),
            ],
        ))
        .unwrap()
    }

    #[test]
    fn test_fresh_order_satisfies_invariants() {
        order().check_invariants().unwrap();
    }

    #[test]
    fn test_total_must_include_all_components() {
        let mut order = order();
        order.shipping_cents = Money::from_cents(300);
        assert!(matches!(
            order.check_invariants(),
            Err(OrderError::TotalMismatch { .. })
        ));

        order.discount_cents = Money::from_cents(100);
        order.tax_cents = Money::from_cents(50);
        order.total_cents = order.expected_total().unwrap();
        assert_eq!(order.total_cents, Money::from_cents(2250));
        order.check_invariants().unwrap();
    }

    #[test]
    fn test_overflowing_components_reported() {
        let mut order = order();
        order.shipping_cents = Money::from_cents(i64::MAX);
        assert!(matches!(
            order.check_invariants(),
            Err(OrderError::AmountOverflow)
        ));
    }

    #[test]
    fn test_seller_subtotal_drift_detected() {
        let mut order = order();
        order.seller_orders[0].subtotal_cents = Money::from_cents(999);
        assert!(matches!(
            order.check_invariants(),
            Err(OrderError::SubtotalMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_seller_order_detected() {
        let mut order = order();
        order.seller_orders.pop();
        assert!(matches!(
            order.check_invariants(),
            Err(OrderError::PartitionMismatch)
        ));
    }

    #[test]
    fn test_foreign_item_detected() {
        let mut order = order();
        order.items[1].order_id = OrderId::new();
        assert!(matches!(
            order.check_invariants(),
            Err(OrderError::ForeignItem(_))
        ));
    }

    #[test]
    fn test_ownership() {
        let order = order();
        assert!(order.is_owned_by(&BuyerId::new("B1")));
        assert!(!order.is_owned_by(&BuyerId::new("B2")));
    }
}

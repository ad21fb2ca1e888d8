//! Builds new order aggregates from checkout input.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{OrderId, OrderItemId, SellerOrderId, Version};
use rand::Rng;

use super::{
    DEFAULT_CURRENCY, Money, NewOrder, Order, OrderError, OrderItem, OrderNumber, OrderStatus,
    SellerId, SellerOrder,
};

/// Creates [`Order`] aggregates.
///
/// Line items are expected to be validated already (see
/// [`NewOrder::validate`]); the factory itself only rejects a missing buyer
/// or an empty item list.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFactory;

impl OrderFactory {
    /// Builds an order stamped with the current time.
    pub fn new_order(input: NewOrder) -> Result<Order, OrderError> {
        Self::new_order_at(input, Utc::now(), &mut rand::rng())
    }

    /// Builds an order as if created at `now`, drawing the order-number
    /// suffix from `rng`.
    pub fn new_order_at<R: Rng>(
        input: NewOrder,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Order, OrderError> {
        if input.buyer_id.is_blank() {
            return Err(OrderError::BuyerIdRequired);
        }
        if input.items.is_empty() {
            return Err(OrderError::NoItems);
        }

        let order_id = OrderId::new();

        let mut subtotal = Money::zero();
        let mut items = Vec::with_capacity(input.items.len());
        for item in input.items {
            let total = item.line_total()?;
            subtotal = subtotal
                .checked_add(total)
                .ok_or(OrderError::AmountOverflow)?;
            items.push(OrderItem {
                id: OrderItemId::new(),
                order_id,
                product_id: item.product_id,
                variant_id: item.variant_id,
                product_name: item.product_name,
                variant_name: item.variant_name,
                sku: item.sku,
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                total_cents: total,
                seller_id: item.seller_id,
                image_url: item.image_url,
            });
        }

        let currency = input
            .currency
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        let seller_orders = partition_by_seller(order_id, &items, now);

        Ok(Order {
            id: order_id,
            order_number: OrderNumber::generate(now.date_naive(), rng),
            buyer_id: input.buyer_id,
            status: OrderStatus::Pending,
            subtotal_cents: subtotal,
            shipping_cents: Money::zero(),
            tax_cents: Money::zero(),
            discount_cents: Money::zero(),
            total_cents: subtotal,
            currency,
            shipping_address: input.shipping_address,
            items,
            seller_orders,
            created_at: now,
            updated_at: now,
            version: Version::first(),
        })
    }

    /// Replaces the order number after a uniqueness collision in the store.
    pub fn regenerate_order_number<R: Rng>(order: &mut Order, rng: &mut R) {
        order.order_number = OrderNumber::generate(order.created_at.date_naive(), rng);
    }
}

/// Groups items by seller, one pending [`SellerOrder`] per seller in order of
/// first appearance.
fn partition_by_seller(
    order_id: OrderId,
    items: &[OrderItem],
    now: DateTime<Utc>,
) -> Vec<SellerOrder> {
    let mut index: HashMap<&SellerId, usize> = HashMap::new();
    let mut seller_orders: Vec<SellerOrder> = Vec::new();

    for item in items {
        let slot = *index.entry(&item.seller_id).or_insert_with(|| {
            seller_orders.push(SellerOrder {
                id: SellerOrderId::new(),
                order_id,
                seller_id: item.seller_id.clone(),
                status: OrderStatus::Pending,
                subtotal_cents: Money::zero(),
                created_at: now,
                updated_at: now,
                version: Version::first(),
            });
            seller_orders.len() - 1
        });
        // Seller subtotals are bounded by the order subtotal, which was
        // already checked.
        let seller_order = &mut seller_orders[slot];
        seller_order.subtotal_cents = seller_order.subtotal_cents.saturating_add(item.total_cents);
    }

    seller_orders
}

//! Inputs for placing an order.

use serde::{Deserialize, Serialize};

use super::{Address, BuyerId, Money, OrderError, ProductId, SellerId, VariantId};

/// Largest quantity a single line may carry; quantities are stored as 32-bit
/// signed integers.
pub const MAX_ITEM_QUANTITY: u32 = i32::MAX as u32;

/// A line item as supplied by the buyer at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    #[serde(default)]
    pub variant_name: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price_cents: Money,
    pub seller_id: SellerId,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl NewOrderItem {
    /// Creates an item with the required fields; optional fields start empty.
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price_cents: Money,
        seller_id: impl Into<SellerId>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            variant_id: None,
            product_name: product_name.into(),
            variant_name: None,
            sku: None,
            quantity,
            unit_price_cents,
            seller_id: seller_id.into(),
            image_url: None,
        }
    }

    /// Sets the variant identity and name.
    pub fn with_variant(
        mut self,
        variant_id: impl Into<VariantId>,
        variant_name: impl Into<String>,
    ) -> Self {
        self.variant_id = Some(variant_id.into());
        self.variant_name = Some(variant_name.into());
        self
    }

    /// Sets the SKU.
    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    /// Checks quantity, price, line total and seller of this line.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.quantity == 0 || self.quantity > MAX_ITEM_QUANTITY {
            return Err(OrderError::InvalidQuantity {
                product_id: self.product_id.clone(),
                quantity: self.quantity,
            });
        }
        if !self.unit_price_cents.is_positive() {
            return Err(OrderError::InvalidPrice {
                product_id: self.product_id.clone(),
                price: self.unit_price_cents.cents(),
            });
        }
        if self.seller_id.is_blank() {
            return Err(OrderError::SellerIdRequired {
                product_id: self.product_id.clone(),
            });
        }
        self.line_total().map(|_| ())
    }

    /// Unit price times quantity.
    pub fn line_total(&self) -> Result<Money, OrderError> {
        self.unit_price_cents
            .checked_multiply(self.quantity)
            .ok_or(OrderError::AmountOverflow)
    }
}

/// Everything needed to place an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub buyer_id: BuyerId,
    /// ISO currency code; `USD` when absent or blank.
    #[serde(default)]
    pub currency: Option<String>,
    pub shipping_address: Address,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    /// Creates an order request in the default currency.
    pub fn new(
        buyer_id: impl Into<BuyerId>,
        shipping_address: Address,
        items: Vec<NewOrderItem>,
    ) -> Self {
        Self {
            buyer_id: buyer_id.into(),
            currency: None,
            shipping_address,
            items,
        }
    }

    /// Sets the currency.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    /// Validates the buyer and every line item.
    ///
    /// Runs before anything is persisted; the first failing check wins.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.buyer_id.is_blank() {
            return Err(OrderError::BuyerIdRequired);
        }
        if self.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        self.items.iter().try_for_each(NewOrderItem::validate)?;
        self.subtotal().map(|_| ())
    }

    /// Sum of all line totals.
    pub fn subtotal(&self) -> Result<Money, OrderError> {
        self.items.iter().try_fold(Money::zero(), |acc, item| {
            acc.checked_add(item.line_total()?)
                .ok_or(OrderError::AmountOverflow)
        })
    }
}

//! Rows exchanged across the persistence boundary.

use chrono::{DateTime, Utc};
use common::{CartId, CartLineId, Money, OrderId, OrderStatus, ProductId, UserId};

/// A catalog product as seen by the stock ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: i32,
}

/// A user's cart. One per user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A (product, quantity) line inside a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub id: CartLineId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: i32,
}

/// A cart line joined with the product's current name and price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineDetail {
    pub line_id: CartLineId,
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub quantity: i32,
}

impl CartLineDetail {
    /// Current price times quantity.
    pub fn subtotal(&self) -> Money {
        self.price.multiply(self.quantity)
    }
}

/// Values for a new order row.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total: Money,
    pub shipping_address: String,
}

/// A persisted order header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total: Money,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
}

/// Values for a new order line. The unit price is a copy taken at purchase time.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// An order line joined with the product name.
///
/// `unit_price` comes from the order line itself, never from the live catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineDetail {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i32,
    pub subtotal: Money,
}

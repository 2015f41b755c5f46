use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderStatus, ProductId};
use store::{Order, OrderLineDetail};

/// One purchased line. `price` is the unit price at purchase time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineView {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub quantity: i32,
    pub subtotal: Money,
}

impl From<OrderLineDetail> for OrderLineView {
    fn from(detail: OrderLineDetail) -> Self {
        Self {
            product_id: detail.product_id,
            name: detail.name,
            price: detail.unit_price,
            quantity: detail.quantity,
            subtotal: detail.subtotal,
        }
    }
}

/// An order as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderView {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub total: Money,
    pub lines: Vec<OrderLineView>,
}

impl OrderView {
    pub fn new(order: Order, lines: Vec<OrderLineView>) -> Self {
        Self {
            order_id: order.id,
            status: order.status,
            shipping_address: order.shipping_address,
            created_at: order.created_at,
            total: order.total,
            lines,
        }
    }
}

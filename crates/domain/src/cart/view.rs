use common::{CartId, CartLineId, Money, ProductId};
use store::CartLineDetail;

/// One line of a cart, priced at the current catalog price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineView {
    pub line_id: CartLineId,
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub quantity: i32,
    pub subtotal: Money,
}

impl From<CartLineDetail> for CartLineView {
    fn from(detail: CartLineDetail) -> Self {
        let subtotal = detail.subtotal();
        Self {
            line_id: detail.line_id,
            product_id: detail.product_id,
            name: detail.name,
            price: detail.price,
            quantity: detail.quantity,
            subtotal,
        }
    }
}

/// A cart as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub cart_id: CartId,
    pub lines: Vec<CartLineView>,
    pub total: Money,
}

impl CartView {
    /// Builds a view from line details in insertion order.
    pub fn new(cart_id: CartId, details: Vec<CartLineDetail>) -> Self {
        let lines: Vec<CartLineView> = details.into_iter().map(CartLineView::from).collect();
        let total = lines.iter().map(|l| l.subtotal).sum();
        Self {
            cart_id,
            lines,
            total,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Quantity held for a product, or 0.
    pub fn quantity_of(&self, product_id: ProductId) -> i32 {
        self.lines
            .iter()
            .find(|l| l.product_id == product_id)
            .map_or(0, |l| l.quantity)
    }
}

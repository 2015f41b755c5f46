use async_trait::async_trait;
use common::{CartId, CartLineId, OrderId, ProductId, UserId};

use crate::{
    Cart, CartLine, CartLineDetail, NewOrder, NewOrderLine, Order, OrderLineDetail, Result,
};

/// Cart and cart-line rows.
#[async_trait]
pub trait CartRepository: Send {
    /// Finds the cart owned by a user.
    async fn find_cart_by_user(&mut self, user_id: UserId) -> Result<Option<Cart>>;

    /// Finds the cart owned by a user and locks it until the transaction ends.
    ///
    /// Every operation that changes a cart's lines loads the cart through
    /// this method first, so line changes to one cart are serialized.
    async fn lock_cart_for_user(&mut self, user_id: UserId) -> Result<Option<Cart>>;

    /// Creates the cart for a user.
    ///
    /// Carts are unique per user; a second create fails with `DuplicateCart`
    /// instead of producing another row.
    async fn create_cart(&mut self, user_id: UserId) -> Result<Cart>;

    /// Sets the cart's last-modified timestamp to now.
    async fn touch_cart(&mut self, cart_id: CartId) -> Result<()>;

    /// Finds a cart line by id, regardless of which cart owns it.
    async fn find_line(&mut self, line_id: CartLineId) -> Result<Option<CartLine>>;

    /// Finds the line for a product inside a cart.
    async fn find_line_by_product(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>>;

    /// Inserts a new line.
    ///
    /// `(cart_id, product_id)` is unique; a second insert fails with
    /// `DuplicateCartLine`.
    async fn insert_line(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartLine>;

    /// Overwrites a line's quantity. Fails with `CartLineNotFound` if absent.
    async fn update_line_quantity(&mut self, line_id: CartLineId, quantity: i32) -> Result<()>;

    /// Deletes a line. Fails with `CartLineNotFound` if absent.
    async fn delete_line(&mut self, line_id: CartLineId) -> Result<()>;

    /// Lists the cart's lines with product details, in insertion order.
    async fn list_line_details(&mut self, cart_id: CartId) -> Result<Vec<CartLineDetail>>;

    /// Deletes the given lines of the cart, returning how many were removed.
    ///
    /// Lines of the cart not named in `line_ids` are left in place.
    async fn clear_lines(&mut self, cart_id: CartId, line_ids: &[CartLineId]) -> Result<u64>;
}

/// Order and order-line rows.
#[async_trait]
pub trait OrderRepository: Send {
    /// Inserts an order header with status `pending`.
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order>;

    /// Inserts one line of an order.
    async fn insert_order_line(&mut self, line: NewOrderLine) -> Result<()>;

    /// Finds an order header by id.
    async fn find_order(&mut self, order_id: OrderId) -> Result<Option<Order>>;

    /// Lists a user's orders, newest first.
    async fn list_orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>>;

    /// Lists the lines of an order in insertion order.
    async fn list_order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLineDetail>>;
}

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{CartId, CartLineId, Money, OrderId, OrderStatus, ProductId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Cart, CartLine, CartLineDetail, CartRepository, NewOrder, NewOrderLine, Order,
    OrderLineDetail, OrderRepository, Product, Result, StockLedger, StoreError, Transaction,
    TransactionCoordinator,
};

/// Named points at which the in-memory store can be told to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    DecreaseStock,
    InsertCartLine,
    InsertOrderLine,
    ClearCart,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: BTreeMap<ProductId, Product>,
    carts: BTreeMap<CartId, Cart>,
    lines: BTreeMap<CartLineId, CartLine>,
    orders: BTreeMap<OrderId, Order>,
    order_lines: Vec<NewOrderLine>,
    next_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn product_mut(&mut self, product_id: ProductId) -> Result<&mut Product> {
        self.products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))
    }
}

/// In-memory store implementation for testing and local runs.
///
/// A transaction holds an exclusive lock on the whole state and works on a
/// private copy, so transactions are serialized and a rollback is simply
/// dropping the copy.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_points: Arc<Mutex<HashSet<FailPoint>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a product to the catalog and returns its id.
    pub async fn add_product(&self, name: impl Into<String>, price: Money, stock: i32) -> ProductId {
        let mut state = self.state.lock().await;
        let id = ProductId::new(state.next_id());
        state.products.insert(
            id,
            Product {
                id,
                name: name.into(),
                price,
                stock,
            },
        );
        id
    }

    /// Changes a product's catalog price.
    pub async fn set_price(&self, product_id: ProductId, price: Money) {
        if let Some(product) = self.state.lock().await.products.get_mut(&product_id) {
            product.price = price;
        }
    }

    /// Returns the committed stock of a product.
    pub async fn stock_of(&self, product_id: ProductId) -> Option<i32> {
        self.state
            .lock()
            .await
            .products
            .get(&product_id)
            .map(|p| p.stock)
    }

    /// Returns the committed lines of a user's cart.
    pub async fn cart_lines_of(&self, user_id: UserId) -> Vec<CartLine> {
        let state = self.state.lock().await;
        let Some(cart) = state.carts.values().find(|c| c.user_id == user_id) else {
            return Vec::new();
        };
        state
            .lines
            .values()
            .filter(|l| l.cart_id == cart.id)
            .cloned()
            .collect()
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Returns the number of committed order lines.
    pub async fn order_line_count(&self) -> usize {
        self.state.lock().await.order_lines.len()
    }

    /// Makes the next operation reaching `point` fail with `InjectedFailure`.
    pub async fn fail_on(&self, point: FailPoint) {
        self.fail_points.lock().await.insert(point);
    }
}

#[async_trait]
impl TransactionCoordinator for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            working,
            fail_points: self.fail_points.clone(),
            finished: false,
        })
    }
}

/// A transaction over [`InMemoryStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_points: Arc<Mutex<HashSet<FailPoint>>>,
    finished: bool,
}

impl InMemoryTransaction {
    async fn check(&self, point: FailPoint) -> Result<()> {
        if self.fail_points.lock().await.remove(&point) {
            return Err(StoreError::InjectedFailure(point));
        }
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!("in-memory transaction dropped without commit, rolled back");
        }
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(mut self) -> Result<()> {
        self.check(FailPoint::Commit).await?;
        *self.guard = std::mem::take(&mut self.working);
        self.finished = true;
        Ok(())
    }

    async fn rollback(mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

#[async_trait]
impl StockLedger for InMemoryTransaction {
    async fn get_stock(&mut self, product_id: ProductId) -> Result<i32> {
        Ok(self.working.product_mut(product_id)?.stock)
    }

    async fn decrease_stock(&mut self, product_id: ProductId, amount: i32) -> Result<()> {
        self.check(FailPoint::DecreaseStock).await?;
        let product = self.working.product_mut(product_id)?;
        if product.stock < amount {
            return Err(StoreError::InsufficientStock {
                product_id,
                requested: amount,
            });
        }
        product.stock -= amount;
        Ok(())
    }

    async fn increase_stock(&mut self, product_id: ProductId, amount: i32) -> Result<()> {
        self.working.product_mut(product_id)?.stock += amount;
        Ok(())
    }

    async fn get_product(&mut self, product_id: ProductId) -> Result<Product> {
        Ok(self.working.product_mut(product_id)?.clone())
    }
}

#[async_trait]
impl CartRepository for InMemoryTransaction {
    async fn find_cart_by_user(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        Ok(self
            .working
            .carts
            .values()
            .find(|c| c.user_id == user_id)
            .cloned())
    }

    async fn lock_cart_for_user(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        // The whole state is already held exclusively by this transaction.
        self.find_cart_by_user(user_id).await
    }

    async fn create_cart(&mut self, user_id: UserId) -> Result<Cart> {
        if self.working.carts.values().any(|c| c.user_id == user_id) {
            return Err(StoreError::DuplicateCart { user_id });
        }
        let now = Utc::now();
        let cart = Cart {
            id: CartId::new(self.working.next_id()),
            user_id,
            created_at: now,
            updated_at: now,
        };
        self.working.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn touch_cart(&mut self, cart_id: CartId) -> Result<()> {
        if let Some(cart) = self.working.carts.get_mut(&cart_id) {
            cart.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_line(&mut self, line_id: CartLineId) -> Result<Option<CartLine>> {
        Ok(self.working.lines.get(&line_id).cloned())
    }

    async fn find_line_by_product(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>> {
        Ok(self
            .working
            .lines
            .values()
            .find(|l| l.cart_id == cart_id && l.product_id == product_id)
            .cloned())
    }

    async fn insert_line(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartLine> {
        self.check(FailPoint::InsertCartLine).await?;
        if self
            .working
            .lines
            .values()
            .any(|l| l.cart_id == cart_id && l.product_id == product_id)
        {
            return Err(StoreError::DuplicateCartLine {
                cart_id,
                product_id,
            });
        }
        let line = CartLine {
            id: CartLineId::new(self.working.next_id()),
            cart_id,
            product_id,
            quantity,
        };
        self.working.lines.insert(line.id, line.clone());
        Ok(line)
    }

    async fn update_line_quantity(&mut self, line_id: CartLineId, quantity: i32) -> Result<()> {
        let line = self
            .working
            .lines
            .get_mut(&line_id)
            .ok_or(StoreError::CartLineNotFound(line_id))?;
        line.quantity = quantity;
        Ok(())
    }

    async fn delete_line(&mut self, line_id: CartLineId) -> Result<()> {
        self.working
            .lines
            .remove(&line_id)
            .map(|_| ())
            .ok_or(StoreError::CartLineNotFound(line_id))
    }

    async fn list_line_details(&mut self, cart_id: CartId) -> Result<Vec<CartLineDetail>> {
        // BTreeMap keys are allocated in insertion order.
        self.working
            .lines
            .values()
            .filter(|l| l.cart_id == cart_id)
            .map(|l| {
                let product = self
                    .working
                    .products
                    .get(&l.product_id)
                    .ok_or(StoreError::ProductNotFound(l.product_id))?;
                Ok(CartLineDetail {
                    line_id: l.id,
                    product_id: l.product_id,
                    name: product.name.clone(),
                    price: product.price,
                    quantity: l.quantity,
                })
            })
            .collect()
    }

    async fn clear_lines(&mut self, cart_id: CartId, line_ids: &[CartLineId]) -> Result<u64> {
        self.check(FailPoint::ClearCart).await?;
        let before = self.working.lines.len();
        self.working
            .lines
            .retain(|id, l| l.cart_id != cart_id || !line_ids.contains(id));
        Ok((before - self.working.lines.len()) as u64)
    }
}

#[async_trait]
impl OrderRepository for InMemoryTransaction {
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let order = Order {
            id: OrderId::new(self.working.next_id()),
            user_id: order.user_id,
            total: order.total,
            status: OrderStatus::Pending,
            shipping_address: order.shipping_address,
            created_at: Utc::now(),
        };
        self.working.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn insert_order_line(&mut self, line: NewOrderLine) -> Result<()> {
        self.check(FailPoint::InsertOrderLine).await?;
        self.working.order_lines.push(line);
        Ok(())
    }

    async fn find_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&order_id).cloned())
    }

    async fn list_orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>> {
        let mut orders: Vec<_> = self
            .working
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn list_order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLineDetail>> {
        self.working
            .order_lines
            .iter()
            .filter(|l| l.order_id == order_id)
            .map(|l| {
                let product = self
                    .working
                    .products
                    .get(&l.product_id)
                    .ok_or(StoreError::ProductNotFound(l.product_id))?;
                Ok(OrderLineDetail {
                    product_id: l.product_id,
                    name: product.name.clone(),
                    unit_price: l.unit_price,
                    quantity: l.quantity,
                    subtotal: l.subtotal,
                })
            })
            .collect()
    }
}

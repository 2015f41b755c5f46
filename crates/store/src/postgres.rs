use async_trait::async_trait;
use common::{CartId, CartLineId, Money, OrderId, OrderStatus, ProductId, UserId};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};

use crate::{
    Cart, CartLine, CartLineDetail, CartRepository, NewOrder, NewOrderLine, Order,
    OrderLineDetail, OrderRepository, Product, Result, StockLedger, StoreError, Transaction,
    TransactionCoordinator,
};

/// PostgreSQL-backed store implementation.
///
/// Transactions run at the server default isolation (read committed). Stock
/// safety does not depend on a stronger level: every decrement is a single
/// conditional `UPDATE`.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TransactionCoordinator for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        Ok(PostgresTransaction {
            tx: self.pool.begin().await?,
        })
    }
}

/// A transaction over [`PostgresStore`]. Rolls back when dropped uncommitted.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn row_to_cart(row: PgRow) -> Result<Cart> {
    Ok(Cart {
        id: CartId::new(row.try_get("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_line(row: PgRow) -> Result<CartLine> {
    Ok(CartLine {
        id: CartLineId::new(row.try_get("id")?),
        cart_id: CartId::new(row.try_get("cart_id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        quantity: row.try_get("quantity")?,
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::new(row.try_get("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        total: Money::from_cents(row.try_get("total_cents")?),
        status: OrderStatus::parse(&status)
            .ok_or_else(|| StoreError::CorruptRow(format!("unknown order status '{status}'")))?,
        shipping_address: row.try_get("shipping_address")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl StockLedger for PostgresTransaction {
    async fn get_stock(&mut self, product_id: ProductId) -> Result<i32> {
        sqlx::query_scalar::<_, i32>("SELECT stock FROM products WHERE id = $1")
            .bind(product_id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or(StoreError::ProductNotFound(product_id))
    }

    async fn decrease_stock(&mut self, product_id: ProductId, amount: i32) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - $1, updated_at = NOW()
            WHERE id = $2 AND stock >= $1
            "#,
        )
        .bind(amount)
        .bind(product_id.as_i64())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            // Zero rows means either no such product or not enough stock.
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
                    .bind(product_id.as_i64())
                    .fetch_one(&mut *self.tx)
                    .await?;
            return Err(if exists {
                StoreError::InsufficientStock {
                    product_id,
                    requested: amount,
                }
            } else {
                StoreError::ProductNotFound(product_id)
            });
        }

        tracing::debug!(%product_id, amount, "stock decreased");
        Ok(())
    }

    async fn increase_stock(&mut self, product_id: ProductId, amount: i32) -> Result<()> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock + $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(amount)
        .bind(product_id.as_i64())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(product_id));
        }
        Ok(())
    }

    async fn get_product(&mut self, product_id: ProductId) -> Result<Product> {
        let row = sqlx::query("SELECT id, name, price_cents, stock FROM products WHERE id = $1")
            .bind(product_id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or(StoreError::ProductNotFound(product_id))?;

        Ok(Product {
            id: ProductId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: row.try_get("stock")?,
        })
    }
}

#[async_trait]
impl CartRepository for PostgresTransaction {
    async fn find_cart_by_user(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        sqlx::query("SELECT id, user_id, created_at, updated_at FROM carts WHERE user_id = $1")
            .bind(user_id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(row_to_cart)
            .transpose()
    }

    async fn lock_cart_for_user(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        sqlx::query(
            r#"
            SELECT id, user_id, created_at, updated_at
            FROM carts
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?
        .map(row_to_cart)
        .transpose()
    }

    async fn create_cart(&mut self, user_id: UserId) -> Result<Cart> {
        let row = sqlx::query(
            r#"
            INSERT INTO carts (user_id)
            VALUES ($1)
            RETURNING id, user_id, created_at, updated_at
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_cart_user")
            {
                return StoreError::DuplicateCart { user_id };
            }
            StoreError::Database(e)
        })?;

        row_to_cart(row)
    }

    async fn touch_cart(&mut self, cart_id: CartId) -> Result<()> {
        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id.as_i64())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn find_line(&mut self, line_id: CartLineId) -> Result<Option<CartLine>> {
        sqlx::query("SELECT id, cart_id, product_id, quantity FROM cart_items WHERE id = $1")
            .bind(line_id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(row_to_line)
            .transpose()
    }

    async fn find_line_by_product(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>> {
        sqlx::query(
            r#"
            SELECT id, cart_id, product_id, quantity
            FROM cart_items
            WHERE cart_id = $1 AND product_id = $2
            "#,
        )
        .bind(cart_id.as_i64())
        .bind(product_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?
        .map(row_to_line)
        .transpose()
    }

    async fn insert_line(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartLine> {
        let row = sqlx::query(
            r#"
            INSERT INTO cart_items (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            RETURNING id, cart_id, product_id, quantity
            "#,
        )
        .bind(cart_id.as_i64())
        .bind(product_id.as_i64())
        .bind(quantity)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_cart_product")
            {
                return StoreError::DuplicateCartLine {
                    cart_id,
                    product_id,
                };
            }
            StoreError::Database(e)
        })?;

        row_to_line(row)
    }

    async fn update_line_quantity(&mut self, line_id: CartLineId, quantity: i32) -> Result<()> {
        let result =
            sqlx::query("UPDATE cart_items SET quantity = $1, updated_at = NOW() WHERE id = $2")
                .bind(quantity)
                .bind(line_id.as_i64())
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::CartLineNotFound(line_id));
        }
        Ok(())
    }

    async fn delete_line(&mut self, line_id: CartLineId) -> Result<()> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(line_id.as_i64())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::CartLineNotFound(line_id));
        }
        Ok(())
    }

    async fn list_line_details(&mut self, cart_id: CartId) -> Result<Vec<CartLineDetail>> {
        let rows = sqlx::query(
            r#"
            SELECT ci.id, ci.product_id, p.name, p.price_cents, ci.quantity
            FROM cart_items ci
            JOIN products p ON ci.product_id = p.id
            WHERE ci.cart_id = $1
            ORDER BY ci.id ASC
            "#,
        )
        .bind(cart_id.as_i64())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CartLineDetail {
                    line_id: CartLineId::new(row.try_get("id")?),
                    product_id: ProductId::new(row.try_get("product_id")?),
                    name: row.try_get("name")?,
                    price: Money::from_cents(row.try_get("price_cents")?),
                    quantity: row.try_get("quantity")?,
                })
            })
            .collect()
    }

    async fn clear_lines(&mut self, cart_id: CartId, line_ids: &[CartLineId]) -> Result<u64> {
        let ids: Vec<i64> = line_ids.iter().map(|id| id.as_i64()).collect();
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND id = ANY($2)")
            .bind(cart_id.as_i64())
            .bind(ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl OrderRepository for PostgresTransaction {
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let row = sqlx::query(
            r#"
            INSERT INTO orders (user_id, total_cents, status, shipping_address)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, total_cents, status, shipping_address, created_at
            "#,
        )
        .bind(order.user_id.as_i64())
        .bind(order.total.cents())
        .bind(OrderStatus::Pending.as_str())
        .bind(&order.shipping_address)
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_order(row)
    }

    async fn insert_order_line(&mut self, line: NewOrderLine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, quantity, price_cents, subtotal_cents)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(line.order_id.as_i64())
        .bind(line.product_id.as_i64())
        .bind(line.quantity)
        .bind(line.unit_price.cents())
        .bind(line.subtotal.cents())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        sqlx::query(
            r#"
            SELECT id, user_id, total_cents, status, shipping_address, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?
        .map(row_to_order)
        .transpose()
    }

    async fn list_orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, total_cents, status, shipping_address, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_order).collect()
    }

    async fn list_order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLineDetail>> {
        let rows = sqlx::query(
            r#"
            SELECT oi.product_id, p.name, oi.price_cents, oi.quantity, oi.subtotal_cents
            FROM order_items oi
            JOIN products p ON oi.product_id = p.id
            WHERE oi.order_id = $1
            ORDER BY oi.id ASC
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(OrderLineDetail {
                    product_id: ProductId::new(row.try_get("product_id")?),
                    name: row.try_get("name")?,
                    unit_price: Money::from_cents(row.try_get("price_cents")?),
                    quantity: row.try_get("quantity")?,
                    subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
                })
            })
            .collect()
    }
}

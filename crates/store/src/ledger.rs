use async_trait::async_trait;
use common::{Money, ProductId};

use crate::{Product, Result};

/// Per-product available quantity.
///
/// Stock is never written directly: it only moves through the conditional
/// [`decrease_stock`](StockLedger::decrease_stock) and the compensating
/// [`increase_stock`](StockLedger::increase_stock). Implementations must
/// keep `stock >= 0` for every product at all times.
#[async_trait]
pub trait StockLedger: Send {
    /// Reads the current stock of a product.
    ///
    /// Fails with `ProductNotFound` if the product does not exist.
    async fn get_stock(&mut self, product_id: ProductId) -> Result<i32>;

    /// Decrements stock by `amount` only if at least `amount` is available.
    ///
    /// The check and the update are one indivisible store operation, so two
    /// concurrent callers can never both succeed against the same units.
    /// Fails with `InsufficientStock` when the precondition does not hold and
    /// with `ProductNotFound` when the product does not exist.
    async fn decrease_stock(&mut self, product_id: ProductId, amount: i32) -> Result<()>;

    /// Returns `amount` units to the product's stock.
    async fn increase_stock(&mut self, product_id: ProductId, amount: i32) -> Result<()>;

    /// Loads a product with its current name, price and stock.
    async fn get_product(&mut self, product_id: ProductId) -> Result<Product>;

    /// Reads the current catalog price of a product.
    async fn get_product_price(&mut self, product_id: ProductId) -> Result<Money> {
        Ok(self.get_product(product_id).await?.price)
    }
}

use common::{CartId, CartLineId, ProductId, UserId};
use thiserror::Error;

use crate::memory::FailPoint;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The product does not exist in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A conditional stock decrement found less stock than requested.
    #[error("Insufficient stock for product {product_id}: requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i32,
    },

    /// The cart line does not exist.
    #[error("Cart line not found: {0}")]
    CartLineNotFound(CartLineId),

    /// A second cart was created for a user who already owns one.
    #[error("Cart already exists for user {user_id}")]
    DuplicateCart { user_id: UserId },

    /// A second line was inserted for a product already in the cart.
    #[error("Cart {cart_id} already has a line for product {product_id}")]
    DuplicateCartLine {
        cart_id: CartId,
        product_id: ProductId,
    },

    /// A failure armed through the in-memory store's fault injection.
    #[error("Injected failure at {0:?}")]
    InjectedFailure(FailPoint),

    /// A stored value could not be mapped back to a domain type.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

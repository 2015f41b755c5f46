//! Domain error types.

use common::ProductId;
use store::StoreError;
use thiserror::Error;

/// Input rejected before any transaction is opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// User ids are positive.
    #[error("Invalid user id: {0}")]
    InvalidUserId(i64),

    /// Quantities are positive.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: i32 },

    /// Orders need somewhere to ship to.
    #[error("Shipping address is required")]
    ShippingAddressRequired,

    /// There is nothing in the cart to order.
    #[error("Cart is empty")]
    EmptyCart,
}

/// Errors that can occur during cart and order operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Bad input shape or values.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// An unknown product, cart, cart line or order.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Not enough stock to satisfy the request.
    #[error("Insufficient stock for product {product_id}: requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i32,
    },

    /// A concurrent request created the same row first.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The backing store failed.
    #[error("Storage error during {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl DomainError {
    pub(crate) fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Converts a store error, keeping its kind and recording the operation.
    pub fn from_store(operation: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::ProductNotFound(id) => DomainError::not_found("Product", id),
            StoreError::CartLineNotFound(id) => DomainError::not_found("Cart line", id),
            StoreError::InsufficientStock {
                product_id,
                requested,
            } => DomainError::InsufficientStock {
                product_id,
                requested,
            },
            StoreError::DuplicateCart { user_id } => {
                DomainError::Conflict(format!("cart for user {user_id} was created concurrently"))
            }
            StoreError::DuplicateCartLine {
                cart_id,
                product_id,
            } => DomainError::Conflict(format!(
                "product {product_id} was added to cart {cart_id} concurrently"
            )),
            source => DomainError::Storage { operation, source },
        }
    }
}

/// Attaches the failing operation to store results.
pub(crate) trait StoreResultExt<T> {
    fn during(self, operation: &'static str) -> Result<T, DomainError>;
}

impl<T> StoreResultExt<T> for store::Result<T> {
    fn during(self, operation: &'static str) -> Result<T, DomainError> {
        self.map_err(|e| DomainError::from_store(operation, e))
    }
}

/// Counts requests turned away for lack of stock.
pub(crate) fn note_rejection(operation: &'static str, err: &DomainError) {
    if matches!(err, DomainError::InsufficientStock { .. }) {
        metrics::counter!("stock_rejections_total", "operation" => operation).increment(1);
    }
}

//! Requests accepted by the core.

use common::{CartLineId, ProductId};

use crate::error::ValidationError;

/// A request that can be checked before any transaction is opened.
pub trait Command: Send + Sync {
    /// Rejects malformed input.
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Command to add a product to the caller's cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddToCart {
    /// The product to add.
    pub product_id: ProductId,

    /// Units to add on top of whatever the cart already holds.
    pub quantity: i32,
}

impl AddToCart {
    /// Creates a new AddToCart command.
    pub fn new(product_id: ProductId, quantity: i32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

impl Command for AddToCart {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.quantity <= 0 {
            return Err(ValidationError::InvalidQuantity {
                quantity: self.quantity,
            });
        }
        Ok(())
    }
}

/// Command to remove a line from the caller's cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveFromCart {
    /// The line to remove.
    pub line_id: CartLineId,
}

impl RemoveFromCart {
    /// Creates a new RemoveFromCart command.
    pub fn new(line_id: CartLineId) -> Self {
        Self { line_id }
    }
}

impl Command for RemoveFromCart {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Command to turn the caller's cart into an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrder {
    /// Where the order ships to.
    pub shipping_address: String,
}

impl PlaceOrder {
    /// Creates a new PlaceOrder command.
    pub fn new(shipping_address: impl Into<String>) -> Self {
        Self {
            shipping_address: shipping_address.into(),
        }
    }

    /// The address as it will be stored.
    pub fn normalized_address(&self) -> &str {
        self.shipping_address.trim()
    }
}

impl Command for PlaceOrder {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.normalized_address().is_empty() {
            return Err(ValidationError::ShippingAddressRequired);
        }
        Ok(())
    }
}

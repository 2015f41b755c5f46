//! Inventory-consistent cart and order core.
//!
//! This crate provides:
//! - `CartService` for reading a cart, adding lines (reserving stock) and removing lines
//! - `OrderFactory` for turning a cart into an order and reading order history
//! - Commands with up-front validation
//! - The `DomainError` taxonomy returned by every operation
//!
//! Every operation runs in exactly one transaction obtained from a
//! [`store::TransactionCoordinator`]; callers identify themselves with an
//! explicit [`UserIdentity`].

pub mod cart;
pub mod command;
pub mod error;
pub mod identity;
pub mod order;

pub use cart::{CartLineView, CartPolicy, CartService, CartView};
pub use command::{AddToCart, Command, PlaceOrder, RemoveFromCart};
pub use error::{DomainError, ValidationError};
pub use identity::{Role, UserIdentity};
pub use order::{OrderFactory, OrderLineView, OrderView};

//! Shared value types for the storefront core.

mod money;
mod status;
mod types;

pub use money::Money;
pub use status::OrderStatus;
pub use types::{CartId, CartLineId, OrderId, ProductId, UserId};

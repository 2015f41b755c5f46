//! The user's cart: add-time stock reservation and line management.

mod service;
mod view;

pub use service::{CartPolicy, CartService};
pub use view::{CartLineView, CartView};

//! Turning a cart into an order, and reading order history.

mod factory;
mod view;

pub use factory::OrderFactory;
pub use view::{OrderLineView, OrderView};

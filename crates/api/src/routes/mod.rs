pub mod cart;
pub mod ops;
pub mod orders;

use domain::{CartService, OrderFactory};
use store::TransactionCoordinator;

/// Shared application state accessible from all handlers.
pub struct AppState<C: TransactionCoordinator> {
    pub carts: CartService<C>,
    pub orders: OrderFactory<C>,
}

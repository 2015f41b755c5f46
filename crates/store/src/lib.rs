//! Transactional persistence boundary for the storefront core.
//!
//! The core reaches storage only through a [`TransactionCoordinator`]. Each
//! [`Transaction`] it hands out is at once the [`StockLedger`], the
//! [`CartRepository`] and the [`OrderRepository`], so every multi-row
//! operation runs in exactly one all-or-nothing scope.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod repository;
pub mod transaction;

pub use error::{Result, StoreError};
pub use ledger::StockLedger;
pub use memory::{FailPoint, InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use records::{
    Cart, CartLine, CartLineDetail, NewOrder, NewOrderLine, Order, OrderLineDetail, Product,
};
pub use repository::{CartRepository, OrderRepository};
pub use transaction::{Transaction, TransactionCoordinator};

use async_trait::async_trait;

use crate::{CartRepository, OrderRepository, Result, StockLedger};

/// One all-or-nothing unit of work.
///
/// A transaction is an owned resource. [`commit`](Transaction::commit) makes
/// every write visible at once; dropping the value without committing rolls
/// everything back. That covers early `?` returns, panics and a cancelled
/// request future alike, so callers never release a transaction by hand on
/// the failure path.
#[async_trait]
pub trait Transaction: StockLedger + CartRepository + OrderRepository + Send {
    /// Persists all writes made through this transaction.
    async fn commit(self) -> Result<()>;

    /// Discards all writes made through this transaction.
    async fn rollback(self) -> Result<()>;
}

/// Hands out transactions against a backing store.
///
/// Nested transactions are not supported: every multi-row operation runs in
/// exactly one transaction obtained from [`begin`](TransactionCoordinator::begin).
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait TransactionCoordinator: Send + Sync {
    /// The transaction type handed out by this coordinator.
    type Tx: Transaction + 'static;

    /// Starts a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}

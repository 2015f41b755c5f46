//! Cart operations, each running in exactly one transaction.

use common::UserId;
use store::{Cart, CartRepository, StockLedger, Transaction, TransactionCoordinator};

use crate::command::{AddToCart, Command, RemoveFromCart};
use crate::error::{DomainError, StoreResultExt, ValidationError, note_rejection};
use crate::identity::UserIdentity;

use super::CartView;

/// Tunable cart behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartPolicy {
    /// Return a removed line's quantity to stock.
    ///
    /// Units are reserved when they are added to a cart. With this off, units
    /// of a removed line stay reserved until restocked out of band.
    pub restock_on_remove: bool,
}

impl Default for CartPolicy {
    fn default() -> Self {
        Self {
            restock_on_remove: true,
        }
    }
}

/// Service for managing a user's cart.
///
/// Adding to the cart reserves stock through the ledger's conditional
/// decrement, so a line never exists without its matching reservation.
#[derive(Clone)]
pub struct CartService<C: TransactionCoordinator> {
    coordinator: C,
    policy: CartPolicy,
}

impl<C: TransactionCoordinator> CartService<C> {
    /// Creates a cart service with the default policy.
    pub fn new(coordinator: C) -> Self {
        Self::with_policy(coordinator, CartPolicy::default())
    }

    pub fn with_policy(coordinator: C, policy: CartPolicy) -> Self {
        Self {
            coordinator,
            policy,
        }
    }

    pub fn policy(&self) -> CartPolicy {
        self.policy
    }

    /// Returns the caller's cart, creating an empty one on first access.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, identity: &UserIdentity) -> Result<CartView, DomainError> {
        let mut tx = self.coordinator.begin().await.during("begin")?;
        let cart = get_or_create_cart(&mut tx, identity.user_id()).await?;
        let lines = tx.list_line_details(cart.id).await.during("get_cart")?;
        tx.commit().await.during("commit")?;

        Ok(CartView::new(cart.id, lines))
    }

    /// Adds units of a product to the caller's cart, reserving them.
    ///
    /// Re-adding a product already in the cart grows the existing line and
    /// reserves only the added units. Fails with `InsufficientStock` when the
    /// line's resulting quantity exceeds the product's current stock; nothing
    /// changes in that case.
    #[tracing::instrument(skip(self))]
    pub async fn add_to_cart(
        &self,
        identity: &UserIdentity,
        cmd: AddToCart,
    ) -> Result<CartView, DomainError> {
        cmd.validate()?;

        self.add_line(identity.user_id(), &cmd)
            .await
            .inspect_err(|e| note_rejection("add_to_cart", e))
    }

    async fn add_line(&self, user_id: UserId, cmd: &AddToCart) -> Result<CartView, DomainError> {
        let AddToCart {
            product_id,
            quantity,
        } = *cmd;

        let mut tx = self.coordinator.begin().await.during("begin")?;
        let cart = get_or_create_cart(&mut tx, user_id).await?;
        let stock = tx.get_stock(product_id).await.during("add_to_cart")?;

        match tx
            .find_line_by_product(cart.id, product_id)
            .await
            .during("add_to_cart")?
        {
            None => {
                if quantity > stock {
                    return Err(DomainError::InsufficientStock {
                        product_id,
                        requested: quantity,
                    });
                }
                tx.insert_line(cart.id, product_id, quantity)
                    .await
                    .during("add_to_cart")?;
            }
            Some(line) => {
                let new_quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or(ValidationError::InvalidQuantity { quantity })?;
                if new_quantity > stock {
                    return Err(DomainError::InsufficientStock {
                        product_id,
                        requested: new_quantity,
                    });
                }
                tx.update_line_quantity(line.id, new_quantity)
                    .await
                    .during("add_to_cart")?;
            }
        }

        // Only the added units; earlier units were reserved when first added.
        tx.decrease_stock(product_id, quantity)
            .await
            .during("add_to_cart")?;
        tx.touch_cart(cart.id).await.during("add_to_cart")?;

        let lines = tx.list_line_details(cart.id).await.during("add_to_cart")?;
        tx.commit().await.during("commit")?;

        metrics::counter!("cart_lines_added_total").increment(1);
        tracing::debug!(cart_id = %cart.id, %product_id, quantity, "Reserved stock for cart line");

        Ok(CartView::new(cart.id, lines))
    }

    /// Removes a line from the caller's cart.
    ///
    /// Fails with `NotFound` when the line does not exist or belongs to
    /// another user's cart.
    #[tracing::instrument(skip(self))]
    pub async fn remove_from_cart(
        &self,
        identity: &UserIdentity,
        cmd: RemoveFromCart,
    ) -> Result<CartView, DomainError> {
        cmd.validate()?;
        let line_id = cmd.line_id;

        let mut tx = self.coordinator.begin().await.during("begin")?;
        let cart = tx
            .lock_cart_for_user(identity.user_id())
            .await
            .during("remove_from_cart")?
            .ok_or_else(|| DomainError::not_found("Cart line", line_id))?;

        let line = tx
            .find_line(line_id)
            .await
            .during("remove_from_cart")?
            .filter(|line| line.cart_id == cart.id)
            .ok_or_else(|| DomainError::not_found("Cart line", line_id))?;

        tx.delete_line(line.id).await.during("remove_from_cart")?;
        if self.policy.restock_on_remove {
            tx.increase_stock(line.product_id, line.quantity)
                .await
                .during("remove_from_cart")?;
        }
        tx.touch_cart(cart.id).await.during("remove_from_cart")?;

        let lines = tx
            .list_line_details(cart.id)
            .await
            .during("remove_from_cart")?;
        tx.commit().await.during("commit")?;

        metrics::counter!("cart_lines_removed_total").increment(1);

        Ok(CartView::new(cart.id, lines))
    }
}

/// Finds and locks the user's cart, or creates it.
///
/// The lock is held until the transaction ends, so two requests changing the
/// same cart run one after the other. Carts are unique per user, so losing a
/// creation race surfaces as `Conflict` rather than a second cart.
async fn get_or_create_cart<T: Transaction>(
    tx: &mut T,
    user_id: UserId,
) -> Result<Cart, DomainError> {
    if let Some(cart) = tx.lock_cart_for_user(user_id).await.during("find_cart")? {
        return Ok(cart);
    }

    let cart = tx.create_cart(user_id).await.during("create_cart")?;
    tracing::debug!(cart_id = %cart.id, %user_id, "Created cart");
    Ok(cart)
}

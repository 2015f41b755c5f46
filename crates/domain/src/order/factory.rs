//! Order creation: cart to order in a single all-or-nothing transition.

use std::time::Instant;

use common::{CartLineId, OrderId, ProductId, UserId};
use store::{
    CartLineDetail, CartRepository, NewOrder, NewOrderLine, OrderRepository, StockLedger,
    Transaction, TransactionCoordinator,
};

use crate::command::{Command, PlaceOrder};
use crate::error::{DomainError, StoreResultExt, ValidationError, note_rejection};
use crate::identity::UserIdentity;

use super::{OrderLineView, OrderView};

/// Creates orders from carts and serves order history.
#[derive(Clone)]
pub struct OrderFactory<C: TransactionCoordinator> {
    coordinator: C,
}

impl<C: TransactionCoordinator> OrderFactory<C> {
    pub fn new(coordinator: C) -> Self {
        Self { coordinator }
    }

    /// Places an order for everything in the caller's cart.
    ///
    /// Each line's reservation is returned to stock and then taken again
    /// through the conditional decrement, so ordered units leave stock exactly
    /// once. Lines are priced at the current catalog price and copied into the
    /// order, and the ordered lines are removed from the cart in the same
    /// transaction. Any failure leaves the cart, stock and orders exactly as
    /// they were.
    #[tracing::instrument(skip(self))]
    pub async fn place_order(
        &self,
        identity: &UserIdentity,
        cmd: PlaceOrder,
    ) -> Result<OrderView, DomainError> {
        cmd.validate()?;

        let started = Instant::now();
        let result = self
            .create_order(identity.user_id(), cmd.normalized_address())
            .await
            .inspect_err(|e| note_rejection("place_order", e));
        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        result
    }

    async fn create_order(
        &self,
        user_id: UserId,
        shipping_address: &str,
    ) -> Result<OrderView, DomainError> {
        let mut tx = self.coordinator.begin().await.during("begin")?;

        let cart = tx
            .lock_cart_for_user(user_id)
            .await
            .during("place_order")?
            .ok_or(ValidationError::EmptyCart)?;
        let lines = tx.list_line_details(cart.id).await.during("place_order")?;
        if lines.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        let ordered_line_ids: Vec<CartLineId> = lines.iter().map(|line| line.line_id).collect();

        let priced = revalidate(&mut tx, lines).await?;
        let total = priced.iter().map(|line| line.subtotal).sum();

        let order = tx
            .insert_order(NewOrder {
                user_id,
                total,
                shipping_address: shipping_address.to_string(),
            })
            .await
            .during("place_order")?;

        for line in &priced {
            tx.insert_order_line(NewOrderLine {
                order_id: order.id,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.price,
                subtotal: line.subtotal,
            })
            .await
            .during("place_order")?;
            tx.decrease_stock(line.product_id, line.quantity)
                .await
                .during("place_order")?;
        }

        tx.clear_lines(cart.id, &ordered_line_ids)
            .await
            .during("place_order")?;
        tx.touch_cart(cart.id).await.during("place_order")?;
        tx.commit().await.during("commit")?;

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(order_id = %order.id, %user_id, total = %order.total, "Order placed");

        Ok(OrderView::new(order, priced))
    }

    /// Lists the caller's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, identity: &UserIdentity) -> Result<Vec<OrderView>, DomainError> {
        let mut tx = self.coordinator.begin().await.during("begin")?;
        let orders = tx
            .list_orders_for_user(identity.user_id())
            .await
            .during("list_orders")?;

        let mut views = Vec::with_capacity(orders.len());
        for order in orders {
            let lines = tx.list_order_lines(order.id).await.during("list_orders")?;
            views.push(OrderView::new(
                order,
                lines.into_iter().map(OrderLineView::from).collect(),
            ));
        }
        tx.rollback().await.during("rollback")?;

        Ok(views)
    }

    /// Loads one of the caller's orders.
    ///
    /// Orders owned by other users are reported as `NotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(
        &self,
        identity: &UserIdentity,
        order_id: OrderId,
    ) -> Result<OrderView, DomainError> {
        let mut tx = self.coordinator.begin().await.during("begin")?;
        let order = tx
            .find_order(order_id)
            .await
            .during("get_order")?
            .filter(|order| order.user_id == identity.user_id())
            .ok_or_else(|| DomainError::not_found("Order", order_id))?;
        let lines = tx.list_order_lines(order.id).await.during("get_order")?;
        tx.rollback().await.during("rollback")?;

        Ok(OrderView::new(
            order,
            lines.into_iter().map(OrderLineView::from).collect(),
        ))
    }
}

/// Returns each line's reservation to stock, then checks the line against
/// live stock and prices it.
///
/// The caller takes the units again with `decrease_stock`, which fails the
/// whole placement if stock was drawn down below the reservation out of band.
async fn revalidate<T: Transaction>(
    tx: &mut T,
    lines: Vec<CartLineDetail>,
) -> Result<Vec<OrderLineView>, DomainError> {
    // Product rows are locked in id order so concurrent checkouts cannot deadlock.
    let mut returns: Vec<(ProductId, i32)> = lines
        .iter()
        .map(|line| (line.product_id, line.quantity))
        .collect();
    returns.sort_unstable_by_key(|(product_id, _)| *product_id);
    for (product_id, quantity) in returns {
        tx.increase_stock(product_id, quantity)
            .await
            .during("place_order")?;
    }

    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
        let product = tx.get_product(line.product_id).await.during("place_order")?;
        if product.stock < line.quantity {
            return Err(DomainError::InsufficientStock {
                product_id: line.product_id,
                requested: line.quantity,
            });
        }
        priced.push(OrderLineView {
            product_id: line.product_id,
            name: line.name,
            price: product.price,
            quantity: line.quantity,
            subtotal: product.price.multiply(line.quantity),
        });
    }
    Ok(priced)
}

//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{CartId, CartLineId, ProductId};
use domain::{AddToCart, CartLineView, CartView, RemoveFromCart};
use serde::{Deserialize, Serialize};
use store::TransactionCoordinator;

use super::AppState;
use crate::error::ApiError;
use crate::identity::RequireUser;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: i64,
    pub quantity: i32,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub cart_id: CartId,
    pub lines: Vec<CartLineResponse>,
    pub total_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct CartLineResponse {
    pub line_id: CartLineId,
    pub product_id: ProductId,
    pub name: String,
    pub price_cents: i64,
    pub quantity: i32,
    pub subtotal_cents: i64,
}

impl From<CartLineView> for CartLineResponse {
    fn from(line: CartLineView) -> Self {
        Self {
            line_id: line.line_id,
            product_id: line.product_id,
            name: line.name,
            price_cents: line.price.cents(),
            quantity: line.quantity,
            subtotal_cents: line.subtotal.cents(),
        }
    }
}

impl From<CartView> for CartResponse {
    fn from(cart: CartView) -> Self {
        Self {
            cart_id: cart.cart_id,
            total_cents: cart.total.cents(),
            lines: cart.lines.into_iter().map(CartLineResponse::from).collect(),
        }
    }
}

// -- Handlers --

/// GET /cart — the caller's cart, created on first access.
#[tracing::instrument(skip(state, identity))]
pub async fn get<C: TransactionCoordinator + 'static>(
    State(state): State<Arc<AppState<C>>>,
    RequireUser(identity): RequireUser,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.get_cart(&identity).await?;
    Ok(Json(cart.into()))
}

/// POST /cart/items — add units of a product, reserving stock.
#[tracing::instrument(skip(state, identity))]
pub async fn add_item<C: TransactionCoordinator + 'static>(
    State(state): State<Arc<AppState<C>>>,
    RequireUser(identity): RequireUser,
    Json(req): Json<AddToCartRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let cmd = AddToCart::new(ProductId::new(req.product_id), req.quantity);
    let cart = state.carts.add_to_cart(&identity, cmd).await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart/items/{id} — remove a line from the caller's cart.
#[tracing::instrument(skip(state, identity))]
pub async fn remove_item<C: TransactionCoordinator + 'static>(
    State(state): State<Arc<AppState<C>>>,
    RequireUser(identity): RequireUser,
    Path(id): Path<i64>,
) -> Result<Json<CartResponse>, ApiError> {
    let cmd = RemoveFromCart::new(CartLineId::new(id));
    let cart = state.carts.remove_from_cart(&identity, cmd).await?;
    Ok(Json(cart.into()))
}

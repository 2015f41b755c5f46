//! Order placement and history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, OrderStatus, ProductId};
use domain::{OrderLineView, OrderView, PlaceOrder};
use serde::{Deserialize, Serialize};
use store::TransactionCoordinator;

use super::AppState;
use crate::error::ApiError;
use crate::identity::RequireUser;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub shipping_address: String,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub total_cents: i64,
    pub lines: Vec<OrderLineResponse>,
}

#[derive(Debug, Serialize)]
pub struct OrderLineResponse {
    pub product_id: ProductId,
    pub name: String,
    pub price_cents: i64,
    pub quantity: i32,
    pub subtotal_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
}

impl From<OrderLineView> for OrderLineResponse {
    fn from(line: OrderLineView) -> Self {
        Self {
            product_id: line.product_id,
            name: line.name,
            price_cents: line.price.cents(),
            quantity: line.quantity,
            subtotal_cents: line.subtotal.cents(),
        }
    }
}

impl From<OrderView> for OrderResponse {
    fn from(order: OrderView) -> Self {
        Self {
            order_id: order.order_id,
            status: order.status,
            shipping_address: order.shipping_address,
            created_at: order.created_at,
            total_cents: order.total.cents(),
            lines: order.lines.into_iter().map(OrderLineResponse::from).collect(),
        }
    }
}

// -- Handlers --

/// POST /orders — place an order for everything in the caller's cart.
#[tracing::instrument(skip(state, identity, req))]
pub async fn create<C: TransactionCoordinator + 'static>(
    State(state): State<Arc<AppState<C>>>,
    RequireUser(identity): RequireUser,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state
        .orders
        .place_order(&identity, PlaceOrder::new(req.shipping_address))
        .await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders — the caller's orders, newest first.
#[tracing::instrument(skip(state, identity))]
pub async fn list<C: TransactionCoordinator + 'static>(
    State(state): State<Arc<AppState<C>>>,
    RequireUser(identity): RequireUser,
) -> Result<Json<OrderListResponse>, ApiError> {
    let orders = state.orders.list_orders(&identity).await?;
    Ok(Json(OrderListResponse {
        orders: orders.into_iter().map(OrderResponse::from).collect(),
    }))
}

/// GET /orders/{id} — one of the caller's orders.
#[tracing::instrument(skip(state, identity))]
pub async fn get<C: TransactionCoordinator + 'static>(
    State(state): State<Arc<AppState<C>>>,
    RequireUser(identity): RequireUser,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.get_order(&identity, OrderId::new(id)).await?;
    Ok(Json(order.into()))
}

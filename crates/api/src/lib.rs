//! HTTP API server for the cart and order core.
//!
//! Exposes the cart and order operations as REST endpoints, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{delete, get, post};
use domain::{CartPolicy, CartService, OrderFactory};
use metrics_exporter_prometheus::PrometheusHandle;
use store::TransactionCoordinator;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
///
/// Requests running past `request_timeout` are cancelled; dropping the
/// handler future rolls back any transaction it had open.
pub fn create_app<C: TransactionCoordinator + 'static>(
    state: Arc<AppState<C>>,
    metrics_handle: PrometheusHandle,
    request_timeout: Duration,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health))
        .route("/cart", get(routes::cart::get::<C>))
        .route("/cart/items", post(routes::cart::add_item::<C>))
        .route("/cart/items/{id}", delete(routes::cart::remove_item::<C>))
        .route("/orders", post(routes::orders::create::<C>))
        .route("/orders", get(routes::orders::list::<C>))
        .route("/orders/{id}", get(routes::orders::get::<C>))
        .with_state(state)
        .merge(metrics_router)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over a transaction coordinator.
pub fn create_state<C: TransactionCoordinator + Clone>(
    coordinator: C,
    policy: CartPolicy,
) -> Arc<AppState<C>> {
    Arc::new(AppState {
        carts: CartService::with_policy(coordinator.clone(), policy),
        orders: OrderFactory::new(coordinator),
    })
}

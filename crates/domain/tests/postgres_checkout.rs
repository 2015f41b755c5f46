//! Cart and checkout behaviour against PostgreSQL.
//!
//! These tests share one PostgreSQL container and never truncate, so each
//! test works on its own products and users and they can run in parallel.
//! Run with:
//!
//! ```bash
//! cargo test -p domain --test postgres_checkout
//! ```

use std::sync::Arc;
use std::time::Duration;

use common::{ProductId, UserId};
use domain::{AddToCart, CartService, DomainError, OrderFactory, PlaceOrder, UserIdentity};
use futures_util::future::join_all;
use sqlx::PgPool;
use store::{CartRepository, PostgresStore, Transaction, TransactionCoordinator};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_commerce_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

struct Shop {
    store: PostgresStore,
    carts: CartService<PostgresStore>,
    orders: OrderFactory<PostgresStore>,
}

async fn get_test_shop() -> Shop {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(24)
        .connect(&info.connection_string)
        .await
        .unwrap();
    let store = PostgresStore::new(pool);

    Shop {
        carts: CartService::new(store.clone()),
        orders: OrderFactory::new(store.clone()),
        store,
    }
}

fn user(id: i64) -> UserIdentity {
    UserIdentity::customer(UserId::new(id)).unwrap()
}

impl Shop {
    async fn product(&self, name: &str, stock: i32) -> ProductId {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO products (name, price_cents, stock) VALUES ($1, 1000, $2) RETURNING id",
        )
        .bind(name)
        .bind(stock)
        .fetch_one(self.store.pool())
        .await
        .unwrap();
        ProductId::new(id)
    }

    async fn stock_of(&self, product: ProductId) -> i32 {
        sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(product.as_i64())
            .fetch_one(self.store.pool())
            .await
            .unwrap()
    }

    /// Units of a product that are in stock, in some cart, or in some order.
    async fn accounted_units(&self, product: ProductId) -> i64 {
        sqlx::query_scalar(
            r#"
            SELECT p.stock::BIGINT
                + COALESCE((SELECT SUM(quantity) FROM cart_items WHERE product_id = p.id), 0)
                + COALESCE((SELECT SUM(quantity) FROM order_items WHERE product_id = p.id), 0)
            FROM products p
            WHERE p.id = $1
            "#,
        )
        .bind(product.as_i64())
        .fetch_one(self.store.pool())
        .await
        .unwrap()
    }

    async fn carts_of(&self, user_id: i64) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.store.pool())
            .await
            .unwrap()
    }

    async fn add(&self, who: i64, product: ProductId, quantity: i32) {
        self.carts
            .add_to_cart(&user(who), AddToCart::new(product, quantity))
            .await
            .unwrap();
    }

    async fn checkout(&self, who: i64) -> Result<domain::OrderView, DomainError> {
        self.orders
            .place_order(&user(who), PlaceOrder::new("1 Main St"))
            .await
    }
}

mod checkout {
    use super::*;

    #[tokio::test]
    async fn reserved_units_leave_stock_once() {
        let shop = get_test_shop().await;
        let lamp = shop.product("Lamp", 5).await;
        let mug = shop.product("Mug", 10).await;

        shop.add(1001, lamp, 3).await;
        shop.add(1001, mug, 2).await;
        assert_eq!(shop.stock_of(lamp).await, 2);

        let order = shop.checkout(1001).await.unwrap();

        assert_eq!(order.lines.len(), 2);
        assert_eq!(shop.stock_of(lamp).await, 2);
        assert_eq!(shop.stock_of(mug).await, 8);
        assert!(shop.carts.get_cart(&user(1001)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn checkouts_locking_products_in_opposite_orders_both_succeed() {
        let shop = get_test_shop().await;
        let a = shop.product("Alpha", 1000).await;
        let b = shop.product("Beta", 1000).await;

        for _ in 0..10 {
            shop.add(1002, a, 1).await;
            shop.add(1002, b, 1).await;
            shop.add(1003, b, 1).await;
            shop.add(1003, a, 1).await;

            let results = join_all([shop.checkout(1002), shop.checkout(1003)]).await;
            for result in results {
                result.unwrap();
            }
        }

        assert_eq!(shop.stock_of(a).await, 980);
        assert_eq!(shop.stock_of(b).await, 980);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_re_adds_to_one_cart_are_all_kept() {
        let shop = get_test_shop().await;
        let product = shop.product("Widget", 100).await;
        shop.add(2001, product, 1).await;

        let adds = (0..20).map(|_| {
            let carts = shop.carts.clone();
            async move {
                carts
                    .add_to_cart(&user(2001), AddToCart::new(product, 1))
                    .await
            }
        });
        for result in join_all(adds).await {
            result.unwrap();
        }

        let cart = shop.carts.get_cart(&user(2001)).await.unwrap();
        assert_eq!(cart.quantity_of(product), 21);
        assert_eq!(shop.stock_of(product).await, 79);
        assert_eq!(shop.accounted_units(product).await, 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_adds_conflict_instead_of_failing() {
        let shop = get_test_shop().await;
        let product = shop.product("Widget", 100).await;

        let adds = (0..8).map(|_| {
            let carts = shop.carts.clone();
            async move {
                carts
                    .add_to_cart(&user(2002), AddToCart::new(product, 1))
                    .await
            }
        });
        let results = join_all(adds).await;

        let mut added = 0;
        for result in &results {
            match result {
                Ok(_) => added += 1,
                Err(DomainError::Conflict(_)) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert!(added >= 1);
        assert_eq!(shop.carts_of(2002).await, 1);

        let cart = shop.carts.get_cart(&user(2002)).await.unwrap();
        assert_eq!(cart.quantity_of(product), added);
        assert_eq!(shop.stock_of(product).await, 100 - added);
    }

    #[tokio::test]
    async fn losing_the_cart_creation_race_is_a_conflict() {
        let shop = get_test_shop().await;
        let product = shop.product("Widget", 10).await;

        let mut rival = shop.store.begin().await.unwrap();
        rival.create_cart(UserId::new(2003)).await.unwrap();

        let pending = {
            let carts = shop.carts.clone();
            tokio::spawn(async move {
                carts
                    .add_to_cart(&user(2003), AddToCart::new(product, 1))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;
        rival.commit().await.unwrap();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(shop.stock_of(product).await, 10);
        assert_eq!(shop.carts_of(2003).await, 1);
    }

    #[tokio::test]
    async fn add_waits_for_checkout_holding_the_cart() {
        let shop = get_test_shop().await;
        let product = shop.product("Widget", 10).await;
        shop.add(2004, product, 1).await;

        let mut in_flight = shop.store.begin().await.unwrap();
        in_flight
            .lock_cart_for_user(UserId::new(2004))
            .await
            .unwrap()
            .unwrap();

        let pending = {
            let carts = shop.carts.clone();
            tokio::spawn(async move {
                carts
                    .add_to_cart(&user(2004), AddToCart::new(product, 2))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!pending.is_finished());

        in_flight.commit().await.unwrap();
        let cart = tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(cart.quantity_of(product), 3);
        assert_eq!(shop.stock_of(product).await, 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn lines_added_during_checkout_are_ordered_or_kept() {
        let shop = get_test_shop().await;
        let mug = shop.product("Mug", 100).await;
        let spoon = shop.product("Spoon", 100).await;

        for _ in 0..10 {
            shop.add(2005, mug, 1).await;

            let carts = shop.carts.clone();
            let add = async move {
                carts
                    .add_to_cart(&user(2005), AddToCart::new(spoon, 1))
                    .await
            };
            let (order, added) = tokio::join!(shop.checkout(2005), add);
            order.unwrap();
            added.unwrap();

            assert_eq!(shop.accounted_units(mug).await, 100);
            assert_eq!(shop.accounted_units(spoon).await, 100);
        }

        assert_eq!(shop.stock_of(spoon).await, 90);
    }
}

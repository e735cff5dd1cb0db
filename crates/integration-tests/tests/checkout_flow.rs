//! Checkout flow tests against a live database.
//!
//! Each test skips (and passes) when `TEST_DATABASE_URL` is unset.

#![allow(clippy::unwrap_used)]

use std::str::FromStr;

use rust_decimal::Decimal;

use copper_kettle_core::{OrderId, ProductId, StockPolicy};
use copper_kettle_integration_tests::TestContext;
use copper_kettle_storefront::db::orders::OrderRepository;
use copper_kettle_storefront::models::cart::CartAction;
use copper_kettle_storefront::models::order::ShippingFields;
use copper_kettle_storefront::services::cart::CartError;
use copper_kettle_storefront::services::checkout::{CheckoutError, FinalizeOutcome};
use copper_kettle_storefront::services::{CartService, CheckoutService};

fn checkout<'a>(ctx: &'a TestContext, policy: StockPolicy) -> CheckoutService<'a> {
    CheckoutService::new(
        &ctx.pool,
        &ctx.gateway,
        &ctx.notifier,
        policy,
        "inr",
        "http://localhost:3000",
    )
}

async fn stock_of(ctx: &TestContext, product_id: ProductId) -> i32 {
    let (stock,): (i32,) = sqlx::query_as("SELECT stock FROM store.products WHERE id = $1")
        .bind(product_id.as_i32())
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    stock
}

async fn order_complete(ctx: &TestContext, order_id: OrderId) -> bool {
    let (complete,): (bool,) = sqlx::query_as("SELECT complete FROM store.orders WHERE id = $1")
        .bind(order_id.as_i32())
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    complete
}

#[tokio::test]
async fn concurrent_adds_cannot_oversell() {
    let Some(ctx) = TestContext::new().await else {
        return;
    };

    let product_id = ctx.create_product("Limited run", 100, 10, false).await;
    let user = ctx.create_user().await;

    // Seed the cart to 9 of 10 units
    let carts = CartService::new(&ctx.pool);
    for _ in 0..9 {
        carts
            .update_item(&user, product_id, CartAction::Add)
            .await
            .unwrap();
    }

    // Three concurrent adds race for the last unit
    let mut handles = Vec::new();
    for _ in 0..3 {
        let pool = ctx.pool.clone();
        let user = user.clone();
        handles.push(tokio::spawn(async move {
            CartService::new(&pool)
                .update_item(&user, product_id, CartAction::Add)
                .await
        }));
    }

    let mut succeeded = 0;
    let mut out_of_stock = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(mutation) => {
                assert_eq!(mutation.quantity, 10);
                succeeded += 1;
            }
            Err(CartError::OutOfStock { available }) => {
                assert_eq!(available, 10);
                out_of_stock += 1;
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(out_of_stock, 2);

    // Stock itself is untouched until finalization
    assert_eq!(stock_of(&ctx, product_id).await, 10);
}

#[tokio::test]
async fn finalize_is_idempotent() {
    let Some(ctx) = TestContext::new().await else {
        return;
    };

    let product_id = ctx.create_product("Ebook", 100, 10, true).await;
    let user = ctx.create_user().await;

    let carts = CartService::new(&ctx.pool);
    for _ in 0..2 {
        carts
            .update_item(&user, product_id, CartAction::Add)
            .await
            .unwrap();
    }
    let (_, order) = carts.current_order_for_user(&user).await.unwrap();

    let service = checkout(&ctx, StockPolicy::AllowBackorder);

    let first = service
        .finalize(order.id, "pay_test_1", Decimal::from(200))
        .await
        .unwrap();
    let FinalizeOutcome::Finalized(finalized) = first else {
        panic!("first call must finalize");
    };
    assert!(finalized.complete);
    let transaction_id = finalized.transaction_id.unwrap();
    assert_eq!(stock_of(&ctx, product_id).await, 8);

    // Second confirmation for the same order is a no-op
    let second = service
        .finalize(order.id, "pay_test_1", Decimal::from(200))
        .await
        .unwrap();
    assert!(matches!(second, FinalizeOutcome::AlreadyComplete(_)));
    assert_eq!(stock_of(&ctx, product_id).await, 8);

    let refreshed = OrderRepository::new(&ctx.pool)
        .get(order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.transaction_id, Some(transaction_id));
}

#[tokio::test]
async fn finalize_rejects_price_mismatch() {
    let Some(ctx) = TestContext::new().await else {
        return;
    };

    let product_id = ctx.create_product("Tampered", 15000, 10, true).await;
    let user = ctx.create_user().await;

    let carts = CartService::new(&ctx.pool);
    carts
        .update_item(&user, product_id, CartAction::Add)
        .await
        .unwrap();
    let (_, order) = carts.current_order_for_user(&user).await.unwrap();

    let service = checkout(&ctx, StockPolicy::AllowBackorder);
    let charged = Decimal::from_str("15000.02").unwrap();

    let result = service.finalize(order.id, "pay_test_2", charged).await;
    assert!(matches!(
        result,
        Err(CheckoutError::PriceMismatch { .. })
    ));

    // Nothing was applied
    assert!(!order_complete(&ctx, order.id).await);
    assert_eq!(stock_of(&ctx, product_id).await, 10);
}

#[tokio::test]
async fn physical_orders_get_a_shipping_address() {
    let Some(ctx) = TestContext::new().await else {
        return;
    };

    let physical = ctx.create_product("Kettle", 1000, 10, false).await;
    let digital = ctx.create_product("Manual PDF", 100, 999, true).await;
    let user = ctx.create_user().await;

    let carts = CartService::new(&ctx.pool);
    carts
        .update_item(&user, physical, CartAction::Add)
        .await
        .unwrap();
    carts
        .update_item(&user, digital, CartAction::Add)
        .await
        .unwrap();
    let (_, order) = carts.current_order_for_user(&user).await.unwrap();

    let orders = OrderRepository::new(&ctx.pool);
    orders
        .set_checkout_details(
            order.id,
            Decimal::from(1100),
            Some(&ShippingFields {
                address: "12 Kettle Lane".to_owned(),
                city: "Pune".to_owned(),
                state: "MH".to_owned(),
                zipcode: "411001".to_owned(),
            }),
        )
        .await
        .unwrap();

    checkout(&ctx, StockPolicy::AllowBackorder)
        .finalize(order.id, "pay_test_3", Decimal::from(1100))
        .await
        .unwrap();

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM store.shipping_addresses WHERE order_id = $1")
            .bind(order.id.as_i32())
            .fetch_one(&ctx.pool)
            .await
            .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn digital_only_orders_skip_shipping() {
    let Some(ctx) = TestContext::new().await else {
        return;
    };

    let digital = ctx.create_product("License key", 500, 999, true).await;
    let user = ctx.create_user().await;

    let carts = CartService::new(&ctx.pool);
    carts
        .update_item(&user, digital, CartAction::Add)
        .await
        .unwrap();
    let (_, order) = carts.current_order_for_user(&user).await.unwrap();

    checkout(&ctx, StockPolicy::AllowBackorder)
        .finalize(order.id, "pay_test_4", Decimal::from(500))
        .await
        .unwrap();

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM store.shipping_addresses WHERE order_id = $1")
            .bind(order.id.as_i32())
            .fetch_one(&ctx.pool)
            .await
            .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn strict_policy_fails_when_stock_ran_out() {
    let Some(ctx) = TestContext::new().await else {
        return;
    };

    let product_id = ctx.create_product("Last one", 700, 1, false).await;
    let user = ctx.create_user().await;

    let carts = CartService::new(&ctx.pool);
    carts
        .update_item(&user, product_id, CartAction::Add)
        .await
        .unwrap();
    let (_, order) = carts.current_order_for_user(&user).await.unwrap();

    // Stock vanishes between checkout and payment confirmation
    sqlx::query("UPDATE store.products SET stock = 0 WHERE id = $1")
        .bind(product_id.as_i32())
        .execute(&ctx.pool)
        .await
        .unwrap();

    let result = checkout(&ctx, StockPolicy::Strict)
        .finalize(order.id, "pay_test_5", Decimal::from(700))
        .await;

    assert!(matches!(
        result,
        Err(CheckoutError::InsufficientStock { .. })
    ));
    assert!(!order_complete(&ctx, order.id).await);
    assert_eq!(stock_of(&ctx, product_id).await, 0);
}

#[tokio::test]
async fn backorder_policy_goes_negative_instead() {
    let Some(ctx) = TestContext::new().await else {
        return;
    };

    let product_id = ctx.create_product("Oversold", 700, 1, true).await;
    let user = ctx.create_user().await;

    let carts = CartService::new(&ctx.pool);
    carts
        .update_item(&user, product_id, CartAction::Add)
        .await
        .unwrap();
    let (_, order) = carts.current_order_for_user(&user).await.unwrap();

    sqlx::query("UPDATE store.products SET stock = 0 WHERE id = $1")
        .bind(product_id.as_i32())
        .execute(&ctx.pool)
        .await
        .unwrap();

    checkout(&ctx, StockPolicy::AllowBackorder)
        .finalize(order.id, "pay_test_6", Decimal::from(700))
        .await
        .unwrap();

    assert!(order_complete(&ctx, order.id).await);
    assert_eq!(stock_of(&ctx, product_id).await, -1);
}

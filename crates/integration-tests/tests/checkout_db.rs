//! Checkout transactions against a live database.
//!
//! These tests drive the checkout service directly, without HTTP. They
//! require a migrated `PostgreSQL` database:
//!
//! ```bash
//! export STOREFRONT_DATABASE_URL=postgres://localhost/kharnak
//! kharnak migrate
//! cargo test -p kharnak-integration-tests --test checkout_db -- --ignored
//! ```
//!
//! Each test creates its own account and products, so runs do not interfere.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;

use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

use kharnak_core::{Cart, CatalogEntry, Email, OrderStatus, PaymentMethod, UserId};
use kharnak_storefront::config::{CommerceConfig, RazorpayConfig};
use kharnak_storefront::db::carts::{self, UNSAVED_VERSION};
use kharnak_storefront::db::products::{self, StockTake};
use kharnak_storefront::db::{
    self as store, CartRepository, NewOrder, OrderRepository, ProductRepository, UserRepository,
    orders,
};
use kharnak_storefront::models::{Address, Order, OrderItem, Product, ProductInput};
use kharnak_storefront::services::catalog::CatalogService;
use kharnak_storefront::services::checkout::{CheckoutError, CheckoutService};
use kharnak_storefront::services::razorpay::{PaymentConfirmation, PaymentError, RazorpayClient};
use kharnak_storefront::services::signing::hmac_sha256;

const KEY_SECRET: &str = "it-razorpay-secret";

async fn database() -> PgPool {
    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("set STOREFRONT_DATABASE_URL to a migrated database");
    store::create_pool(&SecretString::from(url)).await.unwrap()
}

fn checkout(pool: &PgPool) -> CheckoutService {
    let razorpay = RazorpayClient::new(&RazorpayConfig {
        key_id: "rzp_test_it".to_owned(),
        key_secret: SecretString::from(KEY_SECRET),
    })
    .unwrap();
    CheckoutService::new(
        pool.clone(),
        CatalogService::new(pool.clone()),
        CommerceConfig::default(),
        Some(razorpay),
    )
}

async fn account(pool: &PgPool) -> UserId {
    let email = Email::parse(&format!("it-{}@example.com", Uuid::new_v4().simple())).unwrap();
    UserRepository::new(pool)
        .create_with_password("Checkout Test", &email, "not-a-password-hash")
        .await
        .unwrap()
        .id
}

async fn product(pool: &PgPool, quantity: i32) -> Product {
    ProductRepository::new(pool)
        .create(&ProductInput {
            name: format!("IT Pashmina {}", Uuid::new_v4().simple()),
            description: String::new(),
            price: Decimal::new(120_000, 2),
            images: vec![],
            category: "Textiles".to_owned(),
            sub_category: String::new(),
            sizes: vec!["M".to_owned()],
            quantity,
            bestseller: false,
        })
        .await
        .unwrap()
}

async fn stock_of(pool: &PgPool, product: &Product) -> i32 {
    ProductRepository::new(pool)
        .get_by_id(product.id)
        .await
        .unwrap()
        .unwrap()
        .quantity
}

/// A cart holding `quantity` units of each product in size `M`.
fn cart_of(lines: &[(&Product, u32)]) -> Cart {
    let unbounded: HashMap<_, _> = lines
        .iter()
        .map(|(p, _)| {
            let entry = CatalogEntry {
                unit_price: p.price,
                stock: None,
            };
            (p.id, entry)
        })
        .collect();
    let mut cart = Cart::new();
    for (p, quantity) in lines {
        for _ in 0..*quantity {
            cart.add_item(p.id, "M", &unbounded).unwrap();
        }
    }
    cart
}

fn address() -> Address {
    Address {
        first_name: "Tsering".into(),
        last_name: "Dolma".into(),
        email: "tsering@example.com".into(),
        street: "Main Bazaar".into(),
        city: "Leh".into(),
        state: "Ladakh".into(),
        zipcode: "194101".into(),
        country: "India".into(),
        phone: "+91 9000000000".into(),
    }
}

/// Insert an order for one unit of `product`, taking its stock the way
/// checkout does.
async fn order_for(
    pool: &PgPool,
    user: UserId,
    product: &Product,
    payment_method: PaymentMethod,
) -> Order {
    let mut tx = pool.begin().await.unwrap();
    let taken = products::take_stock(&mut *tx, product.id, 1).await.unwrap();
    assert!(matches!(taken, StockTake::Taken { .. }));
    let order = orders::insert(
        &mut *tx,
        &NewOrder {
            user_id: user,
            items: vec![OrderItem {
                product_id: product.id,
                name: product.name.clone(),
                size: "M".into(),
                quantity: 1,
                unit_price: product.price,
                image: None,
            }],
            subtotal: product.price,
            delivery_fee: CommerceConfig::default().delivery_fee,
            address: address(),
            payment_method,
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    order
}

async fn gateway_order(pool: &PgPool, order: &Order) -> String {
    let gateway_id = format!("order_it{}", Uuid::new_v4().simple());
    OrderRepository::new(pool)
        .attach_gateway_order(order.id, &gateway_id)
        .await
        .unwrap();
    gateway_id
}

fn signed(gateway_order_id: &str, payment_id: &str) -> PaymentConfirmation {
    let message = format!("{gateway_order_id}|{payment_id}");
    PaymentConfirmation {
        order_id: gateway_order_id.to_owned(),
        payment_id: payment_id.to_owned(),
        signature: hex::encode(hmac_sha256(KEY_SECRET.as_bytes(), message.as_bytes())),
    }
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_shortfall_rolls_back_every_stock_take() {
    let pool = database().await;
    let user = account(&pool).await;
    let plenty = product(&pool, 5).await;
    let scarce = product(&pool, 1).await;

    let cart = cart_of(&[(&plenty, 2), (&scarce, 1)]);
    let carts = CartRepository::new(&pool);
    let version = carts.save(user, &cart, UNSAVED_VERSION).await.unwrap().unwrap();

    // Someone else buys the last unit after the cart was filled.
    let mut conn = pool.acquire().await.unwrap();
    let taken = products::take_stock(&mut *conn, scarce.id, 1).await.unwrap();
    assert_eq!(taken, StockTake::Taken { remaining: 0 });
    drop(conn);

    let result = checkout(&pool)
        .place_order(user, address(), PaymentMethod::Cod)
        .await;
    match result {
        Err(CheckoutError::InsufficientStock { product, available }) => {
            assert_eq!(product, scarce.name);
            assert_eq!(available, 0);
        }
        other => panic!("expected a stock shortfall, got {other:?}"),
    }

    // The earlier product's decrement was rolled back with the rest.
    assert_eq!(stock_of(&pool, &plenty).await, 5);
    assert_eq!(stock_of(&pool, &scarce).await, 0);
    assert_eq!(carts.load(user).await.unwrap(), (cart, version));
    assert!(OrderRepository::new(&pool).list_for_user(user).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_cod_order_takes_stock_and_clears_cart() {
    let pool = database().await;
    let user = account(&pool).await;
    let socks = product(&pool, 4).await;

    let carts = CartRepository::new(&pool);
    carts
        .save(user, &cart_of(&[(&socks, 3)]), UNSAVED_VERSION)
        .await
        .unwrap()
        .unwrap();

    let placed = checkout(&pool)
        .place_order(user, address(), PaymentMethod::Cod)
        .await
        .unwrap();

    assert!(placed.checkout.is_none());
    assert_eq!(placed.order.status, OrderStatus::OrderPlaced);
    assert_eq!(placed.order.amount, Decimal::new(360_000, 2) + Decimal::new(50, 0));
    assert_eq!(stock_of(&pool, &socks).await, 1);
    assert!(carts.load(user).await.unwrap().0.is_empty());
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_clear_refuses_a_cart_edited_since_it_was_read() {
    let pool = database().await;
    let user = account(&pool).await;
    let cap = product(&pool, 3).await;

    let carts = CartRepository::new(&pool);
    let priced = carts
        .save(user, &cart_of(&[(&cap, 1)]), UNSAVED_VERSION)
        .await
        .unwrap()
        .unwrap();
    let edited = carts
        .save(user, &cart_of(&[(&cap, 2)]), priced)
        .await
        .unwrap()
        .unwrap();

    let mut conn = pool.acquire().await.unwrap();
    assert!(!carts::clear_at_version(&mut *conn, user, priced).await.unwrap());
    assert_eq!(carts.load(user).await.unwrap().0.quantity(cap.id, "M"), 2);

    assert!(carts::clear_at_version(&mut *conn, user, edited).await.unwrap());
    let (cart, version) = carts.load(user).await.unwrap();
    assert!(cart.is_empty());
    assert_eq!(version, edited + 1);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_signed_payment_marks_order_paid_once() {
    let pool = database().await;
    let user = account(&pool).await;
    let shawl = product(&pool, 2).await;
    let order = order_for(&pool, user, &shawl, PaymentMethod::Razorpay).await;
    let gateway_id = gateway_order(&pool, &order).await;
    let confirmation = signed(&gateway_id, "pay_it001");

    let service = checkout(&pool);
    let paid = service.verify_payment(user, order.id, &confirmation).await.unwrap();
    assert!(paid.payment);
    assert_eq!(paid.status, OrderStatus::OrderPlaced);
    assert_eq!(paid.gateway_payment_id.as_deref(), Some("pay_it001"));

    // The widget may report the same payment twice.
    let again = service.verify_payment(user, order.id, &confirmation).await.unwrap();
    assert!(again.payment);
    assert_eq!(again.status, OrderStatus::OrderPlaced);
    assert_eq!(again.gateway_payment_id, paid.gateway_payment_id);
    assert_eq!(stock_of(&pool, &shawl).await, 1);

    // Another account cannot see the order.
    let stranger = account(&pool).await;
    assert!(matches!(
        service.verify_payment(stranger, order.id, &confirmation).await,
        Err(CheckoutError::OrderNotFound)
    ));
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_mismatched_payment_fails_order_and_returns_stock() {
    let pool = database().await;
    let user = account(&pool).await;
    let tea = product(&pool, 2).await;
    let order = order_for(&pool, user, &tea, PaymentMethod::Razorpay).await;
    let gateway_id = gateway_order(&pool, &order).await;
    assert_eq!(stock_of(&pool, &tea).await, 1);

    let mut forged = signed(&gateway_id, "pay_it002");
    forged.signature = "0".repeat(64);

    let service = checkout(&pool);
    assert!(matches!(
        service.verify_payment(user, order.id, &forged).await,
        Err(CheckoutError::Payment(PaymentError::SignatureMismatch))
    ));

    let failed = OrderRepository::new(&pool).get_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(failed.status, OrderStatus::PaymentFailed);
    assert!(!failed.payment);
    assert_eq!(stock_of(&pool, &tea).await, 2);

    // A correct signature cannot revive it, and stock is not returned twice.
    let late = signed(&gateway_id, "pay_it002");
    assert!(matches!(
        service.verify_payment(user, order.id, &late).await,
        Err(CheckoutError::OrderClosed(OrderStatus::PaymentFailed))
    ));
    assert_eq!(stock_of(&pool, &tea).await, 2);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_payment_for_another_gateway_order_is_rejected() {
    let pool = database().await;
    let user = account(&pool).await;
    let rug = product(&pool, 3).await;
    let order = order_for(&pool, user, &rug, PaymentMethod::Razorpay).await;
    gateway_order(&pool, &order).await;

    // Correctly signed, but for a different gateway order.
    let elsewhere = signed("order_itelsewhere", "pay_it003");
    assert!(matches!(
        checkout(&pool).verify_payment(user, order.id, &elsewhere).await,
        Err(CheckoutError::Payment(PaymentError::SignatureMismatch))
    ));

    let failed = OrderRepository::new(&pool).get_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(failed.status, OrderStatus::PaymentFailed);
    assert_eq!(stock_of(&pool, &rug).await, 3);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_cash_order_ignores_payment_confirmations() {
    let pool = database().await;
    let user = account(&pool).await;
    let bowl = product(&pool, 2).await;
    let order = order_for(&pool, user, &bowl, PaymentMethod::Cod).await;
    let bogus = signed("order_itbogus", "pay_itbogus");
    let service = checkout(&pool);

    for status in [OrderStatus::OrderPlaced, OrderStatus::Delivered] {
        if status != OrderStatus::OrderPlaced {
            service.update_status(order.id, status).await.unwrap();
        }

        assert!(matches!(
            service.verify_payment(user, order.id, &bogus).await,
            Err(CheckoutError::NotPaidOnline)
        ));

        let unchanged = OrderRepository::new(&pool).get_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, status);
        assert!(!unchanged.payment);
        assert_eq!(stock_of(&pool, &bowl).await, 1);
    }
}

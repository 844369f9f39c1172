//! Order placement and payment reconciliation.
//!
//! Placing an order prices the account cart against a fresh catalog read,
//! then in one transaction takes stock for every product with a conditional
//! decrement, inserts the order, and empties the cart at the version that
//! was priced. Any shortfall rolls the whole transaction back.

use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use kharnak_core::{OrderId, OrderStatus, PaymentMethod, Price, ProductId, UserId};

use super::catalog::{CatalogService, CatalogSnapshot};
use super::razorpay::{CheckoutSession, PaymentConfirmation, PaymentError, RazorpayClient};
use crate::config::CommerceConfig;
use crate::db::products::{self, StockTake};
use crate::db::{CartRepository, NewOrder, OrderRepository, RepositoryError, carts, orders};
use crate::models::{Address, Order, OrderItem, ValidationError};

/// Errors from checkout and order management.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("cart is empty")]
    EmptyCart,

    /// Not enough stock for a product; nothing was taken.
    #[error("only {available} of {product} left in stock")]
    InsufficientStock { product: String, available: i32 },

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The cart was edited between pricing and placing the order.
    #[error("cart changed during checkout")]
    CartChanged,

    #[error("order not found")]
    OrderNotFound,

    /// The order is past the point where this change applies.
    #[error("order is closed ({0})")]
    OrderClosed(OrderStatus),

    /// Payment verification on an order not paid through the gateway.
    #[error("order is not paid online")]
    NotPaidOnline,

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// A placed order and, for online payment, the gateway session to open.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout: Option<CheckoutSession>,
}

/// Checkout and order lifecycle.
#[derive(Clone)]
pub struct CheckoutService {
    pool: PgPool,
    catalog: CatalogService,
    commerce: CommerceConfig,
    razorpay: Option<RazorpayClient>,
}

impl CheckoutService {
    #[must_use]
    pub const fn new(
        pool: PgPool,
        catalog: CatalogService,
        commerce: CommerceConfig,
        razorpay: Option<RazorpayClient>,
    ) -> Self {
        Self {
            pool,
            catalog,
            commerce,
            razorpay,
        }
    }

    fn gateway(&self) -> Result<&RazorpayClient, PaymentError> {
        self.razorpay.as_ref().ok_or(PaymentError::NotConfigured)
    }

    /// Place an order for everything in `user`'s cart.
    ///
    /// # Errors
    ///
    /// - `CheckoutError::Payment(NotConfigured)` for online payment without
    ///   gateway credentials.
    /// - `CheckoutError::Validation` for a bad address.
    /// - `CheckoutError::EmptyCart`, `CheckoutError::InsufficientStock`,
    ///   `CheckoutError::CartChanged` as described on each variant.
    #[instrument(skip(self, address))]
    pub async fn place_order(
        &self,
        user: UserId,
        address: Address,
        payment_method: PaymentMethod,
    ) -> Result<PlacedOrder, CheckoutError> {
        if payment_method.is_online() {
            self.gateway()?;
        }
        let address = address.validate()?;

        let (mut cart, version) = CartRepository::new(&self.pool).load(user).await?;
        let catalog = self.catalog.fresh_snapshot().await?;
        cart.prune(catalog.as_ref());
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let items = price_items(&cart, &catalog)?;
        let subtotal = items.iter().map(OrderItem::line_total).sum();
        let new_order = NewOrder {
            user_id: user,
            items,
            subtotal,
            delivery_fee: self.commerce.delivery_fee,
            address,
            payment_method,
        };

        let mut tx = self.pool.begin().await?;

        for product_id in cart.product_ids() {
            let wanted = i32::try_from(cart.product_quantity(product_id)).unwrap_or(i32::MAX);
            match products::take_stock(&mut *tx, product_id, wanted).await {
                Ok(StockTake::Taken { .. }) => {}
                Ok(StockTake::Short { available }) => {
                    let product = catalog
                        .get(product_id)
                        .map_or_else(|| product_id.to_string(), |p| p.name.clone());
                    return Err(CheckoutError::InsufficientStock { product, available });
                }
                Err(RepositoryError::NotFound) => {
                    return Err(CheckoutError::ProductNotFound(product_id));
                }
                Err(e) => return Err(e.into()),
            }
        }

        let order = orders::insert(&mut *tx, &new_order).await?;

        if !carts::clear_at_version(&mut *tx, user, version).await? {
            return Err(CheckoutError::CartChanged);
        }

        tx.commit().await?;
        self.catalog.invalidate().await;

        info!(order_id = %order.id, amount = %order.amount, method = %payment_method, "order placed");

        if !payment_method.is_online() {
            return Ok(PlacedOrder {
                order,
                checkout: None,
            });
        }

        match self.open_gateway_order(&order).await {
            Ok((order, checkout)) => Ok(PlacedOrder {
                order,
                checkout: Some(checkout),
            }),
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "gateway order failed, releasing stock");
                self.fail_order(order.id).await?;
                Err(e)
            }
        }
    }

    async fn open_gateway_order(
        &self,
        order: &Order,
    ) -> Result<(Order, CheckoutSession), CheckoutError> {
        let gateway = self.gateway()?;
        let price = Price::new(order.amount, self.commerce.currency);
        let checkout = gateway.create_order(&price, &order.id.to_string()).await?;
        let order = OrderRepository::new(&self.pool)
            .attach_gateway_order(order.id, &checkout.order.id)
            .await?;
        Ok((order, checkout))
    }

    /// Reconcile a payment reported by the checkout widget.
    ///
    /// Only online orders still in `Order Placed` can change here. A valid
    /// signature marks the order paid. An invalid one, or one for a
    /// different gateway order, marks it `Payment Failed` and returns its
    /// stock. Verifying an already-paid order is a no-op.
    ///
    /// # Errors
    ///
    /// - `CheckoutError::OrderNotFound` if the order is missing or not the user's.
    /// - `CheckoutError::NotPaidOnline` for cash-on-delivery orders.
    /// - `CheckoutError::OrderClosed` if the order has left `Order Placed`.
    /// - `CheckoutError::Payment(SignatureMismatch)` after recording the failure.
    #[instrument(skip(self, confirmation))]
    pub async fn verify_payment(
        &self,
        user: UserId,
        order_id: OrderId,
        confirmation: &PaymentConfirmation,
    ) -> Result<Order, CheckoutError> {
        let gateway = self.gateway()?;

        let mut tx = self.pool.begin().await?;
        let order = orders::lock(&mut *tx, order_id)
            .await?
            .filter(|o| o.user_id == user)
            .ok_or(CheckoutError::OrderNotFound)?;

        if order.payment && order.payment_method.is_online() {
            return Ok(order);
        }
        ensure_awaiting_payment(&order)?;

        let matches_order = order.gateway_order_id.as_deref() == Some(&*confirmation.order_id);
        let verified = matches_order && gateway.verify(confirmation).is_ok();

        if !verified {
            release_items(&mut *tx, &order.items).await?;
            orders::set_status(&mut *tx, order.id, OrderStatus::PaymentFailed).await?;
            tx.commit().await?;
            self.catalog.invalidate().await;
            warn!(order_id = %order.id, "payment verification failed, stock released");
            return Err(PaymentError::SignatureMismatch.into());
        }

        let order = orders::mark_paid(&mut *tx, order.id, &confirmation.payment_id).await?;
        tx.commit().await?;
        info!(order_id = %order.id, "order paid");
        Ok(order)
    }

    /// Move an order to a new status (back-office).
    ///
    /// Cancelling returns the order's stock. Cancelled and failed orders are
    /// final.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` or `CheckoutError::OrderClosed`.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, CheckoutError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::lock(&mut *tx, order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        if order.status == status {
            return Ok(order);
        }
        if order.status.releases_stock() {
            return Err(CheckoutError::OrderClosed(order.status));
        }
        if status.releases_stock() {
            release_items(&mut *tx, &order.items).await?;
        }

        let order = orders::set_status(&mut *tx, order.id, status).await?;
        tx.commit().await?;
        if status.releases_stock() {
            self.catalog.invalidate().await;
        }
        info!(order_id = %order.id, status = %status, "order status changed");
        Ok(order)
    }

    async fn fail_order(&self, order_id: OrderId) -> Result<(), CheckoutError> {
        let mut tx = self.pool.begin().await?;
        if let Some(order) = orders::lock(&mut *tx, order_id).await? {
            release_items(&mut *tx, &order.items).await?;
            orders::set_status(&mut *tx, order.id, OrderStatus::PaymentFailed).await?;
        }
        tx.commit().await?;
        self.catalog.invalidate().await;
        Ok(())
    }
}

/// An unpaid online order can only be settled while it is `Order Placed`.
fn ensure_awaiting_payment(order: &Order) -> Result<(), CheckoutError> {
    if !order.payment_method.is_online() {
        return Err(CheckoutError::NotPaidOnline);
    }
    if order.status != OrderStatus::OrderPlaced {
        return Err(CheckoutError::OrderClosed(order.status));
    }
    Ok(())
}

/// Price every cart line against `catalog`.
fn price_items(
    cart: &kharnak_core::Cart,
    catalog: &CatalogSnapshot,
) -> Result<Vec<OrderItem>, CheckoutError> {
    cart.lines()
        .map(|line| {
            let product = catalog
                .get(line.product_id)
                .ok_or(CheckoutError::ProductNotFound(line.product_id))?;
            Ok(OrderItem {
                product_id: product.id,
                name: product.name.clone(),
                size: line.size.to_owned(),
                quantity: line.quantity,
                unit_price: product.price,
                image: product.cover_image().map(str::to_owned),
            })
        })
        .collect()
}

async fn release_items(
    conn: &mut sqlx::PgConnection,
    items: &[OrderItem],
) -> Result<(), RepositoryError> {
    for item in items {
        let quantity = i32::try_from(item.quantity).unwrap_or(i32::MAX);
        products::restore_stock(conn, item.product_id, quantity).await?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use kharnak_core::Cart;

    use super::*;
    use crate::models::Product;

    #[test]
    fn test_price_items_uses_catalog_prices() {
        let catalog = CatalogSnapshot::new(vec![Product {
            id: ProductId::new(5),
            name: "Sea Buckthorn Juice".into(),
            description: String::new(),
            price: Decimal::new(18_000, 2),
            images: vec!["https://cdn.kharnak.in/p/juice.jpg".into()],
            category: "Food".into(),
            sub_category: String::new(),
            sizes: vec!["500ml".into(), "1l".into()],
            quantity: 10,
            bestseller: false,
            created_at: Utc::now(),
        }]);

        let mut cart = Cart::new();
        cart.add_item(ProductId::new(5), "500ml", &catalog).unwrap();
        cart.add_item(ProductId::new(5), "500ml", &catalog).unwrap();
        cart.add_item(ProductId::new(5), "1l", &catalog).unwrap();

        let items = price_items(&cart, &catalog).unwrap();
        assert_eq!(items.len(), 2);
        let subtotal: Decimal = items.iter().map(OrderItem::line_total).sum();
        assert_eq!(subtotal, Decimal::new(54_000, 2));
        assert_eq!(
            items[0].image.as_deref(),
            Some("https://cdn.kharnak.in/p/juice.jpg")
        );
    }

    fn order(method: PaymentMethod, status: OrderStatus) -> Order {
        Order {
            id: OrderId::new(41),
            user_id: UserId::new(7),
            items: vec![],
            subtotal: Decimal::new(90_000, 2),
            delivery_fee: Decimal::new(5_000, 2),
            amount: Decimal::new(95_000, 2),
            address: Address {
                first_name: "Stanzin".into(),
                last_name: String::new(),
                email: "stanzin@example.com".into(),
                street: "Old Road".into(),
                city: "Leh".into(),
                state: "Ladakh".into(),
                zipcode: "194101".into(),
                country: "India".into(),
                phone: "+91 98765 43210".into(),
            },
            status,
            payment_method: method,
            payment: false,
            gateway_order_id: None,
            gateway_payment_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_cash_orders_never_take_payment_confirmations() {
        for status in [OrderStatus::OrderPlaced, OrderStatus::Delivered] {
            assert!(matches!(
                ensure_awaiting_payment(&order(PaymentMethod::Cod, status)),
                Err(CheckoutError::NotPaidOnline)
            ));
        }
    }

    #[test]
    fn test_only_placed_online_orders_await_payment() {
        assert!(
            ensure_awaiting_payment(&order(PaymentMethod::Razorpay, OrderStatus::OrderPlaced))
                .is_ok()
        );
        for status in [
            OrderStatus::Packing,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::PaymentFailed,
        ] {
            assert!(matches!(
                ensure_awaiting_payment(&order(PaymentMethod::Razorpay, status)),
                Err(CheckoutError::OrderClosed(s)) if s == status
            ));
        }
    }

    #[test]
    fn test_price_items_rejects_unknown_product() {
        let catalog = CatalogSnapshot::default();
        let mut cart = Cart::new();
        let stocked = std::collections::HashMap::from([(
            ProductId::new(9),
            kharnak_core::CatalogEntry {
                unit_price: Decimal::ONE,
                stock: None,
            },
        )]);
        cart.add_item(ProductId::new(9), "Standard", &stocked).unwrap();

        assert!(matches!(
            price_items(&cart, &catalog),
            Err(CheckoutError::ProductNotFound(_))
        ));
    }
}

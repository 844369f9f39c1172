//! Order repository.
//!
//! Functions taking a `&mut PgConnection` run inside a caller-owned
//! transaction (checkout, payment verification, status changes).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use kharnak_core::{OrderId, OrderStatus, PaymentMethod, UserId};

use super::{RepositoryError, parse_column};
use crate::models::{Address, Order, OrderItem};

const ORDER_COLUMNS: &str = "id, user_id, items, subtotal, delivery_fee, amount, address, \
                             status, payment_method, payment, gateway_order_id, \
                             gateway_payment_id, created_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    items: Json<Vec<OrderItem>>,
    subtotal: Decimal,
    delivery_fee: Decimal,
    amount: Decimal,
    address: Json<Address>,
    status: String,
    payment_method: String,
    payment: bool,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            items: row.items.0,
            subtotal: row.subtotal,
            delivery_fee: row.delivery_fee,
            amount: row.amount,
            address: row.address.0,
            status: parse_column("order status", &row.status)?,
            payment_method: parse_column("payment method", &row.payment_method)?,
            payment: row.payment,
            gateway_order_id: row.gateway_order_id,
            gateway_payment_id: row.gateway_payment_id,
            created_at: row.created_at,
        })
    }
}

/// An order about to be inserted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub address: Address,
    pub payment_method: PaymentMethod,
}

impl NewOrder {
    /// `subtotal + delivery_fee`.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        self.subtotal + self.delivery_fee
    }
}

/// Repository for order reads and gateway bookkeeping.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM kharnak.shop_order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored row is invalid.
    pub async fn list_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM kharnak.shop_order
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(user)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored row is invalid.
    pub async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM kharnak.shop_order ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Record the gateway order created for an online payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn attach_gateway_order(
        &self,
        id: OrderId,
        gateway_order_id: &str,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE kharnak.shop_order SET gateway_order_id = $2
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(gateway_order_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "gateway order"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }
}

/// Insert an order with status `Order Placed` and `payment = false`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert(conn: &mut PgConnection, order: &NewOrder) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r"
        INSERT INTO kharnak.shop_order
            (user_id, items, subtotal, delivery_fee, amount, address, status, payment_method)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(order.user_id)
    .bind(Json(&order.items))
    .bind(order.subtotal)
    .bind(order.delivery_fee)
    .bind(order.amount())
    .bind(Json(&order.address))
    .bind(OrderStatus::OrderPlaced.as_str())
    .bind(order.payment_method.as_str())
    .fetch_one(&mut *conn)
    .await?;

    row.try_into()
}

/// Load an order and lock its row until the transaction ends.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM kharnak.shop_order WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(TryInto::try_into).transpose()
}

/// Mark an order paid with the gateway's payment id.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order doesn't exist.
pub async fn mark_paid(
    conn: &mut PgConnection,
    id: OrderId,
    gateway_payment_id: &str,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r"
        UPDATE kharnak.shop_order SET payment = TRUE, gateway_payment_id = $2
        WHERE id = $1
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(gateway_payment_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    row.try_into()
}

/// Set an order's status.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order doesn't exist.
pub async fn set_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r"
        UPDATE kharnak.shop_order SET status = $2
        WHERE id = $1
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(status.as_str())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    row.try_into()
}

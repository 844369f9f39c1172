//! Back-office dashboard aggregates.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use super::RepositoryError;

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub products: i64,
    /// Products with no stock left.
    pub out_of_stock: i64,
    pub orders: i64,
    /// Order count keyed by status text.
    pub orders_by_status: BTreeMap<String, i64>,
    /// Booking count keyed by status text.
    pub bookings_by_status: BTreeMap<String, i64>,
    pub unread_messages: i64,
    /// Sum of paid order amounts plus confirmed or completed bookings.
    pub revenue: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct CountsRow {
    products: i64,
    out_of_stock: i64,
    orders: i64,
    unread_messages: i64,
    revenue: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct StatusCountRow {
    status: String,
    count: i64,
}

/// Read-only aggregate queries.
pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Collect dashboard numbers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any query fails.
    pub async fn stats(&self) -> Result<DashboardStats, RepositoryError> {
        let counts = sqlx::query_as::<_, CountsRow>(
            r"
            SELECT
                (SELECT COUNT(*) FROM kharnak.product) AS products,
                (SELECT COUNT(*) FROM kharnak.product WHERE quantity = 0) AS out_of_stock,
                (SELECT COUNT(*) FROM kharnak.shop_order) AS orders,
                (SELECT COUNT(*) FROM kharnak.contact_message WHERE NOT read) AS unread_messages,
                (
                    COALESCE((SELECT SUM(amount) FROM kharnak.shop_order WHERE payment), 0)
                    + COALESCE((SELECT SUM(amount) FROM kharnak.booking
                                WHERE status IN ('confirmed', 'completed')), 0)
                )::NUMERIC(14, 2) AS revenue
            ",
        )
        .fetch_one(self.pool)
        .await?;

        let orders_by_status = self
            .status_counts("SELECT status, COUNT(*) AS count FROM kharnak.shop_order GROUP BY status")
            .await?;
        let bookings_by_status = self
            .status_counts("SELECT status, COUNT(*) AS count FROM kharnak.booking GROUP BY status")
            .await?;

        Ok(DashboardStats {
            products: counts.products,
            out_of_stock: counts.out_of_stock,
            orders: counts.orders,
            orders_by_status,
            bookings_by_status,
            unread_messages: counts.unread_messages,
            revenue: counts.revenue,
        })
    }

    async fn status_counts(&self, sql: &str) -> Result<BTreeMap<String, i64>, RepositoryError> {
        let rows = sqlx::query_as::<_, StatusCountRow>(sql)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| (r.status, r.count)).collect())
    }
}

//! Product repository: catalog CRUD and stock counters.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use kharnak_core::ProductId;

use super::RepositoryError;
use crate::models::{Product, ProductInput};

const PRODUCT_COLUMNS: &str = "id, name, description, price, images, category, sub_category, \
                               sizes, quantity, bestseller, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    description: String,
    price: Decimal,
    images: Vec<String>,
    category: String,
    sub_category: String,
    sizes: Vec<String>,
    quantity: i32,
    bestseller: bool,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price: row.price,
            images: row.images,
            category: row.category,
            sub_category: row.sub_category,
            sizes: row.sizes,
            quantity: row.quantity,
            bestseller: row.bestseller,
            created_at: row.created_at,
        }
    }
}

/// Repository for catalog products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM kharnak.product ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM kharnak.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a product with this name exists.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO kharnak.product
                (name, description, price, images, category, sub_category, sizes, quantity, bestseller)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(&input.images)
        .bind(&input.category)
        .bind(&input.sub_category)
        .bind(&input.sizes)
        .bind(input.quantity)
        .bind(input.bestseller)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "product"))?;

        Ok(row.into())
    }

    /// Replace a product's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new name is taken.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE kharnak.product
            SET name = $2, description = $3, price = $4, images = $5, category = $6,
                sub_category = $7, sizes = $8, quantity = $9, bestseller = $10
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(&input.images)
        .bind(&input.category)
        .bind(&input.sub_category)
        .bind(&input.sizes)
        .bind(input.quantity)
        .bind(input.bestseller)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "product"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Insert or replace a product keyed by name. Used by catalog seeding.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_by_name(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO kharnak.product
                (name, description, price, images, category, sub_category, sizes, quantity, bestseller)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (name) DO UPDATE
            SET description = EXCLUDED.description, price = EXCLUDED.price,
                images = EXCLUDED.images, category = EXCLUDED.category,
                sub_category = EXCLUDED.sub_category, sizes = EXCLUDED.sizes,
                quantity = EXCLUDED.quantity, bestseller = EXCLUDED.bestseller
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(&input.images)
        .bind(&input.category)
        .bind(&input.sub_category)
        .bind(&input.sizes)
        .bind(input.quantity)
        .bind(input.bestseller)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM kharnak.product WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Outcome of [`take_stock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockTake {
    /// Stock was decremented; `remaining` units are left.
    Taken { remaining: i32 },
    /// Not enough stock; nothing changed.
    Short { available: i32 },
}

/// Take `quantity` units of stock if at least that many remain.
///
/// Runs on the caller's connection so checkout can hold every decrement in
/// one transaction.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the product no longer exists.
pub async fn take_stock(
    conn: &mut PgConnection,
    id: ProductId,
    quantity: i32,
) -> Result<StockTake, RepositoryError> {
    let remaining: Option<i32> = sqlx::query_scalar(
        r"
        UPDATE kharnak.product
        SET quantity = quantity - $2
        WHERE id = $1 AND quantity >= $2
        RETURNING quantity
        ",
    )
    .bind(id)
    .bind(quantity)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(remaining) = remaining {
        return Ok(StockTake::Taken { remaining });
    }

    let available: i32 = sqlx::query_scalar("SELECT quantity FROM kharnak.product WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;

    Ok(StockTake::Short { available })
}

/// Put `quantity` units back. Products deleted since are skipped.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn restore_stock(
    conn: &mut PgConnection,
    id: ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE kharnak.product SET quantity = quantity + $2 WHERE id = $1")
        .bind(id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

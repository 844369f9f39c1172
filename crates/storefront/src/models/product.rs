//! Catalog product types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kharnak_core::{CatalogEntry, ProductId, STANDARD_SIZE};

use super::{ValidationError, require_text};

/// A product listed in the shop.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Unit price in the store currency.
    pub price: Decimal,
    /// Image URLs, first one is the cover.
    pub images: Vec<String>,
    pub category: String,
    pub sub_category: String,
    /// Size variants. A single [`STANDARD_SIZE`] entry when the product has none.
    pub sizes: Vec<String>,
    /// Units in stock.
    pub quantity: i32,
    pub bestseller: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Price and stock as the cart sees them.
    #[must_use]
    pub fn catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            unit_price: self.price,
            stock: Some(u32::try_from(self.quantity).unwrap_or(0)),
        }
    }

    /// Cover image, if any.
    #[must_use]
    pub fn cover_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// Payload for creating or replacing a product.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
    pub category: String,
    #[serde(default)]
    pub sub_category: String,
    #[serde(default)]
    pub sizes: Vec<String>,
    pub quantity: i32,
    #[serde(default)]
    pub bestseller: bool,
}

impl ProductInput {
    /// Validate and normalize the payload.
    ///
    /// Sizes are trimmed and de-duplicated; an empty list becomes
    /// `["Standard"]` so every product can be added to a cart.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for blank names or categories, a
    /// non-positive price, negative stock, or blank image URLs.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let name = require_text(&self.name, "Name")?;
        let category = require_text(&self.category, "Category")?;

        if self.price <= Decimal::ZERO {
            return Err(ValidationError::new("Price must be greater than zero"));
        }
        if self.quantity < 0 {
            return Err(ValidationError::new("Quantity cannot be negative"));
        }
        if self.images.iter().any(|url| url.trim().is_empty()) {
            return Err(ValidationError::new("Image URLs cannot be blank"));
        }

        let mut sizes: Vec<String> = Vec::with_capacity(self.sizes.len());
        for size in self.sizes.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            if !sizes.iter().any(|existing| existing == size) {
                sizes.push(size.to_owned());
            }
        }
        if sizes.is_empty() {
            sizes.push(STANDARD_SIZE.to_owned());
        }

        Ok(Self {
            name,
            description: self.description.trim().to_owned(),
            price: self.price.round_dp(2),
            images: self.images.into_iter().map(|u| u.trim().to_owned()).collect(),
            category,
            sub_category: self.sub_category.trim().to_owned(),
            sizes,
            quantity: self.quantity,
            bestseller: self.bestseller,
        })
    }
}

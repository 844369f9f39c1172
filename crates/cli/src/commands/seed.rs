//! Catalog seeding from YAML.
//!
//! ```yaml
//! products:
//!   - name: Pashmina Shawl
//!     price: "2499.00"
//!     category: Women
//!     subCategory: Winterwear
//!     sizes: [S, M, L]
//!     quantity: 20
//! tours:
//!   - title: Tso Moriri Circuit
//!     location: Leh
//!     startDate: 2026-07-01
//!     endDate: 2026-07-05
//!     pricePerPerson: "18000"
//!     totalSeats: 12
//! stays:
//!   - name: Apricot Homestay
//!     location: Turtuk
//!     pricePerNight: "2200"
//!     rooms: 4
//!     maxGuestsPerRoom: 3
//! ```
//!
//! Every entry is validated before anything is written. Products are matched
//! by name, tours by title and start date, stays by name, so running the
//! same file twice leaves the catalog unchanged.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use kharnak_storefront::db::{ProductRepository, StayRepository, TourRepository};
use kharnak_storefront::models::{ProductInput, StayInput, TourInput};

use super::{CommandError, connect};

/// Top-level shape of a catalog file. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub products: Vec<ProductInput>,
    #[serde(default)]
    pub tours: Vec<TourInput>,
    #[serde(default)]
    pub stays: Vec<StayInput>,
}

impl CatalogFile {
    /// Parse a catalog document.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::Yaml` for malformed YAML or missing fields.
    pub fn parse(yaml: &str) -> Result<Self, CommandError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Validate every entry, logging each failure.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidCatalog` with the number of failures.
    pub fn validate(self) -> Result<Self, CommandError> {
        let mut failures = 0;
        let products = keep_valid(
            self.products,
            "product",
            |p| p.name.clone(),
            ProductInput::validate,
            &mut failures,
        );
        let tours = keep_valid(
            self.tours,
            "tour",
            |t| t.title.clone(),
            TourInput::validate,
            &mut failures,
        );
        let stays = keep_valid(
            self.stays,
            "stay",
            |s| s.name.clone(),
            StayInput::validate,
            &mut failures,
        );

        if failures > 0 {
            return Err(CommandError::InvalidCatalog(failures));
        }
        Ok(Self {
            products,
            tours,
            stays,
        })
    }

    const fn is_empty(&self) -> bool {
        self.products.is_empty() && self.tours.is_empty() && self.stays.is_empty()
    }
}

fn keep_valid<T, E: std::fmt::Display>(
    entries: Vec<T>,
    kind: &str,
    label: impl Fn(&T) -> String,
    validate: impl Fn(T) -> Result<T, E>,
    failures: &mut usize,
) -> Vec<T> {
    let mut valid = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = label(&entry);
        match validate(entry) {
            Ok(entry) => valid.push(entry),
            Err(e) => {
                error!(kind, name = %name, error = %e, "Invalid catalog entry");
                *failures += 1;
            }
        }
    }
    valid
}

/// Upsert products, tours, and stays from a YAML file.
///
/// # Errors
///
/// Returns `CommandError` if the file can't be read, fails validation, or a
/// write fails. Entries written before a failed write stay written.
pub async fn catalog(path: &Path) -> Result<(), CommandError> {
    let yaml = std::fs::read_to_string(path).map_err(|source| CommandError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let file = CatalogFile::parse(&yaml)?.validate()?;

    if file.is_empty() {
        info!(path = %path.display(), "Catalog file is empty, nothing to seed");
        return Ok(());
    }

    let pool = connect().await?;

    let products = ProductRepository::new(&pool);
    for input in &file.products {
        let product = products.upsert_by_name(input).await?;
        info!(id = %product.id, name = %product.name, "Product seeded");
    }

    let tours = TourRepository::new(&pool);
    for input in &file.tours {
        let tour = tours.upsert(input).await?;
        info!(id = %tour.id, title = %tour.title, "Tour seeded");
    }

    let stays = StayRepository::new(&pool);
    for input in &file.stays {
        let stay = stays.upsert(input).await?;
        info!(id = %stay.id, name = %stay.name, "Stay seeded");
    }

    info!(
        products = file.products.len(),
        tours = file.tours.len(),
        stays = file.stays.len(),
        "Catalog seeded"
    );
    Ok(())
}

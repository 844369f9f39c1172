//! Cart lines keyed by product and size.
//!
//! A [`Cart`] is a nested map `product -> size -> quantity`. It serializes
//! to the same nested JSON object the storefront frontend keeps, e.g.
//! `{"12": {"M": 2, "L": 1}, "31": {"Standard": 1}}`.
//!
//! The cart never looks anything up on its own. Stock bounds and unit
//! prices come from a [`Catalog`], so callers decide which snapshot of the
//! product list a mutation is checked against.
//!
//! # Invariants
//!
//! - A line exists iff its quantity is greater than zero.
//! - No line has an empty size.
//! - A mutation that fails leaves the cart untouched.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ProductId;

/// Size used for products without size variants.
pub const STANDARD_SIZE: &str = "Standard";

type Lines = BTreeMap<ProductId, BTreeMap<String, u32>>;

/// What the cart needs to know about a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Current unit price.
    pub unit_price: Decimal,
    /// Units in stock, if the product tracks stock.
    pub stock: Option<u32>,
}

/// Source of prices and stock bounds for cart operations.
pub trait Catalog {
    /// Look up a product. `None` means the product is not in the catalog.
    fn entry(&self, product: ProductId) -> Option<CatalogEntry>;
}

impl<S: BuildHasher> Catalog for HashMap<ProductId, CatalogEntry, S> {
    fn entry(&self, product: ProductId) -> Option<CatalogEntry> {
        self.get(&product).copied()
    }
}

impl<C: Catalog + ?Sized> Catalog for &C {
    fn entry(&self, product: ProductId) -> Option<CatalogEntry> {
        (**self).entry(product)
    }
}

/// Reasons a cart mutation is rejected.
///
/// The `Display` text is what the shopper sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// No size was chosen.
    #[error("Select Product Size")]
    MissingSize,

    /// The requested quantity is above the known stock.
    #[error("Maximum available quantity reached")]
    StockExceeded {
        /// Product the line belongs to.
        product: ProductId,
        /// Size of the rejected line.
        size: String,
        /// Units in stock at the time of the check.
        available: u32,
    },
}

/// One (product, size) selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine<'a> {
    pub product_id: ProductId,
    pub size: &'a str,
    pub quantity: u32,
}

/// A shopper's selections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Lines", into = "Lines")]
pub struct Cart {
    lines: Lines,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: BTreeMap::new(),
        }
    }

    /// Add one unit of `product` in `size`.
    ///
    /// Returns the new quantity of the line.
    ///
    /// # Errors
    ///
    /// - [`CartError::MissingSize`] if `size` is blank.
    /// - [`CartError::StockExceeded`] if the catalog knows the product's
    ///   stock and one more unit would exceed it.
    pub fn add_item(
        &mut self,
        product: ProductId,
        size: &str,
        catalog: &impl Catalog,
    ) -> Result<u32, CartError> {
        let size = normalize_size(size).ok_or(CartError::MissingSize)?;
        let next = self.quantity(product, size).saturating_add(1);
        check_stock(product, size, u64::from(next), catalog)?;
        self.set(product, size, next);
        Ok(next)
    }

    /// Overwrite the quantity of a line. Zero or below removes it.
    ///
    /// # Errors
    ///
    /// - [`CartError::StockExceeded`] if `quantity` is above the known stock.
    /// - [`CartError::MissingSize`] if `size` is blank and `quantity` is
    ///   positive.
    pub fn update_quantity(
        &mut self,
        product: ProductId,
        size: &str,
        quantity: i64,
        catalog: &impl Catalog,
    ) -> Result<(), CartError> {
        let Ok(requested) = u64::try_from(quantity) else {
            self.remove(product, size);
            return Ok(());
        };
        if requested == 0 {
            self.remove(product, size);
            return Ok(());
        }

        let size = normalize_size(size).ok_or(CartError::MissingSize)?;
        check_stock(product, size, requested, catalog)?;
        self.set(product, size, u32::try_from(requested).unwrap_or(u32::MAX));
        Ok(())
    }

    /// Quantity held for a (product, size) pair.
    #[must_use]
    pub fn quantity(&self, product: ProductId, size: &str) -> u32 {
        self.lines
            .get(&product)
            .and_then(|sizes| sizes.get(size.trim()))
            .copied()
            .unwrap_or(0)
    }

    /// Quantity held for a product across all sizes.
    #[must_use]
    pub fn product_quantity(&self, product: ProductId) -> u64 {
        self.lines
            .get(&product)
            .map_or(0, |sizes| sizes.values().copied().map(u64::from).sum())
    }

    /// Total number of units in the cart.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.lines
            .values()
            .flat_map(BTreeMap::values)
            .copied()
            .map(u64::from)
            .sum()
    }

    /// Sum of `quantity * unit_price` over all lines.
    ///
    /// Lines whose product is missing from the catalog contribute nothing.
    #[must_use]
    pub fn amount(&self, catalog: &impl Catalog) -> Decimal {
        self.lines()
            .filter_map(|line| {
                catalog
                    .entry(line.product_id)
                    .map(|entry| entry.unit_price * Decimal::from(line.quantity))
            })
            .sum()
    }

    /// Iterate over all lines in product, then size, order.
    pub fn lines(&self) -> impl Iterator<Item = CartLine<'_>> {
        self.lines.iter().flat_map(|(product_id, sizes)| {
            sizes.iter().map(|(size, quantity)| CartLine {
                product_id: *product_id,
                size,
                quantity: *quantity,
            })
        })
    }

    /// Distinct products in the cart.
    pub fn product_ids(&self) -> impl Iterator<Item = ProductId> + '_ {
        self.lines.keys().copied()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Fold `other` into this cart.
    ///
    /// Quantities of matching lines are summed and then clamped to the known
    /// stock, so merging never produces a line the cart would have rejected.
    /// Returns the number of lines that were clamped.
    pub fn merge(&mut self, other: &Self, catalog: &impl Catalog) -> usize {
        let mut clamped = 0;
        for line in other.lines() {
            let mut merged = self
                .quantity(line.product_id, line.size)
                .saturating_add(line.quantity);
            if let Some(stock) = catalog.entry(line.product_id).and_then(|e| e.stock)
                && merged > stock
            {
                merged = stock;
                clamped += 1;
            }
            if merged == 0 {
                self.remove(line.product_id, line.size);
            } else {
                self.set(line.product_id, line.size, merged);
            }
        }
        clamped
    }

    /// Drop lines whose product is no longer in the catalog.
    ///
    /// Returns the removed product ids.
    pub fn prune(&mut self, catalog: &impl Catalog) -> Vec<ProductId> {
        let gone: Vec<ProductId> = self
            .lines
            .keys()
            .copied()
            .filter(|id| catalog.entry(*id).is_none())
            .collect();
        for id in &gone {
            self.lines.remove(id);
        }
        gone
    }

    fn set(&mut self, product: ProductId, size: &str, quantity: u32) {
        self.lines
            .entry(product)
            .or_default()
            .insert(size.to_owned(), quantity);
    }

    fn remove(&mut self, product: ProductId, size: &str) {
        if let Some(sizes) = self.lines.get_mut(&product) {
            sizes.remove(size.trim());
            if sizes.is_empty() {
                self.lines.remove(&product);
            }
        }
    }
}

impl From<Lines> for Cart {
    fn from(raw: Lines) -> Self {
        let lines = raw
            .into_iter()
            .filter_map(|(product, sizes)| {
                let sizes: BTreeMap<String, u32> = sizes
                    .into_iter()
                    .filter_map(|(size, qty)| {
                        let size = normalize_size(&size)?.to_owned();
                        (qty > 0).then_some((size, qty))
                    })
                    .collect();
                (!sizes.is_empty()).then_some((product, sizes))
            })
            .collect();
        Self { lines }
    }
}

impl From<Cart> for Lines {
    fn from(cart: Cart) -> Self {
        cart.lines
    }
}

fn normalize_size(size: &str) -> Option<&str> {
    let size = size.trim();
    (!size.is_empty()).then_some(size)
}

fn check_stock(
    product: ProductId,
    size: &str,
    requested: u64,
    catalog: &impl Catalog,
) -> Result<(), CartError> {
    match catalog.entry(product).and_then(|entry| entry.stock) {
        Some(available) if requested > u64::from(available) => Err(CartError::StockExceeded {
            product,
            size: size.to_owned(),
            available,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(id: i32) -> ProductId {
        ProductId::new(id)
    }

    fn catalog(entries: &[(i32, i64, Option<u32>)]) -> HashMap<ProductId, CatalogEntry> {
        entries
            .iter()
            .map(|&(id, price, stock)| {
                (
                    p(id),
                    CatalogEntry {
                        unit_price: Decimal::new(price, 0),
                        stock,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_add_then_update_to_zero() {
        let catalog = catalog(&[(1, 500, Some(10))]);
        let mut cart = Cart::new();

        assert_eq!(cart.add_item(p(1), "M", &catalog).unwrap(), 1);
        assert_eq!(cart.count(), 1);
        assert_eq!(cart.add_item(p(1), "M", &catalog).unwrap(), 2);
        assert_eq!(cart.count(), 2);

        cart.update_quantity(p(1), "M", 0, &catalog).unwrap();
        assert_eq!(cart.count(), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_without_size_is_rejected_and_leaves_cart_alone() {
        let catalog = catalog(&[(1, 500, Some(10))]);
        let mut cart = Cart::new();
        cart.add_item(p(1), "L", &catalog).unwrap();
        let before = cart.clone();

        assert_eq!(
            cart.add_item(p(1), "", &catalog),
            Err(CartError::MissingSize)
        );
        assert_eq!(
            cart.add_item(p(1), "   ", &catalog),
            Err(CartError::MissingSize)
        );
        assert_eq!(cart, before);
        assert_eq!(CartError::MissingSize.to_string(), "Select Product Size");
    }

    #[test]
    fn test_add_stops_at_stock() {
        let catalog = catalog(&[(1, 500, Some(2))]);
        let mut cart = Cart::new();
        cart.add_item(p(1), "S", &catalog).unwrap();
        cart.add_item(p(1), "S", &catalog).unwrap();

        let err = cart.add_item(p(1), "S", &catalog).unwrap_err();
        assert_eq!(
            err,
            CartError::StockExceeded {
                product: p(1),
                size: "S".to_owned(),
                available: 2,
            }
        );
        assert_eq!(err.to_string(), "Maximum available quantity reached");
        assert_eq!(cart.quantity(p(1), "S"), 2);
    }

    #[test]
    fn test_stock_is_checked_per_size() {
        let catalog = catalog(&[(1, 500, Some(1))]);
        let mut cart = Cart::new();
        cart.add_item(p(1), "S", &catalog).unwrap();
        cart.add_item(p(1), "M", &catalog).unwrap();
        assert_eq!(cart.count(), 2);
        assert_eq!(cart.product_quantity(p(1)), 2);
    }

    #[test]
    fn test_update_above_stock_is_rejected() {
        let catalog = catalog(&[(1, 500, Some(3))]);
        let mut cart = Cart::new();
        cart.add_item(p(1), "M", &catalog).unwrap();
        let before = cart.clone();

        assert!(matches!(
            cart.update_quantity(p(1), "M", 4, &catalog),
            Err(CartError::StockExceeded { available: 3, .. })
        ));
        assert_eq!(cart, before);

        cart.update_quantity(p(1), "M", 3, &catalog).unwrap();
        assert_eq!(cart.quantity(p(1), "M"), 3);
    }

    #[test]
    fn test_negative_quantity_removes_line() {
        let catalog = catalog(&[(1, 500, Some(3))]);
        let mut cart = Cart::new();
        cart.add_item(p(1), "M", &catalog).unwrap();
        cart.update_quantity(p(1), "M", -5, &catalog).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_unknown_stock_is_unbounded() {
        let catalog = catalog(&[(1, 100, None)]);
        let mut cart = Cart::new();
        cart.update_quantity(p(1), STANDARD_SIZE, 1000, &catalog)
            .unwrap();
        cart.update_quantity(p(2), STANDARD_SIZE, 7, &catalog)
            .unwrap();
        assert_eq!(cart.count(), 1007);
    }

    #[test]
    fn test_amount() {
        let catalog = catalog(&[(1, 250, Some(10)), (2, 1200, Some(10))]);
        let mut cart = Cart::new();
        assert_eq!(cart.amount(&catalog), Decimal::ZERO);

        cart.update_quantity(p(1), "M", 2, &catalog).unwrap();
        cart.update_quantity(p(1), "L", 1, &catalog).unwrap();
        cart.update_quantity(p(2), STANDARD_SIZE, 2, &catalog)
            .unwrap();
        assert_eq!(cart.amount(&catalog), Decimal::new(3150, 0));
    }

    #[test]
    fn test_amount_skips_products_missing_from_catalog() {
        let full = catalog(&[(1, 250, None), (2, 1200, None)]);
        let mut cart = Cart::new();
        cart.add_item(p(1), "M", &full).unwrap();
        cart.add_item(p(2), "M", &full).unwrap();

        let shrunk = catalog(&[(1, 250, None)]);
        assert_eq!(cart.amount(&shrunk), Decimal::new(250, 0));
    }

    #[test]
    fn test_count_matches_sum_of_lines_over_mixed_sequence() {
        let catalog = catalog(&[(1, 10, Some(4)), (2, 20, Some(2)), (3, 30, None)]);
        let mut cart = Cart::new();
        let sizes = ["S", "M", ""];

        for step in 0_i64..60 {
            let product = p(i32::try_from(step % 3).unwrap() + 1);
            let size = sizes[usize::try_from(step % 3).unwrap()];
            if step % 4 == 0 {
                let _ = cart.update_quantity(product, size, step % 6 - 1, &catalog);
            } else {
                let _ = cart.add_item(product, size, &catalog);
            }

            let expected: u64 = cart.lines().map(|l| u64::from(l.quantity)).sum();
            assert_eq!(cart.count(), expected);
            assert!(cart.lines().all(|l| l.quantity > 0 && !l.size.is_empty()));
            assert!(cart.lines().all(|l| {
                Catalog::entry(&catalog, l.product_id)
                    .and_then(|e| e.stock)
                    .is_none_or(|stock| l.quantity <= stock)
            }));
        }
    }

    #[test]
    fn test_merge_sums_and_clamps() {
        let catalog = catalog(&[(1, 10, Some(3)), (2, 20, None)]);
        let mut account = Cart::new();
        account.update_quantity(p(1), "M", 2, &catalog).unwrap();

        let mut guest = Cart::new();
        guest.update_quantity(p(1), "M", 2, &catalog).unwrap();
        guest.update_quantity(p(2), "L", 5, &catalog).unwrap();

        let clamped = account.merge(&guest, &catalog);
        assert_eq!(clamped, 1);
        assert_eq!(account.quantity(p(1), "M"), 3);
        assert_eq!(account.quantity(p(2), "L"), 5);
    }

    #[test]
    fn test_merge_drops_lines_with_no_stock_left() {
        let catalog = catalog(&[(1, 10, Some(0))]);
        let mut account = Cart::new();
        let guest: Cart = serde_json::from_str(r#"{"1":{"M":2}}"#).unwrap();
        account.merge(&guest, &catalog);
        assert!(account.is_empty());
    }

    #[test]
    fn test_prune_removes_unknown_products() {
        let catalog = catalog(&[(1, 10, None)]);
        let mut cart: Cart = serde_json::from_str(r#"{"1":{"M":1},"9":{"S":2}}"#).unwrap();
        assert_eq!(cart.prune(&catalog), vec![p(9)]);
        assert_eq!(cart.count(), 1);
    }

    #[test]
    fn test_json_shape_and_normalization() {
        let cart: Cart =
            serde_json::from_str(r#"{"4":{"M":2,"L":0," ":3},"5":{"S":0}}"#).unwrap();
        assert_eq!(cart.count(), 2);
        assert_eq!(serde_json::to_string(&cart).unwrap(), r#"{"4":{"M":2}}"#);
    }
}

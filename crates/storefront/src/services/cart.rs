//! Cart service: one entry point for guest and account carts.
//!
//! Guests keep their cart in the session. Signed-in users keep it in the
//! `cart` table, where every write is conditional on the version that was
//! read; a lost race reloads and reapplies the change, up to
//! [`MAX_ATTEMPTS`] times, before giving up with
//! [`CartServiceError::Conflict`].

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tower_sessions::Session;
use tracing::{debug, instrument, warn};

use kharnak_core::{Cart, CartError, ProductId, UserId};

use super::catalog::{CatalogService, CatalogSnapshot};
use crate::db::{CartRepository, RepositoryError};
use crate::models::{Product, session_keys};

/// Conditional writes attempted before a cart update is abandoned.
pub const MAX_ATTEMPTS: usize = 3;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartServiceError {
    /// The cart rejected the change (missing size, stock bound).
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Product is not in the catalog.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// Size is not one the product is sold in.
    #[error("size {size:?} is not available for product {product}")]
    InvalidSize { product: ProductId, size: String },

    /// Concurrent writers kept winning.
    #[error("cart was modified concurrently")]
    Conflict,

    /// Session store failure.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Whose cart an operation targets.
#[derive(Debug, Clone)]
pub enum CartOwner {
    /// Visitor without an account; cart lives in the session.
    Guest(Session),
    /// Signed-in user; cart lives in the database.
    User(UserId),
}

/// A cart with totals priced against the current catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub cart_data: Cart,
    pub count: u64,
    pub amount: Decimal,
}

impl CartView {
    fn new(cart: Cart, catalog: &CatalogSnapshot) -> Self {
        Self {
            count: cart.count(),
            amount: cart.amount(catalog),
            cart_data: cart,
        }
    }
}

/// Result of folding a guest cart into an account cart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    /// Lines reduced to the available stock.
    pub clamped_lines: usize,
    pub cart: CartView,
}

/// Cart operations for guests and users.
#[derive(Clone)]
pub struct CartService {
    pool: PgPool,
    catalog: CatalogService,
}

impl CartService {
    #[must_use]
    pub const fn new(pool: PgPool, catalog: CatalogService) -> Self {
        Self { pool, catalog }
    }

    /// Current cart with count and amount. Lines for products that have
    /// left the catalog are omitted.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError` if the cart or catalog cannot be loaded.
    pub async fn get(&self, owner: &CartOwner) -> Result<CartView, CartServiceError> {
        let catalog = self.catalog.snapshot().await?;
        let mut cart = match owner {
            CartOwner::Guest(session) => load_guest(session).await?,
            CartOwner::User(user) => CartRepository::new(&self.pool).load(*user).await?.0,
        };
        cart.prune(catalog.as_ref());
        Ok(CartView::new(cart, &catalog))
    }

    /// Add one unit of a product in a size.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::ProductNotFound` for unknown products,
    /// `CartServiceError::Cart` when the size is missing or stock is
    /// exhausted, and `CartServiceError::Conflict` after repeated lost races.
    #[instrument(skip(self, owner))]
    pub async fn add_item(
        &self,
        owner: &CartOwner,
        product: ProductId,
        size: &str,
    ) -> Result<CartView, CartServiceError> {
        self.mutate(owner, |cart, catalog| {
            check_size(catalog, product, size)?;
            cart.add_item(product, size, catalog)?;
            Ok(())
        })
        .await
    }

    /// Overwrite a line's quantity; zero or below removes the line.
    ///
    /// # Errors
    ///
    /// Same as [`CartService::add_item`]. Removing a line whose product has
    /// since been deleted is allowed.
    #[instrument(skip(self, owner))]
    pub async fn update_quantity(
        &self,
        owner: &CartOwner,
        product: ProductId,
        size: &str,
        quantity: i64,
    ) -> Result<CartView, CartServiceError> {
        self.mutate(owner, |cart, catalog| {
            let removing_held_line = quantity <= 0 && cart.quantity(product, size) > 0;
            if !removing_held_line {
                check_size(catalog, product, size)?;
            }
            cart.update_quantity(product, size, quantity, catalog)?;
            Ok(())
        })
        .await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError` if the cart cannot be saved.
    pub async fn clear(&self, owner: &CartOwner) -> Result<(), CartServiceError> {
        self.mutate(owner, |cart, _| {
            cart.clear();
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Fold the session's guest cart into `user`'s cart and empty the
    /// guest cart. Quantities are clamped to current stock.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError` if either cart cannot be loaded or saved.
    #[instrument(skip(self, session))]
    pub async fn merge_guest_into_user(
        &self,
        session: &Session,
        user: UserId,
    ) -> Result<MergeOutcome, CartServiceError> {
        let mut guest = load_guest(session).await?;
        let catalog = self.catalog.snapshot().await?;
        guest.prune(catalog.as_ref());

        if guest.is_empty() {
            let cart = CartRepository::new(&self.pool).load(user).await?.0;
            session.remove::<Cart>(session_keys::CART_ITEMS).await?;
            return Ok(MergeOutcome {
                clamped_lines: 0,
                cart: CartView::new(cart, &catalog),
            });
        }

        let (clamped_lines, cart) = self
            .mutate_user(user, &catalog, |cart, catalog| {
                Ok(cart.merge(&guest, catalog))
            })
            .await?;

        session.remove::<Cart>(session_keys::CART_ITEMS).await?;
        debug!(clamped_lines, "guest cart merged");

        Ok(MergeOutcome {
            clamped_lines,
            cart: CartView::new(cart, &catalog),
        })
    }

    /// Drop the guest cart (logout).
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::Session` if the session store fails.
    pub async fn forget_guest(&self, session: &Session) -> Result<(), CartServiceError> {
        session.remove::<Cart>(session_keys::CART_ITEMS).await?;
        Ok(())
    }

    async fn mutate<F>(&self, owner: &CartOwner, apply: F) -> Result<CartView, CartServiceError>
    where
        F: FnMut(&mut Cart, &CatalogSnapshot) -> Result<(), CartServiceError>,
    {
        let catalog = self.catalog.snapshot().await?;
        let cart = match owner {
            CartOwner::Guest(session) => mutate_guest(session, &catalog, apply).await?,
            CartOwner::User(user) => self.mutate_user(*user, &catalog, apply).await?.1,
        };
        Ok(CartView::new(cart, &catalog))
    }

    async fn mutate_user<T, F>(
        &self,
        user: UserId,
        catalog: &CatalogSnapshot,
        apply: F,
    ) -> Result<(T, Cart), CartServiceError>
    where
        F: FnMut(&mut Cart, &CatalogSnapshot) -> Result<T, CartServiceError>,
    {
        retry_versioned(&CartRepository::new(&self.pool), user, catalog, apply).await
    }
}

/// Versioned cart storage: a save only lands if nobody saved since the load.
pub(crate) trait VersionedCarts {
    async fn load(&self, user: UserId) -> Result<(Cart, i64), RepositoryError>;

    /// `None` when the stored version is no longer `expected`.
    async fn save(
        &self,
        user: UserId,
        cart: &Cart,
        expected: i64,
    ) -> Result<Option<i64>, RepositoryError>;
}

impl VersionedCarts for CartRepository<'_> {
    async fn load(&self, user: UserId) -> Result<(Cart, i64), RepositoryError> {
        CartRepository::load(self, user).await
    }

    async fn save(
        &self,
        user: UserId,
        cart: &Cart,
        expected: i64,
    ) -> Result<Option<i64>, RepositoryError> {
        CartRepository::save(self, user, cart, expected).await
    }
}

/// Load, apply and conditionally save, reapplying on a fresh load whenever
/// the save loses a race.
async fn retry_versioned<S, T, F>(
    store: &S,
    user: UserId,
    catalog: &CatalogSnapshot,
    mut apply: F,
) -> Result<(T, Cart), CartServiceError>
where
    S: VersionedCarts,
    F: FnMut(&mut Cart, &CatalogSnapshot) -> Result<T, CartServiceError>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        let (mut cart, version) = store.load(user).await?;
        let out = apply(&mut cart, catalog)?;
        if store.save(user, &cart, version).await?.is_some() {
            return Ok((out, cart));
        }
        debug!(attempt, "cart version changed underneath us, retrying");
    }

    warn!(user_id = %user, "cart update abandoned after {MAX_ATTEMPTS} conflicting writes");
    Err(CartServiceError::Conflict)
}

async fn load_guest(session: &Session) -> Result<Cart, CartServiceError> {
    Ok(session
        .get::<Cart>(session_keys::CART_ITEMS)
        .await?
        .unwrap_or_default())
}

async fn mutate_guest<F>(
    session: &Session,
    catalog: &CatalogSnapshot,
    mut apply: F,
) -> Result<Cart, CartServiceError>
where
    F: FnMut(&mut Cart, &CatalogSnapshot) -> Result<(), CartServiceError>,
{
    let mut cart = load_guest(session).await?;
    apply(&mut cart, catalog)?;
    session.insert(session_keys::CART_ITEMS, &cart).await?;
    Ok(cart)
}

/// The product must exist and, when a size is given, be sold in it.
fn check_size<'c>(
    catalog: &'c CatalogSnapshot,
    product: ProductId,
    size: &str,
) -> Result<&'c Product, CartServiceError> {
    let found = catalog
        .get(product)
        .ok_or(CartServiceError::ProductNotFound(product))?;

    let size = size.trim();
    if !size.is_empty() && !found.sizes.iter().any(|s| s == size) {
        return Err(CartServiceError::InvalidSize {
            product,
            size: size.to_owned(),
        });
    }
    Ok(found)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;

    /// In-memory cart row. Each entry in `interference` is a write by some
    /// other request that lands between our load and our save.
    struct RacyCarts {
        row: Mutex<(Cart, i64)>,
        interference: Mutex<Vec<Cart>>,
        saves: Mutex<usize>,
    }

    impl RacyCarts {
        fn new(cart: Cart, interference: Vec<Cart>) -> Self {
            Self {
                row: Mutex::new((cart, 1)),
                interference: Mutex::new(interference),
                saves: Mutex::new(0),
            }
        }
    }

    impl VersionedCarts for RacyCarts {
        async fn load(&self, _user: UserId) -> Result<(Cart, i64), RepositoryError> {
            Ok(self.row.lock().unwrap().clone())
        }

        async fn save(
            &self,
            _user: UserId,
            cart: &Cart,
            expected: i64,
        ) -> Result<Option<i64>, RepositoryError> {
            *self.saves.lock().unwrap() += 1;
            let mut row = self.row.lock().unwrap();
            if let Some(other) = self.interference.lock().unwrap().pop() {
                *row = (other, row.1 + 1);
            }
            if row.1 != expected {
                return Ok(None);
            }
            *row = (cart.clone(), expected + 1);
            Ok(Some(row.1))
        }
    }

    fn snapshot() -> CatalogSnapshot {
        CatalogSnapshot::new(vec![Product {
            id: ProductId::new(1),
            name: "Yak Wool Socks".into(),
            description: String::new(),
            price: Decimal::new(65_000, 2),
            images: vec![],
            category: "Textiles".into(),
            sub_category: String::new(),
            sizes: vec!["M".into(), "L".into()],
            quantity: 3,
            bestseller: false,
            created_at: Utc::now(),
        }])
    }

    #[test]
    fn test_check_size() {
        let catalog = snapshot();
        assert!(check_size(&catalog, ProductId::new(1), "M").is_ok());
        // Blank sizes are left for the cart to reject with its own message.
        assert!(check_size(&catalog, ProductId::new(1), " ").is_ok());
        assert!(matches!(
            check_size(&catalog, ProductId::new(1), "XL"),
            Err(CartServiceError::InvalidSize { .. })
        ));
        assert!(matches!(
            check_size(&catalog, ProductId::new(9), "M"),
            Err(CartServiceError::ProductNotFound(_))
        ));
    }

    #[test]
    fn test_cart_view_totals() {
        let catalog = snapshot();
        let mut cart = Cart::new();
        cart.add_item(ProductId::new(1), "M", &catalog).unwrap();
        cart.add_item(ProductId::new(1), "L", &catalog).unwrap();

        let view = CartView::new(cart, &catalog);
        assert_eq!(view.count, 2);
        assert_eq!(view.amount, Decimal::new(130_000, 2));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["cartData"]["1"]["M"], 1);
    }

    #[tokio::test]
    async fn test_lost_race_reapplies_on_fresh_cart() {
        let catalog = snapshot();
        let mut theirs = Cart::new();
        theirs.add_item(ProductId::new(1), "L", &catalog).unwrap();
        let store = RacyCarts::new(Cart::new(), vec![theirs]);

        let mut applied = 0;
        let ((), cart) = retry_versioned(&store, UserId::new(7), &catalog, |cart, catalog| {
            applied += 1;
            cart.add_item(ProductId::new(1), "M", catalog)?;
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(applied, 2);
        assert_eq!(*store.saves.lock().unwrap(), 2);
        // The concurrent "L" survives alongside our "M".
        assert_eq!(cart.quantity(ProductId::new(1), "L"), 1);
        assert_eq!(cart.quantity(ProductId::new(1), "M"), 1);
        let (stored, version) = store.row.lock().unwrap().clone();
        assert_eq!(stored, cart);
        assert_eq!(version, 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let catalog = snapshot();
        let interference = vec![Cart::new(); MAX_ATTEMPTS];
        let store = RacyCarts::new(Cart::new(), interference);

        let mut applied = 0;
        let result = retry_versioned(&store, UserId::new(7), &catalog, |cart, catalog| {
            applied += 1;
            cart.add_item(ProductId::new(1), "M", catalog)?;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(CartServiceError::Conflict)));
        assert_eq!(applied, MAX_ATTEMPTS);
        assert_eq!(*store.saves.lock().unwrap(), MAX_ATTEMPTS);
        assert!(store.row.lock().unwrap().0.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_change_is_not_saved() {
        let catalog = snapshot();
        let store = RacyCarts::new(Cart::new(), vec![]);

        let result = retry_versioned(&store, UserId::new(7), &catalog, |cart, catalog| {
            check_size(catalog, ProductId::new(1), "XL")?;
            cart.add_item(ProductId::new(1), "XL", catalog)?;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(CartServiceError::InvalidSize { .. })));
        assert_eq!(*store.saves.lock().unwrap(), 0);
    }
}

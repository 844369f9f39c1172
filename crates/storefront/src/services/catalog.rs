//! Cached product catalog.
//!
//! The full product list is small and read on every cart operation, so it is
//! cached as one snapshot for 60 seconds. Admin writes go through this
//! service and drop the snapshot immediately.
//!
//! Snapshots are keyed by a generation number that [`CatalogService::invalidate`]
//! bumps. A load that was already running when the catalog changed finishes
//! under the old generation, which no reader asks for any more.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use kharnak_core::{Catalog, CatalogEntry, ProductId};

use crate::db::{ProductRepository, RepositoryError};
use crate::models::{Product, ProductInput};

const SNAPSHOT_TTL: Duration = Duration::from_secs(60);

/// Point-in-time copy of every product.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    products: Vec<Product>,
    index: HashMap<ProductId, usize>,
}

impl CatalogSnapshot {
    #[must_use]
    pub fn new(products: Vec<Product>) -> Self {
        let index = products
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id, i))
            .collect();
        Self { products, index }
    }

    /// Products, newest first.
    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<&Product> {
        self.index.get(&id).and_then(|&i| self.products.get(i))
    }
}

impl Catalog for CatalogSnapshot {
    fn entry(&self, product: ProductId) -> Option<CatalogEntry> {
        self.get(product).map(Product::catalog_entry)
    }
}

/// Catalog reads and admin writes.
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<CatalogServiceInner>,
}

struct CatalogServiceInner {
    pool: PgPool,
    generation: AtomicU64,
    cache: Cache<u64, Arc<CatalogSnapshot>>,
}

impl CatalogService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let cache = Cache::builder()
            .max_capacity(2)
            .time_to_live(SNAPSHOT_TTL)
            .build();

        Self {
            inner: Arc::new(CatalogServiceInner {
                pool,
                generation: AtomicU64::new(0),
                cache,
            }),
        }
    }

    /// Current snapshot, loading it on a miss. Concurrent misses share one
    /// load.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the products cannot be loaded.
    pub async fn snapshot(&self) -> Result<Arc<CatalogSnapshot>, RepositoryError> {
        let generation = self.inner.generation.load(Ordering::Acquire);
        let pool = &self.inner.pool;

        self.inner
            .cache
            .try_get_with(generation, async move {
                debug!(generation, "loading catalog snapshot");
                let products = ProductRepository::new(pool).list_all().await?;
                Ok::<_, RepositoryError>(Arc::new(CatalogSnapshot::new(products)))
            })
            .await
            .map_err(shared_load_error)
    }

    /// Fresh snapshot that bypasses the cache. Used where stale stock would
    /// give a wrong answer (checkout).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the products cannot be loaded.
    pub async fn fresh_snapshot(&self) -> Result<Arc<CatalogSnapshot>, RepositoryError> {
        self.invalidate().await;
        self.snapshot().await
    }

    /// Drop the cached snapshot. Loads already in flight cannot bring the
    /// old catalog back.
    pub async fn invalidate(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }

    /// Add a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let product = ProductRepository::new(&self.inner.pool).create(input).await?;
        self.invalidate().await;
        Ok(product)
    }

    /// Replace a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let product = ProductRepository::new(&self.inner.pool)
            .update(id, input)
            .await?;
        self.invalidate().await;
        Ok(product)
    }

    /// Remove a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn remove(&self, id: ProductId) -> Result<(), RepositoryError> {
        ProductRepository::new(&self.inner.pool).delete(id).await?;
        self.invalidate().await;
        Ok(())
    }
}

/// Take back the error of a load that may have been shared with other
/// callers.
fn shared_load_error(err: Arc<RepositoryError>) -> RepositoryError {
    Arc::try_unwrap(err).unwrap_or_else(|shared| match &*shared {
        RepositoryError::NotFound => RepositoryError::NotFound,
        RepositoryError::Conflict(what) => RepositoryError::Conflict(what.clone()),
        RepositoryError::DataCorruption(what) => RepositoryError::DataCorruption(what.clone()),
        RepositoryError::Database(e) => {
            RepositoryError::Database(sqlx::Error::Protocol(format!("catalog load failed: {e}")))
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use sqlx::postgres::PgPoolOptions;

    use super::*;

    /// A service whose database is unreachable, so every cache miss fails.
    fn offline_service() -> CatalogService {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://kharnak@127.0.0.1:1/kharnak")
            .unwrap();
        CatalogService::new(pool)
    }

    fn product(id: i32, quantity: i32) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: String::new(),
            price: Decimal::new(1_500, 2),
            images: vec![],
            category: "Food".into(),
            sub_category: String::new(),
            sizes: vec!["Standard".into()],
            quantity,
            bestseller: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_snapshot_catalog_entries() {
        let snapshot = CatalogSnapshot::new(vec![product(1, 4), product(2, -3)]);

        let entry = snapshot.entry(ProductId::new(1)).map(|e| e.stock);
        assert_eq!(entry, Some(Some(4)));
        // A corrupt negative count reads as sold out.
        let entry = snapshot.entry(ProductId::new(2)).map(|e| e.stock);
        assert_eq!(entry, Some(Some(0)));
        assert!(snapshot.entry(ProductId::new(3)).is_none());
    }

    #[tokio::test]
    async fn test_cached_snapshot_is_served() {
        let service = offline_service();
        let cached = Arc::new(CatalogSnapshot::new(vec![product(1, 4)]));
        service.inner.cache.insert(0, Arc::clone(&cached)).await;

        let snapshot = service.snapshot().await.unwrap();
        assert!(Arc::ptr_eq(&snapshot, &cached));
    }

    #[tokio::test]
    async fn test_late_load_after_invalidate_is_never_served() {
        let service = offline_service();
        let before = service.inner.generation.load(Ordering::Acquire);

        service.invalidate().await;

        // A load that began before the invalidation lands afterwards.
        let stale = Arc::new(CatalogSnapshot::new(vec![product(1, 4)]));
        service.inner.cache.insert(before, stale).await;

        // The reader asks for the new generation, misses, and goes to the
        // (unreachable) database instead of returning the stale copy.
        assert!(service.snapshot().await.is_err());
    }

    #[test]
    fn test_shared_load_error_keeps_kind() {
        let shared = Arc::new(RepositoryError::NotFound);
        let _other_waiter = Arc::clone(&shared);
        assert!(matches!(shared_load_error(shared), RepositoryError::NotFound));

        let only = Arc::new(RepositoryError::Conflict("product already exists".into()));
        assert!(matches!(
            shared_load_error(only),
            RepositoryError::Conflict(what) if what == "product already exists"
        ));
    }
}

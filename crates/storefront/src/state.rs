//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::booking::BookingService;
use crate::services::cart::CartService;
use crate::services::catalog::CatalogService;
use crate::services::checkout::CheckoutService;
use crate::services::razorpay::{PaymentError, RazorpayClient};
use crate::services::token::TokenSigner;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Every service is built once here and handed
/// to handlers through axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    catalog: CatalogService,
    carts: CartService,
    checkout: CheckoutService,
    bookings: BookingService,
    tokens: TokenSigner,
    razorpay: Option<RazorpayClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` if the payment gateway client cannot be
    /// built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, PaymentError> {
        let razorpay = config
            .razorpay
            .as_ref()
            .map(RazorpayClient::new)
            .transpose()?;

        let catalog = CatalogService::new(pool.clone());
        let carts = CartService::new(pool.clone(), catalog.clone());
        let checkout = CheckoutService::new(
            pool.clone(),
            catalog.clone(),
            config.commerce,
            razorpay.clone(),
        );
        let bookings = BookingService::new(pool.clone(), config.commerce, razorpay.clone());
        let tokens = TokenSigner::new(&config.auth);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                catalog,
                carts,
                checkout,
                bookings,
                tokens,
                razorpay,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    #[must_use]
    pub fn carts(&self) -> &CartService {
        &self.inner.carts
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    #[must_use]
    pub fn bookings(&self) -> &BookingService {
        &self.inner.bookings
    }

    /// Signer for the `token` header.
    #[must_use]
    pub fn tokens(&self) -> &TokenSigner {
        &self.inner.tokens
    }

    /// Payment gateway client, when online payments are configured.
    #[must_use]
    pub fn razorpay(&self) -> Option<&RazorpayClient> {
        self.inner.razorpay.as_ref()
    }
}

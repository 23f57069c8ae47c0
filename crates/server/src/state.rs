//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::services::{
    AuthService, CartService, CatalogService, CheckoutService, OrderService, TokenService,
};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// configuration, the storage backend and the services built on it.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: Store,
    tokens: TokenService,
    auth: AuthService,
    carts: CartService,
    catalog: CatalogService,
    checkout: CheckoutService,
    orders: OrderService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `store` - Repositories for the selected backend
    #[must_use]
    pub fn new(config: ServerConfig, store: Store) -> Self {
        let tokens = TokenService::new(config.token_secret.clone(), config.token_ttl);
        let catalog = CatalogService::new(store.catalog.clone(), config.catalog_cache_ttl);
        let auth = AuthService::new(store.users.clone());
        let carts = CartService::new(store.carts.clone());
        let checkout = CheckoutService::new(
            store.orders.clone(),
            catalog.clone(),
            config.price_tolerance,
        );
        let orders = OrderService::new(
            store.orders.clone(),
            store.history.clone(),
            store.users.clone(),
            catalog.clone(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                tokens,
                auth,
                carts,
                catalog,
                checkout,
                orders,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    /// Bearer token issuer/verifier.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    #[must_use]
    pub fn carts(&self) -> &CartService {
        &self.inner.carts
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }
}

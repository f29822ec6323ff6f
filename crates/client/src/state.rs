//! Client state shared across commands.

use std::sync::Arc;

use tracing::info;

use crate::api::MarketClient;
use crate::cart::{CartOwner, CartStore};
use crate::catalog::CachedCatalog;
use crate::checkout::{CheckoutOrchestrator, ConfirmationReconciler};
use crate::config::ClientConfig;
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::favorites::FavoritesStore;
use crate::navigation::Navigator;
use crate::session::UserSession;
use crate::storage::{FileBackend, PersistedStore};

/// Everything a running client needs, built once at start-up.
///
/// This struct is cheaply cloneable via `Arc`; the cart and favorites inside
/// are the single shared instances every component works against.
#[derive(Clone)]
pub struct MarketContext {
    inner: Arc<MarketContextInner>,
}

struct MarketContextInner {
    config: ClientConfig,
    store: PersistedStore,
    client: MarketClient,
    catalog: CachedCatalog<MarketClient>,
    cart: CartStore,
    favorites: FavoritesStore,
}

impl MarketContext {
    /// Open the storage directory from `config` and load the stores.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directory cannot be created or the
    /// HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let backend = FileBackend::open(&config.storage_dir)?;
        Self::with_store(config, PersistedStore::new(backend))
    }

    /// Build the context on top of an existing store.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_store(config: ClientConfig, store: PersistedStore) -> Result<Self> {
        let client = MarketClient::new(&config.api)?;
        let catalog = CachedCatalog::new(client.clone(), config.catalog_ttl);

        let user = config.session.as_ref().map(|s| &s.user_id);
        match user {
            Some(user) => set_sentry_user(user),
            None => clear_sentry_user(),
        }

        let cart = CartStore::load(store.clone(), config.cart_scope, CartOwner::from_user(user));
        let favorites = FavoritesStore::new(store.clone(), user.cloned());

        info!(
            api = config.api.host(),
            signed_in = user.is_some(),
            cart_items = cart.count(),
            favorites = favorites.len(),
            "Client state loaded"
        );

        Ok(Self {
            inner: Arc::new(MarketContextInner {
                config,
                store,
                client,
                catalog,
                cart,
                favorites,
            }),
        })
    }

    /// Get a reference to the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Signed-in user, if any.
    #[must_use]
    pub fn session(&self) -> Option<&UserSession> {
        self.inner.config.session.as_ref()
    }

    /// Get a reference to the persisted store.
    #[must_use]
    pub fn store(&self) -> &PersistedStore {
        &self.inner.store
    }

    /// Get a reference to the REST client.
    #[must_use]
    pub fn client(&self) -> &MarketClient {
        &self.inner.client
    }

    /// Get a reference to the cached catalog.
    #[must_use]
    pub fn catalog(&self) -> &CachedCatalog<MarketClient> {
        &self.inner.catalog
    }

    /// Get a reference to the cart.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// Get a reference to the favorites.
    #[must_use]
    pub fn favorites(&self) -> &FavoritesStore {
        &self.inner.favorites
    }

    /// Checkout orchestrator presenting navigation through `navigator`.
    #[must_use]
    pub fn orchestrator<N: Navigator>(&self, navigator: N) -> CheckoutOrchestrator<MarketClient, N> {
        CheckoutOrchestrator::new(
            self.inner.client.clone(),
            navigator,
            self.inner.cart.clone(),
            self.inner.store.clone(),
            self.inner.config.section,
        )
    }

    /// Reconciler for one return from the payment provider.
    #[must_use]
    pub fn reconciler(&self) -> ConfirmationReconciler<MarketClient> {
        ConfirmationReconciler::new(
            self.inner.client.clone(),
            self.inner.cart.clone(),
            self.inner.store.clone(),
        )
        .with_session_param(self.inner.config.session_param.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use campus_market_core::{ItemId, ListingId, UserId};

    use super::*;
    use crate::checkout::CheckoutPhase;
    use crate::navigation::RecordingNavigator;

    fn config(vars: &[(&str, &str)]) -> ClientConfig {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        ClientConfig::from_lookup(|key| map.get(key).map(|v| (*v).to_string())).unwrap()
    }

    #[test]
    fn test_context_loads_signed_in_user_state() {
        let store = PersistedStore::in_memory();
        store.write("cart:u1", &HashMap::from([("a", 2)]));
        store.write("favorites:u1", &["l1"]);

        let context = MarketContext::with_store(
            config(&[
                ("MARKET_API_URL", "https://api.campus.test/"),
                ("MARKET_USER_ID", "u1"),
                ("MARKET_AUTH_TOKEN", "eyJhbGciOiJIUzI1NiJ9.e30.sig"),
            ]),
            store,
        )
        .unwrap();

        assert_eq!(context.cart().owner(), CartOwner::User(UserId::new("u1")));
        assert_eq!(context.cart().quantity(&ItemId::new("a")), 2);
        assert!(context.favorites().contains(&ListingId::new("l1")));
        assert_eq!(context.session().unwrap().user_id, UserId::new("u1"));

        let orchestrator = context.orchestrator(RecordingNavigator::new());
        assert_eq!(orchestrator.phase(), CheckoutPhase::Idle);
    }

    #[test]
    fn test_context_without_user_uses_anonymous_cart() {
        let context = MarketContext::with_store(
            config(&[("MARKET_API_URL", "https://api.campus.test/")]),
            PersistedStore::in_memory(),
        )
        .unwrap();

        assert_eq!(context.cart().owner(), CartOwner::Anonymous);
        assert_eq!(context.cart().storage_key(), "cart");
        assert_eq!(context.favorites().owner(), None);
        assert!(context.session().is_none());
    }
}

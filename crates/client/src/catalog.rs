//! Catalog lookups for prices and item names.
//!
//! The catalog itself belongs to the marketplace service. The client only
//! reads it to price the cart and to snapshot names and prices into an
//! order. Lookups degrade gracefully: an item that cannot be fetched has no
//! price and drops out of totals.

use std::collections::HashMap;
use std::time::Duration;

use moka::future::Cache;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use campus_market_core::ItemId;

use crate::api::LocalCatalogSource;
use crate::cart::PriceLookup;

/// Maximum number of individually fetched items kept in the cache.
const CACHE_CAPACITY: u64 = 1000;

/// A purchasable catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    #[serde(alias = "_id")]
    pub id: ItemId,
    pub name: String,
    pub price: Decimal,
    #[serde(default = "default_available")]
    pub available: bool,
}

const fn default_available() -> bool {
    true
}

/// Snapshot of catalog items keyed by ID.
///
/// Unavailable items are kept (so they can still be shown) but have no price.
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    items: HashMap<ItemId, CatalogItem>,
}

impl PriceBook {
    /// Build a price book from catalog items. Later duplicates win.
    #[must_use]
    pub fn new(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        Self {
            items: items.into_iter().map(|i| (i.id.clone(), i)).collect(),
        }
    }

    /// Look up an item by ID.
    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<&CatalogItem> {
        self.items.get(id)
    }

    /// Items that can currently be bought.
    pub fn available(&self) -> impl Iterator<Item = &CatalogItem> {
        self.items.values().filter(|i| i.available)
    }

    /// Number of items, available or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the price book is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl PriceLookup for PriceBook {
    fn price_of(&self, item: &ItemId) -> Option<Decimal> {
        self.items
            .get(item)
            .filter(|i| i.available)
            .map(|i| i.price)
    }
}

/// Catalog source with a short-lived cache for single-item lookups.
pub struct CachedCatalog<S> {
    source: S,
    cache: Cache<ItemId, Option<CatalogItem>>,
}

impl<S: LocalCatalogSource> CachedCatalog<S> {
    /// Wrap `source`, caching item lookups for `ttl`.
    #[must_use]
    pub fn new(source: S, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(ttl)
            .build();
        Self { source, cache }
    }

    /// Fetch the whole catalog.
    ///
    /// On failure the price book is empty, so every cart line is treated as
    /// unpriced rather than failing the caller.
    pub async fn price_book(&self) -> PriceBook {
        match self.source.list_catalog().await {
            Ok(items) => {
                for item in &items {
                    self.cache.insert(item.id.clone(), Some(item.clone())).await;
                }
                debug!(count = items.len(), "Catalog loaded");
                PriceBook::new(items)
            }
            Err(e) => {
                warn!(error = %e, "Failed to load catalog; prices unavailable");
                PriceBook::default()
            }
        }
    }

    /// Fetch a single item, served from cache when fresh.
    ///
    /// Missing items are cached too; fetch failures are not.
    pub async fn item(&self, id: &ItemId) -> Option<CatalogItem> {
        if let Some(cached) = self.cache.get(id).await {
            return cached;
        }

        match self.source.catalog_item(id).await {
            Ok(item) => {
                self.cache.insert(id.clone(), item.clone()).await;
                item
            }
            Err(e) => {
                warn!(%id, error = %e, "Failed to fetch catalog item");
                None
            }
        }
    }

    /// Price book holding only `ids`, fetched item by item.
    pub async fn price_book_for<'a>(&self, ids: impl IntoIterator<Item = &'a ItemId>) -> PriceBook {
        let mut items = Vec::new();
        for id in ids {
            if let Some(item) = self.item(id).await {
                items.push(item);
            }
        }
        PriceBook::new(items)
    }
}

//! Cart store.
//!
//! An in-memory map of item ID to quantity, written through to the persisted
//! store after every mutation so the cart survives reloads. Lines never sit
//! at quantity 0: driving a line to zero or below deletes it.
//!
//! The store is constructed once at start-up and cloned into whatever needs
//! it (the checkout orchestrator, the reconciler, the CLI). Clones share the
//! same state.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use tracing::{debug, warn};

use campus_market_core::{ItemId, UserId};

use crate::storage::{PersistedStore, keys};

/// Resolves the current unit price of a catalog item.
///
/// Returning `None` means the item cannot be priced (deleted from the
/// catalog, unavailable, or the lookup failed); such lines are left out of
/// totals.
pub trait PriceLookup {
    fn price_of(&self, item: &ItemId) -> Option<Decimal>;
}

impl<F> PriceLookup for F
where
    F: Fn(&ItemId) -> Option<Decimal>,
{
    fn price_of(&self, item: &ItemId) -> Option<Decimal> {
        self(item)
    }
}

/// Who the cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CartOwner {
    #[default]
    Anonymous,
    User(UserId),
}

impl CartOwner {
    /// Owner for an optional signed-in user.
    #[must_use]
    pub fn from_user(user: Option<&UserId>) -> Self {
        user.map_or(Self::Anonymous, |u| Self::User(u.clone()))
    }
}

/// How cart persistence is keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CartScope {
    /// One cart per signed-in user, plus one for anonymous visitors.
    #[default]
    PerUser,
    /// A single cart for everyone using this storage, whoever is signed in.
    Shared,
}

impl CartScope {
    /// Persisted key for `owner` under this scope.
    #[must_use]
    pub fn key_for(self, owner: &CartOwner) -> String {
        match (self, owner) {
            (Self::PerUser, CartOwner::User(user)) => keys::user_cart(user),
            _ => keys::CART.to_owned(),
        }
    }
}

/// Shared handle to the cart.
#[derive(Debug, Clone)]
pub struct CartStore {
    inner: Arc<CartInner>,
}

#[derive(Debug)]
struct CartInner {
    store: PersistedStore,
    scope: CartScope,
    state: Mutex<CartState>,
}

#[derive(Debug)]
struct CartState {
    owner: CartOwner,
    lines: BTreeMap<ItemId, u32>,
}

impl CartStore {
    /// Load the cart for `owner`, rehydrating it from `store`.
    ///
    /// Starts empty when nothing (or nothing readable) is stored.
    #[must_use]
    pub fn load(store: PersistedStore, scope: CartScope, owner: CartOwner) -> Self {
        let lines = rehydrate(&store, &scope.key_for(&owner));
        Self {
            inner: Arc::new(CartInner {
                store,
                scope,
                state: Mutex::new(CartState { owner, lines }),
            }),
        }
    }

    /// Add one unit of `item`, creating the line at quantity 1 if absent.
    pub fn add(&self, item: &ItemId) {
        self.mutate(|lines| {
            let quantity = lines.entry(item.clone()).or_insert(0);
            *quantity = quantity.saturating_add(1);
        });
    }

    /// Remove one unit of `item`; the line is deleted when it reaches 0.
    pub fn remove(&self, item: &ItemId) {
        self.mutate(|lines| {
            if let Some(quantity) = lines.get_mut(item) {
                *quantity = quantity.saturating_sub(1);
                if *quantity == 0 {
                    lines.remove(item);
                }
            }
        });
    }

    /// Set the quantity of `item` directly; `n <= 0` deletes the line.
    ///
    /// Quantities above `u32::MAX` are clamped to `u32::MAX`.
    pub fn set_quantity(&self, item: &ItemId, n: i64) {
        self.mutate(|lines| {
            if n <= 0 {
                lines.remove(item);
            } else {
                let quantity = u32::try_from(n).unwrap_or_else(|_| {
                    debug!(%item, requested = n, "Clamped cart quantity");
                    u32::MAX
                });
                lines.insert(item.clone(), quantity);
            }
        });
    }

    /// Empty the cart.
    ///
    /// Only called once an order has been confirmed.
    pub fn clear(&self) {
        self.mutate(BTreeMap::clear);
    }

    /// Delete the persisted copy of the cart without touching memory.
    pub fn discard_persisted(&self) {
        let key = self.storage_key();
        self.inner.store.remove(&key);
    }

    /// Sum of `quantity × price` over every line `lookup` can price.
    ///
    /// A line whose amount would overflow the running total is treated like
    /// an unpriced line and contributes nothing.
    #[must_use]
    pub fn total(&self, lookup: &impl PriceLookup) -> Decimal {
        let state = self.state();
        state
            .lines
            .iter()
            .fold(Decimal::ZERO, |total, (item, quantity)| {
                let Some(price) = lookup.price_of(item) else {
                    return total;
                };
                match price
                    .checked_mul(Decimal::from(*quantity))
                    .and_then(|amount| total.checked_add(amount))
                {
                    Some(next) => next,
                    None => {
                        warn!(%item, quantity, %price, "Cart line overflows the total, skipping");
                        total
                    }
                }
            })
    }

    /// Sum of all quantities (badge count).
    #[must_use]
    pub fn count(&self) -> u32 {
        self.state()
            .lines
            .values()
            .fold(0, |acc, q| acc.saturating_add(*q))
    }

    /// Quantity of `item`, 0 when absent.
    #[must_use]
    pub fn quantity(&self, item: &ItemId) -> u32 {
        self.state().lines.get(item).copied().unwrap_or(0)
    }

    /// Snapshot of the cart lines.
    #[must_use]
    pub fn lines(&self) -> BTreeMap<ItemId, u32> {
        self.state().lines.clone()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state().lines.is_empty()
    }

    /// Current owner.
    #[must_use]
    pub fn owner(&self) -> CartOwner {
        self.state().owner.clone()
    }

    /// Persisted key for the current owner.
    #[must_use]
    pub fn storage_key(&self) -> String {
        self.inner.scope.key_for(&self.state().owner)
    }

    /// Switch to another owner's cart, rehydrating it from storage.
    ///
    /// The previous owner's cart stays persisted under its own key.
    pub fn switch_owner(&self, owner: CartOwner) {
        let lines = rehydrate(&self.inner.store, &self.inner.scope.key_for(&owner));
        let mut state = self.state();
        debug!(?owner, lines = lines.len(), "Switched cart owner");
        state.owner = owner;
        state.lines = lines;
    }

    fn state(&self) -> MutexGuard<'_, CartState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to the lines and write the result through.
    fn mutate(&self, f: impl FnOnce(&mut BTreeMap<ItemId, u32>)) {
        let mut state = self.state();
        f(&mut state.lines);
        let key = self.inner.scope.key_for(&state.owner);
        self.inner.store.write(&key, &state.lines);
        debug!(key, lines = state.lines.len(), "Cart updated");
    }
}

/// Read persisted lines, dropping any stored at quantity 0.
fn rehydrate(store: &PersistedStore, key: &str) -> BTreeMap<ItemId, u32> {
    let mut lines: BTreeMap<ItemId, u32> = store.read(key).unwrap_or_default();
    lines.retain(|_, quantity| *quantity > 0);
    lines
}

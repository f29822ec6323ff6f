//! Favorites store.
//!
//! A per-user set of saved listing IDs, persisted under a key namespaced by
//! the user's ID. Follows the same write-through pattern as the cart but owns
//! a disjoint key. Favorites never expire on their own.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, warn};

use campus_market_core::{ListingId, UserId};

use crate::storage::{PersistedStore, keys};

/// Errors returned by favorites operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FavoritesError {
    /// Favorites need a signed-in user to be keyed by.
    #[error("no signed-in user")]
    NotSignedIn,
}

impl FavoritesError {
    /// Message suitable for showing to the user.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::NotSignedIn => "Please sign in to save favorites.",
        }
    }
}

/// Shared handle to the current user's favorites.
#[derive(Debug, Clone)]
pub struct FavoritesStore {
    inner: Arc<FavoritesInner>,
}

#[derive(Debug)]
struct FavoritesInner {
    store: PersistedStore,
    state: Mutex<FavoritesState>,
}

#[derive(Debug, Default)]
struct FavoritesState {
    owner: Option<UserId>,
    ids: BTreeSet<ListingId>,
}

impl FavoritesStore {
    /// Create a store and load favorites for `owner`.
    #[must_use]
    pub fn new(store: PersistedStore, owner: Option<UserId>) -> Self {
        let favorites = Self {
            inner: Arc::new(FavoritesInner {
                store,
                state: Mutex::default(),
            }),
        };
        favorites.load(owner);
        favorites
    }

    /// Reload favorites after the signed-in user changed.
    ///
    /// With no user the set is empty.
    pub fn load(&self, owner: Option<UserId>) {
        let ids = owner
            .as_ref()
            .and_then(|user| self.inner.store.read::<BTreeSet<ListingId>>(&keys::favorites(user)))
            .unwrap_or_default();
        let mut state = self.state();
        debug!(?owner, count = ids.len(), "Loaded favorites");
        state.owner = owner;
        state.ids = ids;
    }

    /// Add `listing` if absent, remove it if present.
    ///
    /// Returns whether the listing is a favorite afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`FavoritesError::NotSignedIn`] when no user is loaded; the
    /// persisted favorites are left unchanged.
    pub fn toggle(&self, listing: &ListingId) -> Result<bool, FavoritesError> {
        let mut state = self.state();
        let Some(owner) = state.owner.clone() else {
            warn!(%listing, "Favorite toggled without a signed-in user");
            return Err(FavoritesError::NotSignedIn);
        };

        let now_favorite = if state.ids.remove(listing) {
            false
        } else {
            state.ids.insert(listing.clone());
            true
        };

        self.inner
            .store
            .write(&keys::favorites(&owner), &state.ids);
        Ok(now_favorite)
    }

    /// Whether `listing` is a favorite.
    #[must_use]
    pub fn contains(&self, listing: &ListingId) -> bool {
        self.state().ids.contains(listing)
    }

    /// Snapshot of all favorite listing IDs.
    #[must_use]
    pub fn ids(&self) -> BTreeSet<ListingId> {
        self.state().ids.clone()
    }

    /// Number of favorites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().ids.len()
    }

    /// Whether there are no favorites.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state().ids.is_empty()
    }

    /// User the favorites belong to.
    #[must_use]
    pub fn owner(&self) -> Option<UserId> {
        self.state().owner.clone()
    }

    fn state(&self) -> MutexGuard<'_, FavoritesState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

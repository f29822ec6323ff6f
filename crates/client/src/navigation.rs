//! Navigation seam between checkout and whatever presents it.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use url::Url;

/// Where the buyer can be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// The buyer's order history.
    OrderList,
    /// Back to browsing listings.
    ContinueShopping,
    /// A page outside the application, such as the payment provider.
    External(Url),
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrderList => f.write_str("orders"),
            Self::ContinueShopping => f.write_str("shop"),
            Self::External(url) => write!(f, "{url}"),
        }
    }
}

/// Performs navigation on behalf of checkout.
///
/// Navigating to [`View::External`] hands control to another site; the
/// caller must assume it will not get control back.
pub trait Navigator: Send + Sync {
    fn navigate(&self, view: View);
}

impl<N: Navigator + ?Sized> Navigator for &N {
    fn navigate(&self, view: View) {
        (**self).navigate(view);
    }
}

impl<N: Navigator + ?Sized> Navigator for Arc<N> {
    fn navigate(&self, view: View) {
        (**self).navigate(view);
    }
}

/// Navigator that only remembers where it was sent.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<View>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every view navigated to, oldest first.
    #[must_use]
    pub fn visited(&self) -> Vec<View> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent view, if any.
    #[must_use]
    pub fn last(&self) -> Option<View> {
        self.visited().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, view: View) {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(view);
    }
}

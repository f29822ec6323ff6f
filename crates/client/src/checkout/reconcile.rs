//! Reconciling the buyer's return from the payment provider.
//!
//! The provider has taken payment (or not); the order may or may not exist.
//! Confirmation tries the authoritative path first and, if that fails,
//! creates the order directly with the same idempotency key so the backend
//! can collapse any duplicate. Only when both fail is the buyer told to
//! check their orders, and the pending payload is kept for a manual retry.

use thiserror::Error;
use tracing::{info, instrument, warn};
use url::Url;

use campus_market_core::{Order, PaymentSessionId, PendingOrderPayload};

use crate::api::LocalOrderGateway;
use crate::cart::CartStore;
use crate::error::add_breadcrumb;
use crate::navigation::View;
use crate::session::UserSession;
use crate::storage::{PersistedStore, keys};

/// Shown when neither confirmation path produced an order.
const UNRESOLVED_MESSAGE: &str = "We could not confirm your order. If you were charged, check your \
     orders in a few minutes or contact support with your payment reference.";

/// Which request produced the confirmed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationPath {
    /// The provider session was confirmed.
    Primary,
    /// The order was created directly after confirmation failed.
    Fallback,
}

/// Preconditions that stop reconciliation before any request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileFailure {
    #[error("no signed-in user")]
    NotAuthenticated,

    #[error("return URL has no `{param}` query parameter")]
    MissingSessionReference { param: String },
}

impl ReconcileFailure {
    /// Message suitable for showing to the user.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "Please sign in to confirm your payment.",
            Self::MissingSessionReference { .. } => {
                "This page is missing the payment reference. Check your orders to see whether \
                 your payment went through."
            }
        }
    }
}

/// How the return was reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum ReconcileOutcome {
    /// The order exists. The cart and pending payload were cleared; the
    /// buyer picks where to go next from `choices`.
    Confirmed {
        order: Order,
        via: ConfirmationPath,
        choices: Vec<View>,
    },
    /// Both paths failed. Local state is untouched.
    Unresolved { message: String },
    /// Reconciliation could not start.
    Rejected(ReconcileFailure),
}

/// Runs once on the payment return page.
///
/// Consumed by [`Self::run`], so a page load cannot reconcile twice.
pub struct ConfirmationReconciler<G> {
    gateway: G,
    cart: CartStore,
    store: PersistedStore,
    session_param: String,
}

impl<G: LocalOrderGateway> ConfirmationReconciler<G> {
    /// Create a reconciler reading the session reference from `session_id`.
    #[must_use]
    pub fn new(gateway: G, cart: CartStore, store: PersistedStore) -> Self {
        Self {
            gateway,
            cart,
            store,
            session_param: crate::config::ClientConfig::DEFAULT_SESSION_PARAM.to_string(),
        }
    }

    /// Read the session reference from a different query parameter.
    #[must_use]
    pub fn with_session_param(mut self, param: impl Into<String>) -> Self {
        self.session_param = param.into();
        self
    }

    /// Reconcile the return at `return_url`.
    #[instrument(skip_all, fields(path = return_url.path()))]
    pub async fn run(self, session: Option<&UserSession>, return_url: &Url) -> ReconcileOutcome {
        let Some(session) = session else {
            warn!("Payment return reached without a signed-in user");
            return ReconcileOutcome::Rejected(ReconcileFailure::NotAuthenticated);
        };

        let Some(session_ref) = self.session_reference(return_url) else {
            warn!(param = %self.session_param, "Payment return has no session reference");
            return ReconcileOutcome::Rejected(ReconcileFailure::MissingSessionReference {
                param: self.session_param,
            });
        };

        let payload = self.pending_payload();

        let primary = self
            .gateway
            .confirm_payment(session, &session_ref, &payload)
            .await;
        let primary_error = match primary {
            Ok(order) => return self.confirmed(order, ConfirmationPath::Primary),
            Err(e) => e,
        };

        warn!(
            session_ref = %session_ref,
            error = %primary_error,
            "Payment confirmation failed, creating order directly"
        );
        add_breadcrumb(
            "checkout",
            "Payment confirmation fell back to direct order",
            Some(&[("session", session_ref.as_str())]),
        );

        let fallback = self.gateway.place_order(session, &payload).await;
        match fallback {
            Ok(order) => self.confirmed(order, ConfirmationPath::Fallback),
            Err(fallback_error) => {
                let event_id = sentry::capture_message(
                    "Payment return could not be reconciled",
                    sentry::Level::Error,
                );
                tracing::error!(
                    session_ref = %session_ref,
                    key = %payload.idempotency_key,
                    primary = %primary_error,
                    fallback = %fallback_error,
                    sentry_event_id = %event_id,
                    "Payment return unresolved; pending order kept"
                );
                ReconcileOutcome::Unresolved {
                    message: UNRESOLVED_MESSAGE.to_string(),
                }
            }
        }
    }

    fn session_reference(&self, return_url: &Url) -> Option<PaymentSessionId> {
        return_url
            .query_pairs()
            .find(|(name, _)| **name == *self.session_param)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PaymentSessionId::new)
    }

    /// The payload saved before the redirect, or an empty one if it is gone.
    fn pending_payload(&self) -> PendingOrderPayload {
        self.store
            .read(keys::PENDING_ORDER_PAYLOAD)
            .unwrap_or_else(|| {
                warn!("No pending order payload stored; confirming with defaults");
                PendingOrderPayload::default()
            })
    }

    fn confirmed(self, order: Order, via: ConfirmationPath) -> ReconcileOutcome {
        info!(order = %order.id, ?via, "Payment return reconciled");
        self.cart.clear();
        self.store.remove(keys::PENDING_ORDER_PAYLOAD);
        ReconcileOutcome::Confirmed {
            order,
            via,
            choices: vec![View::OrderList, View::ContinueShopping],
        }
    }
}

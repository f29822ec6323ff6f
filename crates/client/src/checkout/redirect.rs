//! Online payment: hand the buyer to the provider's hosted checkout.

use tracing::{info, warn};

use campus_market_core::PendingOrderPayload;

use super::{CheckoutFailure, CheckoutOrchestrator, CheckoutOutcome, CheckoutPhase, InFlight};
use crate::api::LocalOrderGateway;
use crate::error::add_breadcrumb;
use crate::navigation::{Navigator, View};
use crate::session::UserSession;
use crate::storage::keys;

impl<G, N> CheckoutOrchestrator<G, N>
where
    G: LocalOrderGateway,
    N: Navigator,
{
    /// Create a payment session, persist the payload and navigate away.
    ///
    /// The payload is written before navigating so the return page can
    /// rebuild the order. The cart is left alone; it is only cleared once
    /// the return is reconciled.
    pub(super) async fn submit_redirect(
        &self,
        guard: &InFlight<'_>,
        session: &UserSession,
        payload: &PendingOrderPayload,
    ) -> Result<CheckoutOutcome, CheckoutFailure> {
        guard.advance(CheckoutPhase::AwaitingRedirect);

        let payment = self.gateway.create_payment_session(session, payload).await?;
        let Some(url) = payment.url else {
            return Err(CheckoutFailure::MissingRedirect);
        };

        if !self.store.write(keys::PENDING_ORDER_PAYLOAD, payload) {
            warn!(
                key = %payload.idempotency_key,
                "Pending order not persisted; confirmation will fall back to defaults"
            );
        }

        add_breadcrumb(
            "checkout",
            "Payment session created",
            Some(&[
                ("key", payload.idempotency_key.as_str()),
                (
                    "session",
                    payment.id.as_ref().map_or("", |id| id.as_str()),
                ),
            ]),
        );
        info!(host = url.host_str().unwrap_or(""), "Redirecting to payment provider");

        self.navigator.navigate(View::External(url.clone()));
        Ok(CheckoutOutcome::Redirected { url })
    }
}

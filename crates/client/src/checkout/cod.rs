//! Pay-on-delivery: one request places the order.

use tracing::info;

use campus_market_core::PendingOrderPayload;

use super::{CheckoutFailure, CheckoutOrchestrator, CheckoutOutcome, CheckoutPhase, InFlight};
use crate::api::LocalOrderGateway;
use crate::navigation::{Navigator, View};
use crate::session::UserSession;

impl<G, N> CheckoutOrchestrator<G, N>
where
    G: LocalOrderGateway,
    N: Navigator,
{
    /// Place the order directly.
    ///
    /// On success the cart is emptied (memory and storage) and the buyer is
    /// sent to their orders. On failure nothing local changes, so the buyer
    /// can retry without re-adding items.
    pub(super) async fn submit_cod(
        &self,
        guard: &InFlight<'_>,
        session: &UserSession,
        payload: &PendingOrderPayload,
    ) -> Result<CheckoutOutcome, CheckoutFailure> {
        guard.advance(CheckoutPhase::SubmittingCod);

        let order = self.gateway.place_order(session, payload).await?;
        info!(order = %order.id, items = payload.item_count(), "Pay-on-delivery order placed");

        self.cart.clear();
        self.cart.discard_persisted();
        self.navigator.navigate(View::OrderList);

        Ok(CheckoutOutcome::Placed(order))
    }
}

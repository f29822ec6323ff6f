//! Checkout orchestration.
//!
//! One [`CheckoutOrchestrator`] exists per running client. Each call to
//! [`CheckoutOrchestrator::checkout`] is one attempt and walks
//!
//! ```text
//! Idle -> Validating -> SubmittingCod    -> Succeeded | Failed
//!                    -> AwaitingRedirect -> HandedOff | Failed
//! ```
//!
//! Only one attempt may be in flight at a time. A second attempt started
//! while the first is validating or submitting fails immediately with
//! [`CheckoutFailure::AlreadyInProgress`]. The in-flight marker is released on
//! every exit path, including a panic or an abandoned future.
//!
//! Payment is dispatched by method:
//!
//! - pay on delivery: the order is placed directly (see `cod`)
//! - online: a provider session is created, the payload is persisted and the
//!   buyer is sent to the provider (see `redirect`); the buyer's return is
//!   handled by [`ConfirmationReconciler`]
//!
//! The cart is only ever cleared once an order is confirmed.

mod cod;
mod reconcile;
mod redirect;

pub use reconcile::{ConfirmationPath, ConfirmationReconciler, ReconcileFailure, ReconcileOutcome};

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, instrument, warn};
use url::Url;

use campus_market_core::{
    AddressError, DeliveryAddress, IdempotencyKey, LineItem, Order, PaymentMethod,
    PendingOrderPayload, Section, TotalMismatch,
};

use crate::api::{ApiError, LocalOrderGateway};
use crate::cart::CartStore;
use crate::catalog::PriceBook;
use crate::error::add_breadcrumb;
use crate::navigation::Navigator;
use crate::session::UserSession;
use crate::storage::{PersistedStore, keys};

/// Where the current checkout attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutPhase {
    /// No attempt has run yet, or the last one was abandoned.
    #[default]
    Idle,
    Validating,
    SubmittingCod,
    AwaitingRedirect,
    /// The order was placed.
    Succeeded,
    /// The buyer was sent to the payment provider.
    HandedOff,
    Failed,
}

impl CheckoutPhase {
    /// Whether an attempt holds the single-flight slot in this phase.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(
            self,
            Self::Validating | Self::SubmittingCod | Self::AwaitingRedirect
        )
    }
}

/// Why a checkout attempt did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutFailure {
    #[error("a checkout is already in progress")]
    AlreadyInProgress,

    #[error("no signed-in user")]
    NotAuthenticated,

    #[error("cart is empty")]
    EmptyCart,

    #[error("order total must be greater than zero")]
    InvalidTotal,

    #[error("delivery address is missing")]
    MissingAddress,

    #[error("delivery address is longer than {max} characters")]
    AddressTooLong { max: usize },

    #[error(transparent)]
    TotalMismatch(#[from] TotalMismatch),

    /// No response from the service.
    #[error("service unreachable")]
    Unreachable,

    /// The service answered and refused; carries its message verbatim.
    #[error("rejected: {}", .0.as_deref().unwrap_or("(no message)"))]
    Rejected(Option<String>),

    /// A payment session was created without a page to send the buyer to.
    #[error("payment session has no redirect URL")]
    MissingRedirect,
}

impl CheckoutFailure {
    /// Message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::AlreadyInProgress => "Your order is already being placed. Please wait.".to_string(),
            Self::NotAuthenticated => "Please sign in to check out.".to_string(),
            Self::EmptyCart => "Your cart is empty.".to_string(),
            Self::InvalidTotal => {
                "Your cart total must be greater than zero. Some items may no longer be available."
                    .to_string()
            }
            Self::MissingAddress => "Please enter a delivery address.".to_string(),
            Self::AddressTooLong { max } => {
                format!("Delivery address must be at most {max} characters.")
            }
            Self::TotalMismatch(_) => {
                "Your cart changed while checking out. Please review it and try again.".to_string()
            }
            Self::Unreachable => {
                "Could not reach the marketplace. Check your connection and try again.".to_string()
            }
            Self::Rejected(Some(message)) => message.clone(),
            Self::Rejected(None) => "Your order could not be placed. Please try again.".to_string(),
            Self::MissingRedirect => {
                "The payment page could not be opened. Please try again.".to_string()
            }
        }
    }

    /// Whether the attempt was stopped before any network call.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated
                | Self::EmptyCart
                | Self::InvalidTotal
                | Self::MissingAddress
                | Self::AddressTooLong { .. }
                | Self::TotalMismatch(_)
        )
    }
}

impl From<AddressError> for CheckoutFailure {
    fn from(err: AddressError) -> Self {
        match err {
            AddressError::Empty => Self::MissingAddress,
            AddressError::TooLong { max } => Self::AddressTooLong { max },
        }
    }
}

impl From<ApiError> for CheckoutFailure {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unreachable(_) => Self::Unreachable,
            ApiError::Rejected { message, .. } => Self::Rejected(message),
            ApiError::Malformed(_) => Self::Rejected(None),
        }
    }
}

/// Result of one checkout attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum CheckoutOutcome {
    /// Pay on delivery: the order exists and the cart was cleared.
    Placed(Order),
    /// Online: the buyer was sent to the provider. The cart is untouched
    /// until the return is reconciled.
    Redirected { url: Url },
    Failed(CheckoutFailure),
}

impl CheckoutOutcome {
    /// The failure, if the attempt failed.
    #[must_use]
    pub const fn failure(&self) -> Option<&CheckoutFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    const fn terminal_phase(&self) -> CheckoutPhase {
        match self {
            Self::Placed(_) => CheckoutPhase::Succeeded,
            Self::Redirected { .. } => CheckoutPhase::HandedOff,
            Self::Failed(_) => CheckoutPhase::Failed,
        }
    }
}

/// What the buyer asked for at the checkout form.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutRequest<'a> {
    pub method: PaymentMethod,
    pub delivery_address: &'a str,
    /// Prices and names snapshotted into the order.
    pub catalog: &'a PriceBook,
}

/// Drives checkout attempts for one client.
pub struct CheckoutOrchestrator<G, N> {
    gateway: G,
    navigator: N,
    cart: CartStore,
    store: PersistedStore,
    section: Section,
    phase: Mutex<CheckoutPhase>,
}

impl<G, N> CheckoutOrchestrator<G, N>
where
    G: LocalOrderGateway,
    N: Navigator,
{
    #[must_use]
    pub fn new(
        gateway: G,
        navigator: N,
        cart: CartStore,
        store: PersistedStore,
        section: Section,
    ) -> Self {
        Self {
            gateway,
            navigator,
            cart,
            store,
            section,
            phase: Mutex::new(CheckoutPhase::Idle),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> CheckoutPhase {
        *lock(&self.phase)
    }

    /// Section orders are placed in.
    #[must_use]
    pub const fn section(&self) -> Section {
        self.section
    }

    /// Address used for the last checkout in this section.
    #[must_use]
    pub fn saved_delivery_address(&self) -> Option<String> {
        saved_delivery_address(&self.store, self.section)
    }

    /// Run one checkout attempt.
    ///
    /// Never returns an error: every failure is reported as
    /// [`CheckoutOutcome::Failed`] with a user-presentable reason.
    #[instrument(skip_all, fields(method = %request.method, section = %self.section))]
    pub async fn checkout(
        &self,
        session: Option<&UserSession>,
        request: CheckoutRequest<'_>,
    ) -> CheckoutOutcome {
        let Some(guard) = InFlight::begin(&self.phase) else {
            warn!("Checkout rejected, another attempt is in flight");
            return CheckoutOutcome::Failed(CheckoutFailure::AlreadyInProgress);
        };

        let outcome = self
            .attempt(&guard, session, request)
            .await
            .unwrap_or_else(CheckoutOutcome::Failed);

        match &outcome {
            CheckoutOutcome::Failed(failure) => {
                warn!(reason = %failure, "Checkout failed");
            }
            CheckoutOutcome::Placed(order) => info!(order = %order.id, "Checkout completed"),
            CheckoutOutcome::Redirected { url } => {
                info!(host = url.host_str().unwrap_or(""), "Checkout handed off to payment provider");
            }
        }

        guard.finish(outcome.terminal_phase());
        outcome
    }

    async fn attempt(
        &self,
        guard: &InFlight<'_>,
        session: Option<&UserSession>,
        request: CheckoutRequest<'_>,
    ) -> Result<CheckoutOutcome, CheckoutFailure> {
        let session = session.ok_or(CheckoutFailure::NotAuthenticated)?;
        let payload = self.prepare(session, &request)?;

        // A new attempt supersedes whatever an earlier redirect left behind.
        self.store.remove(keys::PENDING_ORDER_PAYLOAD);
        self.store.write(
            &keys::delivery_address(self.section),
            &payload.delivery_address,
        );

        add_breadcrumb(
            "checkout",
            "Checkout started",
            Some(&[
                ("method", payload.payment_method.as_str()),
                ("key", payload.idempotency_key.as_str()),
            ]),
        );

        match payload.payment_method {
            PaymentMethod::Cod => self.submit_cod(guard, session, &payload).await,
            PaymentMethod::Online => self.submit_redirect(guard, session, &payload).await,
        }
    }

    /// Validate the cart and build the payload for this attempt.
    fn prepare(
        &self,
        session: &UserSession,
        request: &CheckoutRequest<'_>,
    ) -> Result<PendingOrderPayload, CheckoutFailure> {
        if self.cart.is_empty() {
            return Err(CheckoutFailure::EmptyCart);
        }

        let total_amount = self.cart.total(request.catalog);
        if total_amount <= Decimal::ZERO {
            return Err(CheckoutFailure::InvalidTotal);
        }

        let address = DeliveryAddress::parse(request.delivery_address)?;

        let line_items = self
            .cart
            .lines()
            .into_iter()
            .filter_map(|(id, quantity)| {
                let item = request.catalog.get(&id).filter(|item| item.available)?;
                Some(LineItem {
                    catalog_item_id: id,
                    name: item.name.clone(),
                    quantity,
                    unit_price: item.price,
                })
            })
            .collect();

        let now = Utc::now();
        let payload = PendingOrderPayload {
            line_items,
            total_amount,
            delivery_address: address.into_inner(),
            payment_method: request.method,
            section: self.section,
            idempotency_key: IdempotencyKey::generate(&session.user_id, now),
            created_at: Some(now),
        };
        payload.check_total()?;
        Ok(payload)
    }
}

/// Last delivery address saved for `section`.
#[must_use]
pub fn saved_delivery_address(store: &PersistedStore, section: Section) -> Option<String> {
    store.read(&keys::delivery_address(section))
}

/// Holds the single-flight slot for one attempt.
///
/// Dropping the guard without calling [`InFlight::finish`] (panic, abandoned
/// future) puts the orchestrator back to `Idle`.
struct InFlight<'a> {
    phase: &'a Mutex<CheckoutPhase>,
}

impl<'a> InFlight<'a> {
    fn begin(phase: &'a Mutex<CheckoutPhase>) -> Option<Self> {
        let mut current = lock(phase);
        if current.is_in_flight() {
            return None;
        }
        *current = CheckoutPhase::Validating;
        Some(Self { phase })
    }

    fn advance(&self, next: CheckoutPhase) {
        *lock(self.phase) = next;
    }

    fn finish(self, terminal: CheckoutPhase) {
        debug_assert!(!terminal.is_in_flight());
        self.advance(terminal);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut current = lock(self.phase);
        if current.is_in_flight() {
            *current = CheckoutPhase::Idle;
        }
    }
}

fn lock(phase: &Mutex<CheckoutPhase>) -> MutexGuard<'_, CheckoutPhase> {
    phase.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use secrecy::SecretString;

    use campus_market_core::{ItemId, OrderId, PaymentSessionId, UserId};

    use super::*;
    use crate::api::{OrderGateway, PaymentSession};
    use crate::cart::{CartOwner, CartScope};
    use crate::catalog::CatalogItem;
    use crate::navigation::{RecordingNavigator, View};

    /// Gateway answering every call with one scripted result.
    pub(crate) struct StubGateway {
        pub place: Result<Order, ApiError>,
        pub session: Result<PaymentSession, ApiError>,
        pub confirm: Result<Order, ApiError>,
        pub calls: AtomicUsize,
    }

    impl StubGateway {
        pub(crate) fn accepting() -> Self {
            Self {
                place: Ok(order("o1")),
                session: Ok(PaymentSession {
                    id: Some(PaymentSessionId::new("cs_1")),
                    url: Some(Url::parse("https://pay.test/c/cs_1").unwrap()),
                }),
                confirm: Ok(order("o2")),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn record(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl OrderGateway for StubGateway {
        async fn place_order(
            &self,
            _session: &UserSession,
            _payload: &PendingOrderPayload,
        ) -> Result<Order, ApiError> {
            self.record();
            self.place.clone()
        }

        async fn create_payment_session(
            &self,
            _session: &UserSession,
            _payload: &PendingOrderPayload,
        ) -> Result<PaymentSession, ApiError> {
            self.record();
            self.session.clone()
        }

        async fn confirm_payment(
            &self,
            _session: &UserSession,
            _session_ref: &PaymentSessionId,
            _payload: &PendingOrderPayload,
        ) -> Result<Order, ApiError> {
            self.record();
            self.confirm.clone()
        }
    }

    pub(crate) fn order(id: &str) -> Order {
        Order {
            id: OrderId::new(id),
            status: campus_market_core::OrderStatus::Placed,
            total_amount: None,
            created_at: None,
        }
    }

    pub(crate) fn session() -> UserSession {
        UserSession::new(UserId::new("u1"), SecretString::from("tok"))
    }

    fn price_book() -> PriceBook {
        PriceBook::new([
            CatalogItem {
                id: ItemId::new("a"),
                name: "Rice bowl".to_string(),
                price: Decimal::from(100),
                available: true,
            },
            CatalogItem {
                id: ItemId::new("b"),
                name: "Notes".to_string(),
                price: Decimal::from(250),
                available: true,
            },
        ])
    }

    fn setup(
        gateway: StubGateway,
    ) -> (
        CheckoutOrchestrator<StubGateway, RecordingNavigator>,
        CartStore,
        PersistedStore,
    ) {
        let store = PersistedStore::in_memory();
        let cart = CartStore::load(
            store.clone(),
            CartScope::PerUser,
            CartOwner::User(UserId::new("u1")),
        );
        let orchestrator = CheckoutOrchestrator::new(
            gateway,
            RecordingNavigator::new(),
            cart.clone(),
            store.clone(),
            Section::Food,
        );
        (orchestrator, cart, store)
    }

    fn request<'a>(method: PaymentMethod, address: &'a str, book: &'a PriceBook) -> CheckoutRequest<'a> {
        CheckoutRequest {
            method,
            delivery_address: address,
            catalog: book,
        }
    }

    #[tokio::test]
    async fn test_cod_checkout_places_order_and_clears_cart() {
        let (orchestrator, cart, store) = setup(StubGateway::accepting());
        let book = price_book();
        cart.add(&ItemId::new("a"));
        cart.add(&ItemId::new("a"));
        cart.add(&ItemId::new("b"));

        let outcome = orchestrator
            .checkout(Some(&session()), request(PaymentMethod::Cod, " Room 12 ", &book))
            .await;

        assert_eq!(outcome, CheckoutOutcome::Placed(order("o1")));
        assert!(cart.is_empty());
        assert!(store.read::<serde_json::Value>("cart:u1").is_none());
        assert_eq!(orchestrator.navigator.last(), Some(View::OrderList));
        assert_eq!(orchestrator.phase(), CheckoutPhase::Succeeded);
        assert_eq!(orchestrator.saved_delivery_address().as_deref(), Some("Room 12"));
    }

    #[tokio::test]
    async fn test_validation_failures_make_no_network_call() {
        let (orchestrator, cart, _store) = setup(StubGateway::accepting());
        let book = price_book();

        let outcome = orchestrator
            .checkout(Some(&session()), request(PaymentMethod::Cod, "Room 12", &book))
            .await;
        assert_eq!(outcome.failure(), Some(&CheckoutFailure::EmptyCart));

        cart.add(&ItemId::new("deleted"));
        let outcome = orchestrator
            .checkout(Some(&session()), request(PaymentMethod::Cod, "Room 12", &book))
            .await;
        assert_eq!(outcome.failure(), Some(&CheckoutFailure::InvalidTotal));

        cart.add(&ItemId::new("a"));
        let outcome = orchestrator
            .checkout(Some(&session()), request(PaymentMethod::Cod, "   ", &book))
            .await;
        assert_eq!(outcome.failure(), Some(&CheckoutFailure::MissingAddress));

        let outcome = orchestrator
            .checkout(None, request(PaymentMethod::Cod, "Room 12", &book))
            .await;
        assert_eq!(outcome.failure(), Some(&CheckoutFailure::NotAuthenticated));

        assert_eq!(orchestrator.gateway.calls(), 0);
        assert_eq!(orchestrator.phase(), CheckoutPhase::Failed);
        assert!(outcome.failure().unwrap().is_validation());
    }

    #[tokio::test]
    async fn test_unpriced_lines_are_left_out_of_payload() {
        let (orchestrator, cart, store) = setup(StubGateway::accepting());
        let book = price_book();
        cart.add(&ItemId::new("a"));
        cart.add(&ItemId::new("deleted"));

        let outcome = orchestrator
            .checkout(Some(&session()), request(PaymentMethod::Online, "Room 12", &book))
            .await;
        assert!(matches!(outcome, CheckoutOutcome::Redirected { .. }));

        let pending: PendingOrderPayload = store.read(keys::PENDING_ORDER_PAYLOAD).unwrap();
        assert_eq!(pending.line_items.len(), 1);
        assert_eq!(pending.total_amount, Decimal::from(100));
        assert_eq!(pending.line_items.first().unwrap().name, "Rice bowl");
        assert!(pending.idempotency_key.as_str().starts_with("u1-"));
    }

    #[tokio::test]
    async fn test_rejection_keeps_cart_and_message() {
        let gateway = StubGateway {
            place: Err(ApiError::Rejected {
                status: 409,
                message: Some("Rice bowl is sold out".to_string()),
            }),
            ..StubGateway::accepting()
        };
        let (orchestrator, cart, _store) = setup(gateway);
        let book = price_book();
        cart.add(&ItemId::new("a"));

        let outcome = orchestrator
            .checkout(Some(&session()), request(PaymentMethod::Cod, "Room 12", &book))
            .await;

        let failure = outcome.failure().unwrap();
        assert_eq!(failure.user_message(), "Rice bowl is sold out");
        assert!(!failure.is_validation());
        assert_eq!(cart.count(), 1);
        assert_eq!(orchestrator.navigator.last(), None);
    }

    #[tokio::test]
    async fn test_unreachable_is_distinct_from_rejection() {
        let gateway = StubGateway {
            place: Err(ApiError::Unreachable("connection refused".to_string())),
            ..StubGateway::accepting()
        };
        let (orchestrator, cart, _store) = setup(gateway);
        let book = price_book();
        cart.add(&ItemId::new("a"));

        let outcome = orchestrator
            .checkout(Some(&session()), request(PaymentMethod::Cod, "Room 12", &book))
            .await;
        assert_eq!(outcome.failure(), Some(&CheckoutFailure::Unreachable));
        assert!(!cart.is_empty());
    }

    #[tokio::test]
    async fn test_missing_redirect_url_fails_without_persisting() {
        let gateway = StubGateway {
            session: Ok(PaymentSession { id: None, url: None }),
            ..StubGateway::accepting()
        };
        let (orchestrator, cart, store) = setup(gateway);
        let book = price_book();
        cart.add(&ItemId::new("a"));

        let outcome = orchestrator
            .checkout(Some(&session()), request(PaymentMethod::Online, "Room 12", &book))
            .await;
        assert_eq!(outcome.failure(), Some(&CheckoutFailure::MissingRedirect));
        assert!(store.read::<PendingOrderPayload>(keys::PENDING_ORDER_PAYLOAD).is_none());
        assert_eq!(orchestrator.navigator.last(), None);
    }

    #[tokio::test]
    async fn test_new_attempt_supersedes_stale_pending_payload() {
        let (orchestrator, cart, store) = setup(StubGateway::accepting());
        let book = price_book();
        cart.add(&ItemId::new("a"));
        store.write(keys::PENDING_ORDER_PAYLOAD, &PendingOrderPayload::default());

        let _ = orchestrator
            .checkout(Some(&session()), request(PaymentMethod::Cod, "Room 12", &book))
            .await;
        assert!(store.read::<PendingOrderPayload>(keys::PENDING_ORDER_PAYLOAD).is_none());
    }

    #[test]
    fn test_guard_rejects_second_holder_and_releases_on_drop() {
        let phase = Mutex::new(CheckoutPhase::Idle);

        let guard = InFlight::begin(&phase).unwrap();
        assert!(InFlight::begin(&phase).is_none());
        guard.advance(CheckoutPhase::SubmittingCod);
        assert!(InFlight::begin(&phase).is_none());

        drop(guard);
        assert_eq!(*lock(&phase), CheckoutPhase::Idle);

        let guard = InFlight::begin(&phase).unwrap();
        guard.finish(CheckoutPhase::Failed);
        assert_eq!(*lock(&phase), CheckoutPhase::Failed);
        assert!(InFlight::begin(&phase).is_some());
    }

    #[test]
    fn test_failure_from_api_error() {
        assert_eq!(
            CheckoutFailure::from(ApiError::Malformed("bad json".into())),
            CheckoutFailure::Rejected(None)
        );
        assert_eq!(
            CheckoutFailure::from(AddressError::TooLong { max: 500 }),
            CheckoutFailure::AddressTooLong { max: 500 }
        );
        assert_eq!(
            CheckoutFailure::Rejected(None).user_message(),
            "Your order could not be placed. Please try again."
        );
    }
}

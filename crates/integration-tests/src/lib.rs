//! Integration tests for Campus Market.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p campus-market-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart` - cart arithmetic, persistence and quota handling
//! - `favorites` - per-user favorites
//! - `checkout` - validation, pay-on-delivery, redirect, single-flight
//! - `reconcile` - payment return handling and the direct-order fallback
//!
//! Nothing here opens a socket: the checkout code is driven through
//! [`FakeGateway`], a scripted [`OrderGateway`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rust_decimal::Decimal;
use secrecy::SecretString;
use tokio::sync::Notify;
use url::Url;

use campus_market_client::api::{ApiError, OrderGateway, PaymentSession};
use campus_market_client::cart::{CartOwner, CartScope, CartStore};
use campus_market_client::catalog::{CatalogItem, PriceBook};
use campus_market_client::checkout::{CheckoutOrchestrator, ConfirmationReconciler};
use campus_market_client::navigation::RecordingNavigator;
use campus_market_client::session::UserSession;
use campus_market_client::storage::PersistedStore;
use campus_market_core::{
    IdempotencyKey, ItemId, Order, OrderId, OrderStatus, PaymentSessionId, PendingOrderPayload,
    Section, UserId,
};

/// A request the gateway received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    PlaceOrder {
        key: IdempotencyKey,
        payload: PendingOrderPayload,
    },
    CreatePaymentSession {
        key: IdempotencyKey,
    },
    ConfirmPayment {
        session_ref: PaymentSessionId,
        payload: PendingOrderPayload,
    },
}

/// Scripted order gateway.
///
/// Each endpoint answers from its queue of scripted responses and succeeds
/// once the queue is empty. Clones share scripts and the call log.
#[derive(Clone, Default)]
pub struct FakeGateway {
    inner: Arc<FakeGatewayInner>,
}

#[derive(Default)]
struct FakeGatewayInner {
    place: Mutex<VecDeque<Result<Order, ApiError>>>,
    sessions: Mutex<VecDeque<Result<PaymentSession, ApiError>>>,
    confirm: Mutex<VecDeque<Result<Order, ApiError>>>,
    calls: Mutex<Vec<Call>>,
    next_order: AtomicUsize,
    gated: AtomicBool,
    gate: Notify,
}

impl FakeGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next `place_order`.
    #[must_use]
    pub fn then_place(self, response: Result<Order, ApiError>) -> Self {
        lock(&self.inner.place).push_back(response);
        self
    }

    /// Queue a response for the next `create_payment_session`.
    #[must_use]
    pub fn then_session(self, response: Result<PaymentSession, ApiError>) -> Self {
        lock(&self.inner.sessions).push_back(response);
        self
    }

    /// Queue a response for the next `confirm_payment`.
    #[must_use]
    pub fn then_confirm(self, response: Result<Order, ApiError>) -> Self {
        lock(&self.inner.confirm).push_back(response);
        self
    }

    /// Hold every `place_order` until [`Self::release`] is called.
    #[must_use]
    pub fn gated(self) -> Self {
        self.inner.gated.store(true, Ordering::SeqCst);
        self
    }

    /// Let one held `place_order` proceed.
    pub fn release(&self) {
        self.inner.gate.notify_one();
    }

    /// Every call received so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.inner.calls).clone()
    }

    /// Idempotency keys of every `place_order` call.
    #[must_use]
    pub fn placed_keys(&self) -> Vec<IdempotencyKey> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::PlaceOrder { key, .. } => Some(key),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        lock(&self.inner.calls).push(call);
    }

    fn next_order(&self) -> Order {
        let n = self.inner.next_order.fetch_add(1, Ordering::SeqCst) + 1;
        order(&format!("order-{n}"))
    }
}

impl OrderGateway for FakeGateway {
    async fn place_order(
        &self,
        _session: &UserSession,
        payload: &PendingOrderPayload,
    ) -> Result<Order, ApiError> {
        self.record(Call::PlaceOrder {
            key: payload.idempotency_key.clone(),
            payload: payload.clone(),
        });
        if self.inner.gated.load(Ordering::SeqCst) {
            self.inner.gate.notified().await;
        }
        let scripted = lock(&self.inner.place).pop_front();
        scripted.unwrap_or_else(|| Ok(self.next_order()))
    }

    async fn create_payment_session(
        &self,
        _session: &UserSession,
        payload: &PendingOrderPayload,
    ) -> Result<PaymentSession, ApiError> {
        self.record(Call::CreatePaymentSession {
            key: payload.idempotency_key.clone(),
        });
        let scripted = lock(&self.inner.sessions).pop_front();
        scripted.unwrap_or_else(|| Ok(payment_session("cs_test_1")))
    }

    async fn confirm_payment(
        &self,
        _session: &UserSession,
        session_ref: &PaymentSessionId,
        payload: &PendingOrderPayload,
    ) -> Result<Order, ApiError> {
        self.record(Call::ConfirmPayment {
            session_ref: session_ref.clone(),
            payload: payload.clone(),
        });
        let scripted = lock(&self.inner.confirm).pop_front();
        scripted.unwrap_or_else(|| Ok(self.next_order()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Fixtures
// =============================================================================

/// An order in the `placed` state.
#[must_use]
pub fn order(id: &str) -> Order {
    Order {
        id: OrderId::new(id),
        status: OrderStatus::Placed,
        total_amount: None,
        created_at: None,
    }
}

/// A hosted payment session at `pay.test`.
///
/// # Panics
///
/// Panics if `id` makes the URL invalid.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn payment_session(id: &str) -> PaymentSession {
    PaymentSession {
        id: Some(PaymentSessionId::new(id)),
        url: Some(Url::parse(&format!("https://pay.test/c/{id}")).unwrap()),
    }
}

/// Signed-in session for `user`.
#[must_use]
pub fn session_for(user: &str) -> UserSession {
    UserSession::new(UserId::new(user), SecretString::from("test-bearer-token"))
}

/// Item A at 100 and item B at 250, both available.
#[must_use]
pub fn price_book() -> PriceBook {
    PriceBook::new([
        catalog_item("itemA", "Hostel mattress", 100),
        catalog_item("itemB", "Calculus notes", 250),
    ])
}

/// An available catalog item.
#[must_use]
pub fn catalog_item(id: &str, name: &str, price: i64) -> CatalogItem {
    CatalogItem {
        id: ItemId::new(id),
        name: name.to_string(),
        price: Decimal::from(price),
        available: true,
    }
}

/// A signed-in user's client wired to a [`FakeGateway`].
pub struct Harness {
    pub store: PersistedStore,
    pub cart: CartStore,
    pub gateway: FakeGateway,
    pub session: UserSession,
    pub orchestrator: CheckoutOrchestrator<FakeGateway, Arc<RecordingNavigator>>,
    pub navigator: Arc<RecordingNavigator>,
}

impl Harness {
    /// Harness for user `u1` on a fresh in-memory store.
    #[must_use]
    pub fn new(gateway: FakeGateway) -> Self {
        Self::with_store(gateway, PersistedStore::in_memory())
    }

    /// Harness for user `u1` on `store`.
    #[must_use]
    pub fn with_store(gateway: FakeGateway, store: PersistedStore) -> Self {
        let session = session_for("u1");
        let cart = CartStore::load(
            store.clone(),
            CartScope::PerUser,
            CartOwner::User(session.user_id.clone()),
        );
        let navigator = Arc::new(RecordingNavigator::new());
        let orchestrator = CheckoutOrchestrator::new(
            gateway.clone(),
            Arc::clone(&navigator),
            cart.clone(),
            store.clone(),
            Section::Food,
        );

        Self {
            store,
            cart,
            gateway,
            session,
            orchestrator,
            navigator,
        }
    }

    /// Fill the cart with `{itemA: 2, itemB: 1}`.
    pub fn fill_cart(&self) {
        self.cart.add(&ItemId::new("itemA"));
        self.cart.add(&ItemId::new("itemA"));
        self.cart.add(&ItemId::new("itemB"));
    }

    /// Reconciler sharing this harness's cart, store and gateway.
    #[must_use]
    pub fn reconciler(&self) -> ConfirmationReconciler<FakeGateway> {
        ConfirmationReconciler::new(self.gateway.clone(), self.cart.clone(), self.store.clone())
    }
}

//! Integration tests for reconciling the return from the payment provider.

#![allow(clippy::unwrap_used)]

use url::Url;

use campus_market_client::api::ApiError;
use campus_market_client::checkout::{
    CheckoutOutcome, CheckoutRequest, ConfirmationPath, ReconcileFailure, ReconcileOutcome,
};
use campus_market_client::navigation::View;
use campus_market_client::storage::{FileBackend, PersistedStore, keys};
use campus_market_core::{PaymentMethod, PaymentSessionId, PendingOrderPayload};
use campus_market_integration_tests::{Call, FakeGateway, Harness, price_book};

fn return_url(query: &str) -> Url {
    Url::parse(&format!("https://campus.test/payment/success{query}")).unwrap()
}

fn not_found() -> ApiError {
    ApiError::Rejected {
        status: 404,
        message: Some("Session not found".to_string()),
    }
}

/// Run an online checkout so the pending payload is stored.
async fn redirect(h: &Harness) -> PendingOrderPayload {
    h.fill_cart();
    let book = price_book();
    let outcome = h
        .orchestrator
        .checkout(
            Some(&h.session),
            CheckoutRequest {
                method: PaymentMethod::Online,
                delivery_address: "Block C, Room 7",
                catalog: &book,
            },
        )
        .await;
    assert!(matches!(outcome, CheckoutOutcome::Redirected { .. }));
    h.store.read(keys::PENDING_ORDER_PAYLOAD).unwrap()
}

#[tokio::test]
async fn test_primary_confirmation_offers_choices_without_navigating() {
    let h = Harness::new(FakeGateway::new());
    let pending = redirect(&h).await;
    let visited_before = h.navigator.visited().len();

    let outcome = h
        .reconciler()
        .run(Some(&h.session), &return_url("?session_id=cs_test_1"))
        .await;

    let ReconcileOutcome::Confirmed { via, choices, .. } = outcome else {
        panic!("expected confirmation, got {outcome:?}");
    };
    assert_eq!(via, ConfirmationPath::Primary);
    assert_eq!(choices, vec![View::OrderList, View::ContinueShopping]);
    assert_eq!(h.navigator.visited().len(), visited_before);

    assert!(h.cart.is_empty());
    assert!(h
        .store
        .read::<PendingOrderPayload>(keys::PENDING_ORDER_PAYLOAD)
        .is_none());

    let confirm = h.gateway.calls().into_iter().last().unwrap();
    assert_eq!(
        confirm,
        Call::ConfirmPayment {
            session_ref: PaymentSessionId::new("cs_test_1"),
            payload: pending,
        }
    );
}

#[tokio::test]
async fn test_scenario_d_missing_payload_confirms_with_defaults() {
    let h = Harness::new(FakeGateway::new());

    let outcome = h
        .reconciler()
        .run(Some(&h.session), &return_url("?session_id=cs_123"))
        .await;

    assert!(matches!(
        outcome,
        ReconcileOutcome::Confirmed {
            via: ConfirmationPath::Primary,
            ..
        }
    ));
    assert_eq!(
        h.gateway.calls(),
        vec![Call::ConfirmPayment {
            session_ref: PaymentSessionId::new("cs_123"),
            payload: PendingOrderPayload::default(),
        }]
    );
}

#[tokio::test]
async fn test_scenario_e_fallback_creates_order_with_same_key() {
    let h = Harness::new(FakeGateway::new().then_confirm(Err(not_found())));
    let pending = redirect(&h).await;

    let outcome = h
        .reconciler()
        .run(Some(&h.session), &return_url("?session_id=cs_test_1"))
        .await;

    assert!(matches!(
        outcome,
        ReconcileOutcome::Confirmed {
            via: ConfirmationPath::Fallback,
            ..
        }
    ));
    assert!(h.cart.is_empty());
    assert!(h
        .store
        .read::<PendingOrderPayload>(keys::PENDING_ORDER_PAYLOAD)
        .is_none());
    assert_eq!(h.gateway.placed_keys(), vec![pending.idempotency_key]);
}

#[tokio::test]
async fn test_both_paths_failing_keeps_state_for_retry() {
    let h = Harness::new(
        FakeGateway::new()
            .then_confirm(Err(not_found()))
            .then_place(Err(ApiError::Unreachable("timeout".to_string()))),
    );
    let pending = redirect(&h).await;

    let outcome = h
        .reconciler()
        .run(Some(&h.session), &return_url("?session_id=cs_test_1"))
        .await;

    let ReconcileOutcome::Unresolved { message } = outcome else {
        panic!("expected unresolved, got {outcome:?}");
    };
    assert!(message.contains("contact support"));
    assert_eq!(h.cart.count(), 3);
    assert_eq!(
        h.store.read::<PendingOrderPayload>(keys::PENDING_ORDER_PAYLOAD),
        Some(pending)
    );

    // A manual retry (reloading the return page) goes through.
    let retry = h
        .reconciler()
        .run(Some(&h.session), &return_url("?session_id=cs_test_1"))
        .await;
    assert!(matches!(retry, ReconcileOutcome::Confirmed { .. }));
    assert!(h.cart.is_empty());
}

#[tokio::test]
async fn test_missing_session_reference_is_fatal() {
    let h = Harness::new(FakeGateway::new());
    redirect(&h).await;
    let calls_before = h.gateway.calls().len();

    let outcome = h
        .reconciler()
        .run(Some(&h.session), &return_url("?status=success"))
        .await;

    let ReconcileOutcome::Rejected(failure) = outcome else {
        panic!("expected rejection, got {outcome:?}");
    };
    assert!(matches!(
        failure,
        ReconcileFailure::MissingSessionReference { .. }
    ));
    assert!(failure.user_message().contains("payment reference"));
    assert_eq!(h.gateway.calls().len(), calls_before);
    assert_eq!(h.cart.count(), 3);
}

#[tokio::test]
async fn test_reconcile_requires_signed_in_user() {
    let h = Harness::new(FakeGateway::new());

    let outcome = h
        .reconciler()
        .run(None, &return_url("?session_id=cs_1"))
        .await;

    assert_eq!(
        outcome,
        ReconcileOutcome::Rejected(ReconcileFailure::NotAuthenticated)
    );
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_payload_survives_restart_between_redirect_and_return() {
    let dir = std::env::temp_dir().join(format!(
        "campus-market-restart-{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);

    let gateway = FakeGateway::new();
    let before = Harness::with_store(
        gateway.clone(),
        PersistedStore::new(FileBackend::open(&dir).unwrap()),
    );
    let pending = redirect(&before).await;
    drop(before);

    // A fresh process on the same storage directory.
    let after = Harness::with_store(
        gateway,
        PersistedStore::new(FileBackend::open(&dir).unwrap()),
    );
    assert_eq!(after.cart.count(), 3);

    let outcome = after
        .reconciler()
        .run(Some(&after.session), &return_url("?session_id=cs_test_1"))
        .await;
    assert!(matches!(outcome, ReconcileOutcome::Confirmed { .. }));

    let Some(Call::ConfirmPayment { payload, .. }) = after.gateway.calls().into_iter().last() else {
        panic!("expected a confirmation request");
    };
    assert_eq!(payload, pending);
    assert!(after.cart.is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

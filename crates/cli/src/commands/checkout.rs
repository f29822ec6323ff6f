//! Checkout and payment-return commands.

use std::process::ExitCode;

use tracing::debug;
use url::Url;

use campus_market_client::checkout::{CheckoutRequest, ReconcileOutcome, saved_delivery_address};
use campus_market_client::error::Result;
use campus_market_client::state::MarketContext;
use campus_market_core::PaymentMethod;

use crate::output::{self, TerminalNavigator};

/// Check out the cart with `method`.
///
/// Without `--address` the last address used in the configured section is
/// reused; with neither, checkout reports the missing address.
pub async fn checkout(context: &MarketContext, method: &str, address: Option<&str>) -> Result<ExitCode> {
    let method = PaymentMethod::parse(method);
    let address = address.map_or_else(
        || saved_delivery_address(context.store(), context.config().section).unwrap_or_default(),
        str::to_string,
    );
    debug!(%method, has_address = !address.is_empty(), "Starting checkout");

    let lines = context.cart().lines();
    let book = context.catalog().price_book_for(lines.keys()).await;

    let outcome = context
        .orchestrator(TerminalNavigator)
        .checkout(
            context.session(),
            CheckoutRequest {
                method,
                delivery_address: &address,
                catalog: &book,
            },
        )
        .await;

    output::checkout(&outcome);
    Ok(if outcome.failure().is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Reconcile the payment provider's return to `return_url`.
pub async fn confirm(context: &MarketContext, return_url: &Url) -> Result<ExitCode> {
    let outcome = context
        .reconciler()
        .run(context.session(), return_url)
        .await;

    output::reconcile(&outcome);
    Ok(match outcome {
        ReconcileOutcome::Confirmed { .. } => ExitCode::SUCCESS,
        ReconcileOutcome::Unresolved { .. } | ReconcileOutcome::Rejected(_) => ExitCode::FAILURE,
    })
}

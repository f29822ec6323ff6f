//! Terminal presentation.
//!
//! Everything the CLI shows the user goes through here; logs go to stderr
//! via `tracing`.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;

use campus_market_client::catalog::{CatalogItem, PriceBook};
use campus_market_client::checkout::{CheckoutOutcome, ReconcileOutcome};
use campus_market_client::navigation::{Navigator, View};
use campus_market_core::{ItemId, ListingId};

/// Navigator for a terminal: there is no browser, so it tells the user
/// where to go instead.
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, view: View) {
        match view {
            View::External(url) => println!("Continue to payment: {url}"),
            View::OrderList => println!("Your order is in your order list."),
            View::ContinueShopping => println!("Happy shopping."),
        }
    }
}

pub fn message(text: &str) {
    println!("{text}");
}

pub fn error(text: &str) {
    eprintln!("error: {text}");
}

/// Print cart lines with their prices.
pub fn cart(lines: &BTreeMap<ItemId, u32>, book: &PriceBook, total: Decimal, count: u32) {
    if lines.is_empty() {
        println!("Your cart is empty.");
        return;
    }

    for (id, quantity) in lines {
        match book.get(id).filter(|item| item.available) {
            Some(item) => println!(
                "{quantity:>4} x {:<32} {:>10} {:>10}",
                item.name,
                item.price,
                item.price * Decimal::from(*quantity)
            ),
            None => println!("{quantity:>4} x {id:<32} {:>10}", "unavailable"),
        }
    }
    println!("{count} item(s), total {total}");
}

pub fn favorites(ids: &BTreeSet<ListingId>) {
    if ids.is_empty() {
        println!("No favorites yet.");
    }
    for id in ids {
        println!("{id}");
    }
}

pub fn catalog(items: &[&CatalogItem]) {
    if items.is_empty() {
        println!("No items available.");
    }
    for item in items {
        println!("{:<24} {:<32} {:>10}", item.id, item.name, item.price);
    }
}

pub fn checkout(outcome: &CheckoutOutcome) {
    match outcome {
        CheckoutOutcome::Placed(order) => println!("Order {} placed ({}).", order.id, order.status),
        CheckoutOutcome::Redirected { .. } => {
            println!("After paying, run `market confirm <return-url>` with the page you land on.");
        }
        CheckoutOutcome::Failed(failure) => error(&failure.user_message()),
    }
}

pub fn reconcile(outcome: &ReconcileOutcome) {
    match outcome {
        ReconcileOutcome::Confirmed { order, choices, .. } => {
            println!("Payment confirmed. Order {} ({}).", order.id, order.status);
            let choices: Vec<String> = choices.iter().map(ToString::to_string).collect();
            println!("Next: {}", choices.join(" | "));
        }
        ReconcileOutcome::Unresolved { message } => error(message),
        ReconcileOutcome::Rejected(failure) => error(failure.user_message()),
    }
}

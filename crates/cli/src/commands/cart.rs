//! Cart commands.

use std::process::ExitCode;

use campus_market_client::error::{ClientError, Result, add_breadcrumb};
use campus_market_client::state::MarketContext;
use campus_market_core::ItemId;

use crate::output;

/// Show the cart priced against the current catalog.
pub async fn show(context: &MarketContext) -> Result<ExitCode> {
    let cart = context.cart();
    let lines = cart.lines();
    let book = context.catalog().price_book_for(lines.keys()).await;

    output::cart(&lines, &book, cart.total(&book), cart.count());
    Ok(ExitCode::SUCCESS)
}

/// Add one unit of `item`.
pub fn add(context: &MarketContext, item: &str) -> Result<ExitCode> {
    let item = parse_item(item)?;
    context.cart().add(&item);
    add_breadcrumb("cart", "Item added", Some(&[("item", item.as_str())]));

    output::message(&format!(
        "Added {item} ({} in cart)",
        context.cart().quantity(&item)
    ));
    Ok(ExitCode::SUCCESS)
}

/// Remove one unit of `item`.
pub fn remove(context: &MarketContext, item: &str) -> Result<ExitCode> {
    let item = parse_item(item)?;
    context.cart().remove(&item);
    add_breadcrumb("cart", "Item removed", Some(&[("item", item.as_str())]));

    match context.cart().quantity(&item) {
        0 => output::message(&format!("Removed {item} from the cart")),
        n => output::message(&format!("{item}: {n} in cart")),
    }
    Ok(ExitCode::SUCCESS)
}

/// Set the quantity of `item` directly.
pub fn set(context: &MarketContext, item: &str, quantity: i64) -> Result<ExitCode> {
    let item = parse_item(item)?;
    context.cart().set_quantity(&item, quantity);

    output::message(&format!(
        "{item}: {} in cart",
        context.cart().quantity(&item)
    ));
    Ok(ExitCode::SUCCESS)
}

/// Empty the cart.
pub fn clear(context: &MarketContext) -> Result<ExitCode> {
    context.cart().clear();
    output::message("Cart cleared");
    Ok(ExitCode::SUCCESS)
}

fn parse_item(raw: &str) -> Result<ItemId> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ClientError::BadRequest("Item ID cannot be empty.".to_string()));
    }
    Ok(ItemId::new(raw))
}

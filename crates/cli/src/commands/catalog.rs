//! Catalog listing.

use std::process::ExitCode;

use campus_market_client::error::Result;
use campus_market_client::state::MarketContext;

use crate::output;

/// List every purchasable item.
pub async fn list(context: &MarketContext) -> Result<ExitCode> {
    let book = context.catalog().price_book().await;
    let mut items: Vec<_> = book.available().collect();
    items.sort_by(|a, b| a.name.cmp(&b.name));

    output::catalog(&items);
    Ok(ExitCode::SUCCESS)
}

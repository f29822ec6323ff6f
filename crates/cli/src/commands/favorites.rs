//! Favorites commands.

use std::process::ExitCode;

use campus_market_client::error::{ClientError, Result};
use campus_market_client::state::MarketContext;
use campus_market_core::ListingId;

use crate::output;

/// List favorite listings.
pub fn list(context: &MarketContext) -> Result<ExitCode> {
    output::favorites(&context.favorites().ids());
    Ok(ExitCode::SUCCESS)
}

/// Save `listing` if it is not a favorite yet, otherwise unsave it.
pub fn toggle(context: &MarketContext, listing: &str) -> Result<ExitCode> {
    let listing = listing.trim();
    if listing.is_empty() {
        return Err(ClientError::BadRequest("Listing ID cannot be empty.".to_string()));
    }

    let listing = ListingId::new(listing);
    if context.favorites().toggle(&listing)? {
        output::message(&format!("Saved {listing} to favorites"));
    } else {
        output::message(&format!("Removed {listing} from favorites"));
    }
    Ok(ExitCode::SUCCESS)
}

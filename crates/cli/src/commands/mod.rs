//! Subcommand implementations.
//!
//! Each command works against the shared [`MarketContext`] and reports
//! through [`crate::output`]; it returns the process exit code.
//!
//! [`MarketContext`]: campus_market_client::state::MarketContext

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod favorites;

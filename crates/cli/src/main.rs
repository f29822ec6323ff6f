//! Campus Market CLI - cart, favorites and checkout from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart with current prices
//! market cart show
//!
//! # Add an item, then set its quantity directly
//! market cart add 64f1c0ffee
//! market cart set 64f1c0ffee 3
//!
//! # Save or unsave a listing
//! market favorites toggle 64f1listing
//!
//! # Pay on delivery, reusing the last address for this section
//! market checkout --method COD
//!
//! # Pay online, then reconcile the provider's return URL
//! market checkout --method online --address "Room 114, Hostel B"
//! market confirm "https://campus.example/payment/success?session_id=cs_123"
//! ```
//!
//! # Commands
//!
//! - `cart` - Inspect and edit the cart
//! - `favorites` - List and toggle saved listings
//! - `checkout` - Place an order
//! - `confirm` - Reconcile a return from the payment provider
//! - `catalog` - List purchasable items

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use campus_market_client::config::ClientConfig;
use campus_market_client::state::MarketContext;

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "market")]
#[command(author, version, about = "Campus Market cart and checkout")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// List and toggle favorite listings
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },
    /// Check out the current cart
    Checkout {
        /// Payment method (`COD` pays on delivery, anything else pays online)
        #[arg(short, long, default_value = "COD")]
        method: String,

        /// Delivery address (defaults to the last one used in this section)
        #[arg(short, long)]
        address: Option<String>,
    },
    /// Reconcile a return from the payment provider
    Confirm {
        /// Full return URL, including the session query parameter
        return_url: Url,
    },
    /// List purchasable catalog items
    Catalog,
}

#[derive(Subcommand)]
enum CartAction {
    /// Show cart lines, prices and total
    Show,
    /// Add one unit of an item
    Add {
        /// Catalog item ID
        item: String,
    },
    /// Remove one unit of an item
    Remove {
        /// Catalog item ID
        item: String,
    },
    /// Set an item's quantity (0 or less removes it)
    Set {
        /// Catalog item ID
        item: String,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum FavoritesAction {
    /// List favorite listing IDs
    List,
    /// Add or remove a listing
    Toggle {
        /// Listing ID
        listing: String,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "campus_market_client=info,campus_market_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration from environment (needed for Sentry init)
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    let context = match MarketContext::new(config) {
        Ok(context) => context,
        Err(e) => {
            e.report();
            output::error(&e.user_message());
            return ExitCode::FAILURE;
        }
    };

    match run(cli, &context).await {
        Ok(code) => code,
        Err(e) => {
            e.report();
            output::error(&e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, context: &MarketContext) -> campus_market_client::error::Result<ExitCode> {
    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(context).await,
            CartAction::Add { item } => commands::cart::add(context, &item),
            CartAction::Remove { item } => commands::cart::remove(context, &item),
            CartAction::Set { item, quantity } => commands::cart::set(context, &item, quantity),
            CartAction::Clear => commands::cart::clear(context),
        },
        Commands::Favorites { action } => match action {
            FavoritesAction::List => commands::favorites::list(context),
            FavoritesAction::Toggle { listing } => commands::favorites::toggle(context, &listing),
        },
        Commands::Checkout { method, address } => {
            commands::checkout::checkout(context, &method, address.as_deref()).await
        }
        Commands::Confirm { return_url } => commands::checkout::confirm(context, &return_url).await,
        Commands::Catalog => commands::catalog::list(context).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_checkout_defaults_to_cod() {
        let cli = Cli::try_parse_from(["market", "checkout"]).ok();
        assert!(matches!(
            cli.map(|c| c.command),
            Some(Commands::Checkout { ref method, address: None }) if method == "COD"
        ));
    }

    #[test]
    fn test_parse_negative_quantity() {
        let cli = Cli::try_parse_from(["market", "cart", "set", "i1", "-2"]).ok();
        assert!(matches!(
            cli.map(|c| c.command),
            Some(Commands::Cart {
                action: CartAction::Set { quantity: -2, .. }
            })
        ));
    }

    #[test]
    fn test_confirm_requires_a_url() {
        assert!(Cli::try_parse_from(["market", "confirm", "not a url"]).is_err());
    }
}

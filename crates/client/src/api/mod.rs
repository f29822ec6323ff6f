//! Marketplace REST service collaborators.
//!
//! # Architecture
//!
//! - [`OrderGateway`] - order placement, payment sessions, payment confirmation
//! - [`CatalogSource`] - read-only catalog lookups used for prices and names
//! - [`MarketClient`] - `reqwest` implementation of both against the REST API
//!
//! The checkout code only sees the traits, so tests drive it with scripted
//! gateways and never open a socket.
//!
//! # Endpoints
//!
//! | operation | request |
//! |---|---|
//! | place order | `POST orders` (+ `Idempotency-Key` header) |
//! | create payment session | `POST payments/session` |
//! | confirm payment | `POST payments/confirm` |
//! | list catalog | `GET catalog` |
//! | catalog item | `GET catalog/{id}` |

mod http;

pub use http::MarketClient;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use campus_market_core::{ItemId, Order, PaymentSessionId, PendingOrderPayload};

use crate::catalog::CatalogItem;
use crate::session::UserSession;

/// Errors that can occur when talking to the marketplace service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No response was received (connection refused, DNS, timeout).
    #[error("service unreachable: {0}")]
    Unreachable(String),

    /// A response was received and it reported failure.
    #[error("request rejected with status {status}: {}", .message.as_deref().unwrap_or("(no message)"))]
    Rejected {
        status: u16,
        /// Server-provided message, kept verbatim.
        message: Option<String>,
    },

    /// A response was received but could not be understood.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Whether the request never got a response.
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }

    /// Message supplied by the server, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Rejected {
                status: status.as_u16(),
                message: None,
            }
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}

/// A hosted checkout session at the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Provider reference, when the service reports it up front.
    pub id: Option<PaymentSessionId>,
    /// Where to send the buyer to pay; `None` when the service reported
    /// success without one.
    pub url: Option<Url>,
}

/// Order placement and payment endpoints.
///
/// Implement [`OrderGateway`]; the `Local` variant exists for gateways whose
/// futures are not `Send` and is what the checkout code is generic over.
#[trait_variant::make(OrderGateway: Send)]
pub trait LocalOrderGateway {
    /// Create an order directly. Used for pay-on-delivery and as the
    /// fallback when payment confirmation cannot find the provider session.
    async fn place_order(
        &self,
        session: &UserSession,
        payload: &PendingOrderPayload,
    ) -> Result<Order, ApiError>;

    /// Ask the provider (via the service) for a hosted checkout session.
    async fn create_payment_session(
        &self,
        session: &UserSession,
        payload: &PendingOrderPayload,
    ) -> Result<PaymentSession, ApiError>;

    /// Confirm a completed provider session and create the paid order.
    async fn confirm_payment(
        &self,
        session: &UserSession,
        session_ref: &PaymentSessionId,
        payload: &PendingOrderPayload,
    ) -> Result<Order, ApiError>;
}

/// Read-only catalog endpoints.
#[trait_variant::make(CatalogSource: Send)]
pub trait LocalCatalogSource {
    /// Every listed catalog item.
    async fn list_catalog(&self) -> Result<Vec<CatalogItem>, ApiError>;

    /// One catalog item, `None` when it no longer exists.
    async fn catalog_item(&self, id: &ItemId) -> Result<Option<CatalogItem>, ApiError>;
}

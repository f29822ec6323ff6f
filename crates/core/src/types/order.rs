//! Order payloads and the order record returned by the remote service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ItemId, OrderId};
use super::idempotency::IdempotencyKey;
use super::status::{OrderStatus, PaymentMethod, Section};

/// One line of an order, with name and price captured at submission time.
///
/// This is a price snapshot, not a live reference: later catalog changes do
/// not alter an order that was already submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub catalog_item_id: ItemId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl LineItem {
    /// `quantity × unit_price`, or `None` when it does not fit in a
    /// [`Decimal`].
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// The declared total of a payload does not match its line items.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TotalMismatch {
    /// The line items sum to a different amount.
    #[error("order total {declared} does not match line items ({computed})")]
    Differs {
        /// Total carried by the payload.
        declared: Decimal,
        /// Sum of `quantity × unit_price` over the line items.
        computed: Decimal,
    },
    /// The line items sum past the range of a decimal.
    #[error("line items of order total {declared} overflow")]
    Overflow { declared: Decimal },
}

/// Everything the remote service needs to create an order.
///
/// For online payments the payload is persisted locally before the browser
/// leaves for the provider, so it must survive a full round trip through
/// storage. Every field has a default so a partially written or empty record
/// still deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PendingOrderPayload {
    pub line_items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub delivery_address: String,
    pub payment_method: PaymentMethod,
    pub section: Section,
    pub idempotency_key: IdempotencyKey,
    pub created_at: Option<DateTime<Utc>>,
}

impl Default for PendingOrderPayload {
    fn default() -> Self {
        Self {
            line_items: Vec::new(),
            total_amount: Decimal::ZERO,
            delivery_address: String::new(),
            payment_method: PaymentMethod::Online,
            section: Section::default(),
            idempotency_key: IdempotencyKey::default(),
            created_at: None,
        }
    }
}

impl PendingOrderPayload {
    /// Sum of `quantity × unit_price` over all line items, `None` on
    /// overflow.
    #[must_use]
    pub fn computed_total(&self) -> Option<Decimal> {
        self.line_items
            .iter()
            .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(line.line_total()?))
    }

    /// Verify that `total_amount` equals the sum of the line items.
    ///
    /// # Errors
    ///
    /// Returns [`TotalMismatch`] when the declared total disagrees.
    pub fn check_total(&self) -> Result<(), TotalMismatch> {
        match self.computed_total() {
            Some(computed) if computed == self.total_amount => Ok(()),
            Some(computed) => Err(TotalMismatch::Differs {
                declared: self.total_amount,
                computed,
            }),
            None => Err(TotalMismatch::Overflow {
                declared: self.total_amount,
            }),
        }
    }

    /// Total number of units across all line items.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.line_items
            .iter()
            .fold(0, |acc, l| acc.saturating_add(l.quantity))
    }
}

/// An order as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(alias = "_id")]
    pub id: OrderId,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

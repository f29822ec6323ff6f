//! Core types for Campus Market.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod id;
pub mod idempotency;
pub mod order;
pub mod status;

pub use address::{AddressError, DeliveryAddress};
pub use id::*;
pub use idempotency::IdempotencyKey;
pub use order::{LineItem, Order, PendingOrderPayload, TotalMismatch};
pub use status::*;

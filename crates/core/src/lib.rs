//! Campus Market Core - Shared domain types.
//!
//! This crate provides the types shared by every Campus Market component:
//! - `client` - Cart, favorites, checkout and payment reconciliation
//! - `cli` - Command-line driver for the client
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no storage,
//! no HTTP clients. Anything that touches the network or the persisted store
//! lives in the client crate.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, delivery addresses, idempotency keys, order payloads

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

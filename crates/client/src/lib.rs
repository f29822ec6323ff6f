//! Campus Market client library.
//!
//! Keeps the buyer's cart and favorites in durable local storage and drives
//! checkout against the marketplace REST service, including the hand-off to
//! an external payment provider and the reconciliation that runs when the
//! buyer comes back.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod favorites;
pub mod navigation;
pub mod session;
pub mod state;
pub mod storage;

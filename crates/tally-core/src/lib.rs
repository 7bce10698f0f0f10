//! tally-core - Core library for Tally
//!
//! This crate contains the shared models, the offline-first local cache,
//! and the sync engine used by all Tally interfaces.

pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod merge;
pub mod models;
pub mod reconcile;
pub mod remote;
pub mod retry;
pub mod service;
pub mod store;
pub mod util;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Error, Result};
pub use models::{
    Category, Collection, FlowKind, PendingMutation, Record, SavingsGoal, SavingsTransaction,
    Transaction,
};

//! # mealtally-ledger
//!
//! Durable order ledger: one JSON store per group and month, partitioned
//! by calendar date.

pub mod store;

pub use store::{LedgerStore, MergeMode, MergeReport};

//! Order text classification and aggregation.
//!
//! Split into focused submodules:
//! - `parse` — portion-form and headcount-list order declarations
//! - `mention` — `@name` detection against the bot's names
//! - `timestamp` — whether a chat timestamp falls on the current day
//! - `summary` — portion-count vs. attendee-count totals

mod mention;
mod parse;
mod summary;
mod timestamp;

pub use mention::*;
pub use parse::*;
pub use summary::*;
pub use timestamp::*;

/// Phrase every bot-authored summary carries. Messages containing it are
/// never read back as orders.
pub const SUMMARY_MARKER: &str = "订餐汇总";

//! # Shelfwatch Stock
//! The stock state machine: diffs catalog snapshots against last-known
//! availability and emits change events.

pub mod tracker;

pub use tracker::{StockRecord, StockTracker};

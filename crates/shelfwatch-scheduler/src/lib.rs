//! # Shelfwatch Scheduler
//! Drives the poll-and-notify cycle: periodic, strictly sequential cycles
//! plus independently rate-limited on-demand checks.

pub mod engine;

pub use engine::{PollEngine, run_poll_loop};

//! Deadline digest: fetch, filter, sort and render upcoming assignments.

pub mod aggregator;
pub mod format;

pub use aggregator::{DeadlineAggregator, DeadlineEntry, DigestOutcome, TokenStatus};
pub use format::TimeRemaining;

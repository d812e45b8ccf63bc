//! Export CloudWatch Logs Insights results over arbitrary time spans.
//!
//! The time range is split into day-long windows that are queried
//! concurrently; any window exceeding the service's per-query result cap is
//! bisected and queried again until every window fits.

pub mod cli;
pub mod config;
pub mod output;
pub mod scheduler;
pub mod service;

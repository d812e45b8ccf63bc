pub mod ledger;
pub mod runner;
pub mod window;

pub use ledger::{LedgerSnapshot, TaskLedger};
pub use runner::{run_scheduler, PollTask, RunSummary, SchedulerError, SubmissionTask};
pub use window::{partition, TimeWindow, DAY_IN_SECONDS, MIN_SPLIT_WIDTH};

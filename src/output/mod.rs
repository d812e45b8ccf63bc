pub mod aggregator;
pub mod dedup;
pub mod writer;

pub use aggregator::{AggregatedOutput, DateBucket, ResultAggregator};
pub use dedup::{dedup_file, DedupError, DedupReport};
pub use writer::{write_output, OutputError};

pub mod cloudwatch;
pub mod traits;

pub use cloudwatch::CloudWatchService;
pub use traits::{
    PollOutcome, QueryHandle, QueryId, QueryService, QueryStatus, ResultField, ResultRecord,
    ServiceError, ServiceErrorKind, RESULT_LIMIT,
};

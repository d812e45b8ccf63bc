use crate::scheduler::window::TimeWindow;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Per-query result cap enforced by the log-query service.
pub const RESULT_LIMIT: u64 = 10_000;

/// Remote log-query service the scheduler drives.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Submit the configured query over `window`.
    async fn start_query(&self, window: &TimeWindow) -> Result<QueryId, ServiceError>;

    /// Fetch the current status and, once finished, the results of a query.
    async fn poll_query(&self, query_id: &QueryId) -> Result<PollOutcome, ServiceError>;
}

/// Opaque identifier the service hands out for a submitted query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryId(String);

impl QueryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A submitted query together with the window it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryHandle {
    pub query_id: QueryId,
    pub window: TimeWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Running,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub status: QueryStatus,
    pub records_matched: u64,
    pub records_scanned: u64,
    pub records: Vec<ResultRecord>,
}

impl PollOutcome {
    pub fn running() -> Self {
        Self {
            status: QueryStatus::Running,
            records_matched: 0,
            records_scanned: 0,
            records: Vec::new(),
        }
    }

    /// The query finished but its results cannot be used as-is.
    pub fn overflowed(&self, limit: u64) -> bool {
        self.status == QueryStatus::Failed || self.records_matched > limit
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultField {
    pub field: String,
    pub value: String,
}

impl ResultField {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// One log entry as returned by the service, fields in service order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRecord {
    pub fields: Vec<ResultField>,
}

impl ResultRecord {
    pub fn new(fields: Vec<ResultField>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.field == name)
            .map(|f| f.value.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResultRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(field, value)| ResultField::new(field, value))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    AuthFailure,
    ResourceNotFound,
    MalformedQuery,
    ConcurrencyLimitExceeded,
    Other,
}

impl ServiceErrorKind {
    /// What the user should do about it.
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::AuthFailure => {
                "authentication failed; configure AWS credentials (aws configure, or AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY)"
            }
            Self::ResourceNotFound => {
                "log group not found; check query.log_group_name and query.region"
            }
            Self::MalformedQuery => "query rejected by the service; check query.log_query",
            Self::ConcurrencyLimitExceeded => {
                "too many concurrent queries on this account; lower scheduler.max_concurrent_queries"
            }
            Self::Other => "unexpected service error",
        }
    }
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.remediation())
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_on_matched_count() {
        let mut outcome = PollOutcome {
            status: QueryStatus::Complete,
            records_matched: RESULT_LIMIT,
            records_scanned: 0,
            records: vec![],
        };
        assert!(!outcome.overflowed(RESULT_LIMIT));

        outcome.records_matched = RESULT_LIMIT + 1;
        assert!(outcome.overflowed(RESULT_LIMIT));
    }

    #[test]
    fn test_failed_status_counts_as_overflow() {
        let outcome = PollOutcome {
            status: QueryStatus::Failed,
            ..PollOutcome::running()
        };
        assert!(outcome.overflowed(RESULT_LIMIT));
    }

    #[test]
    fn test_record_lookup() {
        let record: ResultRecord = [("@timestamp", "2024-01-01 00:00:00.000"), ("@ptr", "abc")]
            .into_iter()
            .collect();
        assert_eq!(record.get("@ptr"), Some("abc"));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn test_error_message_includes_remediation() {
        let err = ServiceError::new(ServiceErrorKind::ResourceNotFound, "no such group");
        let text = err.to_string();
        assert!(text.contains("log_group_name"));
        assert!(text.contains("no such group"));
    }
}

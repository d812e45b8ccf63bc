use super::traits::{
    PollOutcome, QueryId, QueryService, QueryStatus, ResultField, ResultRecord, ServiceError,
    ServiceErrorKind, RESULT_LIMIT,
};
use crate::config::types::QueryConfig;
use crate::scheduler::window::TimeWindow;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudwatchlogs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudwatchlogs::types::QueryStatus as CwQueryStatus;
use aws_sdk_cloudwatchlogs::Client;
use std::fmt::Debug;
use tracing::debug;

/// CloudWatch Logs Insights client bound to one log group and query string.
#[derive(Debug, Clone)]
pub struct CloudWatchService {
    client: Client,
    log_group_name: String,
    query_string: String,
}

impl CloudWatchService {
    /// Build a client from the default AWS credential chain for the configured region.
    pub async fn connect(config: &QueryConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        Self::with_client(
            Client::new(&sdk_config),
            config.log_group_name.clone(),
            config.log_query.clone(),
        )
    }

    pub fn with_client(client: Client, log_group_name: String, query_string: String) -> Self {
        Self {
            client,
            log_group_name,
            query_string,
        }
    }
}

#[async_trait]
impl QueryService for CloudWatchService {
    async fn start_query(&self, window: &TimeWindow) -> Result<QueryId, ServiceError> {
        let output = self
            .client
            .start_query()
            .log_group_name(&self.log_group_name)
            .query_string(&self.query_string)
            .start_time(window.start)
            .end_time(window.last_second())
            .limit(RESULT_LIMIT as i32)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        let query_id = output.query_id().ok_or_else(|| {
            ServiceError::new(ServiceErrorKind::Other, "StartQuery returned no query id")
        })?;

        debug!(query_id = %query_id, window = %window, "Started CloudWatch query");
        Ok(QueryId::new(query_id))
    }

    async fn poll_query(&self, query_id: &QueryId) -> Result<PollOutcome, ServiceError> {
        let output = self
            .client
            .get_query_results()
            .query_id(query_id.as_str())
            .send()
            .await
            .map_err(classify_sdk_error)?;

        let status = match output.status() {
            Some(CwQueryStatus::Complete) => QueryStatus::Complete,
            Some(CwQueryStatus::Failed)
            | Some(CwQueryStatus::Cancelled)
            | Some(CwQueryStatus::Timeout) => QueryStatus::Failed,
            _ => QueryStatus::Running,
        };

        if status == QueryStatus::Running {
            return Ok(PollOutcome::running());
        }

        let (records_matched, records_scanned) = output
            .statistics()
            .map(|stats| (stats.records_matched() as u64, stats.records_scanned() as u64))
            .unwrap_or_default();

        let records = output
            .results()
            .iter()
            .map(|row| {
                ResultRecord::new(
                    row.iter()
                        .map(|f| {
                            ResultField::new(
                                f.field().unwrap_or_default(),
                                f.value().unwrap_or_default(),
                            )
                        })
                        .collect(),
                )
            })
            .collect();

        Ok(PollOutcome {
            status,
            records_matched,
            records_scanned,
            records,
        })
    }
}

fn classify_sdk_error<E, R>(err: SdkError<E, R>) -> ServiceError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    let kind = match err.as_service_error() {
        Some(service_err) => kind_from_code(service_err.code()),
        None if message.to_lowercase().contains("credential") => ServiceErrorKind::AuthFailure,
        None => ServiceErrorKind::Other,
    };
    ServiceError::new(kind, message)
}

fn kind_from_code(code: Option<&str>) -> ServiceErrorKind {
    match code {
        Some("ResourceNotFoundException") => ServiceErrorKind::ResourceNotFound,
        Some("MalformedQueryException") => ServiceErrorKind::MalformedQuery,
        Some("LimitExceededException") => ServiceErrorKind::ConcurrencyLimitExceeded,
        Some(
            "UnrecognizedClientException"
            | "AccessDeniedException"
            | "ExpiredTokenException"
            | "InvalidSignatureException",
        ) => ServiceErrorKind::AuthFailure,
        _ => ServiceErrorKind::Other,
    }
}

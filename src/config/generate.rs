pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# LOGSPAN CONFIGURATION
# =============================================================================
# Exports CloudWatch Logs Insights results over an arbitrary time span into a
# single CSV file. The span is queried one day at a time; any window matching
# more than 10000 records is split in half and queried again.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ./logspan.yml
#   3. ~/.config/logspan/config.yml
#   4. /etc/logspan/config.yml
#
# AWS credentials are taken from the default credential chain (environment,
# ~/.aws/credentials, instance profile, ...).

# =============================================================================
# QUERY (required)
# =============================================================================
query:
  # UTC, yyyy-mm-ddThh:mm:ss. The end time itself is not included.
  start_time: "2024-01-01T00:00:00"
  end_time: "2024-01-08T00:00:00"
  log_group_name: /aws/lambda/my-function
  # Logs Insights query. Do not add a `| limit` command: each window already
  # returns up to 10000 records and overflowing windows are split.
  log_query: "fields @timestamp, @message, @requestId"
  region: us-east-1

# =============================================================================
# SCHEDULER (optional)
# =============================================================================
scheduler:
  # Queries submitted and not yet finished at any one time
  max_concurrent_queries: 8
  # Delay before re-polling a query that is still running
  poll_interval: 500ms
  # Give up on a query after this many polls; omit to wait forever
  # max_poll_attempts: 1200
  # How often progress is logged
  progress_interval: 1s

# =============================================================================
# OUTPUT (optional)
# =============================================================================
output:
  # Directory receiving <timestamp>-cloudwatch-output.csv
  directory: .
  # When set, also write <name>-sorted.csv keeping only the latest row for
  # each value of this column (matched case-insensitively)
  # filter_column_name: "@requestId"
"#
    .to_string()
}

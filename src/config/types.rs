use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Timestamp layout accepted for `query.start_time` / `query.end_time` (UTC).
pub const INPUT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub query: QueryConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// What to fetch. Empty fields are reported by validation, not by the parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub log_group_name: String,
    #[serde(default)]
    pub log_query: String,
    #[serde(default)]
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Ceiling on queries submitted and not yet finished
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,
    /// Delay before re-polling a running query
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Abort once a single query has been polled this many times; unbounded if unset
    #[serde(default)]
    pub max_poll_attempts: Option<u32>,
    #[serde(default = "default_progress_interval", with = "humantime_serde")]
    pub progress_interval: Duration,
}

fn default_max_concurrent_queries() -> usize {
    8
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_progress_interval() -> Duration {
    Duration::from_secs(1)
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_queries: default_max_concurrent_queries(),
            poll_interval: default_poll_interval(),
            max_poll_attempts: None,
            progress_interval: default_progress_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
    /// Column whose repeated values are collapsed by the dedup pass
    #[serde(default)]
    pub filter_column_name: Option<String>,
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            filter_column_name: None,
        }
    }
}

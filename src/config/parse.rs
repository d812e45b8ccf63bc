use super::types::*;
use crate::config::expand_tilde;
use crate::scheduler::window::TimeWindow;
use chrono::NaiveDateTime;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut config = parse_config(&yaml_string)?;
    config.output.directory = expand_tilde(&config.output.directory);
    Ok(config)
}

/// Parse and validate a config from YAML text.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(yaml)?;
    validate_config(&config)?;
    Ok(config)
}

impl QueryConfig {
    /// The configured span as epoch seconds.
    pub fn time_range(&self) -> Result<TimeWindow, ConfigError> {
        let start = parse_input_time("start_time", &self.start_time)?;
        let end = parse_input_time("end_time", &self.end_time)?;
        TimeWindow::new(start, end).ok_or_else(|| {
            ConfigError::Validation("query.start_time must be earlier than query.end_time".to_string())
        })
    }
}

fn parse_input_time(name: &str, value: &str) -> Result<i64, ConfigError> {
    NaiveDateTime::parse_from_str(value.trim(), INPUT_TIME_FORMAT)
        .map(|ts| ts.and_utc().timestamp())
        .map_err(|e| {
            ConfigError::Validation(format!(
                "query.{}: invalid time '{}' ({}); use yyyy-mm-ddThh:mm:ss",
                name, value, e
            ))
        })
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_query(&config.query, &mut errors);

    if config.scheduler.max_concurrent_queries == 0 {
        errors.push("scheduler.max_concurrent_queries must be at least 1".to_string());
    }
    if config.scheduler.poll_interval.is_zero() {
        errors.push("scheduler.poll_interval must be greater than zero".to_string());
    }
    if config.scheduler.progress_interval.is_zero() {
        errors.push("scheduler.progress_interval must be greater than zero".to_string());
    }
    if config.scheduler.max_poll_attempts == Some(0) {
        errors.push("scheduler.max_poll_attempts must be at least 1 when set".to_string());
    }
    if let Some(column) = &config.output.filter_column_name {
        if column.trim().is_empty() {
            errors.push("output.filter_column_name cannot be empty when set".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_query(query: &QueryConfig, errors: &mut Vec<String>) {
    let required = [
        ("start_time", &query.start_time),
        ("end_time", &query.end_time),
        ("log_group_name", &query.log_group_name),
        ("log_query", &query.log_query),
        ("region", &query.region),
    ];
    let mut missing = false;
    for (name, value) in required {
        if value.trim().is_empty() {
            errors.push(format!("query.{} cannot be empty", name));
            missing = true;
        }
    }

    if !query.log_query.is_empty() && contains_limit_clause(&query.log_query) {
        errors.push(
            "query.log_query must not contain a limit clause; results are fetched in windows of at most 10000 records"
                .to_string(),
        );
    }

    if !missing {
        if let Err(e) = query.time_range() {
            errors.push(e.to_string().trim_start_matches("validation failed: ").to_string());
        }
    }
}

/// Whether the query caps its own result count with a `limit` command.
fn limit_clause_regex() -> &'static Regex {
    static LIMIT_CLAUSE: OnceLock<Regex> = OnceLock::new();
    LIMIT_CLAUSE.get_or_init(|| Regex::new(r"(?i)(^|\|)\s*limit\b").expect("limit clause pattern is valid"))
}

fn contains_limit_clause(query: &str) -> bool {
    limit_clause_regex().is_match(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const VALID: &str = r#"
query:
  start_time: "2024-01-01T00:00:00"
  end_time: "2024-01-02T01:00:00"
  log_group_name: /aws/lambda/orders
  log_query: "fields @timestamp, @message | sort @timestamp desc"
  region: us-east-1
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config(VALID).unwrap();

        assert_eq!(config.scheduler.max_concurrent_queries, 8);
        assert_eq!(config.scheduler.poll_interval, Duration::from_millis(500));
        assert_eq!(config.scheduler.max_poll_attempts, None);
        assert_eq!(config.output.directory, std::path::PathBuf::from("."));
        assert!(config.output.filter_column_name.is_none());
    }

    #[test]
    fn test_time_range() {
        let config = parse_config(VALID).unwrap();
        let range = config.query.time_range().unwrap();

        assert_eq!(range.start, 1_704_067_200);
        assert_eq!(range.width(), 25 * 3600);
    }

    #[test]
    fn test_scheduler_overrides() {
        let yaml = format!(
            "{}\nscheduler:\n  max_concurrent_queries: 4\n  poll_interval: 2s\n  max_poll_attempts: 100\noutput:\n  filter_column_name: requestId\n",
            VALID
        );
        let config = parse_config(&yaml).unwrap();

        assert_eq!(config.scheduler.max_concurrent_queries, 4);
        assert_eq!(config.scheduler.poll_interval, Duration::from_secs(2));
        assert_eq!(config.scheduler.max_poll_attempts, Some(100));
        assert_eq!(config.output.filter_column_name.as_deref(), Some("requestId"));
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let err = parse_config("query:\n  region: us-east-1\n").unwrap_err();
        let ConfigError::ValidationList(errors) = err else {
            panic!("expected validation list, got {err}");
        };

        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("start_time")));
        assert!(errors.iter().any(|e| e.contains("log_group_name")));
    }

    #[test]
    fn test_end_before_start_rejected() {
        let yaml = VALID.replace("2024-01-02T01:00:00", "2023-12-31T00:00:00");
        let err = parse_config(&yaml).unwrap_err();
        assert!(err.to_string().contains("earlier than"));
    }

    #[test]
    fn test_equal_times_rejected() {
        let yaml = VALID.replace("2024-01-02T01:00:00", "2024-01-01T00:00:00");
        assert!(parse_config(&yaml).is_err());
    }

    #[test]
    fn test_bad_time_format_rejected() {
        let yaml = VALID.replace("2024-01-01T00:00:00", "01/01/2024");
        let err = parse_config(&yaml).unwrap_err();
        assert!(err.to_string().contains("yyyy-mm-ddThh:mm:ss"));
    }

    #[test]
    fn test_limit_clause_rejected() {
        let yaml = VALID.replace("| sort @timestamp desc", "| sort @timestamp desc | LIMIT 50");
        let err = parse_config(&yaml).unwrap_err();
        assert!(err.to_string().contains("limit clause"));
    }

    #[test]
    fn test_limit_inside_field_name_allowed() {
        assert!(!contains_limit_clause("fields rate_limited, @message"));
        assert!(contains_limit_clause("limit 10"));
        assert!(contains_limit_clause("fields @message |limit 10"));
    }

    #[test]
    fn test_limit_clause_regex_compiled_once() {
        assert!(std::ptr::eq(limit_clause_regex(), limit_clause_regex()));
        assert!(contains_limit_clause("fields @message\n| Limit 5"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let yaml = format!("{}\nscheduler:\n  max_concurrent_queries: 0\n", VALID);
        assert!(parse_config(&yaml).is_err());
    }
}

use crate::service::ResultRecord;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Synthetic field the service attaches to every record; never exported.
pub const POINTER_FIELD: &str = "@ptr";
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// Accumulated CSV rows for one calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateBucket {
    /// `YYYY-MM-DD`
    pub date: String,
    pub rows: String,
}

/// Everything collected over a run, buckets in date order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedOutput {
    /// Comma-joined field names, without trailing newline
    pub header: Option<String>,
    pub buckets: Vec<DateBucket>,
}

impl AggregatedOutput {
    pub fn row_count(&self) -> usize {
        self.buckets.iter().map(|b| b.rows.lines().count()).sum()
    }
}

#[derive(Default)]
struct AggregatorState {
    header: Option<String>,
    buckets: HashMap<String, String>,
}

/// Thread-safe map from date to CSV rows, shared by all polling handlers.
#[derive(Default)]
pub struct ResultAggregator {
    state: Mutex<AggregatorState>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a batch of records to CSV rows and append them to their buckets.
    ///
    /// The whole batch is merged under one lock acquisition. Returns the number
    /// of rows added.
    pub fn merge(&self, records: &[ResultRecord]) -> usize {
        if records.is_empty() {
            return 0;
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.header.is_none() {
            state.header = Some(header_line(&records[0]));
        }

        for record in records {
            let date = date_key(record);
            let row = csv_row(record);
            let bucket = state.buckets.entry(date.to_string()).or_default();
            bucket.push_str(&row);
            bucket.push('\n');
        }

        debug!(rows = records.len(), dates = state.buckets.len(), "Merged query results");
        records.len()
    }

    pub fn header(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .header
            .clone()
    }

    /// Take the accumulated buckets, sorted by date, leaving the aggregator empty.
    pub fn drain(&self) -> AggregatedOutput {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut buckets: Vec<DateBucket> = std::mem::take(&mut state.buckets)
            .into_iter()
            .map(|(date, rows)| DateBucket { date, rows })
            .collect();
        buckets.sort_by(|a, b| a.date.cmp(&b.date));

        AggregatedOutput {
            header: state.header.clone(),
            buckets,
        }
    }
}

fn exported_fields(record: &ResultRecord) -> impl Iterator<Item = &crate::service::ResultField> {
    record.fields.iter().filter(|f| f.field != POINTER_FIELD)
}

fn header_line(record: &ResultRecord) -> String {
    exported_fields(record)
        .map(|f| f.field.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn csv_row(record: &ResultRecord) -> String {
    exported_fields(record)
        .map(|f| f.value.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Date portion of `@timestamp` (`2024-01-01 12:00:00.000` -> `2024-01-01`).
fn date_key(record: &ResultRecord) -> &str {
    record
        .get(TIMESTAMP_FIELD)
        .and_then(|ts| ts.split([' ', 'T']).next())
        .unwrap_or_default()
}

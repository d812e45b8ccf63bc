//! Scripted in-memory stand-in for CloudWatch Logs Insights.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::DateTime;
use logspan::scheduler::TimeWindow;
use logspan::service::{
    PollOutcome, QueryId, QueryService, QueryStatus, ResultRecord, ServiceError, ServiceErrorKind,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

pub const BASE: i64 = 1_704_067_200; // 2024-01-01T00:00:00Z

struct PendingQuery {
    window: TimeWindow,
    polls: u32,
}

/// Answers every window with one record stamped at the window start.
///
/// Windows wider than `overflow_wider_than` report 15000 matches, and windows
/// wider than `fail_wider_than` report `Failed` with no matches. Each query
/// reports `Running` for `running_polls` polls before completing.
pub struct ScriptedService {
    pub overflow_wider_than: i64,
    pub running_polls: u32,
    pub fail_wider_than: i64,
    pub submit_error: Option<ServiceErrorKind>,
    pub poll_error: Option<ServiceErrorKind>,
    pub records_per_window: usize,
    next_id: AtomicU64,
    queries: Mutex<HashMap<QueryId, PendingQuery>>,
    submitted: Mutex<Vec<TimeWindow>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    polls: AtomicUsize,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self {
            overflow_wider_than: i64::MAX,
            running_polls: 0,
            fail_wider_than: i64::MAX,
            submit_error: None,
            poll_error: None,
            records_per_window: 1,
            next_id: AtomicU64::new(0),
            queries: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
        }
    }

    pub fn overflowing_above(mut self, width: i64) -> Self {
        self.overflow_wider_than = width;
        self
    }

    pub fn running_for(mut self, polls: u32) -> Self {
        self.running_polls = polls;
        self
    }

    pub fn failing_with(mut self, kind: ServiceErrorKind) -> Self {
        self.submit_error = Some(kind);
        self
    }

    pub fn failing_polls_with(mut self, kind: ServiceErrorKind) -> Self {
        self.poll_error = Some(kind);
        self
    }

    pub fn failed_above(mut self, width: i64) -> Self {
        self.fail_wider_than = width;
        self
    }

    pub fn submitted(&self) -> Vec<TimeWindow> {
        let mut windows = self.submitted.lock().unwrap().clone();
        windows.sort_by_key(|w| w.start);
        windows
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    fn records_for(&self, window: &TimeWindow) -> Vec<ResultRecord> {
        let timestamp = DateTime::from_timestamp(window.start, 0)
            .unwrap()
            .format("%Y-%m-%d %H:%M:%S%.3f")
            .to_string();
        (0..self.records_per_window)
            .map(|i| {
                [
                    ("@timestamp", timestamp.clone()),
                    ("@message", format!("{}-{}", window.start, i)),
                    ("@ptr", format!("ptr-{}", window.start)),
                ]
                .into_iter()
                .collect()
            })
            .collect()
    }
}

#[async_trait]
impl QueryService for ScriptedService {
    async fn start_query(&self, window: &TimeWindow) -> Result<QueryId, ServiceError> {
        if let Some(kind) = self.submit_error {
            return Err(ServiceError::new(kind, "scripted failure"));
        }

        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let id = QueryId::new(format!("q-{}", self.next_id.fetch_add(1, Ordering::SeqCst)));
        self.queries.lock().unwrap().insert(
            id.clone(),
            PendingQuery {
                window: *window,
                polls: 0,
            },
        );
        self.submitted.lock().unwrap().push(*window);
        tokio::task::yield_now().await;
        Ok(id)
    }

    async fn poll_query(&self, query_id: &QueryId) -> Result<PollOutcome, ServiceError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if let Some(kind) = self.poll_error {
            return Err(ServiceError::new(kind, "scripted poll failure"));
        }

        let window = {
            let mut queries = self.queries.lock().unwrap();
            let query = queries
                .get_mut(query_id)
                .ok_or_else(|| ServiceError::new(ServiceErrorKind::Other, "unknown query id"))?;
            query.polls += 1;
            if query.polls <= self.running_polls {
                return Ok(PollOutcome::running());
            }
            query.window
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if window.width() > self.fail_wider_than {
            return Ok(PollOutcome {
                status: QueryStatus::Failed,
                records_matched: 0,
                records_scanned: 0,
                records: Vec::new(),
            });
        }

        if window.width() > self.overflow_wider_than {
            return Ok(PollOutcome {
                status: QueryStatus::Complete,
                records_matched: 15_000,
                records_scanned: 20_000,
                records: Vec::new(),
            });
        }

        let records = self.records_for(&window);
        Ok(PollOutcome {
            status: QueryStatus::Complete,
            records_matched: records.len() as u64,
            records_scanned: 100,
            records,
        })
    }
}

use tokio::sync::watch;

/// Point-in-time view of the ledger counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    /// Windows handed to the submission queue, including bisection children
    pub issued: u64,
    /// Windows that delivered results or aborted the run
    pub completed: u64,
    /// Windows retired by bisection
    pub split: u64,
    /// Set once every initial window has been issued
    pub sealed: bool,
    pub records_matched: u64,
    pub records_scanned: u64,
}

impl LedgerSnapshot {
    pub fn outstanding(&self) -> u64 {
        self.issued - self.completed - self.split
    }

    /// All issued work, including windows spawned by bisection, has finished.
    ///
    /// Never true before the initial partition is sealed, so an empty ledger
    /// is not mistaken for a finished one.
    pub fn is_done(&self) -> bool {
        self.sealed && self.issued > 0 && self.outstanding() == 0
    }

    /// Percentage of issued work that has reached a terminal outcome.
    pub fn progress_percent(&self) -> f64 {
        if self.issued == 0 {
            return 0.0;
        }
        (self.completed + self.split) as f64 / self.issued as f64 * 100.0
    }
}

/// Tracks issued versus finished windows and gates scheduler termination.
pub struct TaskLedger {
    state: watch::Sender<LedgerSnapshot>,
}

impl TaskLedger {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LedgerSnapshot::default());
        Self { state }
    }

    /// Record `count` freshly issued windows.
    pub fn issue(&self, count: u64) {
        self.state.send_modify(|s| s.issued += count);
    }

    /// Mark the initial partition as fully enqueued.
    pub fn seal(&self) {
        self.state.send_modify(|s| s.sealed = true);
    }

    /// Retire one window by bisection and issue its two children.
    ///
    /// Both updates happen under one modification so observers never see the
    /// parent gone before its children exist.
    pub fn split(&self) {
        self.state.send_modify(|s| {
            s.split += 1;
            s.issued += 2;
        });
    }

    pub fn complete(&self) {
        self.state.send_modify(|s| {
            debug_assert!(s.completed + s.split < s.issued);
            s.completed += 1;
        });
    }

    /// Add the statistics reported for a results-delivered window.
    pub fn record_stats(&self, matched: u64, scanned: u64) {
        self.state.send_modify(|s| {
            s.records_matched += matched;
            s.records_scanned += scanned;
        });
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        *self.state.borrow()
    }

    /// Resolve once [`LedgerSnapshot::is_done`] holds.
    pub async fn wait_until_done(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(LedgerSnapshot::is_done).await;
    }
}

impl Default for TaskLedger {
    fn default() -> Self {
        Self::new()
    }
}

use chrono::DateTime;
use std::fmt;

/// Length of one initial partition window.
pub const DAY_IN_SECONDS: i64 = 24 * 60 * 60;

/// Windows narrower than this are never bisected.
pub const MIN_SPLIT_WIDTH: i64 = 5;

/// A half-open interval `[start, end)` of epoch seconds over which one query runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    /// Returns `None` unless `start < end`.
    pub fn new(start: i64, end: i64) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn width(&self) -> i64 {
        self.end - self.start
    }

    /// Last second covered by the window, for services taking inclusive ranges.
    pub fn last_second(&self) -> i64 {
        self.end - 1
    }

    /// Split the window into two contiguous halves.
    ///
    /// Returns `None` when the window is narrower than `min_width`; the caller
    /// has to treat that as unsplittable.
    pub fn bisect(&self, min_width: i64) -> Option<(TimeWindow, TimeWindow)> {
        let width = self.width();
        if width < min_width || width < 2 {
            return None;
        }

        let mid = self.start + width / 2;
        Some((
            TimeWindow {
                start: self.start,
                end: mid,
            },
            TimeWindow {
                start: mid,
                end: self.end,
            },
        ))
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = |secs: i64| match DateTime::from_timestamp(secs, 0) {
            Some(ts) => ts.format("%Y-%m-%dT%H:%M:%S").to_string(),
            None => secs.to_string(),
        };
        write!(f, "[{}, {})", format(self.start), format(self.end))
    }
}

/// Cut `range` into day-long windows plus a shorter trailing remainder.
pub fn partition(range: TimeWindow) -> Vec<TimeWindow> {
    let mut windows = Vec::with_capacity((range.width() / DAY_IN_SECONDS + 1) as usize);
    let mut cursor = range.start;

    while cursor < range.end {
        let end = cursor.saturating_add(DAY_IN_SECONDS).min(range.end);
        windows.push(TimeWindow { start: cursor, end });
        cursor = end;
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: i64 = 1_704_067_200; // 2024-01-01T00:00:00Z

    fn assert_covers(windows: &[TimeWindow], range: TimeWindow) {
        assert!(!windows.is_empty());
        assert_eq!(windows.first().unwrap().start, range.start);
        assert_eq!(windows.last().unwrap().end, range.end);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "windows must be contiguous");
        }
        for window in windows {
            assert!(window.start < window.end);
        }
    }

    #[test]
    fn test_new_rejects_empty_window() {
        assert!(TimeWindow::new(10, 10).is_none());
        assert!(TimeWindow::new(10, 5).is_none());
        assert!(TimeWindow::new(5, 10).is_some());
    }

    #[test]
    fn test_partition_exact_day() {
        let range = TimeWindow::new(BASE, BASE + DAY_IN_SECONDS).unwrap();
        let windows = partition(range);
        assert_eq!(windows, vec![range]);
    }

    #[test]
    fn test_partition_day_plus_hour() {
        let range = TimeWindow::new(BASE, BASE + 25 * 3600).unwrap();
        let windows = partition(range);

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].width(), DAY_IN_SECONDS);
        assert_eq!(windows[1].width(), 3600);
        assert_covers(&windows, range);
    }

    #[test]
    fn test_partition_shorter_than_a_day() {
        let range = TimeWindow::new(BASE, BASE + 90).unwrap();
        assert_eq!(partition(range), vec![range]);
    }

    #[test]
    fn test_partition_covers_arbitrary_spans() {
        for (offset, width) in [(0, 1), (17, 3 * DAY_IN_SECONDS), (3601, 7 * DAY_IN_SECONDS + 59)] {
            let range = TimeWindow::new(BASE + offset, BASE + offset + width).unwrap();
            let windows = partition(range);
            assert_covers(&windows, range);
            assert!(windows.iter().all(|w| w.width() <= DAY_IN_SECONDS));
        }
    }

    #[test]
    fn test_bisect_even_width() {
        let window = TimeWindow::new(BASE, BASE + 10_000).unwrap();
        let (left, right) = window.bisect(MIN_SPLIT_WIDTH).unwrap();

        assert_eq!(left, TimeWindow { start: BASE, end: BASE + 5_000 });
        assert_eq!(right, TimeWindow { start: BASE + 5_000, end: BASE + 10_000 });
    }

    #[test]
    fn test_bisect_odd_width_keeps_every_second() {
        let window = TimeWindow::new(BASE, BASE + 7).unwrap();
        let (left, right) = window.bisect(MIN_SPLIT_WIDTH).unwrap();

        assert_eq!(left.start, window.start);
        assert_eq!(left.end, right.start);
        assert_eq!(right.end, window.end);
        assert_eq!(left.width() + right.width(), 7);
    }

    #[test]
    fn test_bisect_minimum_width() {
        let window = TimeWindow::new(BASE, BASE + MIN_SPLIT_WIDTH).unwrap();
        assert!(window.bisect(MIN_SPLIT_WIDTH).is_some());

        let narrow = TimeWindow::new(BASE, BASE + 4).unwrap();
        assert!(narrow.bisect(MIN_SPLIT_WIDTH).is_none());
    }

    #[test]
    fn test_last_second_is_inclusive_end() {
        let window = TimeWindow::new(BASE, BASE + DAY_IN_SECONDS).unwrap();
        assert_eq!(window.last_second(), BASE + DAY_IN_SECONDS - 1);
    }

    #[test]
    fn test_display() {
        let window = TimeWindow::new(BASE, BASE + 3600).unwrap();
        assert_eq!(
            window.to_string(),
            "[2024-01-01T00:00:00, 2024-01-01T01:00:00)"
        );
    }
}

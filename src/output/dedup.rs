use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no records found in '{0}'")]
    NoRecords(PathBuf),

    #[error("filter column '{0}' is not present in the query output")]
    MissingColumn(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupReport {
    pub output_path: PathBuf,
    pub rows_kept: usize,
    pub duplicates_removed: usize,
}

struct DuplicateTracker {
    duplicates: usize,
    /// Index of the newest row seen for the key
    latest: usize,
}

/// Collapse rows sharing a `column` value down to the latest one.
///
/// Reads the CSV at `path` and writes the surviving rows, header first and in
/// their original order, to `<stem>-sorted.csv` next to it.
pub fn dedup_file(path: &Path, column: &str) -> Result<DedupReport, DedupError> {
    let contents = fs::read_to_string(path).map_err(|source| DedupError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut lines = contents.lines().filter(|l| !l.is_empty());
    let header = lines.next().ok_or_else(|| DedupError::NoRecords(path.to_path_buf()))?;
    let rows: Vec<&str> = lines.collect();
    if rows.is_empty() {
        return Err(DedupError::NoRecords(path.to_path_buf()));
    }

    let key_index = header
        .split(',')
        .position(|name| name.trim().eq_ignore_ascii_case(column.trim()))
        .ok_or_else(|| DedupError::MissingColumn(column.to_string()))?;

    let kept = dedup_rows(&rows, key_index);
    let duplicates_removed = rows.len() - kept.len();

    let output_path = sorted_path(path);
    let mut output = String::with_capacity(contents.len());
    output.push_str(header);
    output.push('\n');
    for row in &kept {
        output.push_str(row);
        output.push('\n');
    }
    fs::write(&output_path, output).map_err(|source| DedupError::Write {
        path: output_path.clone(),
        source,
    })?;

    info!(
        path = %output_path.display(),
        column = column,
        rows_kept = kept.len(),
        duplicates_removed = duplicates_removed,
        "Wrote filtered output"
    );

    Ok(DedupReport {
        output_path,
        rows_kept: kept.len(),
        duplicates_removed,
    })
}

/// Keep, for every key in column `key_index`, only its latest row.
///
/// Rows with identical keys and identical timestamps are true duplicates: the
/// first one seen is kept. Rows without the key column pass through untouched.
pub fn dedup_rows<'a>(rows: &[&'a str], key_index: usize) -> Vec<&'a str> {
    let mut trackers: HashMap<&str, DuplicateTracker> = HashMap::new();
    let mut removed = vec![false; rows.len()];

    for (index, row) in rows.iter().enumerate() {
        let Some(key) = row.split(',').nth(key_index) else {
            continue;
        };

        match trackers.get_mut(key) {
            None => {
                trackers.insert(
                    key,
                    DuplicateTracker {
                        duplicates: 0,
                        latest: index,
                    },
                );
            }
            Some(tracker) => {
                tracker.duplicates += 1;
                let current = row_timestamp(row);
                let latest = row_timestamp(rows[tracker.latest]);
                if current > latest {
                    tracker.latest = index;
                } else if current == latest {
                    removed[index] = true;
                }
            }
        }
    }

    rows.iter()
        .enumerate()
        .filter(|(index, row)| {
            if removed[*index] {
                return false;
            }
            match row.split(',').nth(key_index).and_then(|key| trackers.get(key)) {
                Some(tracker) if tracker.duplicates > 0 => tracker.latest == *index,
                _ => true,
            }
        })
        .map(|(_, row)| *row)
        .collect()
}

/// Parse the leading timestamp column (`2024-01-01 12:00:00.123`).
fn row_timestamp(row: &str) -> Option<NaiveDateTime> {
    let value = row.split(',').next().unwrap_or_default().trim();
    let parsed = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"));

    match parsed {
        Ok(ts) => Some(ts),
        Err(e) => {
            warn!(value = value, error = %e, "Unparseable row timestamp");
            None
        }
    }
}

fn sorted_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}-sorted.csv", stem))
}

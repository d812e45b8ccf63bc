use super::aggregator::{AggregatedOutput, ResultAggregator};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

const OUTPUT_SUFFIX: &str = "-cloudwatch-output.csv";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to create output file '{path}': {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write output file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Name of the output file for a run started at `now`.
pub fn output_file_name(now: DateTime<Utc>) -> String {
    format!("{}{}", now.format("%Y-%m-%dT%H-%M-%S"), OUTPUT_SUFFIX)
}

/// Drain the aggregator into a single CSV file inside `directory`.
///
/// Rows are written to a temporary sibling first and renamed into place, so
/// a failed run never leaves a partially written output file behind.
pub fn write_output(
    aggregator: &ResultAggregator,
    directory: &Path,
    now: DateTime<Utc>,
) -> Result<PathBuf, OutputError> {
    let output = aggregator.drain();
    let path = directory.join(output_file_name(now));

    if output.buckets.is_empty() {
        warn!("No records were returned for the requested time range");
    }

    write_csv(&output, &path)?;

    info!(
        path = %path.display(),
        dates = output.buckets.len(),
        rows = output.row_count(),
        "Wrote query output"
    );

    Ok(path)
}

/// Write the header once followed by each bucket's rows, in bucket order.
pub fn write_csv(output: &AggregatedOutput, path: &Path) -> Result<(), OutputError> {
    let partial = path.with_extension("csv.partial");

    let result = write_buckets(output, &partial).and_then(|()| {
        fs::rename(&partial, path).map_err(|source| OutputError::Write {
            path: path.to_path_buf(),
            source,
        })
    });

    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

fn write_buckets(output: &AggregatedOutput, path: &Path) -> Result<(), OutputError> {
    let file = File::create(path).map_err(|source| OutputError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    let write_err = |source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(header) = &output.header {
        writeln!(writer, "{}", header).map_err(write_err)?;
    }
    for bucket in &output.buckets {
        writer.write_all(bucket.rows.as_bytes()).map_err(write_err)?;
    }
    writer.flush().map_err(write_err)?;
    writer.get_ref().sync_all().map_err(write_err)?;

    Ok(())
}

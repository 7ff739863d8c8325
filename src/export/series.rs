use std::fs;
use std::fs::OpenOptions;
use std::path::Path;

use chrono::{DateTime, FixedOffset};
use csv::WriterBuilder;

use crate::config::ColumnSpec;
use crate::error::{Error, Result};
use crate::models::{Feature, FeatureState};

/// The only columns a time-series profile may request.
pub const SERIES_ATTRS: &[&str] = &[
    "date",
    "time",
    "num_iss_all",
    "num_iss_open",
    "num_iss_closed",
];

/// One snapshot of issue counts at invocation time. Rows are appended
/// to the series file and never rewritten; two invocations within the
/// same second simply produce two rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRow {
    pub date: String,
    pub time: String,
    pub num_iss_all: usize,
    pub num_iss_open: usize,
    pub num_iss_closed: usize,
}

impl SeriesRow {
    fn value(&self, attr: &str) -> Option<String> {
        match attr {
            "date" => Some(self.date.clone()),
            "time" => Some(self.time.clone()),
            "num_iss_all" => Some(self.num_iss_all.to_string()),
            "num_iss_open" => Some(self.num_iss_open.to_string()),
            "num_iss_closed" => Some(self.num_iss_closed.to_string()),
            _ => None,
        }
    }
}

/// Count all/open/closed over the fresh, unfiltered fetch and stamp
/// with the invocation time in the profile's offset.
pub fn aggregate(records: &[Feature], now: DateTime<FixedOffset>) -> SeriesRow {
    let num_iss_open = records
        .iter()
        .filter(|r| r.state == FeatureState::Open)
        .count();
    let num_iss_closed = records
        .iter()
        .filter(|r| r.state == FeatureState::Closed)
        .count();
    SeriesRow {
        date: now.format("%Y/%m/%d").to_string(),
        time: now.format("%H:%M:%S").to_string(),
        num_iss_all: records.len(),
        num_iss_open,
        num_iss_closed,
    }
}

pub fn validate_columns(cols: &[ColumnSpec]) -> Result<()> {
    for col in cols {
        if !SERIES_ATTRS.contains(&col.attr.as_str()) {
            return Err(Error::Config(format!(
                "time-series output column [{}] is not allowed; expected one of: {}",
                col.attr,
                SERIES_ATTRS.join(", ")
            )));
        }
    }
    Ok(())
}

/// Append one row, creating the file with a header when it is absent or
/// empty. The append is the unit of durability: an interrupted run
/// loses at most the in-flight row, never history.
pub fn append_row(path: &Path, cols: &[ColumnSpec], row: &SeriesRow) -> Result<()> {
    validate_columns(cols)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    if needs_header {
        writer.write_record(cols.iter().map(|c| c.header.as_str()))?;
    }
    writer.write_record(
        cols.iter()
            .map(|c| row.value(&c.attr).unwrap_or_default()),
    )?;
    writer.flush()?;
    tracing::info!("[{}] appended", path.display());
    Ok(())
}

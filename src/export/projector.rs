use chrono::FixedOffset;

use crate::config::ColumnSpec;
use crate::error::{Error, Result};
use crate::models::feature::FEATURE_ATTRS;
use crate::models::Feature;

/// Header plus rows, ready for the CSV writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Map each record to one row per the column spec. Column order is the
/// declared order; headers honor the optional rename. Unknown attribute
/// names are rejected up front rather than producing empty columns.
pub fn project(records: &[Feature], cols: &[ColumnSpec], tz: &FixedOffset) -> Result<Table> {
    for col in cols {
        if !FEATURE_ATTRS.contains(&col.attr.as_str()) {
            return Err(Error::Config(format!(
                "unknown output column attribute [{}]; expected one of: {}",
                col.attr,
                FEATURE_ATTRS.join(", ")
            )));
        }
    }

    let header: Vec<String> = cols.iter().map(|c| c.header.clone()).collect();
    let rows = records
        .iter()
        .map(|record| {
            cols.iter()
                .map(|col| record.attr(&col.attr, tz).unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(Table { header, rows })
}

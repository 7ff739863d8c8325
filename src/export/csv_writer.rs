use std::fs;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;

use crate::config::Profile;
use crate::error::Result;
use crate::export::projector::Table;

/// Output file path for a profile: `out_path/<comps joined by _>.csv`,
/// each component being a profile field named in `out_bname_comps`.
pub fn output_path(profile: &Profile) -> Result<PathBuf> {
    let comps = profile
        .io
        .out_bname_comps
        .iter()
        .map(|c| profile.bname_component(c))
        .collect::<Result<Vec<_>>>()?;
    let bname = comps.join("_");
    Ok(profile.io.out_path.join(format!("{}.csv", bname)))
}

/// Serialize a projected table, creating the output directory on demand.
pub fn write_table(path: &Path, table: &Table) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(&table.header)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    tracing::info!("[{}] generated", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnSpec, FeatureKind, IoSpec, Profile};
    use tempfile::tempdir;

    fn profile(out_path: PathBuf, comps: &[&str]) -> Profile {
        Profile {
            flag: "beamline".to_string(),
            owner: "acme".to_string(),
            repo: "dcps".to_string(),
            is_private: false,
            token: None,
            feature: FeatureKind::Issues,
            is_time_series: false,
            filters: None,
            io: IoSpec {
                out_path,
                out_cols: vec![ColumnSpec::parse("number").unwrap()],
                out_bname_comps: comps.iter().map(|s| s.to_string()).collect(),
                out_utc: 0,
            },
        }
    }

    #[test]
    fn path_joins_bname_components() {
        let p = profile(PathBuf::from("out"), &["repo", "feature"]);
        assert_eq!(output_path(&p).unwrap(), PathBuf::from("out/dcps_issues.csv"));
    }

    #[test]
    fn unknown_bname_component_is_config_error() {
        let p = profile(PathBuf::from("out"), &["branch"]);
        assert!(output_path(&p).is_err());
    }

    #[test]
    fn writes_header_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let table = Table {
            header: vec!["No.".to_string(), "title".to_string()],
            rows: vec![vec!["1".to_string(), "a, quoted".to_string()]],
        };
        write_table(&path, &table).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "No.,title\n1,\"a, quoted\"\n");
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::config::{Profile, RawConfig};
use crate::error::{Error, Result};
use crate::export::{csv_writer, projector, series};
use crate::filter;
use crate::github::FeatureSource;

/// Runs profiles one at a time: fetch, then either the filter/project
/// path or the time-series path, then write. A failing profile logs a
/// diagnostic block and never aborts its siblings.
pub struct Pipeline {
    source: Arc<dyn FeatureSource>,
}

impl Pipeline {
    pub fn new(source: impl FeatureSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    pub async fn run_all(&self, cfg: &RawConfig) {
        if cfg.run.active_repos.is_empty() {
            tracing::warn!("run.active_repos is empty; nothing to do");
            return;
        }
        for flag in &cfg.run.active_repos {
            match cfg.resolve(flag) {
                Ok(Some(profile)) => {
                    if let Err(e) = self.run_profile(&profile).await {
                        report_failure(&profile, &e);
                    }
                }
                Ok(None) => {
                    tracing::warn!("active repo [{}] has no profile section; skipping", flag);
                }
                Err(e) => {
                    tracing::error!("profile [{}] configuration rejected: {}", flag, e);
                }
            }
        }
    }

    pub async fn run_profile(&self, profile: &Profile) -> Result<PathBuf> {
        let records = self.source.list_features(profile).await?;
        tracing::info!(
            "Fetched {} records for {}/{}",
            records.len(),
            profile.owner,
            profile.repo
        );

        let out_path = csv_writer::output_path(profile)?;
        if profile.is_time_series {
            let now = Utc::now().with_timezone(&profile.io.tz());
            let row = series::aggregate(&records, now);
            series::append_row(&out_path, &profile.io.out_cols, &row)?;
        } else {
            let records = match &profile.filters {
                Some(filters) => filter::apply(records, filters)?,
                None => records,
            };
            let table = projector::project(&records, &profile.io.out_cols, &profile.io.tz())?;
            csv_writer::write_table(&out_path, &table)?;
        }
        Ok(out_path)
    }
}

fn report_failure(profile: &Profile, error: &Error) {
    tracing::error!("profile [{}] failed: {}", profile.flag, error);
    if let Error::Fetch { owner, repo, url, .. } = error {
        tracing::error!("Access to [{}] failed. Check the following items:", url);
        tracing::error!("- owner: [{}]", owner);
        tracing::error!("- repo: [{}]", repo);
        tracing::error!("- token (if is_repo_private: true)");
    }
}

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::FeatureState;

/// Top-level YAML document: a `run` section plus one section per profile,
/// keyed by the profile's flag.
#[derive(Debug, Deserialize)]
pub struct RawConfig {
    pub run: RunSection,
    #[serde(flatten)]
    pub profiles: HashMap<String, RawProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    #[serde(default)]
    pub active_repos: Vec<String>,
    #[serde(default)]
    pub io: IoSection,
    pub schedule: Option<ScheduleSpec>,
}

/// One `io` block, either run-level defaults or a per-profile override.
/// Every key is optional; resolution merges profile keys over run keys.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IoSection {
    pub out_path: Option<String>,
    pub out_cols: Option<Vec<String>>,
    pub out_bname_comps: Option<Vec<String>>,
    pub out_utc: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct RawProfile {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub is_repo_private: bool,
    pub token: Option<String>,
    #[serde(default)]
    pub feature: FeatureKind,
    #[serde(default)]
    pub is_time_series: bool,
    pub filters: Option<RawFilters>,
    #[serde(default)]
    pub io: IoSection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    #[default]
    Issues,
    Pulls,
}

impl FeatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Issues => "issues",
            FeatureKind::Pulls => "pulls",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawFilters {
    pub state: FeatureState,
    pub numbers: Option<Vec<Directive>>,
    pub labels: Option<Vec<String>>,
    pub strings: Option<Vec<String>>,
}

/// YAML lets number directives appear as bare integers or as strings
/// (ranges like `"4-5"` must be quoted).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Directive {
    Num(u64),
    Text(String),
}

impl Directive {
    fn as_text(&self) -> String {
        match self {
            Directive::Num(n) => n.to_string(),
            Directive::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSpec {
    pub toggle: bool,
    pub every: ScheduleUnit,
    #[serde(default = "default_interval")]
    pub interval: u64,
    pub at: Option<String>,
}

fn default_interval() -> u64 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleUnit {
    #[serde(alias = "second")]
    Seconds,
    #[serde(alias = "minute")]
    Minutes,
    #[serde(alias = "hour")]
    Hours,
    #[serde(alias = "day")]
    Days,
}

impl ScheduleUnit {
    pub fn seconds(&self) -> u64 {
        match self {
            ScheduleUnit::Seconds => 1,
            ScheduleUnit::Minutes => 60,
            ScheduleUnit::Hours => 3600,
            ScheduleUnit::Days => 86400,
        }
    }
}

/// A fully resolved, immutable profile: io inheritance applied, filter
/// tokens parsed, token indirection expanded. This is the value every
/// pipeline stage receives.
#[derive(Debug, Clone)]
pub struct Profile {
    pub flag: String,
    pub owner: String,
    pub repo: String,
    pub is_private: bool,
    pub token: Option<String>,
    pub feature: FeatureKind,
    pub is_time_series: bool,
    pub filters: Option<FilterSpec>,
    pub io: IoSpec,
}

impl Profile {
    /// Output base-name component lookup for `out_bname_comps`.
    pub fn bname_component(&self, name: &str) -> Result<&str> {
        match name {
            "flag" => Ok(&self.flag),
            "owner" => Ok(&self.owner),
            "repo" => Ok(&self.repo),
            "feature" => Ok(self.feature.as_str()),
            other => Err(Error::Config(format!(
                "unknown out_bname_comps entry [{}] in profile [{}]",
                other, self.flag
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IoSpec {
    pub out_path: PathBuf,
    pub out_cols: Vec<ColumnSpec>,
    pub out_bname_comps: Vec<String>,
    pub out_utc: i32,
}

impl IoSpec {
    pub fn tz(&self) -> FixedOffset {
        // out_utc is validated to a sane hour range at resolve time.
        FixedOffset::east_opt(self.out_utc * 3600).unwrap_or_else(|| {
            FixedOffset::east_opt(0).expect("zero offset is always valid")
        })
    }
}

/// One output column: the record attribute to read and the header to
/// print for it. `attr;Header` in YAML renames the column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub attr: String,
    pub header: String,
}

impl ColumnSpec {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(2, ';');
        let attr = parts.next().unwrap_or_default().trim();
        if attr.is_empty() {
            return Err(Error::Validation(format!(
                "empty attribute in out_cols entry [{}]",
                raw
            )));
        }
        let header = match parts.next() {
            Some(h) if !h.trim().is_empty() => h.trim(),
            _ => attr,
        };
        Ok(Self {
            attr: attr.to_string(),
            header: header.to_string(),
        })
    }
}

/// Parsed filter directives, applied in declared order: state, numbers,
/// labels, strings. An absent section means that stage is skipped.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    pub state: FeatureState,
    pub numbers: Option<Vec<NumberToken>>,
    pub labels: Option<Vec<SignedToken>>,
    pub strings: Option<Vec<SignedToken>>,
}

impl FilterSpec {
    /// True when the numbers directive passes every record through,
    /// i.e. it contains the literal `all` token.
    pub fn numbers_resolve_to_all(&self) -> bool {
        self.numbers
            .as_ref()
            .is_some_and(|ts| ts.iter().any(|t| matches!(t, NumberToken::All)))
    }

    /// The strings filter must not ride on an `all` numbers directive.
    /// Checked before any fetch or filtering work.
    pub fn validate(&self) -> Result<()> {
        let strings_active = self.strings.as_ref().is_some_and(|ts| !ts.is_empty());
        if strings_active && self.numbers_resolve_to_all() {
            return Err(Error::Config(
                "a strings filter cannot be combined with numbers: [all]; \
                 narrow the numbers directive or drop the strings filter"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// A numbers directive token: `all`, a single issue number, or an
/// inclusive `lo-hi` range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumberToken {
    All,
    Single(u64),
    Range(u64, u64),
}

impl NumberToken {
    pub fn parse(raw: &str) -> Result<Self> {
        let s = raw.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(NumberToken::All);
        }
        if let Ok(n) = s.parse::<u64>() {
            return Ok(NumberToken::Single(n));
        }
        if let Some((lo, hi)) = s.split_once('-') {
            let lo: u64 = lo.trim().parse().map_err(|_| malformed_number(raw))?;
            let hi: u64 = hi.trim().parse().map_err(|_| malformed_number(raw))?;
            if lo > hi {
                return Err(Error::Validation(format!(
                    "descending range [{}]: expected lo-hi with lo <= hi",
                    raw
                )));
            }
            return Ok(NumberToken::Range(lo, hi));
        }
        Err(malformed_number(raw))
    }

    pub fn matches(&self, number: u64) -> bool {
        match self {
            NumberToken::All => true,
            NumberToken::Single(n) => number == *n,
            NumberToken::Range(lo, hi) => (*lo..=*hi).contains(&number),
        }
    }
}

fn malformed_number(raw: &str) -> Error {
    Error::Validation(format!(
        "malformed numbers token [{}]: expected `all`, a number, or lo-hi",
        raw
    ))
}

/// A signed label/string directive token. `-name` excludes; `all`
/// short-circuits the whole stage to a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedToken {
    All,
    Include(String),
    Exclude(String),
}

impl SignedToken {
    pub fn parse(raw: &str) -> Result<Self> {
        let s = raw.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(SignedToken::All);
        }
        if let Some(name) = s.strip_prefix('-') {
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::Validation(format!(
                    "malformed exclusion token [{}]: nothing follows `-`",
                    raw
                )));
            }
            return Ok(SignedToken::Exclude(name.to_string()));
        }
        if s.is_empty() {
            return Err(Error::Validation("empty filter token".to_string()));
        }
        Ok(SignedToken::Include(s.to_string()))
    }
}

impl RawConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Resolve one active profile by flag. `Ok(None)` means the flag has
    /// no profile section (skipped, as the original tool does); any
    /// invalid directive is an error scoped to this profile only.
    pub fn resolve(&self, flag: &str) -> Result<Option<Profile>> {
        let Some(raw) = self.profiles.get(flag) else {
            return Ok(None);
        };

        let io = self.resolve_io(flag, &raw.io)?;
        let token = raw.token.as_deref().map(expand_token).transpose()?;
        let filters = raw.filters.as_ref().map(parse_filters).transpose()?;
        if let Some(filters) = &filters {
            filters.validate()?;
        }

        Ok(Some(Profile {
            flag: flag.to_string(),
            owner: raw.owner.clone(),
            repo: raw.repo.clone(),
            is_private: raw.is_repo_private,
            token,
            feature: raw.feature,
            is_time_series: raw.is_time_series,
            filters,
            io,
        }))
    }

    fn resolve_io(&self, flag: &str, profile_io: &IoSection) -> Result<IoSpec> {
        let run_io = &self.run.io;
        let out_path = profile_io
            .out_path
            .clone()
            .or_else(|| run_io.out_path.clone())
            .unwrap_or_else(|| ".".to_string());
        let out_cols_raw = profile_io
            .out_cols
            .clone()
            .or_else(|| run_io.out_cols.clone())
            .ok_or_else(|| {
                Error::Config(format!(
                    "profile [{}] has no io.out_cols (neither own nor run-level)",
                    flag
                ))
            })?;
        let out_cols = out_cols_raw
            .iter()
            .map(|c| ColumnSpec::parse(c))
            .collect::<Result<Vec<_>>>()?;
        let out_bname_comps = profile_io
            .out_bname_comps
            .clone()
            .or_else(|| run_io.out_bname_comps.clone())
            .unwrap_or_else(|| vec!["repo".to_string(), "feature".to_string()]);
        let out_utc = profile_io.out_utc.or(run_io.out_utc).unwrap_or(0);
        if !(-23..=23).contains(&out_utc) {
            return Err(Error::Config(format!(
                "profile [{}] io.out_utc [{}] is outside -23..=23",
                flag, out_utc
            )));
        }
        Ok(IoSpec {
            out_path: PathBuf::from(out_path),
            out_cols,
            out_bname_comps,
            out_utc,
        })
    }
}

fn parse_filters(raw: &RawFilters) -> Result<FilterSpec> {
    let numbers = raw
        .numbers
        .as_ref()
        .map(|ds| {
            ds.iter()
                .map(|d| NumberToken::parse(&d.as_text()))
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?;
    let labels = parse_signed(raw.labels.as_ref())?;
    let strings = parse_signed(raw.strings.as_ref())?;
    Ok(FilterSpec {
        state: raw.state,
        numbers,
        labels,
        strings,
    })
}

fn parse_signed(raw: Option<&Vec<String>>) -> Result<Option<Vec<SignedToken>>> {
    raw.map(|ts| ts.iter().map(|t| SignedToken::parse(t)).collect())
        .transpose()
}

/// A token value of `$NAME` is read from the environment so credentials
/// can stay out of checked-in YAML files.
fn expand_token(raw: &str) -> Result<String> {
    match raw.strip_prefix('$') {
        Some(var) => env::var(var).map_err(|_| {
            Error::Config(format!(
                "token references environment variable [{}] which is not set",
                var
            ))
        }),
        None => Ok(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
run:
  active_repos: [beamline, counters]
  io:
    out_path: ./out
    out_cols: ["number;No.", "title", "labels"]
    out_utc: 9
beamline:
  owner: acme
  repo: dcps
  filters:
    state: open
    numbers: [2, "4-5"]
    labels: [bug, -invalid]
counters:
  owner: acme
  repo: dcps
  is_time_series: true
  io:
    out_cols: [date, time, num_iss_all, num_iss_open, num_iss_closed]
    out_utc: 0
"#;

    #[test]
    fn loads_profiles_and_inherits_io() {
        let cfg = RawConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(cfg.run.active_repos, vec!["beamline", "counters"]);

        let p = cfg.resolve("beamline").unwrap().unwrap();
        assert_eq!(p.owner, "acme");
        assert_eq!(p.io.out_path, PathBuf::from("./out"));
        assert_eq!(p.io.out_utc, 9);
        assert_eq!(p.io.out_cols[0].header, "No.");
        assert_eq!(p.io.out_cols[1].header, "title");

        // Profile io keys override run io keys one by one.
        let ts = cfg.resolve("counters").unwrap().unwrap();
        assert_eq!(ts.io.out_utc, 0);
        assert_eq!(ts.io.out_path, PathBuf::from("./out"));
        assert_eq!(ts.io.out_cols.len(), 5);
        assert!(ts.is_time_series);
    }

    #[test]
    fn unknown_flag_resolves_to_none() {
        let cfg = RawConfig::from_yaml_str(SAMPLE).unwrap();
        assert!(cfg.resolve("missing").unwrap().is_none());
    }

    #[test]
    fn parses_number_tokens() {
        let cfg = RawConfig::from_yaml_str(SAMPLE).unwrap();
        let p = cfg.resolve("beamline").unwrap().unwrap();
        let numbers = p.filters.unwrap().numbers.unwrap();
        assert_eq!(numbers, vec![NumberToken::Single(2), NumberToken::Range(4, 5)]);
    }

    #[test]
    fn number_token_grammar() {
        assert_eq!(NumberToken::parse("ALL").unwrap(), NumberToken::All);
        assert_eq!(NumberToken::parse("7").unwrap(), NumberToken::Single(7));
        assert_eq!(NumberToken::parse("4 - 9").unwrap(), NumberToken::Range(4, 9));
        assert!(matches!(
            NumberToken::parse("9-4"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            NumberToken::parse("x-y"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn signed_token_grammar() {
        assert_eq!(SignedToken::parse("bug").unwrap(), SignedToken::Include("bug".into()));
        assert_eq!(
            SignedToken::parse("-invalid").unwrap(),
            SignedToken::Exclude("invalid".into())
        );
        assert_eq!(SignedToken::parse("All").unwrap(), SignedToken::All);
        assert!(matches!(SignedToken::parse("-"), Err(Error::Validation(_))));
        assert!(matches!(SignedToken::parse("  "), Err(Error::Validation(_))));
    }

    #[test]
    fn strings_with_all_numbers_is_config_error() {
        let spec = FilterSpec {
            state: crate::models::FeatureState::Open,
            numbers: Some(vec![NumberToken::All]),
            labels: None,
            strings: Some(vec![SignedToken::Include("DCPS".into())]),
        };
        assert!(matches!(spec.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn strings_with_narrow_numbers_is_allowed() {
        let spec = FilterSpec {
            state: crate::models::FeatureState::Open,
            numbers: Some(vec![NumberToken::Range(1, 10)]),
            labels: None,
            strings: Some(vec![SignedToken::Include("DCPS".into())]),
        };
        assert!(spec.validate().is_ok());

        // Present-but-empty strings never trips the precondition.
        let empty = FilterSpec {
            state: crate::models::FeatureState::Open,
            numbers: Some(vec![NumberToken::All]),
            labels: None,
            strings: Some(vec![]),
        };
        assert!(empty.validate().is_ok());
    }

    #[test]
    fn column_spec_rename() {
        let c = ColumnSpec::parse("number ; No.").unwrap();
        assert_eq!(c.attr, "number");
        assert_eq!(c.header, "No.");
        let plain = ColumnSpec::parse("title").unwrap();
        assert_eq!(plain.header, "title");
        assert!(ColumnSpec::parse(" ;x").is_err());
    }

    #[test]
    fn token_env_indirection() {
        env::set_var("GH2CSV_TEST_TOKEN", "sekrit");
        assert_eq!(expand_token("$GH2CSV_TEST_TOKEN").unwrap(), "sekrit");
        assert_eq!(expand_token("literal").unwrap(), "literal");
        assert!(matches!(
            expand_token("$GH2CSV_TEST_MISSING"),
            Err(Error::Config(_))
        ));
    }
}

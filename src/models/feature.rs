use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// One feature record (issue) as returned by the GitHub API, reduced to the
/// attributes this tool consumes. Identity within a repo is `number`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub number: u64,
    pub state: FeatureState,
    pub title: String,
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureState {
    Open,
    Closed,
}

impl FeatureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureState::Open => "open",
            FeatureState::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

impl Feature {
    /// Label names, stable-sorted for deterministic output.
    pub fn label_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.labels.iter().map(|l| l.name.as_str()).collect();
        names.sort();
        names
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.name == name)
    }

    /// Title and body concatenated for substring matching.
    pub fn searchable_text(&self) -> String {
        match &self.body {
            Some(body) => format!("{}\n{}", self.title, body),
            None => self.title.clone(),
        }
    }

    /// Look up a named attribute as an output cell value, rendering
    /// timestamps in the given offset. Returns `None` for unknown names.
    pub fn attr(&self, name: &str, tz: &FixedOffset) -> Option<String> {
        let fmt_ts = |ts: &DateTime<Utc>| {
            ts.with_timezone(tz).format("%Y-%m-%d %H:%M:%S").to_string()
        };
        match name {
            "number" => Some(self.number.to_string()),
            "state" => Some(self.state.as_str().to_string()),
            "title" => Some(self.title.clone()),
            "body" => Some(self.body.clone().unwrap_or_default()),
            "labels" => Some(self.label_names().join(", ")),
            "created_at" => Some(fmt_ts(&self.created_at)),
            "updated_at" => Some(fmt_ts(&self.updated_at)),
            "closed_at" => Some(self.closed_at.as_ref().map(fmt_ts).unwrap_or_default()),
            _ => None,
        }
    }
}

/// The attributes `attr` recognizes, in canonical order.
pub const FEATURE_ATTRS: &[&str] = &[
    "number",
    "state",
    "title",
    "body",
    "labels",
    "created_at",
    "updated_at",
    "closed_at",
];

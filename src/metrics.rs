use crate::github::{Issue, PullRequest};
use crate::types::RepositoryIdentity;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

const HOURS_PER_DAY: i64 = 24;

/// A scalar attached to a metric record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

/// A named fact about the repository, e.g. `issues.open` with `{count: 12}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricRecord {
    path: String,
    data: BTreeMap<String, MetricValue>,
}

impl MetricRecord {
    pub fn new<K, V>(path: impl Into<String>, data: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<MetricValue>,
    {
        Self {
            path: path.into(),
            data: data
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// A record carrying a single `count` field.
    pub fn count(path: impl Into<String>, count: impl Into<MetricValue>) -> Self {
        Self::new(path, [("count", count)])
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn data(&self) -> &BTreeMap<String, MetricValue> {
        &self.data
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.data.get(key)
    }
}

/// All records produced by one collection pass (or one event) for a repository.
///
/// Item order carries no meaning and paths may repeat.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsBatch {
    origin: RepositoryIdentity,
    items: Vec<MetricRecord>,
}

impl MetricsBatch {
    pub fn new(origin: RepositoryIdentity, items: Vec<MetricRecord>) -> Self {
        Self { origin, items }
    }

    pub fn single(origin: RepositoryIdentity, record: MetricRecord) -> Self {
        Self::new(origin, vec![record])
    }

    pub fn origin(&self) -> &RepositoryIdentity {
        &self.origin
    }

    pub fn items(&self) -> &[MetricRecord] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Records with the given path.
    pub fn with_path<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a MetricRecord> + 'a {
        self.items.iter().filter(move |m| m.path == path)
    }
}

/// Per-issue and per-label detail records.
///
/// Issues that are really pull requests get no `issues.data` record, but their labels
/// are still counted.
pub fn issue_records(issues: &[Issue]) -> Vec<MetricRecord> {
    let mut items = Vec::new();
    for issue in issues {
        if !issue.is_pull_request() {
            items.push(MetricRecord::new(
                "issues.data",
                [
                    ("time", MetricValue::from(issue.created_at.timestamp())),
                    ("state", MetricValue::from(issue.state.as_str())),
                    ("id", MetricValue::from(issue.number)),
                ],
            ));
        }
        for label in &issue.labels {
            items.push(MetricRecord::new("labels.data", [("name", label.name.as_str())]));
        }
    }
    items
}

pub fn pull_request_records(pull_requests: &[PullRequest]) -> Vec<MetricRecord> {
    pull_requests
        .iter()
        .map(|pr| {
            MetricRecord::new(
                "pull_requests.data",
                [
                    ("time", MetricValue::from(pr.created_at.timestamp())),
                    ("state", MetricValue::from(pr.state.as_str())),
                    ("merged", MetricValue::from(pr.merged)),
                    ("id", MetricValue::from(pr.id)),
                ],
            )
        })
        .collect()
}

/// Whole days elapsed since `updated_at`.
pub fn staleness_days(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - updated_at).num_hours() / HOURS_PER_DAY
}

// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Define the JSON model (commits, issues, merged records, reports, delivery statuses) shared by every stage
// role: model/types
// outputs: Serializable structs with stable field names matching commits.json, jira-commits-merged.json and reports.json
// invariants:
// - List fields deserialize missing or null as empty, never absent
// - Report.merged_record also accepts the legacy `tickets_and_commits` field name
// - Delivery timestamps are skipped on output until stamped
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Commit {
  #[serde(default)]
  pub hash: String,
  #[serde(default)]
  pub date: String,
  #[serde(default)]
  pub time: String,
  #[serde(default)]
  pub day: String,
  #[serde(default)]
  pub message: String,
}

/// Snapshot of a tracker issue at fetch time.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Issue {
  #[serde(default)]
  pub key: String,
  #[serde(default)]
  pub summary: String,
  #[serde(default)]
  pub assignee: String,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub reporter: String,
  #[serde(default)]
  pub updated: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Contributor {
  #[serde(default, deserialize_with = "null_as_default")]
  pub name: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub emails: Vec<String>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub regular_commits: Vec<Commit>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub overtime_commits: Vec<Commit>,
}

/// Shape of `commits.json`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CommitsFile {
  #[serde(default, deserialize_with = "null_as_default")]
  pub contributors: Vec<Contributor>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Author {
  pub name: String,
  pub emails: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct DeveloperCommits {
  #[serde(default, deserialize_with = "null_as_default")]
  pub regular: Vec<Commit>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub overtime: Vec<Commit>,
}

/// Raw per-email entry of `jira-commits-merged.json`; every field may be missing.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct DeveloperEntry {
  #[serde(default, deserialize_with = "null_as_default")]
  pub name: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub tickets: Vec<Issue>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub commits: DeveloperCommits,
}

/// `jira-commits-merged.json`: email → entry.
pub type MergedSource = BTreeMap<String, DeveloperEntry>;

/// Per-developer combination of tickets and commits for one run.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct MergedRecord {
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub name: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub tickets: Vec<Issue>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub regular_commits: Vec<Commit>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub overtime_commits: Vec<Commit>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Report {
  #[serde(default)]
  pub id: String,
  pub developer_email: String,
  #[serde(default)]
  pub ai_summary: String,
  #[serde(alias = "tickets_and_commits", default)]
  pub merged_record: MergedRecord,
  #[serde(default)]
  pub generated_at: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sent_to_slack_at: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sent_to_email_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
  Slack,
  Email,
}

impl fmt::Display for Channel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Channel::Slack => write!(f, "Slack"),
      Channel::Email => write!(f, "Email"),
    }
  }
}

/// One channel's delivery of one report.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DeliveryStatus {
  pub report_id: String,
  pub channel: Channel,
  pub delivered_at: String,
}

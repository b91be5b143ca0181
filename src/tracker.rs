// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Jira integration: resolve commit-author emails to account ids and fetch issues assigned to or reported by them
// role: tracker/integration
// inputs: TrackerCredentials; author emails; account ids; max issue count; courtesy pause
// outputs: Account id lists, simplified Issue snapshots, per-email lookup outcomes and a human-readable summary
// side_effects: Network calls to {base}/rest/api/3 (user search, JQL search); thread sleeps between account queries
// invariants:
// - Issue search is a POST with the JQL in the JSON body, never in the URL
// - Per-email and per-account failures are recorded and never abort sibling lookups
// - Issues per email are unique by key, ordered by updated (newest first), truncated to max
// errors: Typed ReportError at the TrackerApi seam; collected into EmailIssues at the orchestration layer
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::HashSet;
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::TrackerCredentials;
use crate::error::{ReportError, ReportResult};
use crate::ext::serde_json::JsonFetch;
use crate::http::{build_agent, call_json, RetryPolicy};
use crate::model::{Contributor, Issue};

pub const DEFAULT_MAX_ISSUES: usize = 30;

const ISSUE_FIELDS: [&str; 5] = ["summary", "assignee", "status", "reporter", "updated"];

// --- Trait seam for the tracker API ---
pub trait TrackerApi: Send + Sync {
  /// Account ids whose email matches `email`, in the order the tracker returns them.
  fn search_users(&self, email: &str) -> ReportResult<Vec<String>>;
  /// Issues where `account_id` is assignee or reporter, newest update first.
  fn search_issues(&self, account_id: &str, max: usize) -> ReportResult<Vec<Issue>>;
}

pub struct JiraHttpApi {
  creds: TrackerCredentials,
  agent: ureq::Agent,
  retry: RetryPolicy,
}

impl JiraHttpApi {
  pub fn new(creds: TrackerCredentials, timeout: Duration, retry: RetryPolicy) -> Self {
    Self { creds, agent: build_agent(timeout), retry }
  }

  fn auth_header(&self) -> String {
    let raw = format!("{}:{}", self.creds.email, self.creds.api_token);
    format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(raw))
  }
}

/// JQL matching issues the account is assignee OR reporter of.
pub fn issues_jql(account_id: &str) -> String {
  let id = account_id.replace('\\', "\\\\").replace('"', "\\\"");
  format!("assignee = \"{id}\" OR reporter = \"{id}\" ORDER BY updated DESC")
}

/// Flatten a raw Jira issue into the snapshot shape.
pub fn issue_from_json(v: &serde_json::Value) -> Issue {
  Issue {
    key: v.fetch("key").to_or_default::<String>(),
    summary: v.fetch("fields.summary").to_or_default::<String>(),
    assignee: v.fetch("fields.assignee.displayName").to_or_default::<String>(),
    status: v.fetch("fields.status.name").to_or_default::<String>(),
    reporter: v.fetch("fields.reporter.displayName").to_or_default::<String>(),
    updated: v.fetch("fields.updated").to_or_default::<String>(),
  }
}

fn account_ids_from_json(v: &serde_json::Value) -> ReportResult<Vec<String>> {
  let arr = v
    .as_array()
    .ok_or_else(|| ReportError::Decode("user search did not return an array".into()))?;

  Ok(arr.iter().filter_map(|u| u.fetch("accountId").to::<String>()).filter(|id| !id.is_empty()).collect())
}

fn issues_from_json(v: &serde_json::Value) -> ReportResult<Vec<Issue>> {
  let arr = v
    .fetch("issues")
    .value()
    .and_then(|i| i.as_array())
    .ok_or_else(|| ReportError::Decode("issue search response has no issues array".into()))?;

  Ok(arr.iter().map(issue_from_json).filter(|i| !i.key.is_empty()).collect())
}

impl TrackerApi for JiraHttpApi {
  fn search_users(&self, email: &str) -> ReportResult<Vec<String>> {
    let url = format!("{}/rest/api/3/user/search", self.creds.base_url);
    let auth = self.auth_header();

    let v = call_json(&self.retry, &url, || {
      self
        .agent
        .get(&url)
        .query("query", email)
        .set("Accept", "application/json")
        .set("Authorization", &auth)
        .call()
    })?;

    account_ids_from_json(&v)
  }

  fn search_issues(&self, account_id: &str, max: usize) -> ReportResult<Vec<Issue>> {
    let url = format!("{}/rest/api/3/search/jql", self.creds.base_url);
    let auth = self.auth_header();
    let body = serde_json::json!({
      "jql": issues_jql(account_id),
      "maxResults": max,
      "fields": ISSUE_FIELDS,
    });

    let v = call_json(&self.retry, &url, || {
      self
        .agent
        .post(&url)
        .set("Accept", "application/json")
        .set("Authorization", &auth)
        .send_json(body.clone())
    })?;

    let mut issues = issues_from_json(&v)?;
    issues.truncate(max);

    Ok(issues)
  }
}

/// Env-backed tracker for hermetic runs.
///
/// `GJR_TEST_TRACKER_USERS_JSON` maps email → array of account ids, or a number to fail with that status.
/// `GJR_TEST_TRACKER_ISSUES_JSON` maps account id → array of raw Jira issues, or a number status.
pub struct EnvTrackerApi;

const USERS_ENV: &str = "GJR_TEST_TRACKER_USERS_JSON";
const ISSUES_ENV: &str = "GJR_TEST_TRACKER_ISSUES_JSON";

fn env_fixture(var: &str, key: &str) -> ReportResult<Option<serde_json::Value>> {
  let Ok(raw) = std::env::var(var) else {
    return Ok(None);
  };
  let map: serde_json::Value = serde_json::from_str(&raw).map_err(|e| ReportError::Decode(format!("{var}: {e}")))?;
  let entry = map.get(key).cloned();

  if let Some(status) = entry.as_ref().and_then(|v| v.as_u64()) {
    return Err(ReportError::RemoteQuery {
      status: status as u16,
      url: format!("env:{var}/{key}"),
      body: String::new(),
    });
  }

  Ok(entry)
}

impl TrackerApi for EnvTrackerApi {
  fn search_users(&self, email: &str) -> ReportResult<Vec<String>> {
    Ok(
      env_fixture(USERS_ENV, email)?
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default()
        .into_iter()
        .filter_map(|id| id.as_str().map(str::to_string))
        .collect(),
    )
  }

  fn search_issues(&self, account_id: &str, max: usize) -> ReportResult<Vec<Issue>> {
    let mut issues = match env_fixture(ISSUES_ENV, account_id)? {
      Some(arr) => issues_from_json(&serde_json::json!({ "issues": arr }))?,
      None => Vec::new(),
    };
    issues.truncate(max);

    Ok(issues)
  }
}

pub fn env_wants_mock() -> bool {
  std::env::var(USERS_ENV).is_ok() || std::env::var(ISSUES_ENV).is_ok()
}

/// Pick the tracker backend: env fixtures when present, otherwise the Jira REST API.
pub fn build_tracker_api(creds: TrackerCredentials, timeout: Duration, retry: RetryPolicy) -> Box<dyn TrackerApi> {
  if env_wants_mock() {
    debug!("using env-backed tracker fixtures");
    Box::new(EnvTrackerApi)
  } else {
    Box::new(JiraHttpApi::new(creds, timeout, retry))
  }
}

// --- Lookup orchestration ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountError {
  pub account_id: String,
  pub error: String,
}

/// Outcome of resolving one email and fetching its issues.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmailIssues {
  pub email: String,
  pub account_ids: Vec<String>,
  pub issues: Vec<Issue>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub identity_error: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty", default)]
  pub account_errors: Vec<AccountError>,
}

impl EmailIssues {
  pub fn has_errors(&self) -> bool {
    self.identity_error.is_some() || !self.account_errors.is_empty()
  }
}

/// Resolve an email to account ids. Blank emails resolve to nothing without a call.
pub fn resolve_identity(api: &dyn TrackerApi, email: &str) -> ReportResult<Vec<String>> {
  let email = email.trim();
  if email.is_empty() {
    return Ok(Vec::new());
  }

  api.search_users(email)
}

fn updated_key(issue: &Issue) -> Option<DateTime<FixedOffset>> {
  DateTime::parse_from_str(&issue.updated, "%Y-%m-%dT%H:%M:%S%.f%z")
    .or_else(|_| DateTime::parse_from_rfc3339(&issue.updated))
    .ok()
}

/// Dedupe by key (first wins), order newest-updated first, cap at `max`.
pub fn combine_issues(batches: Vec<Vec<Issue>>, max: usize) -> Vec<Issue> {
  let mut seen: HashSet<String> = HashSet::new();
  let mut out: Vec<Issue> = batches.into_iter().flatten().filter(|i| seen.insert(i.key.clone())).collect();

  out.sort_by(|a, b| updated_key(b).cmp(&updated_key(a)).then_with(|| b.updated.cmp(&a.updated)));
  out.truncate(max);
  out
}

/// Fetch issues for each account id, pausing between successive queries.
pub fn fetch_issues_for_accounts(
  api: &dyn TrackerApi,
  account_ids: &[String],
  max: usize,
  pause: Duration,
) -> (Vec<Issue>, Vec<AccountError>) {
  let mut batches = Vec::with_capacity(account_ids.len());
  let mut errors = Vec::new();

  for (i, account_id) in account_ids.iter().enumerate() {
    if i > 0 && !pause.is_zero() {
      std::thread::sleep(pause);
    }

    match api.search_issues(account_id, max) {
      Ok(issues) => {
        debug!(account_id = %account_id, count = issues.len(), "fetched issues");
        batches.push(issues);
      }
      Err(e) => {
        warn!(account_id = %account_id, error = %e, "issue fetch failed");
        errors.push(AccountError { account_id: account_id.clone(), error: e.to_string() });
      }
    }
  }

  (combine_issues(batches, max), errors)
}

/// Resolve one email and fetch its issues; never fails, failures are recorded on the result.
pub fn lookup_email(api: &dyn TrackerApi, email: &str, max: usize, pause: Duration) -> EmailIssues {
  let mut out = EmailIssues { email: email.to_string(), ..Default::default() };

  match resolve_identity(api, email) {
    Ok(ids) => out.account_ids = ids,
    Err(e) => {
      warn!(email, error = %e, "identity lookup failed");
      out.identity_error = Some(e.to_string());
      return out;
    }
  }

  if out.account_ids.is_empty() {
    info!(email, "no tracker account for email");
    return out;
  }

  let (issues, errors) = fetch_issues_for_accounts(api, &out.account_ids, max, pause);
  out.issues = issues;
  out.account_errors = errors;
  out
}

/// Lookups for every email of a contributor, combined into one ticket list.
pub fn lookup_contributor(
  api: &dyn TrackerApi,
  contributor: &Contributor,
  max: usize,
  pause: Duration,
) -> (Vec<Issue>, Vec<EmailIssues>) {
  let mut lookups = Vec::with_capacity(contributor.emails.len());

  for (i, email) in contributor.emails.iter().enumerate() {
    if i > 0 && !pause.is_zero() {
      std::thread::sleep(pause);
    }
    lookups.push(lookup_email(api, email, max, pause));
  }

  let tickets = combine_issues(lookups.iter().map(|l| l.issues.clone()).collect(), max);
  (tickets, lookups)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorIssues {
  pub name: String,
  pub tickets: Vec<Issue>,
  pub lookups: Vec<EmailIssues>,
}

/// Tracker issues for every commit author.
pub fn fetch_issues_for_authors(
  api: &dyn TrackerApi,
  contributors: &[Contributor],
  max: usize,
  pause: Duration,
) -> Vec<AuthorIssues> {
  let mut out = Vec::with_capacity(contributors.len());

  for (i, c) in contributors.iter().enumerate() {
    if i > 0 && !pause.is_zero() {
      std::thread::sleep(pause);
    }
    let (tickets, lookups) = lookup_contributor(api, c, max, pause);
    out.push(AuthorIssues { name: c.name.clone(), tickets, lookups });
  }

  out
}

/// Multi-line, human-readable digest of an issue fetch.
pub fn render_fetch_summary(results: &[AuthorIssues]) -> String {
  let mut text = String::new();
  let total: usize = results.iter().map(|r| r.tickets.len()).sum();
  let failed: usize = results.iter().flat_map(|r| &r.lookups).filter(|l| l.has_errors()).count();

  text.push_str(&format!(
    "Fetched {} tracker issues for {} authors ({} email lookups with errors)\n",
    total,
    results.len(),
    failed
  ));

  for r in results {
    text.push_str(&format!("\n{}: {} issues\n", r.name, r.tickets.len()));

    for l in &r.lookups {
      match &l.identity_error {
        Some(e) => text.push_str(&format!("  {}: lookup failed: {}\n", l.email, e)),
        None if l.account_ids.is_empty() => text.push_str(&format!("  {}: no tracker account\n", l.email)),
        None => text.push_str(&format!("  {}: accounts {}\n", l.email, l.account_ids.join(", "))),
      }
      for ae in &l.account_errors {
        text.push_str(&format!("    account {} failed: {}\n", ae.account_id, ae.error));
      }
    }

    for issue in &r.tickets {
      text.push_str(&format!("  - {} [{}] {} (updated {})\n", issue.key, issue.status, issue.summary, issue.updated));
    }
  }

  text
}

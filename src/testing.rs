//! In-memory fakes and fixture builders shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::{ReportError, ReportResult};
use crate::model::{Commit, Issue, MergedRecord, Report};
use crate::report::assemble;
use crate::summary::TextGenerator;
use crate::tracker::TrackerApi;

/// Tracker with canned users/issues and a call log.
#[derive(Default)]
pub struct FakeTracker {
  pub users: HashMap<String, Vec<String>>,
  pub failing_emails: HashSet<String>,
  pub issues: HashMap<String, Vec<Issue>>,
  pub failing_accounts: HashSet<String>,
  pub calls: Mutex<Vec<String>>,
}

impl TrackerApi for FakeTracker {
  fn search_users(&self, email: &str) -> ReportResult<Vec<String>> {
    self.calls.lock().unwrap().push(format!("users:{email}"));
    if self.failing_emails.contains(email) {
      return Err(ReportError::RemoteQuery { status: 500, url: "fake://users".into(), body: String::new() });
    }
    Ok(self.users.get(email).cloned().unwrap_or_default())
  }

  fn search_issues(&self, account_id: &str, max: usize) -> ReportResult<Vec<Issue>> {
    self.calls.lock().unwrap().push(format!("issues:{account_id}"));
    if self.failing_accounts.contains(account_id) {
      return Err(ReportError::RemoteQuery { status: 400, url: "fake://issues".into(), body: String::new() });
    }
    let mut v = self.issues.get(account_id).cloned().unwrap_or_default();
    v.truncate(max);
    Ok(v)
  }
}

/// Generator returning a fixed response (or failing with a status); records prompts.
pub struct FakeGenerator {
  response: Result<serde_json::Value, u16>,
  pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
  pub fn text(text: &str) -> Self {
    Self {
      response: Ok(serde_json::json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })),
      prompts: Mutex::new(Vec::new()),
    }
  }

  pub fn failing(status: u16) -> Self {
    Self { response: Err(status), prompts: Mutex::new(Vec::new()) }
  }
}

impl TextGenerator for FakeGenerator {
  fn generate(&self, prompt: &str) -> ReportResult<serde_json::Value> {
    self.prompts.lock().unwrap().push(prompt.to_string());
    match &self.response {
      Ok(v) => Ok(v.clone()),
      Err(status) => Err(ReportError::RemoteQuery { status: *status, url: "fake://generate".into(), body: String::new() }),
    }
  }
}

pub fn sample_commit(hash: &str, message: &str) -> Commit {
  Commit {
    hash: hash.into(),
    date: "2025-08-12".into(),
    time: "14:03".into(),
    day: "Tuesday".into(),
    message: message.into(),
  }
}

pub fn sample_issue(key: &str, updated: &str) -> Issue {
  Issue {
    key: key.into(),
    summary: format!("{key} summary"),
    assignee: "Ada".into(),
    status: "In Progress".into(),
    reporter: "Lin".into(),
    updated: updated.into(),
  }
}

pub fn sample_reports(run_id: &str, n: usize) -> Vec<Report> {
  (0..n)
    .map(|i| {
      let email = format!("dev{i}@x.com");
      let record = MergedRecord { email: email.clone(), name: format!("Dev {i}"), ..Default::default() };
      assemble(run_id, "2025-08-12T14:03:00Z", &email, format!("summary {i}"), record)
    })
    .collect()
}

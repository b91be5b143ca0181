// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Assemble Reports and merge delivery statuses into them by report id and channel
// role: report/assembly
// inputs: run id, generation time, email, summary, MergedRecord; DeliveryStatus records
// outputs: Report values; new Report values carrying delivery timestamps
// invariants:
// - Report ids are "<run_id>:<email>" and unique within a run
// - Delivery timestamps are only set through DeliveryLedger::apply; a later status for the same id+channel overwrites
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::HashMap;

use crate::model::{Channel, DeliveryStatus, MergedRecord, Report};

pub fn report_id(run_id: &str, email: &str) -> String {
  format!("{}:{}", run_id, email)
}

pub fn assemble(run_id: &str, generated_at: &str, email: &str, ai_summary: String, record: MergedRecord) -> Report {
  Report {
    id: report_id(run_id, email),
    developer_email: email.to_string(),
    ai_summary,
    merged_record: record,
    generated_at: generated_at.to_string(),
    sent_to_slack_at: None,
    sent_to_email_at: None,
  }
}

/// Give id-less reports (older files) a positional id so deliveries can be matched.
pub fn backfill_ids(reports: &mut [Report]) {
  for (i, r) in reports.iter_mut().enumerate() {
    if r.id.is_empty() {
      r.id = report_id(&format!("legacy-{}", i), &r.developer_email);
    }
  }
}

/// Latest delivery time per (report id, channel).
#[derive(Debug, Default, Clone)]
pub struct DeliveryLedger {
  entries: HashMap<(String, Channel), String>,
}

impl DeliveryLedger {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record(&mut self, status: DeliveryStatus) {
    self.entries.insert((status.report_id, status.channel), status.delivered_at);
  }

  pub fn extend<I: IntoIterator<Item = DeliveryStatus>>(&mut self, statuses: I) {
    for s in statuses {
      self.record(s);
    }
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Copy of `report` with any recorded delivery times applied.
  pub fn apply(&self, report: &Report) -> Report {
    let mut out = report.clone();

    if let Some(at) = self.entries.get(&(report.id.clone(), Channel::Slack)) {
      out.sent_to_slack_at = Some(at.clone());
    }
    if let Some(at) = self.entries.get(&(report.id.clone(), Channel::Email)) {
      out.sent_to_email_at = Some(at.clone());
    }

    out
  }

  pub fn apply_all(&self, reports: &[Report]) -> Vec<Report> {
    reports.iter().map(|r| self.apply(r)).collect()
  }

  fn covers(&self, report: &Report) -> bool {
    [Channel::Slack, Channel::Email].into_iter().any(|c| self.entries.contains_key(&(report.id.clone(), c)))
  }
}

/// Merge delivery statuses into a batch; returns the stamped copies and how many reports got a stamp.
pub fn apply_deliveries(reports: &[Report], statuses: Vec<DeliveryStatus>) -> (Vec<Report>, usize) {
  let mut ledger = DeliveryLedger::new();
  ledger.extend(statuses);

  let stamped = reports.iter().filter(|r| ledger.covers(r)).count();
  (ledger.apply_all(reports), stamped)
}

// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Per-developer report pipeline: identity lookup, issue fetch, merge, summary, assembly, staging
// role: processing/pipeline
// inputs: Contributors from commits.json; TrackerApi; TextGenerator; run id and generation time; optional StagingFile
// outputs: RunOutcome with reports in contributor order plus per-developer errors
// side_effects: Network calls through the trait seams; appends each finished report to the staging file
// invariants:
// - One report per contributor with at least one email, even when lookups or generation fail
// - Output order equals input order regardless of --jobs
// - Staging appends are serialized
// - Every contributor after the first waits the courtesy pause before its tracker queries
// errors: Per-developer failures are collected as DeveloperError; nothing here aborts the run
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::sync::Mutex;
use std::time::Duration;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::merge::merge_contributor;
use crate::model::{Contributor, Report};
use crate::report::assemble;
use crate::store::StagingFile;
use crate::summary::{sentinel, try_summarize, TextGenerator};
use crate::tracker::{lookup_contributor, TrackerApi};

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
  pub max_issues: usize,
  pub pause: Duration,
  pub jobs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
  Identity,
  Issues,
  Summary,
  Staging,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeveloperError {
  pub name: String,
  pub email: String,
  pub stage: Stage,
  pub error: String,
}

#[derive(Debug, Default)]
pub struct RunOutcome {
  pub reports: Vec<Report>,
  pub errors: Vec<DeveloperError>,
  /// Contributors without any email; no report is possible for them.
  pub skipped: Vec<String>,
}

pub struct Pipeline<'a> {
  tracker: &'a dyn TrackerApi,
  generator: &'a dyn TextGenerator,
  run_id: String,
  generated_at: String,
  opts: PipelineOptions,
}

enum Processed {
  Done(Report, Vec<DeveloperError>),
  Skipped(String),
}

impl<'a> Pipeline<'a> {
  pub fn new(
    tracker: &'a dyn TrackerApi,
    generator: &'a dyn TextGenerator,
    run_id: impl Into<String>,
    generated_at: impl Into<String>,
    opts: PipelineOptions,
  ) -> Self {
    Self { tracker, generator, run_id: run_id.into(), generated_at: generated_at.into(), opts }
  }

  /// Build one developer's report. `None` when the contributor has no usable email.
  pub fn process_developer(&self, contributor: &Contributor) -> Option<(Report, Vec<DeveloperError>)> {
    let email = contributor.emails.iter().map(|e| e.trim()).find(|e| !e.is_empty())?.to_string();
    let mut errors = Vec::new();

    let (tickets, lookups) = lookup_contributor(self.tracker, contributor, self.opts.max_issues, self.opts.pause);
    for l in &lookups {
      if let Some(e) = &l.identity_error {
        errors.push(self.error(contributor, &l.email, Stage::Identity, e.clone()));
      }
      for ae in &l.account_errors {
        errors.push(self.error(contributor, &l.email, Stage::Issues, format!("account {}: {}", ae.account_id, ae.error)));
      }
    }

    let record = merge_contributor(&email, contributor, tickets);
    let summary = match try_summarize(self.generator, &record) {
      Ok(text) => text,
      Err(e) => {
        warn!(email = %email, error = %e, "summary generation failed");
        errors.push(self.error(contributor, &email, Stage::Summary, e.to_string()));
        sentinel(&e)
      }
    };

    debug!(email = %email, tickets = record.tickets.len(), "developer processed");
    Some((assemble(&self.run_id, &self.generated_at, &email, summary, record), errors))
  }

  fn error(&self, c: &Contributor, email: &str, stage: Stage, error: String) -> DeveloperError {
    DeveloperError { name: c.name.clone(), email: email.to_string(), stage, error }
  }

  fn process_and_stage(&self, contributor: &Contributor, staging: Option<&Mutex<&StagingFile>>) -> Processed {
    let Some((report, mut errors)) = self.process_developer(contributor) else {
      warn!(name = %contributor.name, "contributor has no email; skipped");
      return Processed::Skipped(contributor.name.clone());
    };

    if let Some(lock) = staging {
      let staged = match lock.lock() {
        Ok(file) => file.append(&report),
        Err(poisoned) => poisoned.into_inner().append(&report),
      };
      if let Err(e) = staged {
        warn!(id = %report.id, error = %e, "could not stage report");
        errors.push(self.error(contributor, &report.developer_email, Stage::Staging, e.to_string()));
      }
    }

    Processed::Done(report, errors)
  }

  /// Process every contributor, on a bounded pool when `jobs > 1`, pausing between contributors.
  pub fn run(&self, contributors: &[Contributor], staging: Option<&StagingFile>) -> RunOutcome {
    let lock = staging.map(Mutex::new);
    let lock = lock.as_ref();

    let step = |(i, c): (usize, &Contributor)| {
      if i > 0 && !self.opts.pause.is_zero() {
        std::thread::sleep(self.opts.pause);
      }
      self.process_and_stage(c, lock)
    };

    let processed: Vec<Processed> = if self.opts.jobs > 1 {
      match rayon::ThreadPoolBuilder::new().num_threads(self.opts.jobs).build() {
        Ok(pool) => pool.install(|| contributors.par_iter().enumerate().map(step).collect()),
        Err(e) => {
          warn!(error = %e, "worker pool unavailable; running sequentially");
          contributors.iter().enumerate().map(step).collect()
        }
      }
    } else {
      contributors.iter().enumerate().map(step).collect()
    };

    let mut out = RunOutcome::default();
    for p in processed {
      match p {
        Processed::Done(report, errors) => {
          out.reports.push(report);
          out.errors.extend(errors);
        }
        Processed::Skipped(name) => out.skipped.push(name),
      }
    }

    info!(
      run_id = %self.run_id,
      reports = out.reports.len(),
      errors = out.errors.len(),
      skipped = out.skipped.len(),
      "pipeline finished"
    );
    out
  }
}

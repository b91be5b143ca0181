// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Execute one CLI action against the data directory and produce its stdout text
// role: processing/orchestrator
// inputs: EffectiveConfig (paths, action, credentials); optional now override
// outputs: CommandOutput (stdout text + success flag); files in the data directory
// side_effects: Reads commits/merged/report files; writes the merged file, the report store and its staging file; network via tracker/generator seams
// invariants:
// - Missing credentials fail before any per-developer work
// - run saves the batch before any dispatch; dispatch stamps are not written to the store unless dispatch --write-back is used
// - dispatch --write-back keeps entries that are not reports untouched and in place
// - dispatch fails on an input that is not a JSON array and rewrites nothing when no report was stamped
// - Save failures are reported as the status line with success=false, never as a panic
// errors: anyhow with context for configuration and unexpected IO; typed ReportError inside
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{Action, EffectiveConfig};
use crate::config::EmailTarget;
use crate::dispatch::{dispatch, Dispatcher, EmailDispatcher, SlackDispatcher};
use crate::error::{ReportError, ReportResult};
use crate::merge::{entry_for_contributor, merge_entry};
use crate::model::{Author, Channel, CommitsFile, Contributor, MergedRecord, MergedSource, Report};
use crate::pipeline::{DeveloperError, Pipeline, PipelineOptions};
use crate::report::backfill_ids;
use crate::store::{save_status, ReportStore};
use crate::summary::{build_generator, SUMMARY_ERROR_PREFIX};
use crate::tracker::{build_tracker_api, fetch_issues_for_authors, render_fetch_summary, AuthorIssues};
use crate::util;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
  pub stdout: String,
  pub success: bool,
}

impl CommandOutput {
  fn ok(stdout: String) -> Self {
    Self { stdout, success: true }
  }

  fn json<T: Serialize>(value: &T) -> Result<Self> {
    Ok(Self::ok(serde_json::to_string_pretty(value)?))
  }
}

pub fn load_contributors(path: &Path) -> Vec<Contributor> {
  util::read_json_lenient::<CommitsFile>(path).contributors
}

pub fn list_authors(contributors: &[Contributor]) -> Vec<Author> {
  contributors.iter().map(|c| Author { name: c.name.clone(), emails: c.emails.clone() }).collect()
}

/// First contributor whose name matches `author` ignoring case.
pub fn find_author<'a>(contributors: &'a [Contributor], author: &str) -> Option<&'a Contributor> {
  let wanted = author.to_lowercase();
  contributors.iter().find(|c| c.name.to_lowercase() == wanted)
}

/// Record for `email` from the merged file; an unknown email yields empty lists.
pub fn tickets_for_email(source: &MergedSource, email: &str) -> MergedRecord {
  merge_entry(email, &source.get(email).cloned().unwrap_or_default())
}

/// Merged-file contents for a finished issue fetch: every email of an author maps to the same entry.
pub fn merged_source(contributors: &[Contributor], fetched: &[AuthorIssues]) -> MergedSource {
  let mut out = MergedSource::new();

  for (c, f) in contributors.iter().zip(fetched) {
    for email in c.emails.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
      out.insert(email.to_string(), entry_for_contributor(c, f.tickets.clone()));
    }
  }

  out
}

/// Append the JSON array in `input` to the store.
pub fn save_file(store: &ReportStore, input: &Path) -> ReportResult<usize> {
  let bytes = std::fs::read(input).map_err(|e| ReportError::Persistence(format!("{}: {}", input.display(), e)))?;
  let parsed: serde_json::Value =
    serde_json::from_slice(&bytes).map_err(|e| ReportError::Decode(format!("{}: {}", input.display(), e)))?;

  match parsed {
    serde_json::Value::Array(batch) => store.append_values(batch),
    _ => Err(ReportError::Decode(format!("{}: expected a JSON array of reports", input.display()))),
  }
}

fn dispatcher_for(cfg: &EffectiveConfig, channel: Channel, to: Option<&str>, subject: &str) -> Result<Box<dyn Dispatcher>> {
  match channel {
    Channel::Slack => Ok(Box::new(SlackDispatcher)),
    Channel::Email => {
      let target = EmailTarget::new(to.unwrap_or_default(), subject, &cfg.smtp).context("email dispatch")?;
      Ok(Box::new(EmailDispatcher::new(target)))
    }
  }
}

/// Stamp the reports in `input`; with `write_back`, rewrite the file with the stamped copies.
pub fn dispatch_file(
  dispatcher: &dyn Dispatcher,
  input: &Path,
  write_back: bool,
  delivered_at: &str,
) -> Result<CommandOutput> {
  let mut values: Vec<serde_json::Value> =
    util::read_json_strict(input).with_context(|| format!("reading reports from {}", input.display()))?;

  let (positions, mut reports): (Vec<usize>, Vec<Report>) = values
    .iter()
    .enumerate()
    .filter_map(|(i, v)| match serde_json::from_value::<Report>(v.clone()) {
      Ok(r) => Some((i, r)),
      Err(e) => {
        warn!(index = i, error = %e, "entry is not a report; left as is");
        None
      }
    })
    .unzip();

  if reports.is_empty() {
    warn!(path = %input.display(), "no reports to send");
  }
  backfill_ids(&mut reports);

  let out = dispatch(dispatcher, &reports, delivered_at)?;

  if write_back && out.count > 0 {
    for (pos, r) in positions.iter().zip(&out.reports) {
      values[*pos] = serde_json::to_value(r)?;
    }
    util::write_json_atomic(input, &values).with_context(|| format!("writing stamped reports to {}", input.display()))?;
    info!(path = %input.display(), count = out.count, "stamped reports written back");
  }

  Ok(CommandOutput::ok(out.status_line()))
}

#[derive(Debug, Serialize)]
pub struct ReportLine {
  pub id: String,
  pub developer_email: String,
  pub tickets: usize,
  pub regular_commits: usize,
  pub overtime_commits: usize,
  pub summary_ok: bool,
}

impl From<&Report> for ReportLine {
  fn from(r: &Report) -> Self {
    Self {
      id: r.id.clone(),
      developer_email: r.developer_email.clone(),
      tickets: r.merged_record.tickets.len(),
      regular_commits: r.merged_record.regular_commits.len(),
      overtime_commits: r.merged_record.overtime_commits.len(),
      summary_ok: !r.ai_summary.starts_with(SUMMARY_ERROR_PREFIX),
    }
  }
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
  pub run_id: String,
  pub generated_at: String,
  pub recovered: usize,
  pub reports: Vec<ReportLine>,
  pub errors: Vec<DeveloperError>,
  pub skipped: Vec<String>,
  pub save_status: String,
  pub store_total: Option<usize>,
  pub dispatch: Vec<String>,
}

struct RunRequest<'a> {
  max_issues: usize,
  jobs: usize,
  slack: bool,
  email_to: Option<&'a str>,
  subject: &'a str,
}

fn run_pipeline(cfg: &EffectiveConfig, req: RunRequest<'_>, now: chrono::DateTime<chrono::Utc>) -> Result<CommandOutput> {
  // Configuration first: nothing below runs without every credential in place.
  let tracker_creds = cfg.tracker.credentials().context("run needs Jira credentials")?;
  let generation_creds = cfg.generation.credentials().context("run needs a generation API key")?;
  let email_target = match req.email_to {
    Some(to) => Some(EmailTarget::new(to, req.subject, &cfg.smtp).context("email dispatch")?),
    None => None,
  };

  let store = ReportStore::new(&cfg.paths.store);
  let recovered = store.recover_staged().context("recovering staged reports")?;

  let contributors = load_contributors(Path::new(&cfg.paths.commits));
  let tracker = build_tracker_api(tracker_creds, cfg.tracker.timeout(), cfg.tracker.retry_policy());
  let generator = build_generator(generation_creds, cfg.generation.timeout());

  let run_id = util::run_id(now);
  let generated_at = util::iso_utc(now);
  let opts = PipelineOptions { max_issues: req.max_issues, pause: cfg.tracker.pause(), jobs: req.jobs };
  let pipeline = Pipeline::new(tracker.as_ref(), generator.as_ref(), run_id.clone(), generated_at.clone(), opts);

  info!(run_id = %run_id, developers = contributors.len(), jobs = req.jobs, "run started");
  let staging = store.staging();
  let outcome = pipeline.run(&contributors, Some(&staging));

  let saved = store.commit_run(&outcome.reports, &staging);
  let status = save_status(&saved);
  let success = saved.is_ok();

  let mut dispatched = Vec::new();
  if success {
    if req.slack {
      dispatched.push(dispatch(&SlackDispatcher, &outcome.reports, &generated_at)?.status_line());
    }
    if let Some(target) = email_target {
      dispatched.push(dispatch(&EmailDispatcher::new(target), &outcome.reports, &generated_at)?.status_line());
    }
  } else {
    warn!(status = %status, "batch not saved; dispatch skipped");
  }

  let summary = RunSummary {
    run_id,
    generated_at,
    recovered,
    reports: outcome.reports.iter().map(ReportLine::from).collect(),
    errors: outcome.errors,
    skipped: outcome.skipped,
    save_status: status,
    store_total: saved.ok(),
    dispatch: dispatched,
  };

  Ok(CommandOutput { stdout: serde_json::to_string_pretty(&summary)?, success })
}

pub fn execute(cfg: &EffectiveConfig) -> Result<CommandOutput> {
  let now = util::effective_now(util::parse_now(cfg.now_override.as_deref()));
  let paths = &cfg.paths;

  match &cfg.action {
    Action::Authors => CommandOutput::json(&list_authors(&load_contributors(Path::new(&paths.commits)))),

    Action::Commits { author } => {
      let contributors = load_contributors(Path::new(&paths.commits));
      match find_author(&contributors, author) {
        Some(c) => CommandOutput::json(c),
        None => CommandOutput::json(&serde_json::json!({})),
      }
    }

    Action::Tickets { email } => {
      let source: MergedSource = util::read_json_lenient(Path::new(&paths.merged));
      CommandOutput::json(&tickets_for_email(&source, email))
    }

    Action::FetchIssues { max_issues, write_merged } => {
      let creds = cfg.tracker.credentials().context("fetch-issues needs Jira credentials")?;
      let api = build_tracker_api(creds, cfg.tracker.timeout(), cfg.tracker.retry_policy());
      let contributors = load_contributors(Path::new(&paths.commits));

      let fetched = fetch_issues_for_authors(api.as_ref(), &contributors, *max_issues, cfg.tracker.pause());
      let mut text = render_fetch_summary(&fetched);

      if *write_merged {
        let merged = merged_source(&contributors, &fetched);
        util::write_json_atomic(Path::new(&paths.merged), &merged)
          .with_context(|| format!("writing {}", paths.merged))?;
        text.push_str(&format!("\nMerged file written: {} ({} emails)\n", paths.merged, merged.len()));
      }

      Ok(CommandOutput::ok(text))
    }

    Action::Save { input } => {
      let store = ReportStore::new(&paths.store);
      let saved = save_file(&store, Path::new(input));
      Ok(CommandOutput { stdout: save_status(&saved), success: saved.is_ok() })
    }

    Action::Dispatch { channel, input, write_back, to, subject } => {
      let dispatcher = dispatcher_for(cfg, *channel, to.as_deref(), subject)?;
      dispatch_file(dispatcher.as_ref(), Path::new(input), *write_back, &util::iso_utc(now))
    }

    Action::Run { max_issues, jobs, slack, email_to, subject } => run_pipeline(
      cfg,
      RunRequest { max_issues: *max_issues, jobs: *jobs, slack: *slack, email_to: email_to.as_deref(), subject },
      now,
    ),
  }
}

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{GenerationSettings, SmtpSettings, TrackerSettings, DEFAULT_GENERATION_URL};
use crate::logging::LogLevel;
use crate::model::Channel;
use crate::tracker::DEFAULT_MAX_ISSUES;
use crate::util;

pub const COMMITS_FILE: &str = "commits.json";
pub const MERGED_FILE: &str = "jira-commits-merged.json";
pub const STORE_FILE: &str = "reports.json";
const DEFAULT_SUBJECT: &str = "Developer activity reports";

#[derive(Parser, Debug)]
#[command(
    name = "git-jira-report",
    version,
    about = "Correlate git commits with Jira issues and produce per-developer activity reports",
    long_about = None
)]
pub struct Cli {
  /// Directory holding commits.json, jira-commits-merged.json and reports.json
  #[arg(long, global = true, default_value = "data")]
  pub data_dir: PathBuf,

  /// Log verbosity (overrides RUST_LOG)
  #[arg(long, global = true, value_enum)]
  pub log_level: Option<LogLevel>,

  #[command(flatten)]
  pub tracker: TrackerArgs,

  #[command(flatten)]
  pub generation: GenerationArgs,

  #[command(flatten)]
  pub smtp: SmtpArgs,

  /// Emit a troff man page to stdout (internal; for packaging)
  #[arg(long, hide = true)]
  pub gen_man: bool,

  /// Override the "now" instant used for run ids and timestamps (hidden; tests only)
  #[arg(long = "now-override", global = true, hide = true)]
  pub now_override: Option<String>,

  #[command(subcommand)]
  pub command: Option<Command>,
}

#[derive(Args, Debug, Clone)]
pub struct TrackerArgs {
  /// Jira site, e.g. https://acme.atlassian.net
  #[arg(long, global = true, env = "JIRA_BASE_URL")]
  pub jira_base_url: Option<String>,

  /// Jira account email used for basic auth
  #[arg(long, global = true, env = "JIRA_EMAIL")]
  pub jira_email: Option<String>,

  #[arg(long, global = true, env = "JIRA_API_TOKEN", hide_env_values = true)]
  pub jira_api_token: Option<String>,

  /// Per-request timeout for Jira calls
  #[arg(long, global = true, default_value_t = 15)]
  pub tracker_timeout_secs: u64,

  /// Retries for throttled or failing Jira calls
  #[arg(long, global = true, default_value_t = 3)]
  pub max_retries: u32,

  /// Courtesy pause between successive Jira queries
  #[arg(long, global = true, default_value_t = 200)]
  pub pause_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct GenerationArgs {
  #[arg(long, global = true, env = "GEMINI_API_URL", default_value = DEFAULT_GENERATION_URL)]
  pub gemini_api_url: String,

  #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
  pub gemini_api_key: Option<String>,

  /// Summary generation timeout (clamped to 30..=60)
  #[arg(long, global = true, default_value_t = 30)]
  pub generation_timeout_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct SmtpArgs {
  #[arg(long, global = true, env = "SMTP_HOST")]
  pub smtp_host: Option<String>,

  #[arg(long, global = true, env = "SMTP_PORT", default_value_t = 587)]
  pub smtp_port: u16,

  #[arg(long, global = true, env = "SMTP_USERNAME")]
  pub smtp_username: Option<String>,

  #[arg(long, global = true, env = "SMTP_PASSWORD", hide_env_values = true)]
  pub smtp_password: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
  /// List commit authors and their emails
  Authors {
    /// Commit source file (default: <data-dir>/commits.json)
    #[arg(long)]
    commits_path: Option<PathBuf>,
  },
  /// Show one author's commits (name match is case-insensitive)
  Commits {
    author: String,
    #[arg(long)]
    commits_path: Option<PathBuf>,
  },
  /// Show tickets and commits for an email from the merged file
  Tickets {
    email: String,
    /// Merged file (default: <data-dir>/jira-commits-merged.json)
    #[arg(long)]
    merged_path: Option<PathBuf>,
  },
  /// Fetch Jira issues for every commit author
  FetchIssues {
    #[arg(long)]
    commits_path: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_MAX_ISSUES)]
    max_issues: usize,
    /// Also write <data-dir>/jira-commits-merged.json
    #[arg(long)]
    write_merged: bool,
  },
  /// Append a JSON array of reports to the store
  Save {
    #[arg(long)]
    input: PathBuf,
  },
  /// Stamp reports as delivered through a channel
  Dispatch {
    #[arg(value_enum)]
    channel: DispatchChannel,
    /// Reports to dispatch (default: the store)
    #[arg(long)]
    input: Option<PathBuf>,
    /// Write the stamped reports back to the input file
    #[arg(long)]
    write_back: bool,
    /// Email recipient
    #[arg(long)]
    to: Option<String>,
    #[arg(long, default_value = DEFAULT_SUBJECT)]
    subject: String,
  },
  /// Run the full pipeline: lookups, summaries, save, optional dispatch
  Run {
    #[arg(long)]
    commits_path: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_MAX_ISSUES)]
    max_issues: usize,
    /// Developers processed concurrently
    #[arg(long, default_value_t = 1)]
    jobs: usize,
    /// Dispatch the new reports to Slack after saving
    #[arg(long)]
    slack: bool,
    /// Dispatch the new reports by email to this recipient after saving
    #[arg(long)]
    email_to: Option<String>,
    #[arg(long, default_value = DEFAULT_SUBJECT)]
    subject: String,
  },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchChannel {
  Slack,
  Email,
}

impl From<DispatchChannel> for Channel {
  fn from(c: DispatchChannel) -> Self {
    match c {
      DispatchChannel::Slack => Channel::Slack,
      DispatchChannel::Email => Channel::Email,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
  pub commits: String,
  pub merged: String,
  pub store: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
  Authors,
  Commits { author: String },
  Tickets { email: String },
  FetchIssues { max_issues: usize, write_merged: bool },
  Save { input: String },
  Dispatch { channel: Channel, input: String, write_back: bool, to: Option<String>, subject: String },
  Run { max_issues: usize, jobs: usize, slack: bool, email_to: Option<String>, subject: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
  pub paths: DataPaths,
  pub action: Action,
  pub tracker: TrackerSettings,
  pub generation: GenerationSettings,
  pub smtp: SmtpSettings,
  pub now_override: Option<String>,
}

fn file_in(dir: &Path, override_path: Option<&PathBuf>, name: &str) -> String {
  match override_path {
    Some(p) => util::canonicalize_lossy(p),
    None => util::canonicalize_lossy(dir.join(name)),
  }
}

pub fn normalize(cli: Cli) -> Result<EffectiveConfig> {
  let Some(command) = cli.command else {
    bail!("Provide a subcommand: authors | commits | tickets | fetch-issues | save | dispatch | run");
  };

  if let Some(now) = cli.now_override.as_deref() {
    if util::parse_now(Some(now)).is_none() {
      bail!("--now-override must be an RFC 3339 instant, got {:?}", now);
    }
  }

  let dir = cli.data_dir.as_path();
  let store = file_in(dir, None, STORE_FILE);
  let mut commits_override: Option<PathBuf> = None;
  let mut merged_override: Option<PathBuf> = None;

  let action = match command {
    Command::Authors { commits_path } => {
      commits_override = commits_path;
      Action::Authors
    }
    Command::Commits { author, commits_path } => {
      commits_override = commits_path;
      Action::Commits { author }
    }
    Command::Tickets { email, merged_path } => {
      merged_override = merged_path;
      Action::Tickets { email }
    }
    Command::FetchIssues { commits_path, max_issues, write_merged } => {
      if max_issues == 0 {
        bail!("--max-issues must be at least 1");
      }
      commits_override = commits_path;
      Action::FetchIssues { max_issues, write_merged }
    }
    Command::Save { input } => Action::Save { input: util::canonicalize_lossy(input) },
    Command::Dispatch { channel, input, write_back, to, subject } => Action::Dispatch {
      channel: channel.into(),
      input: input.as_deref().map(util::canonicalize_lossy).unwrap_or_else(|| store.clone()),
      write_back,
      to,
      subject,
    },
    Command::Run { commits_path, max_issues, jobs, slack, email_to, subject } => {
      if max_issues == 0 {
        bail!("--max-issues must be at least 1");
      }
      if jobs == 0 {
        bail!("--jobs must be at least 1");
      }
      commits_override = commits_path;
      Action::Run { max_issues, jobs, slack, email_to, subject }
    }
  };

  let paths = DataPaths {
    commits: file_in(dir, commits_override.as_ref(), COMMITS_FILE),
    merged: file_in(dir, merged_override.as_ref(), MERGED_FILE),
    store,
  };

  Ok(EffectiveConfig {
    paths,
    action,
    tracker: TrackerSettings {
      base_url: cli.tracker.jira_base_url,
      email: cli.tracker.jira_email,
      api_token: cli.tracker.jira_api_token,
      timeout_secs: cli.tracker.tracker_timeout_secs,
      max_retries: cli.tracker.max_retries,
      pause_ms: cli.tracker.pause_ms,
    },
    generation: GenerationSettings {
      api_url: cli.generation.gemini_api_url,
      api_key: cli.generation.gemini_api_key,
      timeout_secs: cli.generation.generation_timeout_secs,
    },
    smtp: SmtpSettings {
      host: cli.smtp.smtp_host,
      port: cli.smtp.smtp_port,
      username: cli.smtp.smtp_username,
      password: cli.smtp.smtp_password,
    },
    now_override: cli.now_override,
  })
}

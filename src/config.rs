// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Credential and endpoint settings for the tracker, text-generation and email channels
// role: config/credentials
// inputs: Optional values gathered by the CLI (flags with env fallbacks)
// outputs: Validated credential bundles or ReportError::Configuration naming what is missing
// invariants:
// - Secrets are never serialized (EffectiveConfig is printable)
// - Validation happens before any network call is attempted
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, ReportResult};
use crate::http::RetryPolicy;

pub const DEFAULT_GENERATION_URL: &str =
  "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

fn present(v: &Option<String>) -> Option<String> {
  v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn require(fields: &[(&str, &Option<String>)]) -> ReportResult<Vec<String>> {
  let missing: Vec<&str> = fields.iter().filter(|(_, v)| present(v).is_none()).map(|(n, _)| *n).collect();

  if !missing.is_empty() {
    return Err(ReportError::Configuration(format!("missing {}", missing.join(", "))));
  }

  Ok(fields.iter().filter_map(|(_, v)| present(v)).collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerCredentials {
  pub base_url: String,
  pub email: String,
  pub api_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSettings {
  pub base_url: Option<String>,
  pub email: Option<String>,
  #[serde(skip)]
  pub api_token: Option<String>,
  pub timeout_secs: u64,
  pub max_retries: u32,
  pub pause_ms: u64,
}

impl TrackerSettings {
  pub fn credentials(&self) -> ReportResult<TrackerCredentials> {
    let vals = require(&[
      ("JIRA_BASE_URL", &self.base_url),
      ("JIRA_EMAIL", &self.email),
      ("JIRA_API_TOKEN", &self.api_token),
    ])?;

    Ok(TrackerCredentials {
      base_url: vals[0].trim_end_matches('/').to_string(),
      email: vals[1].clone(),
      api_token: vals[2].clone(),
    })
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs.max(1))
  }

  pub fn pause(&self) -> Duration {
    Duration::from_millis(self.pause_ms)
  }

  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy { max_retries: self.max_retries, ..RetryPolicy::default() }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationCredentials {
  pub api_url: String,
  pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
  pub api_url: String,
  #[serde(skip)]
  pub api_key: Option<String>,
  pub timeout_secs: u64,
}

impl GenerationSettings {
  pub fn credentials(&self) -> ReportResult<GenerationCredentials> {
    let vals = require(&[("GEMINI_API_KEY", &self.api_key)])?;

    Ok(GenerationCredentials { api_url: self.api_url.clone(), api_key: vals[0].clone() })
  }

  /// Generation calls are bounded to 30..=60 seconds.
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs.clamp(30, 60))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpCredentials {
  pub host: String,
  pub port: u16,
  pub username: String,
  pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpSettings {
  pub host: Option<String>,
  pub port: u16,
  pub username: Option<String>,
  #[serde(skip)]
  pub password: Option<String>,
}

impl SmtpSettings {
  pub fn credentials(&self) -> ReportResult<SmtpCredentials> {
    let vals = require(&[
      ("SMTP_HOST", &self.host),
      ("SMTP_USERNAME", &self.username),
      ("SMTP_PASSWORD", &self.password),
    ])?;

    Ok(SmtpCredentials {
      host: vals[0].clone(),
      port: self.port,
      username: vals[1].clone(),
      password: vals[2].clone(),
    })
  }
}

/// Everything the email channel needs for one dispatch.
#[derive(Debug, Clone)]
pub struct EmailTarget {
  pub recipient: String,
  pub subject: String,
  pub smtp: SmtpCredentials,
}

impl EmailTarget {
  pub fn new(recipient: &str, subject: &str, smtp: &SmtpSettings) -> ReportResult<Self> {
    if recipient.trim().is_empty() {
      return Err(ReportError::Configuration("missing email recipient".into()));
    }

    Ok(Self { recipient: recipient.trim().to_string(), subject: subject.to_string(), smtp: smtp.credentials()? })
  }
}

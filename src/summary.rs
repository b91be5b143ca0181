// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Render a MergedRecord as a prompt, call the text-generation endpoint, and extract a cleaned summary
// role: summary/integration
// inputs: MergedRecord; GenerationCredentials; timeout
// outputs: Cleaned summary text, or a sentinel error string when generation fails
// side_effects: One POST per developer to the generation endpoint
// invariants:
// - Extraction reads candidates[0].content.parts[0].text; any missing level yields ""
// - A leading ```lang fence and a trailing ``` fence are stripped independently
// - A failed generation is represented by sentinel(): "Error generating summary: ..."
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::GenerationCredentials;
use crate::error::{ReportError, ReportResult};
use crate::ext::serde_json::JsonFetch;
use crate::http::{build_agent, call_json, RetryPolicy};
use crate::model::{Commit, MergedRecord};

pub const SUMMARY_ERROR_PREFIX: &str = "Error generating summary: ";

// --- Trait seam for the generation endpoint ---
pub trait TextGenerator: Send + Sync {
  /// Send `prompt` and return the raw JSON response.
  fn generate(&self, prompt: &str) -> ReportResult<serde_json::Value>;
}

pub struct GeminiHttpGenerator {
  creds: GenerationCredentials,
  agent: ureq::Agent,
}

impl GeminiHttpGenerator {
  pub fn new(creds: GenerationCredentials, timeout: Duration) -> Self {
    Self { creds, agent: build_agent(timeout) }
  }
}

impl TextGenerator for GeminiHttpGenerator {
  fn generate(&self, prompt: &str) -> ReportResult<serde_json::Value> {
    let url = &self.creds.api_url;
    let payload = serde_json::json!({ "contents": [{ "parts": [{ "text": prompt }] }] });

    call_json(&RetryPolicy::no_retries(), url, || {
      self
        .agent
        .post(url)
        .set("Content-Type", "application/json")
        .set("X-goog-api-key", &self.creds.api_key)
        .send_json(payload.clone())
    })
  }
}

/// Env-backed generator: `GJR_TEST_GENERATION_JSON` is returned as the raw response;
/// `GJR_TEST_GENERATION_STATUS` makes every call fail with that status.
pub struct EnvGenerator;

const GENERATION_JSON_ENV: &str = "GJR_TEST_GENERATION_JSON";
const GENERATION_STATUS_ENV: &str = "GJR_TEST_GENERATION_STATUS";

impl TextGenerator for EnvGenerator {
  fn generate(&self, _prompt: &str) -> ReportResult<serde_json::Value> {
    if let Some(status) = std::env::var(GENERATION_STATUS_ENV).ok().and_then(|s| s.trim().parse::<u16>().ok()) {
      return Err(ReportError::RemoteQuery { status, url: format!("env:{GENERATION_STATUS_ENV}"), body: String::new() });
    }

    let raw = std::env::var(GENERATION_JSON_ENV).unwrap_or_else(|_| "{}".into());
    serde_json::from_str(&raw).map_err(|e| ReportError::Decode(format!("{GENERATION_JSON_ENV}: {e}")))
  }
}

pub fn env_wants_mock() -> bool {
  std::env::var(GENERATION_JSON_ENV).is_ok() || std::env::var(GENERATION_STATUS_ENV).is_ok()
}

pub fn build_generator(creds: GenerationCredentials, timeout: Duration) -> Box<dyn TextGenerator> {
  if env_wants_mock() {
    debug!("using env-backed generation fixtures");
    Box::new(EnvGenerator)
  } else {
    Box::new(GeminiHttpGenerator::new(creds, timeout))
  }
}

fn push_commits(out: &mut String, title: &str, commits: &[Commit]) {
  out.push_str(&format!("\n{} ({}):\n", title, commits.len()));

  if commits.is_empty() {
    out.push_str("- none\n");
  }

  for c in commits {
    let short: String = c.hash.chars().take(8).collect();
    out.push_str(&format!("- {} {} ({}) {}: {}\n", c.date, c.time, c.day, short, c.message.trim()));
  }
}

/// Plain-text prompt describing the developer's tickets and commits.
pub fn render_prompt(record: &MergedRecord) -> String {
  let mut out = String::new();
  let who = if record.name.is_empty() { record.email.clone() } else { format!("{} <{}>", record.name, record.email) };

  out.push_str("You are preparing a concise activity report about one software developer.\n");
  out.push_str(&format!("Developer: {}\n", who));

  out.push_str(&format!("\nJira tickets ({}):\n", record.tickets.len()));
  if record.tickets.is_empty() {
    out.push_str("- none\n");
  }
  for t in &record.tickets {
    out.push_str(&format!("- {} [{}] {} (updated {})\n", t.key, t.status, t.summary, t.updated));
  }

  push_commits(&mut out, "Regular commits", &record.regular_commits);
  push_commits(&mut out, "Overtime commits", &record.overtime_commits);

  out.push_str(
    "\nWrite a concise report: one short paragraph plus at most five bullet points. \
     Describe what the developer worked on, how the commits relate to the tickets, \
     and call out overtime work. Do not invent tickets or commits.\n",
  );

  out
}

/// Pull the generated text out of the raw response.
pub fn extract_text(response: &serde_json::Value) -> String {
  response.fetch("candidates.0.content.parts.0.text").to_or_default::<String>()
}

static FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*\r?\n?").expect("fence-open regex"));
static FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*```$").expect("fence-close regex"));

/// Strip a wrapping markdown code fence (opening and closing handled independently).
pub fn clean_fences(text: &str) -> String {
  let trimmed = text.trim();
  let opened = FENCE_OPEN.replace(trimmed, "");
  FENCE_CLOSE.replace(&opened, "").trim().to_string()
}

/// Generate a summary, surfacing failures as typed errors.
pub fn try_summarize(generator: &dyn TextGenerator, record: &MergedRecord) -> ReportResult<String> {
  let prompt = render_prompt(record);
  let response = generator.generate(&prompt)?;

  Ok(clean_fences(&extract_text(&response)))
}

/// Summary text standing in for a failed generation, so the report is still produced.
pub fn sentinel(err: &ReportError) -> String {
  format!("{}{}", SUMMARY_ERROR_PREFIX, err)
}

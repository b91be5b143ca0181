// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Shared ureq plumbing: agent construction, JSON response classification, bounded retry with backoff
// role: http/transport
// inputs: A closure issuing one request; RetryPolicy
// outputs: Parsed JSON bodies or typed ReportError values
// side_effects: Network calls made by the supplied closure; thread sleeps between retries
// invariants:
// - Only transient failures (429, 5xx, transport) are retried, at most max_retries times
// - Retry-After (seconds) overrides the computed backoff, both capped at max_delay
// - Error bodies are truncated before they are carried in errors or logs
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ReportError, ReportResult};

const ERROR_BODY_LIMIT: usize = 512;

pub fn build_agent(timeout: Duration) -> ureq::Agent {
  ureq::AgentBuilder::new()
    .timeout(timeout)
    .user_agent(concat!("git-jira-report/", env!("CARGO_PKG_VERSION")))
    .build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_retries: u32,
  pub base_delay: Duration,
  pub max_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_retries: 3,
      base_delay: Duration::from_millis(250),
      max_delay: Duration::from_secs(8),
    }
  }
}

impl RetryPolicy {
  pub fn no_retries() -> Self {
    Self { max_retries: 0, ..Self::default() }
  }

  /// Delay before retry number `attempt` (0-based).
  pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
    let backoff = retry_after.unwrap_or_else(|| self.base_delay.saturating_mul(2u32.saturating_pow(attempt)));
    backoff.min(self.max_delay)
  }
}

/// Parse a `Retry-After` header given in whole seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
  value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

struct Failure {
  error: ReportError,
  retry_after: Option<Duration>,
}

fn truncate(mut s: String) -> String {
  if s.len() > ERROR_BODY_LIMIT {
    let mut end = ERROR_BODY_LIMIT;
    while !s.is_char_boundary(end) {
      end -= 1;
    }
    s.truncate(end);
  }
  s
}

fn classify(url: &str, result: Result<ureq::Response, ureq::Error>) -> Result<serde_json::Value, Failure> {
  match result {
    Ok(resp) => resp.into_json::<serde_json::Value>().map_err(|e| Failure {
      error: ReportError::Decode(format!("{}: {}", url, e)),
      retry_after: None,
    }),
    Err(ureq::Error::Status(status, resp)) => {
      let retry_after = match status {
        429 | 503 => resp.header("Retry-After").and_then(parse_retry_after),
        _ => None,
      };
      let body = truncate(resp.into_string().unwrap_or_default());

      Err(Failure { error: ReportError::RemoteQuery { status, url: url.to_string(), body }, retry_after })
    }
    Err(ureq::Error::Transport(t)) => Err(Failure {
      error: ReportError::Transport { url: url.to_string(), message: t.to_string() },
      retry_after: None,
    }),
  }
}

/// Issue a request through `send`, retrying transient failures per `policy`, and decode the JSON body.
pub fn call_json<F>(policy: &RetryPolicy, url: &str, mut send: F) -> ReportResult<serde_json::Value>
where
  F: FnMut() -> Result<ureq::Response, ureq::Error>,
{
  let mut attempt: u32 = 0;

  loop {
    match classify(url, send()) {
      Ok(v) => {
        debug!(url, attempt, "request succeeded");
        return Ok(v);
      }
      Err(failure) => {
        if attempt >= policy.max_retries || !failure.error.is_transient() {
          return Err(failure.error);
        }

        let delay = policy.delay_for(attempt, failure.retry_after);
        warn!(url, attempt, delay_ms = delay.as_millis() as u64, error = %failure.error, "transient failure; retrying");
        std::thread::sleep(delay);
        attempt += 1;
      }
    }
  }
}

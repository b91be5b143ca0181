// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Typed error taxonomy shared by the tracker, generation, persistence and delivery layers
// role: errors
// outputs: ReportError enum and ReportResult alias
// invariants:
// - Configuration is the only variant that aborts a run before per-developer work
// - RemoteQuery always carries the HTTP status of the failing call
// - Decode on persisted files is logged and degraded to defaults; a batch that fails to decode is rejected whole
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
  /// Required credentials or settings are missing.
  #[error("Configuration error: {0}")]
  Configuration(String),

  /// A remote dependency answered with a non-success status.
  #[error("Remote query to {url} failed with status {status}: {body}")]
  RemoteQuery { status: u16, url: String, body: String },

  /// The call never produced a response (DNS, connect, timeout).
  #[error("Transport error calling {url}: {message}")]
  Transport { url: String, message: String },

  /// Persisted or remote JSON did not have the expected shape.
  #[error("Decode error: {0}")]
  Decode(String),

  #[error("Persistence error: {0}")]
  Persistence(String),
}

impl ReportError {
  /// True for failures worth retrying: throttling, server errors, and transport hiccups.
  pub fn is_transient(&self) -> bool {
    match self {
      ReportError::RemoteQuery { status, .. } => *status == 429 || *status >= 500,
      ReportError::Transport { .. } => true,
      _ => false,
    }
  }
}

impl From<std::io::Error> for ReportError {
  fn from(e: std::io::Error) -> Self {
    ReportError::Persistence(e.to_string())
  }
}

pub type ReportResult<T> = Result<T, ReportError>;

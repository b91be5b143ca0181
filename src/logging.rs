// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Configure the tracing subscriber for the binary
// role: logging/setup
// inputs: Optional --log-level; RUST_LOG
// outputs: A global fmt subscriber writing to stderr
// invariants:
// - Logs never go to stdout (stdout carries JSON and status lines)
// - An explicit --log-level wins over RUST_LOG; default is warn
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
  Error,
  Warn,
  Info,
  Debug,
  Trace,
}

impl LogLevel {
  pub fn as_str(&self) -> &'static str {
    match self {
      LogLevel::Error => "error",
      LogLevel::Warn => "warn",
      LogLevel::Info => "info",
      LogLevel::Debug => "debug",
      LogLevel::Trace => "trace",
    }
  }
}

pub fn env_filter(level: Option<LogLevel>) -> EnvFilter {
  match level {
    Some(l) => EnvFilter::new(l.as_str()),
    None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
  }
}

/// Install the stderr subscriber. A second call is a no-op.
pub fn init(level: Option<LogLevel>) {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(env_filter(level))
    .with_writer(std::io::stderr)
    .with_target(false)
    .try_init();
}

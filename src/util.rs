// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Utilities for paths, clock/run ids, lenient JSON reads, atomic JSON writes, and man page rendering
// role: utilities/helpers
// inputs: Various primitives; DateTime; paths; clap CommandFactory
// outputs: Canonicalized paths, formatted timestamps, decoded JSON with defaults, files written atomically, man page text
// side_effects: write_json_atomic creates parent directories and renames a temp sibling over the target
// invariants:
// - read_json_lenient never fails: missing or malformed files decode to T::default() (logged)
// - read_json_strict treats only a missing file as T::default(); unreadable or malformed files are errors
// - write_json_atomic never leaves a half-written target; the temp sibling is <name>.tmp
// errors: IO/serialization errors from writes bubble as ReportError::Persistence
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use clap::CommandFactory;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{ReportError, ReportResult};

pub fn canonicalize_lossy<P: AsRef<Path>>(p: P) -> String {
  let p = p.as_ref();
  let pb: PathBuf = match std::fs::canonicalize(p) {
    Ok(x) => x,
    Err(_) => match std::env::current_dir() {
      Ok(cwd) => cwd.join(p),
      Err(_) => PathBuf::from(p),
    },
  };
  pb.to_string_lossy().to_string()
}

/// Returns the effective "now" given an optional override.
///
/// When `override_now` is `Some`, that instant is returned; otherwise
/// the current UTC time is used. Keeps tests deterministic without
/// sprinkling `Utc::now()` throughout the code.
pub fn effective_now(override_now: Option<DateTime<Utc>>) -> DateTime<Utc> {
  override_now.unwrap_or_else(Utc::now)
}

/// Parse an RFC 3339 instant (used by the hidden --now-override flag).
pub fn parse_now(s: Option<&str>) -> Option<DateTime<Utc>> {
  s.and_then(|v| DateTime::parse_from_rfc3339(v).ok()).map(|d| d.with_timezone(&Utc))
}

pub fn iso_utc(at: DateTime<Utc>) -> String {
  at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Compact, sortable run identifier, e.g. 20250812T140300Z.
pub fn run_id(at: DateTime<Utc>) -> String {
  at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// `<path>` with `suffix` appended to its file name (reports.json → reports.json.tmp).
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
  let mut name: OsString = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  name.push(suffix);
  path.with_file_name(name)
}

/// Read and decode a JSON file, falling back to `T::default()` when it is missing or malformed.
pub fn read_json_lenient<T>(path: &Path) -> T
where
  T: DeserializeOwned + Default,
{
  let bytes = match std::fs::read(path) {
    Ok(b) => b,
    Err(e) => {
      if e.kind() != std::io::ErrorKind::NotFound {
        warn!(path = %path.display(), error = %e, "unreadable JSON file; using empty default");
      }
      return T::default();
    }
  };

  match serde_json::from_slice::<T>(&bytes) {
    Ok(v) => v,
    Err(e) => {
      let err = ReportError::Decode(format!("{}: {}", path.display(), e));
      warn!(error = %err, "malformed JSON file; using empty default");
      T::default()
    }
  }
}

/// Read and decode a JSON file that is about to be rewritten. A missing file is `T::default()`.
pub fn read_json_strict<T>(path: &Path) -> ReportResult<T>
where
  T: DeserializeOwned + Default,
{
  let bytes = match std::fs::read(path) {
    Ok(b) => b,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
    Err(e) => return Err(ReportError::Persistence(format!("{}: {}", path.display(), e))),
  };

  serde_json::from_slice::<T>(&bytes).map_err(|e| ReportError::Decode(format!("{}: {}", path.display(), e)))
}

/// Serialize `value` pretty-printed into `<path>.tmp`, flush to disk, then rename over `path`.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> ReportResult<()> {
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)?;
  }

  let bytes = serde_json::to_vec_pretty(value).map_err(|e| ReportError::Persistence(e.to_string()))?;
  let tmp = sibling_path(path, ".tmp");

  {
    let mut f = std::fs::File::create(&tmp)?;
    f.write_all(&bytes)?;
    f.sync_all()?;
  }

  std::fs::rename(&tmp, path).map_err(|e| ReportError::Persistence(format!("{}: {}", path.display(), e)))
}

/// Render a section-1 man page for a clap `CommandFactory` implementor.
/// Returns the troff content as a UTF-8 string.
pub fn render_man_page<T: CommandFactory>() -> anyhow::Result<String> {
  let cmd = T::command();
  let man = clap_mangen::Man::new(cmd);
  let mut buf: Vec<u8> = Vec::new();

  man.render(&mut buf)?;

  Ok(String::from_utf8_lossy(&buf).to_string())
}

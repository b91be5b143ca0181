// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Append-only JSON report store with a per-run staging file for crash recovery
// role: persistence/store
// inputs: Report batches or report-shaped JSON objects; store path
// outputs: reports.json (JSON array) and reports.json.staging (JSON Lines, transient)
// side_effects: Reads/writes the store file; appends to and removes the staging file
// invariants:
// - A successful append grows the store by exactly the batch length; prior entries keep their order and content
// - A missing, malformed or non-array store reads as empty
// - The store is replaced atomically (temp sibling + rename)
// - Staged reports are promoted into the store before the staging file is removed
// errors: ReportError::Persistence for IO/serialization failures; Decode for non-object batch items
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ReportError, ReportResult};
use crate::model::Report;
use crate::util::{sibling_path, write_json_atomic};

pub struct ReportStore {
  path: PathBuf,
}

impl ReportStore {
  pub fn new<P: Into<PathBuf>>(path: P) -> Self {
    Self { path: path.into() }
  }

  #[cfg(test)]
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Existing entries; anything unreadable counts as an empty store.
  pub fn load(&self) -> Vec<serde_json::Value> {
    let bytes = match std::fs::read(&self.path) {
      Ok(b) => b,
      Err(_) => return Vec::new(),
    };

    match serde_json::from_slice::<serde_json::Value>(&bytes) {
      Ok(serde_json::Value::Array(items)) => items,
      Ok(_) => {
        warn!(path = %self.path.display(), "report store is not a JSON array; treating as empty");
        Vec::new()
      }
      Err(e) => {
        warn!(path = %self.path.display(), error = %e, "report store is malformed; treating as empty");
        Vec::new()
      }
    }
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.load().len()
  }

  /// Append report-shaped objects; returns the new total.
  pub fn append_values(&self, batch: Vec<serde_json::Value>) -> ReportResult<usize> {
    if let Some(i) = batch.iter().position(|v| !v.is_object()) {
      return Err(ReportError::Decode(format!("batch item {} is not a report object", i)));
    }

    let mut all = self.load();
    let before = all.len();
    all.extend(batch);

    write_json_atomic(&self.path, &all)?;
    info!(path = %self.path.display(), before, total = all.len(), "report batch saved");

    Ok(all.len())
  }

  pub fn append_batch(&self, batch: &[Report]) -> ReportResult<usize> {
    let values = batch
      .iter()
      .map(serde_json::to_value)
      .collect::<Result<Vec<_>, _>>()
      .map_err(|e| ReportError::Persistence(e.to_string()))?;

    self.append_values(values)
  }

  pub fn staging(&self) -> StagingFile {
    StagingFile { path: sibling_path(&self.path, ".staging") }
  }

  /// Move everything in the staging file into the store, then remove it. Returns the number promoted.
  pub fn promote(&self, staging: &StagingFile) -> ReportResult<usize> {
    let staged = staging.read();
    let n = staged.len();

    if n > 0 {
      self.append_values(staged)?;
    }
    staging.clear()?;

    Ok(n)
  }

  /// Save a finished run in batch order, then drop its staging file.
  pub fn commit_run(&self, batch: &[Report], staging: &StagingFile) -> ReportResult<usize> {
    let total = self.append_batch(batch)?;
    staging.clear()?;
    Ok(total)
  }

  /// Promote reports left behind by an interrupted run.
  pub fn recover_staged(&self) -> ReportResult<usize> {
    let staging = self.staging();
    if !staging.exists() {
      return Ok(0);
    }

    let n = self.promote(&staging)?;
    if n > 0 {
      warn!(recovered = n, path = %staging.path().display(), "recovered reports from an interrupted run");
    }

    Ok(n)
  }
}

/// User-facing status line for a save.
pub fn save_status(result: &ReportResult<usize>) -> String {
  match result {
    Ok(total) => format!("All reports saved successfully! Total reports: {}", total),
    Err(e) => format!("Error saving reports: {}", e),
  }
}

/// JSON Lines file holding reports produced so far in the current run.
pub struct StagingFile {
  path: PathBuf,
}

impl StagingFile {
  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn exists(&self) -> bool {
    self.path.exists()
  }

  pub fn append(&self, report: &Report) -> ReportResult<()> {
    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }

    let mut line = serde_json::to_vec(report).map_err(|e| ReportError::Persistence(e.to_string()))?;
    line.push(b'\n');

    let mut f = std::fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
    f.write_all(&line)?;
    f.sync_data()?;

    debug!(id = %report.id, "report staged");
    Ok(())
  }

  /// Staged entries in order; a torn trailing line from a crash is skipped.
  pub fn read(&self) -> Vec<serde_json::Value> {
    let Ok(f) = std::fs::File::open(&self.path) else {
      return Vec::new();
    };

    std::io::BufReader::new(f)
      .lines()
      .map_while(Result::ok)
      .filter(|l| !l.trim().is_empty())
      .filter_map(|l| match serde_json::from_str::<serde_json::Value>(&l) {
        Ok(v) if v.is_object() => Some(v),
        _ => {
          warn!(path = %self.path.display(), "skipping unreadable staged line");
          None
        }
      })
      .collect()
  }

  pub fn clear(&self) -> ReportResult<()> {
    match std::fs::remove_file(&self.path) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}

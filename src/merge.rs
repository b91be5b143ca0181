// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Combine a developer's tickets, regular commits and overtime commits into one MergedRecord
// role: merge/pure
// inputs: DeveloperEntry (merged-file shape) or Contributor + fetched issues
// outputs: MergedRecord values and the merged-file entry shape
// invariants:
// - Pure: no IO, no clock, no network
// - Missing lists are empty lists; element order is preserved exactly as received
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use crate::model::{Contributor, DeveloperCommits, DeveloperEntry, Issue, MergedRecord};

/// Merge a raw merged-file entry for `email`.
pub fn merge_entry(email: &str, entry: &DeveloperEntry) -> MergedRecord {
  MergedRecord {
    email: email.to_string(),
    name: entry.name.clone(),
    tickets: entry.tickets.clone(),
    regular_commits: entry.commits.regular.clone(),
    overtime_commits: entry.commits.overtime.clone(),
  }
}

/// Build the merged-file entry for a contributor once their tickets are known.
pub fn entry_for_contributor(contributor: &Contributor, tickets: Vec<Issue>) -> DeveloperEntry {
  DeveloperEntry {
    name: contributor.name.clone(),
    tickets,
    commits: DeveloperCommits {
      regular: contributor.regular_commits.clone(),
      overtime: contributor.overtime_commits.clone(),
    },
  }
}

/// Contributor + tickets straight to a record, keyed by the email used for lookup.
pub fn merge_contributor(email: &str, contributor: &Contributor, tickets: Vec<Issue>) -> MergedRecord {
  merge_entry(email, &entry_for_contributor(contributor, tickets))
}

use crate::common::{cli, stdout_json};
use test_support::DataDir;

#[test]
fn authors_on_one_contributor_fixture_is_exact() {
  let data = DataDir::with_fixture("one_contributor.json");
  let out = cli(&data).arg("authors").output().unwrap();

  assert!(out.status.success());
  assert_eq!(stdout_json(&out), serde_json::json!([{"name": "A", "emails": ["a@x.com"]}]));
}

#[test]
fn authors_on_missing_commits_file_is_empty() {
  let data = DataDir::new();
  let out = cli(&data).arg("authors").output().unwrap();

  assert!(out.status.success());
  assert_eq!(stdout_json(&out), serde_json::json!([]));
}

#[test]
fn commits_by_author_ignores_case_and_defaults_null_lists() {
  let data = DataDir::with_fixture("commits.json");
  let out = cli(&data).args(["commits", "lin CHEN"]).output().unwrap();

  assert!(out.status.success());
  let v = stdout_json(&out);
  assert_eq!(v["name"], "Lin Chen");
  assert_eq!(v["regular_commits"].as_array().unwrap().len(), 1);
  assert_eq!(v["overtime_commits"], serde_json::json!([]));
}

#[test]
fn commits_for_unknown_author_is_empty_object() {
  let data = DataDir::with_fixture("commits.json");
  let out = cli(&data).args(["commits", "Nobody"]).output().unwrap();

  assert!(out.status.success());
  assert_eq!(stdout_json(&out), serde_json::json!({}));
}

#[test]
fn tickets_reads_merged_file_with_missing_fields() {
  let data = DataDir::new();
  data.write_json(
    "jira-commits-merged.json",
    &serde_json::json!({
      "a@x.com": {
        "name": "A",
        "tickets": [{"key": "P-1", "summary": "S", "assignee": "A", "status": "Done", "reporter": "B", "updated": "u"}]
      }
    }),
  );

  let out = cli(&data).args(["tickets", "a@x.com"]).output().unwrap();
  assert!(out.status.success());
  let v = stdout_json(&out);
  assert_eq!(v["email"], "a@x.com");
  assert_eq!(v["tickets"][0]["key"], "P-1");
  assert_eq!(v["regular_commits"], serde_json::json!([]));
  assert_eq!(v["overtime_commits"], serde_json::json!([]));

  let out = cli(&data).args(["tickets", "nobody@x.com"]).output().unwrap();
  let v = stdout_json(&out);
  assert_eq!(v["name"], "");
  assert_eq!(v["tickets"], serde_json::json!([]));
}

use crate::common::{cli, stdout_json, stdout_text, with_fake_backends};
use predicates::prelude::*;
use test_support::DataDir;

#[test]
fn fetch_issues_summarizes_and_writes_merged_file() {
  let data = DataDir::with_fixture("commits.json");
  let mut cmd = cli(&data);
  with_fake_backends(&mut cmd);
  let out = cmd.args(["fetch-issues", "--write-merged"]).output().unwrap();

  assert!(out.status.success());
  let text = stdout_text(&out);
  assert!(text.starts_with("Fetched 1 tracker issues for 3 authors (1 email lookups with errors)"), "{text}");
  assert!(text.contains("- PROJ-1 [Done] Login page"));
  assert!(text.contains("lin@x.com: lookup failed"));
  assert!(text.contains("ada@home.org: no tracker account"));

  let merged = data.read_json("jira-commits-merged.json");
  assert_eq!(merged["ada@x.com"]["tickets"][0]["key"], "PROJ-1");
  assert_eq!(merged["ada@x.com"]["commits"]["overtime"].as_array().unwrap().len(), 1);
  assert!(merged.get("lin@x.com").is_some());

  // the merged file feeds the tickets query
  let out = cli(&data).args(["tickets", "ada@home.org"]).output().unwrap();
  let v = stdout_json(&out);
  assert_eq!(v["name"], "Ada Lovelace");
  assert_eq!(v["tickets"][0]["key"], "PROJ-1");
  assert_eq!(v["regular_commits"].as_array().unwrap().len(), 2);
}

#[test]
fn fetch_issues_without_credentials_fails_fast() {
  let data = DataDir::with_fixture("commits.json");
  cli(&data)
    .args(["fetch-issues"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("JIRA_BASE_URL").and(predicate::str::contains("JIRA_API_TOKEN")));
}

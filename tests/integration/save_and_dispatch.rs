use crate::common::{cli, stdout_text};
use predicates::prelude::*;
use test_support::DataDir;

fn batch(run: &str, n: usize) -> serde_json::Value {
  let reports: Vec<serde_json::Value> = (0..n)
    .map(|i| {
      serde_json::json!({
        "id": format!("{run}:dev{i}@x.com"),
        "developer_email": format!("dev{i}@x.com"),
        "ai_summary": format!("summary {i}"),
        "merged_record": {
          "email": format!("dev{i}@x.com"),
          "name": format!("Dev {i}"),
          "tickets": [],
          "regular_commits": [],
          "overtime_commits": []
        },
        "generated_at": "2025-08-15T12:00:00Z"
      })
    })
    .collect();
  serde_json::Value::Array(reports)
}

fn ids(v: &serde_json::Value) -> Vec<String> {
  v.as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap().to_string()).collect()
}

#[test]
fn saving_three_twice_keeps_first_three_as_prefix() {
  let data = DataDir::new();
  let first = data.write_json("first.json", &batch("r1", 3));
  let second = data.write_json("second.json", &batch("r2", 3));

  let out = cli(&data).args(["save", "--input", first.to_str().unwrap()]).output().unwrap();
  assert!(out.status.success());
  assert_eq!(stdout_text(&out), "All reports saved successfully! Total reports: 3");

  let out = cli(&data).args(["save", "--input", second.to_str().unwrap()]).output().unwrap();
  assert_eq!(stdout_text(&out), "All reports saved successfully! Total reports: 6");

  let store = data.read_json("reports.json");
  let mut expected = ids(&batch("r1", 3));
  expected.extend(ids(&batch("r2", 3)));
  assert_eq!(ids(&store), expected);
}

#[test]
fn save_on_corrupt_store_behaves_like_empty() {
  let data = DataDir::new();
  data.write_text("reports.json", "[{ truncated");
  let input = data.write_json("batch.json", &batch("r1", 2));

  let out = cli(&data).args(["save", "--input", input.to_str().unwrap()]).output().unwrap();
  assert!(out.status.success());
  assert_eq!(stdout_text(&out), "All reports saved successfully! Total reports: 2");
}

#[test]
fn save_of_unreadable_input_reports_error_status() {
  let data = DataDir::new();
  let missing = data.path().join("nope.json");

  let out = cli(&data).args(["save", "--input", missing.to_str().unwrap()]).output().unwrap();
  assert!(!out.status.success());
  assert!(stdout_text(&out).starts_with("Error saving reports: "));
  assert!(!data.path().join("reports.json").exists());
}

#[test]
fn slack_dispatch_counts_and_writes_back_stamps() {
  let data = DataDir::new();
  data.write_json("reports.json", &batch("r1", 3));

  let out = cli(&data).args(["dispatch", "slack", "--write-back"]).output().unwrap();
  assert!(out.status.success());
  assert_eq!(stdout_text(&out), "[Slack] 3 reports sent!");

  let store = data.read_json("reports.json");
  for r in store.as_array().unwrap() {
    assert_eq!(r["sent_to_slack_at"], "2025-08-15T12:00:00Z");
    assert!(r.get("sent_to_email_at").is_none());
  }
}

#[test]
fn email_dispatch_needs_recipient_and_smtp() {
  let data = DataDir::new();
  data.write_json("reports.json", &batch("r1", 1));

  cli(&data)
    .args(["dispatch", "email", "--to", "lead@x.com"])
    .env("SMTP_HOST", "smtp.x.com")
    .assert()
    .failure()
    .stderr(predicate::str::contains("SMTP_USERNAME").and(predicate::str::contains("SMTP_PASSWORD")));

  cli(&data)
    .args(["dispatch", "email", "--to", "lead@x.com", "--write-back"])
    .env("SMTP_HOST", "smtp.x.com")
    .env("SMTP_USERNAME", "bot")
    .env("SMTP_PASSWORD", "secret")
    .assert()
    .success()
    .stdout(predicate::str::contains("[Email] 1 reports sent!"));

  let store = data.read_json("reports.json");
  assert_eq!(store[0]["sent_to_email_at"], "2025-08-15T12:00:00Z");
}

#[test]
fn dispatch_backfills_ids_for_legacy_reports() {
  let data = DataDir::new();
  let input = data.write_json(
    "legacy.json",
    &serde_json::json!([{
      "developer_email": "old@x.com",
      "ai_summary": "old",
      "tickets_and_commits": {"email": "old@x.com", "name": "Old"}
    }]),
  );

  let out = cli(&data)
    .args(["dispatch", "slack", "--write-back", "--input", input.to_str().unwrap()])
    .output()
    .unwrap();
  assert_eq!(stdout_text(&out), "[Slack] 1 reports sent!");

  let written = data.read_json("legacy.json");
  assert_eq!(written[0]["id"], "legacy-0:old@x.com");
  assert_eq!(written[0]["merged_record"]["name"], "Old");
  assert_eq!(written[0]["sent_to_slack_at"], "2025-08-15T12:00:00Z");
}

#[test]
fn write_back_never_overwrites_an_unparseable_store() {
  let data = DataDir::new();
  let original = r#"{"reports":[{"id":"r1:a@x.com","ai_summary":"keep me"}]}"#;
  data.write_text("reports.json", original);

  cli(&data)
    .args(["dispatch", "slack", "--write-back"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("reports.json"));

  assert_eq!(std::fs::read_to_string(data.path().join("reports.json")).unwrap(), original);
}

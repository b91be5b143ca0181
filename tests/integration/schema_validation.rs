use crate::common::run_cmd;
use jsonschema::validator_for;
use test_support::DataDir;

fn compile_schema(name: &str) -> jsonschema::Validator {
  let path = test_support::schemas_dir().join(name);
  let data = std::fs::read(&path).expect("schema file");
  let schema: serde_json::Value = serde_json::from_slice(&data).expect("valid schema JSON");
  validator_for(&schema).expect("compile schema")
}

#[test]
fn run_store_conforms_to_schema() {
  let data = DataDir::with_fixture("commits.json");
  run_cmd(&data).assert().success();

  let store = data.read_json("reports.json");
  let compiled = compile_schema("reports.schema.json");
  compiled.validate(&store).expect("schema validation failed for reports.json");
}

#[test]
fn schema_rejects_report_without_developer_email() {
  let compiled = compile_schema("reports.schema.json");
  let bad = serde_json::json!([{
    "id": "run:x",
    "ai_summary": "",
    "merged_record": {"email": "", "name": "", "tickets": [], "regular_commits": [], "overtime_commits": []},
    "generated_at": "2025-08-15T12:00:00Z"
  }]);
  assert!(!compiled.is_valid(&bad));
}

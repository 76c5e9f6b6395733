//! Integration test that generates negfuzz-results.schema.json
//!
//! Run with: cargo test -p negfuzz-core --test generate_schema

use negfuzz_core::report::generate_schema;
use std::path::Path;

#[test]
fn write_schema_file() {
    let schema = generate_schema().unwrap();

    // Write to workspace root
    let workspace_root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap();
    let schema_path = workspace_root.join("negfuzz-results.schema.json");

    std::fs::write(&schema_path, &schema).expect("failed to write schema file");

    let content = std::fs::read_to_string(&schema_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(
        parsed.get("title").and_then(|v| v.as_str()),
        Some("RunReport")
    );
    let defs = parsed.get("$defs").and_then(|v| v.as_object()).unwrap();
    assert!(defs.contains_key("TestCaseResult"));
    assert!(defs.contains_key("Outcome"));
}

#[test]
fn dry_run_schema_describes_plan() {
    let schema = negfuzz_core::report::generate_dry_run_schema().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&schema).unwrap();
    assert_eq!(
        parsed.get("title").and_then(|v| v.as_str()),
        Some("DryRunPlan")
    );
    let props = parsed.get("properties").and_then(|v| v.as_object()).unwrap();
    assert!(props.contains_key("operations"));
    assert!(props.contains_key("validations"));
}

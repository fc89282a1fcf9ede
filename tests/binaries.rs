use serde_json::{ json, Value };
use std::path::Path;
use std::process::{ Command, Output };

fn seed_documents(args: &[&str], data_dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_seed-documents"))
        .args(["--store", "memory", "--data-dir"])
        .arg(data_dir)
        .args(args)
        .output()
        .unwrap()
}

fn setup_vector_indexes(args: &[&str], output_dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_setup-vector-indexes"))
        .args(["--output-dir"])
        .arg(output_dir)
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn seeding_absent_input_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let output = seed_documents(&[], dir.path());
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn seeding_records_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let records = json!([
        { "title": "Returns", "content": "30 days", "category": "policy" },
        { "title": "Shipping", "content": "2-5 days", "category": "policy" },
        { "title": "Warranty", "content": "1 year", "category": "policy" },
    ]);
    std::fs::write(dir.path().join("knowledge_base.json"), records.to_string()).unwrap();

    let output = seed_documents(&[], dir.path());
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn seeding_reviews_dataset_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let reviews: Vec<Value> = (0..120)
        .map(|i| json!({ "reviewId": i, "rating": 5 }))
        .collect();
    std::fs::write(dir.path().join("reviews.json"), Value::Array(reviews).to_string()).unwrap();

    let output = seed_documents(&["--dataset", "reviews"], dir.path());
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn malformed_seed_file_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("knowledge_base.json"), r#"{"title": "not a list"}"#).unwrap();

    let output = seed_documents(&[], dir.path());
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn explicit_input_overrides_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.json");
    std::fs::write(&input, "[1, 2]").unwrap();

    let output = seed_documents(&["--input", input.to_str().unwrap()], dir.path());
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn memory_provisioning_writes_complete_report() {
    let dir = tempfile::tempdir().unwrap();
    let output = setup_vector_indexes(&["--store", "memory"], dir.path());
    assert_eq!(output.status.code(), Some(0));

    let reports: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(reports.len(), 1);
    assert!(
        reports[0].file_name().unwrap().to_string_lossy().starts_with("vector_search_setup_results_")
    );

    let report: Value = serde_json::from_str(&std::fs::read_to_string(&reports[0]).unwrap()).unwrap();
    assert_eq!(report["all_indexes_created"], true);
    assert_eq!(report["vector_indexes"].as_object().unwrap().len(), 3);
    assert_eq!(report["supporting_indexes"]["knowledge_base_supporting"], true);
}

#[test]
fn unknown_store_exits_one_without_report() {
    let dir = tempfile::tempdir().unwrap();
    let output = setup_vector_indexes(&["--store", "dynamodb"], dir.path());
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

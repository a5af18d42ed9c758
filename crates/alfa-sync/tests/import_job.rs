//! Background import job behavior.

mod common;

use serde_json::json;
use std::sync::Arc;

use alfa_db::Interpreter;
use alfa_crm::RateLimiter;
use alfa_sync::{CandidateImporter, ImportOptions, JobState, JobTracker, MemoryStore};

use common::MockCrm;

fn importer(crm: Arc<MockCrm>, store: Arc<MemoryStore>) -> CandidateImporter {
    common::init_test_logging();
    CandidateImporter::new(
        crm,
        store,
        Arc::new(JobTracker::new()),
        Arc::new(RateLimiter::zoho_default()),
    )
}

#[tokio::test]
async fn test_invalid_max_records_fails_the_job() {
    let importer = importer(Arc::new(MockCrm::new()), Arc::new(MemoryStore::new()));

    let options = ImportOptions {
        max_records: Some(5000),
        ..ImportOptions::default()
    };
    importer.run("job_1", "Contacts", options).await;

    let status = importer.tracker().get_status("job_1").unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert_eq!(status.progress, 0);
    assert!(status
        .error
        .as_deref()
        .is_some_and(|e| e.contains("max_records cannot exceed 1000")));
}

#[tokio::test]
async fn test_empty_fetch_completes_with_zero_counts() {
    let importer = importer(Arc::new(MockCrm::new()), Arc::new(MemoryStore::new()));

    importer.run("job_1", "Contacts", ImportOptions::default()).await;

    let status = importer.tracker().get_status("job_1").unwrap();
    assert_eq!(status.state, JobState::Completed);
    assert_eq!(status.progress, 100);
    assert_eq!(status.message, "No candidates found in Zoho CRM");
    let results = status.results.unwrap();
    assert_eq!(results.total, 0);
    assert_eq!(results.created, 0);
}

#[tokio::test]
async fn test_import_creates_and_updates_interpreters() {
    let crm = Arc::new(MockCrm::new());
    crm.set_records(vec![
        json!({"id": "z1", "Full_Name": "Ana", "Email": "ana@x.com", "Language": "French"}),
        json!({"id": "z2", "Full_Name": "Bob", "Email": "bob@x.com"}),
    ]);
    let store = Arc::new(MemoryStore::new());
    let mut existing = Interpreter::new("int_1".to_string(), "Ana".to_string());
    existing.record_id = Some("z1".to_string());
    existing.email = Some("ana@x.com".to_string());
    existing.language = Some("Spanish".to_string());
    store.seed_interpreter(existing);
    let importer = importer(crm, store.clone());

    importer.run("job_1", "Contacts", ImportOptions::default()).await;

    let status = importer.tracker().get_status("job_1").unwrap();
    assert_eq!(status.state, JobState::Completed);
    assert_eq!(
        status.message,
        "Successfully imported 1 and updated 1 interpreters"
    );
    let results = status.results.unwrap();
    assert_eq!(results.total, 2);
    assert_eq!(results.created, 1);
    assert_eq!(results.updated, 1);
    assert_eq!(results.errors, 0);

    assert_eq!(store.interpreter_count(), 2);
    assert_eq!(
        store.interpreter("int_1").unwrap().language.as_deref(),
        Some("French")
    );
}

#[tokio::test]
async fn test_existing_records_skipped_when_updates_disabled() {
    let crm = Arc::new(MockCrm::new());
    crm.set_records(vec![
        json!({"id": "z1", "Full_Name": "Ana Maria", "Email": "ana@x.com"}),
    ]);
    let store = Arc::new(MemoryStore::new());
    let mut existing = Interpreter::new("int_1".to_string(), "Ana".to_string());
    existing.email = Some("ana@x.com".to_string());
    store.seed_interpreter(existing);
    let importer = importer(crm, store.clone());

    let options = ImportOptions {
        update_existing: false,
        ..ImportOptions::default()
    };
    importer.run("job_1", "Contacts", options).await;

    let results = importer.tracker().get_status("job_1").unwrap().results.unwrap();
    assert_eq!(results.skipped, 1);
    assert_eq!(results.updated, 0);
    assert_eq!(store.interpreter("int_1").unwrap().contact_name, "Ana");
}

#[tokio::test]
async fn test_fetch_failure_fails_the_job() {
    let crm = Arc::new(MockCrm::new());
    crm.fail_fetch();
    let importer = importer(crm, Arc::new(MemoryStore::new()));

    importer.run("job_1", "Contacts", ImportOptions::default()).await;

    let status = importer.tracker().get_status("job_1").unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert!(status.message.starts_with("Import failed:"));
    assert!(status.results.is_none());
}

#[tokio::test]
async fn test_max_records_truncates_the_fetch() {
    let crm = Arc::new(MockCrm::new());
    crm.set_records(vec![
        json!({"id": "z1", "Full_Name": "Ana", "Email": "ana@x.com"}),
        json!({"id": "z2", "Full_Name": "Bob", "Email": "bob@x.com"}),
        json!({"id": "z3", "Full_Name": "Cara", "Email": "cara@x.com"}),
    ]);
    let store = Arc::new(MemoryStore::new());
    let importer = importer(crm, store.clone());

    let options = ImportOptions {
        max_records: Some(2),
        ..ImportOptions::default()
    };
    importer.run("job_1", "Contacts", options).await;

    let results = importer.tracker().get_status("job_1").unwrap().results.unwrap();
    assert_eq!(results.total, 2);
    assert_eq!(store.interpreter_count(), 2);
}

/*!
 * Behaviour shared by both progress store backends
 */

use serde_json::json;
use std::sync::Arc;

use dataset_translator::database::SqliteProgressStore;
use dataset_translator::translation::{FileProgressStore, InstructionPair, ProgressStore, WriteOutcome, read_record, write_record};

use crate::common::{SharedStore, create_temp_dir};

fn backends(dir: &std::path::Path) -> Vec<(&'static str, SharedStore)> {
    vec![
        ("files", Arc::new(FileProgressStore::new(dir.join("files")))),
        ("sqlite", Arc::new(SqliteProgressStore::open(dir.join("progress.db")).unwrap())),
    ]
}

#[test]
fn test_stores_writeOnce_shouldKeepFirstRecord() {
    let dir = create_temp_dir().unwrap();
    for (name, store) in backends(dir.path()) {
        let first = write_record(store.as_ref(), "instructions", 0, &InstructionPair::new("um", "dois")).unwrap();
        let second = write_record(store.as_ref(), "instructions", 0, &InstructionPair::new("três", "quatro")).unwrap();

        assert_eq!(first, WriteOutcome::Written, "{}", name);
        assert_eq!(second, WriteOutcome::AlreadyPresent, "{}", name);
        let stored: InstructionPair = read_record(store.as_ref(), "instructions", 0).unwrap().unwrap();
        assert_eq!(stored, InstructionPair::new("um", "dois"), "{}", name);
    }
}

#[test]
fn test_stores_namespaces_shouldNotOverlap() {
    let dir = create_temp_dir().unwrap();
    for (name, store) in backends(dir.path()) {
        store.write("instructions", 1, &json!({"k": 1})).unwrap();
        store.write("multiple_choice", 2, &json!({"k": 2})).unwrap();

        assert!(store.exists("instructions", 1).unwrap(), "{}", name);
        assert!(!store.exists("instructions", 2).unwrap(), "{}", name);
        assert_eq!(store.indices("multiple_choice").unwrap().into_iter().collect::<Vec<_>>(), vec![2], "{}", name);
    }
}

#[test]
fn test_stores_invalidate_shouldReportWhetherSomethingWasRemoved() {
    let dir = create_temp_dir().unwrap();
    for (name, store) in backends(dir.path()) {
        store.write("instructions", 5, &json!({"k": 5})).unwrap();

        assert!(store.invalidate("instructions", 5).unwrap(), "{}", name);
        assert!(!store.invalidate("instructions", 5).unwrap(), "{}", name);
        assert_eq!(store.read("instructions", 5).unwrap(), None, "{}", name);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stores_concurrentWritesToOneKey_shouldPersistExactlyOne() {
    let dir = create_temp_dir().unwrap();
    for (name, store) in backends(dir.path()) {
        let handles: Vec<_> = (0..16)
            .map(|writer| {
                let store = store.clone();
                tokio::spawn(async move { store.write("instructions", 9, &json!({ "writer": writer })).unwrap() })
            })
            .collect();

        let mut written = 0;
        for handle in handles {
            if handle.await.unwrap() == WriteOutcome::Written {
                written += 1;
            }
        }

        assert_eq!(written, 1, "{}", name);
        assert!(store.read("instructions", 9).unwrap().is_some(), "{}", name);
    }
}

#[test]
fn test_fileStore_shouldLeaveNoStagingFiles() {
    let dir = create_temp_dir().unwrap();
    let store = FileProgressStore::new(dir.path());
    for index in 0..5 {
        store.write("instructions", index, &json!({ "i": index })).unwrap();
    }

    let names: Vec<String> = std::fs::read_dir(dir.path().join("instructions"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names.len(), 5);
    assert!(names.iter().all(|name| name.ends_with(".json") && !name.starts_with('.')));
}

use crate::hashing::Fingerprint;
use crate::state::{ModuleStatus, STATUS_FORMAT_VERSION, StatusRecord};

fn status(fingerprint: &str, version: u64) -> ModuleStatus {
    ModuleStatus {
        fingerprint: fingerprint.to_string(),
        version,
    }
}

#[test]
fn test_status_record_operations() {
    let mut record = StatusRecord::new();
    assert!(record.is_empty());
    assert_eq!(record.version, STATUS_FORMAT_VERSION);

    record.upsert("../lib", status("abc", 10));
    assert_eq!(record.len(), 1);
    assert_eq!(record.get("../lib").unwrap().version, 10);

    record.upsert("../lib", status("def", 20));
    assert_eq!(record.len(), 1);
    assert_eq!(record.get("../lib").unwrap().fingerprint, "def");
    assert!(record.get("../other").is_none());
}

#[test]
fn test_fingerprints_mapping() {
    let mut record = StatusRecord::new();
    record.upsert("/a", status("one", 1));
    record.upsert("/b", status("two", 2));

    let fingerprints = record.fingerprints();
    assert_eq!(fingerprints.len(), 2);
    assert_eq!(fingerprints["/a"], Fingerprint::from_stored("one"));
    assert_eq!(fingerprints["/b"], Fingerprint::from_stored("two"));
}

#[test]
fn test_max_version() {
    let mut record = StatusRecord::new();
    assert!(record.max_version().is_none());

    record.upsert("/a", status("one", 1_700_000_000_000));
    record.upsert("/b", status("two", 1_700_000_000_500));
    record.upsert("/c", status("three", 1_600_000_000_000));

    assert_eq!(record.max_version(), Some(1_700_000_000_500));
}

//! Tests that verify the cursor store survives simulated crashes.
//!
//! Each test interrupts the atomic write protocol at a specific point and
//! checks that re-reading the cursor path yields the previous fully-written
//! value (or absence), never partial bytes.
//!
//! Run with: cargo test --test cursor_crash_tests

use floe::cursor::{CursorRecord, CursorStore};
use tempfile::TempDir;

fn record_with(name: &str, pos: u64) -> CursorRecord {
    let mut record = CursorRecord::default();
    record.set(name, pos);
    record
}

/// Crash before the rename: a temp file exists but the final path still
/// holds the previous committed value.
#[tokio::test]
async fn test_crash_before_rename_preserves_previous_value() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cursor.json");
    let store = CursorStore::new(&path, "crash_test");

    let committed = record_with("updates", 1_000);
    store.write(&committed).await.unwrap();

    // Simulate a crash mid-write: a newer value was fully serialized to the
    // temp sibling but the process died before the rename.
    let newer = record_with("updates", 5_000);
    let newer_bytes = serde_json::to_vec_pretty(&newer).unwrap();
    std::fs::write(dir.path().join("cursor.json.tmp"), newer_bytes).unwrap();

    // Recovery reads the committed value, not the orphaned temp file.
    let recovered = store.read().await.unwrap().unwrap();
    assert_eq!(recovered, committed);
    assert_eq!(recovered.position("updates"), Some(1_000));
}

/// Crash mid-serialization: truncated bytes at the temp path are ignored and
/// a subsequent write cleans up after itself.
#[tokio::test]
async fn test_truncated_temp_file_never_observed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cursor.json");
    let store = CursorStore::new(&path, "crash_test");

    let committed = record_with("events", 42);
    store.write(&committed).await.unwrap();

    // Torn temp write from a crashed process.
    std::fs::write(dir.path().join("cursor.json.tmp"), b"{\"positions\":{\"ev").unwrap();

    let recovered = store.read().await.unwrap().unwrap();
    assert_eq!(recovered, committed);

    // The next successful write replaces the torn temp file entirely.
    let next = record_with("events", 43);
    store.write(&next).await.unwrap();
    assert!(!dir.path().join("cursor.json.tmp").exists());
    assert_eq!(store.read().await.unwrap().unwrap(), next);
}

/// Crash before any cursor ever committed: recovery sees absence, a
/// fresh-start signal rather than an error.
#[tokio::test]
async fn test_crash_with_only_temp_file_reads_as_no_checkpoint() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cursor.json");

    std::fs::write(dir.path().join("cursor.json.tmp"), b"partial").unwrap();

    let store = CursorStore::new(&path, "crash_test");
    assert!(store.read().await.unwrap().is_none());
}

/// The backup sibling always equals the pre-write bytes, so a corrupted
/// primary (e.g. filesystem damage after the rename) stays recoverable.
#[tokio::test]
async fn test_backup_recovers_corrupted_primary() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cursor.json");
    let store = CursorStore::new(&path, "crash_test");

    let first = record_with("updates", 100);
    store.write(&first).await.unwrap();
    let second = record_with("updates", 200);
    store.write(&second).await.unwrap();

    // Backup bytes are exactly the first record's serialization.
    let bak = std::fs::read(dir.path().join("cursor.json.bak")).unwrap();
    assert_eq!(bak, serde_json::to_vec_pretty(&first).unwrap());

    // Corrupt the primary; the caller falls back to the backup.
    std::fs::write(&path, b"\x00\x00garbage").unwrap();
    assert!(store.read().await.unwrap().is_none());

    let recovered = store.read_backup().await.unwrap().unwrap();
    assert_eq!(recovered, first);
}

/// A failed write never disturbs the committed cursor and leaves no temp
/// file behind.
#[tokio::test]
async fn test_failed_write_leaves_cursor_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cursor.json");
    let store = CursorStore::new(&path, "crash_test");

    let committed = record_with("updates", 7);
    store.write(&committed).await.unwrap();

    // Make the directory read-only so the temp create fails.
    let mut perms = std::fs::metadata(dir.path()).unwrap().permissions();
    let original = perms.clone();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(0o555);
        std::fs::set_permissions(dir.path(), perms).unwrap();

        let err = store.write(&record_with("updates", 8)).await.unwrap_err();
        assert!(err.to_string().contains("atomic cursor write failed"));

        std::fs::set_permissions(dir.path(), original).unwrap();
    }

    let recovered = store.read().await.unwrap().unwrap();
    assert_eq!(recovered, committed);
    assert!(!dir.path().join("cursor.json.tmp").exists());
}

/// Many sequential overwrites: every intermediate read observes a complete
/// record, and the final state matches the last write.
#[tokio::test]
async fn test_repeated_overwrites_always_complete() {
    let dir = TempDir::new().unwrap();
    let store = CursorStore::new(dir.path().join("cursor.json"), "crash_test");

    for i in 1..=50u64 {
        store.write(&record_with("updates", i)).await.unwrap();
        let read_back = store.read().await.unwrap().unwrap();
        assert_eq!(read_back.position("updates"), Some(i));
    }

    // Backup trails by exactly one write.
    let bak = store.read_backup().await.unwrap().unwrap();
    assert_eq!(bak.position("updates"), Some(49));
}

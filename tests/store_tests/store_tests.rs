//! Tests for RecordStore and AssociationTable
//!
//! These tests verify:
//! - Creating, reopening and replaying a store
//! - Insert-or-update semantics per (search string, filename) pair
//! - Per-file deletion and its no-op case
//! - Scan order and restartability
//! - Recovery from interrupted appends on open
//! - Read-only mode
//! - Compaction

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use fuzzdex::config::{Config, SyncStrategy};
use fuzzdex::store::{AssociationTable, RecordStore, Recovery, FILE_HEADER_SIZE};
use fuzzdex::DexError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_path() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index.fzdx");
    (temp_dir, path)
}

fn config() -> Config {
    Config::builder()
        .sync_strategy(SyncStrategy::EveryWrite)
        .build()
}

fn read_only_config() -> Config {
    Config::builder().read_only(true).build()
}

fn pairs(store: &RecordStore) -> Vec<(String, String)> {
    store
        .scan()
        .map(|a| (a.search_string.clone(), a.filename.clone()))
        .collect()
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_creates_file_with_header() {
    let (_temp, path) = setup_temp_path();

    let store = RecordStore::open(&path, &config()).unwrap();

    assert!(path.exists());
    assert_eq!(fs::metadata(&path).unwrap().len(), FILE_HEADER_SIZE as u64);
    assert!(store.is_empty());
    assert_eq!(store.total_records(), 0);
}

#[test]
fn test_open_empty_file_initializes_it() {
    let (_temp, path) = setup_temp_path();
    fs::File::create(&path).unwrap();

    let store = RecordStore::open(&path, &config()).unwrap();

    assert!(store.is_empty());
    assert_eq!(fs::metadata(&path).unwrap().len(), FILE_HEADER_SIZE as u64);
}

#[test]
fn test_open_garbage_file_is_corrupt() {
    let (_temp, path) = setup_temp_path();
    fs::write(&path, b"this is not a database").unwrap();

    let result = RecordStore::open(&path, &config());

    assert!(matches!(result, Err(DexError::CorruptFormat(_))));
}

#[test]
fn test_open_in_missing_directory_fails() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("missing").join("index.fzdx");

    let result = RecordStore::open(&path, &config());

    assert!(matches!(result, Err(DexError::Io(_))));
}

// =============================================================================
// Append / Update Tests
// =============================================================================

#[test]
fn test_append_new_pairs() {
    let (_temp, path) = setup_temp_path();
    let mut store = RecordStore::open(&path, &config()).unwrap();

    store.append_or_update("report", "/tmp/a.txt", 100).unwrap();
    store.append_or_update("invoice", "/tmp/b.txt", 200).unwrap();
    store.append_or_update("draft", "/tmp/a.txt", 300).unwrap();

    assert_eq!(store.len(), 3);
    assert_eq!(store.file_count(), 2);
    assert_eq!(
        pairs(&store),
        vec![
            ("report".to_string(), "/tmp/a.txt".to_string()),
            ("invoice".to_string(), "/tmp/b.txt".to_string()),
            ("draft".to_string(), "/tmp/a.txt".to_string()),
        ]
    );
}

#[test]
fn test_update_existing_pair_keeps_one_association() {
    let (_temp, path) = setup_temp_path();
    let mut store = RecordStore::open(&path, &config()).unwrap();

    store.append_or_update("report", "/tmp/a.txt", 100).unwrap();
    let stored = store.append_or_update("report", "/tmp/a.txt", 250).unwrap();

    assert_eq!(stored, 250);
    assert_eq!(store.len(), 1);
    assert_eq!(store.total_records(), 2);
    assert_eq!(store.dead_records(), 1);
    assert_eq!(store.scan().next().unwrap().timestamp, 250);
}

#[test]
fn test_update_never_moves_timestamp_backwards() {
    let (_temp, path) = setup_temp_path();
    let mut store = RecordStore::open(&path, &config()).unwrap();

    store.append_or_update("report", "/tmp/a.txt", 500).unwrap();
    let stored = store.append_or_update("report", "/tmp/a.txt", 400).unwrap();

    assert_eq!(stored, 500);
}

#[test]
fn test_update_keeps_scan_position() {
    let (_temp, path) = setup_temp_path();
    let mut store = RecordStore::open(&path, &config()).unwrap();

    store.append_or_update("a", "/f1", 1).unwrap();
    store.append_or_update("b", "/f2", 2).unwrap();
    store.append_or_update("a", "/f1", 3).unwrap();

    let order: Vec<&str> = store.scan().map(|a| a.search_string.as_str()).collect();
    assert_eq!(order, vec!["a", "b"]);
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_all_for_file() {
    let (_temp, path) = setup_temp_path();
    let mut store = RecordStore::open(&path, &config()).unwrap();

    store.append_or_update("report", "/tmp/a.txt", 1).unwrap();
    store.append_or_update("draft", "/tmp/a.txt", 2).unwrap();
    store.append_or_update("invoice", "/tmp/b.txt", 3).unwrap();

    let removed = store.delete_all_for("/tmp/a.txt").unwrap();

    assert_eq!(removed, 2);
    assert_eq!(store.len(), 1);
    assert_eq!(store.scan_file("/tmp/a.txt").count(), 0);
    assert_eq!(store.scan().next().unwrap().filename, "/tmp/b.txt");
}

#[test]
fn test_delete_unknown_file_is_noop() {
    let (_temp, path) = setup_temp_path();
    let mut store = RecordStore::open(&path, &config()).unwrap();
    store.append_or_update("report", "/tmp/a.txt", 1).unwrap();
    let len_before = fs::metadata(&path).unwrap().len();

    let removed = store.delete_all_for("/nope").unwrap();

    assert_eq!(removed, 0);
    assert_eq!(store.total_records(), 1);
    assert_eq!(fs::metadata(&path).unwrap().len(), len_before);
}

// =============================================================================
// Scan Tests
// =============================================================================

#[test]
fn test_scan_is_restartable() {
    let (_temp, path) = setup_temp_path();
    let mut store = RecordStore::open(&path, &config()).unwrap();
    for i in 0..10 {
        store.append_or_update(&format!("k{}", i), "/f", i).unwrap();
    }

    let first: Vec<_> = store.scan().collect();
    let second: Vec<_> = store.scan().collect();

    assert_eq!(first.len(), 10);
    assert_eq!(first, second);
}

#[test]
fn test_files_summary() {
    let (_temp, path) = setup_temp_path();
    let mut store = RecordStore::open(&path, &config()).unwrap();

    store.append_or_update("x", "/b", 10).unwrap();
    store.append_or_update("y", "/a", 30).unwrap();
    store.append_or_update("z", "/a", 20).unwrap();

    let files = store.files();

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].filename, "/a");
    assert_eq!(files[0].keywords, 2);
    assert_eq!(files[0].last_modified, 30);
    assert_eq!(files[1].filename, "/b");
    assert_eq!(files[1].last_modified, 10);
}

// =============================================================================
// Persistence / Recovery Tests
// =============================================================================

#[test]
fn test_reopen_replays_updates_and_deletes() {
    let (_temp, path) = setup_temp_path();

    {
        let mut store = RecordStore::open(&path, &config()).unwrap();
        store.append_or_update("report", "/tmp/a.txt", 1).unwrap();
        store.append_or_update("invoice", "/tmp/b.txt", 2).unwrap();
        store.append_or_update("report", "/tmp/a.txt", 5).unwrap();
        store.append_or_update("memo", "/tmp/c.txt", 6).unwrap();
        store.delete_all_for("/tmp/b.txt").unwrap();
        store.flush_and_close().unwrap();
    }

    let store = RecordStore::open(&path, &config()).unwrap();

    assert_eq!(store.len(), 2);
    assert_eq!(store.total_records(), 5);
    assert_eq!(
        pairs(&store),
        vec![
            ("report".to_string(), "/tmp/a.txt".to_string()),
            ("memo".to_string(), "/tmp/c.txt".to_string()),
        ]
    );
    assert_eq!(store.scan().next().unwrap().timestamp, 5);
}

#[test]
fn test_reopen_without_close_keeps_data() {
    let (_temp, path) = setup_temp_path();

    {
        let mut store = RecordStore::open(&path, &config()).unwrap();
        store.append_or_update("report", "/tmp/a.txt", 1).unwrap();
        // Simulated crash: no flush_and_close
        drop(store);
    }

    let store = RecordStore::open(&path, &config()).unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn test_open_truncates_interrupted_append() {
    let (_temp, path) = setup_temp_path();

    {
        let mut store = RecordStore::open(&path, &config()).unwrap();
        store.append_or_update("report", "/tmp/a.txt", 1).unwrap();
        store.flush_and_close().unwrap();
    }
    let good_len = fs::metadata(&path).unwrap().len();

    // Half a record header left by a crash
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[9, 9, 9, 9, 9, 9, 9]).unwrap();
    }

    let mut store = RecordStore::open(&path, &config()).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(fs::metadata(&path).unwrap().len(), good_len);

    // Appends continue cleanly after the cut
    store.append_or_update("invoice", "/tmp/b.txt", 2).unwrap();
    drop(store);

    let (_, result) = Recovery::recover(&path).unwrap();
    assert_eq!(result.records_recovered, 2);
    assert_eq!(result.torn_bytes, 0);
}

// =============================================================================
// Read-Only Tests
// =============================================================================

#[test]
fn test_read_only_rejects_mutations() {
    let (_temp, path) = setup_temp_path();
    {
        let mut store = RecordStore::open(&path, &config()).unwrap();
        store.append_or_update("report", "/tmp/a.txt", 1).unwrap();
    }

    let mut store = RecordStore::open(&path, &read_only_config()).unwrap();

    assert!(store.is_read_only());
    assert_eq!(store.len(), 1);
    assert!(matches!(
        store.append_or_update("x", "/y", 1),
        Err(DexError::ReadOnly)
    ));
    assert!(matches!(
        store.delete_all_for("/tmp/a.txt"),
        Err(DexError::ReadOnly)
    ));
    assert!(matches!(store.compact(), Err(DexError::ReadOnly)));
}

#[test]
fn test_read_only_missing_file_fails() {
    let (_temp, path) = setup_temp_path();

    let result = RecordStore::open(&path, &read_only_config());

    assert!(matches!(result, Err(DexError::Io(_))));
    assert!(!path.exists());
}

#[test]
fn test_read_only_empty_file_opens_empty() {
    let (_temp, path) = setup_temp_path();
    fs::write(&path, b"").unwrap();

    let store = RecordStore::open(&path, &read_only_config()).unwrap();

    assert!(store.is_read_only());
    assert!(store.is_empty());
    assert_eq!(store.total_records(), 0);
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
}

#[test]
fn test_read_only_leaves_torn_tail_in_place() {
    let (_temp, path) = setup_temp_path();
    {
        let mut store = RecordStore::open(&path, &config()).unwrap();
        store.append_or_update("report", "/tmp/a.txt", 1).unwrap();
    }
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[1, 2, 3]).unwrap();
    }
    let len = fs::metadata(&path).unwrap().len();

    let store = RecordStore::open(&path, &read_only_config()).unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(fs::metadata(&path).unwrap().len(), len);
}

// =============================================================================
// Compaction Tests
// =============================================================================

#[test]
fn test_compact_drops_dead_records() {
    let (_temp, path) = setup_temp_path();
    let mut store = RecordStore::open(&path, &config()).unwrap();

    for i in 0..20 {
        store.append_or_update("same", "/tmp/a.txt", i).unwrap();
    }
    store.append_or_update("gone", "/tmp/b.txt", 1).unwrap();
    store.delete_all_for("/tmp/b.txt").unwrap();
    assert_eq!(store.total_records(), 22);

    let stats = store.compact().unwrap();

    assert_eq!(stats.records_before, 22);
    assert_eq!(stats.records_after, 1);
    assert!(stats.bytes_after < stats.bytes_before);
    assert_eq!(store.total_records(), 1);
    assert_eq!(store.dead_records(), 0);
    assert_eq!(fs::metadata(&path).unwrap().len(), stats.bytes_after);
}

#[test]
fn test_compacted_file_reopens_with_same_content() {
    let (_temp, path) = setup_temp_path();

    {
        let mut store = RecordStore::open(&path, &config()).unwrap();
        store.append_or_update("a", "/f1", 1).unwrap();
        store.append_or_update("b", "/f2", 2).unwrap();
        store.append_or_update("a", "/f1", 3).unwrap();
        store.delete_all_for("/f2").unwrap();
        store.compact().unwrap();
        // Appends after compaction land in the new file
        store.append_or_update("c", "/f3", 4).unwrap();
        store.flush_and_close().unwrap();
    }

    let store = RecordStore::open(&path, &config()).unwrap();
    assert_eq!(
        pairs(&store),
        vec![
            ("a".to_string(), "/f1".to_string()),
            ("c".to_string(), "/f3".to_string()),
        ]
    );
    assert_eq!(store.scan().next().unwrap().timestamp, 3);
    assert_eq!(store.total_records(), 2);
}

#[cfg(unix)]
#[test]
fn test_failed_compaction_disables_writes() {
    let (_temp, path) = setup_temp_path();
    let mut store = RecordStore::open(&path, &config()).unwrap();
    store.append_or_update("a", "/f1", 1).unwrap();
    store.append_or_update("a", "/f1", 2).unwrap();

    // Nothing can be renamed over or read back from a directory
    fs::remove_file(&path).unwrap();
    fs::create_dir(&path).unwrap();

    assert!(store.compact().is_err());

    assert!(!store.is_read_only());
    assert!(matches!(
        store.append_or_update("b", "/f2", 3),
        Err(DexError::Io(_))
    ));
    assert!(matches!(store.delete_all_for("/f1"), Err(DexError::Io(_))));
    assert_eq!(pairs(&store), vec![("a".to_string(), "/f1".to_string())]);
    assert!(store.flush_and_close().is_err());
}

#[test]
fn test_should_compact_thresholds() {
    let (_temp, path) = setup_temp_path();
    let mut store = RecordStore::open(&path, &config()).unwrap();

    assert!(!store.should_compact(0, 0.5));

    store.append_or_update("a", "/f", 1).unwrap();
    store.append_or_update("a", "/f", 2).unwrap();
    store.append_or_update("a", "/f", 3).unwrap();

    // 2 of 3 records dead
    assert!(store.should_compact(3, 0.5));
    assert!(!store.should_compact(4, 0.5));
    assert!(!store.should_compact(3, 0.7));
}

#[test]
fn test_open_removes_stale_compaction_file() {
    let (_temp, path) = setup_temp_path();
    let scratch = PathBuf::from(format!("{}.compact", path.display()));
    fs::write(&scratch, b"leftover").unwrap();

    let _store = RecordStore::open(&path, &config()).unwrap();

    assert!(!scratch.exists());
}

// =============================================================================
// AssociationTable Tests
// =============================================================================

#[test]
fn test_table_upsert_reports_new_pairs() {
    let mut table = AssociationTable::new();

    assert!(table.upsert("k", "/f", 1));
    assert!(!table.upsert("k", "/f", 2));
    assert!(table.upsert("k", "/g", 3));

    assert_eq!(table.len(), 2);
    assert_eq!(table.get("k", "/f"), Some(2));
}

#[test]
fn test_table_remove_file_and_iter_file() {
    let mut table = AssociationTable::new();
    table.upsert("b", "/f", 1);
    table.upsert("x", "/g", 1);
    table.upsert("a", "/f", 2);

    let keywords: Vec<&str> = table.iter_file("/f").map(|a| a.search_string.as_str()).collect();
    assert_eq!(keywords, vec!["b", "a"]);

    assert_eq!(table.remove_file("/f"), 2);
    assert_eq!(table.remove_file("/f"), 0);
    assert!(!table.contains_file("/f"));
    assert_eq!(table.file_count(), 1);
}

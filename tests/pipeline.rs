//! Integration tests for the scan → schedule → notify pipeline.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;

use code_intel::{
    AnalyzerRegistry, ChangeNotification, ChangeScheduler, FileEvent, FileEventKind, FileSummary,
    ProjectScanner, SnapshotStore, Symbol, SymbolIndex, SymbolKind,
};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn scanner_for(root: &Path, index: Arc<SymbolIndex>) -> Arc<ProjectScanner> {
    Arc::new(ProjectScanner::new(
        root,
        Arc::new(AnalyzerRegistry::new()),
        index,
        SnapshotStore::new(root.join(".code-intel/index.json")),
    ))
}

/// `a.py` valid, `b.py` broken, already fully scanned
fn scanned_project() -> (TempDir, Arc<SymbolIndex>, Arc<ChangeScheduler>) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    write(dir.path(), "a.py", "def foo():\n    return 1\n");
    write(dir.path(), "b.py", "def broken(:\n    pass\n");

    let index = Arc::new(SymbolIndex::new());
    let scanner = scanner_for(dir.path(), index.clone());
    scanner.full_scan().expect("full scan failed");

    let scheduler = Arc::new(ChangeScheduler::new(scanner, Duration::from_millis(20)));
    (dir, index, scheduler)
}

mod scenarios {
    use super::*;

    #[test]
    fn test_full_scan_records_symbols_and_errors() {
        let (_dir, index, _scheduler) = scanned_project();

        let a = index.get("a.py").expect("a.py indexed");
        assert_eq!(a.symbols.len(), 1);
        assert_eq!(a.symbols[0].name, "foo");
        assert_eq!(a.symbols[0].kind, SymbolKind::Function);
        assert!(a.errors.is_empty());

        let b = index.get("b.py").expect("b.py indexed despite errors");
        assert!(b.symbols.is_empty());
        assert_eq!(b.errors.len(), 1);
        assert!(b.errors[0].line.is_some());
    }

    #[test]
    fn test_edit_yields_update_notification() {
        let (dir, _index, scheduler) = scanned_project();
        let (_id, mut rx) = scheduler.subscribe();

        write(dir.path(), "a.py", "def foo():\n    return 2\n");
        scheduler.enqueue(dir.path().join("a.py"));
        scheduler.drain();

        let note = rx.try_recv().expect("one notification");
        assert_eq!(
            note,
            ChangeNotification {
                updated: ["a.py".to_string()].into_iter().collect(),
                deleted: Default::default(),
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_delete_yields_deletion_notification() {
        let (dir, index, scheduler) = scanned_project();
        let (_id, mut rx) = scheduler.subscribe();

        fs::remove_file(dir.path().join("b.py")).unwrap();
        scheduler.enqueue_event(&FileEvent::new(dir.path().join("b.py"), FileEventKind::Deleted));
        scheduler.drain();

        let note = rx.try_recv().expect("one notification");
        assert!(note.updated.is_empty());
        assert_eq!(note.deleted.iter().collect::<Vec<_>>(), vec!["b.py"]);
        assert!(index.get("b.py").is_none());
    }

    #[test]
    fn test_renamed_directory_moves_its_files() {
        let (dir, index, scheduler) = scanned_project();
        write(dir.path(), "pkg/a.py", "def inner():\n    pass\n");
        scheduler.enqueue(dir.path().join("pkg/a.py"));
        scheduler.drain();
        assert!(index.contains("pkg/a.py"));

        fs::rename(dir.path().join("pkg"), dir.path().join("pkg2")).unwrap();
        scheduler.enqueue_event(&FileEvent::new(dir.path().join("pkg"), FileEventKind::Deleted));
        scheduler.enqueue_event(&FileEvent::new(dir.path().join("pkg2"), FileEventKind::Created));
        let note = scheduler.drain().expect("rename is a change");

        assert_eq!(note.updated.iter().collect::<Vec<_>>(), vec!["pkg2/a.py"]);
        assert_eq!(note.deleted.iter().collect::<Vec<_>>(), vec!["pkg/a.py"]);
        assert!(!index.contains("pkg/a.py"));
        assert_eq!(index.get("pkg2/a.py").unwrap().symbols[0].name, "inner");
    }
}

mod properties {
    use super::*;

    #[test]
    fn test_incremental_scan_is_idempotent() {
        let (dir, index, scheduler) = scanned_project();
        let scanner = scanner_for(dir.path(), index.clone());
        drop(scheduler);

        write(dir.path(), "a.py", "def foo():\n    return 3\n");
        let path = dir.path().join("a.py");

        let first = scanner.incremental_scan(&[path.clone()]);
        assert_eq!(first.updated, vec!["a.py"]);
        let after_first = index.get("a.py").unwrap();

        let second = scanner.incremental_scan(&[path]);
        assert!(second.updated.is_empty());
        assert_eq!(second.unchanged, vec!["a.py"]);
        let after_second = index.get("a.py").unwrap();

        assert_eq!(*after_first, *after_second);
        // No re-analysis: the stored summary is the very same allocation
        assert!(Arc::ptr_eq(&after_first, &after_second));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (dir, index, _scheduler) = scanned_project();
        let store = SnapshotStore::new(dir.path().join(".code-intel/index.json"));

        let loaded = store.load().unwrap().expect("snapshot written by full scan");
        let restored = SymbolIndex::new();
        restored.replace_all(loaded);

        assert_eq!(restored.paths(), index.paths());
        for original in index.all() {
            let copy = restored.get(&original.path).unwrap();
            assert_eq!(copy.content_hash, original.content_hash);
            assert_eq!(copy.symbols, original.symbols);
            assert_eq!(copy.errors, original.errors);
        }
    }

    #[test]
    fn test_rapid_events_coalesce_into_one_update() {
        let (dir, _index, scheduler) = scanned_project();
        let (_id, mut rx) = scheduler.subscribe();
        let path = dir.path().join("a.py");

        for i in 0..5 {
            write(dir.path(), "a.py", &format!("def foo():\n    return {}\n", i + 10));
            scheduler.enqueue_event(&FileEvent::new(&path, FileEventKind::Modified));
        }
        assert_eq!(scheduler.pending_count(), 1);

        scheduler.drain();
        let note = rx.try_recv().unwrap();
        assert_eq!(note.updated.len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_readers_never_see_mixed_summaries() {
        let index = Arc::new(SymbolIndex::new());

        let summary = |prefix: &str| FileSummary {
            path: "a.py".to_string(),
            content_hash: prefix.to_string(),
            modified_at: Utc::now(),
            symbols: (1..=50)
                .map(|i| Symbol::new(format!("{}_{}", prefix, i), SymbolKind::Function, i))
                .collect(),
            errors: Vec::new(),
        };
        index.put("a.py", summary("old"));

        let writer = {
            let index = index.clone();
            let old = summary("old");
            let new = summary("new");
            thread::spawn(move || {
                for i in 0..500 {
                    let next = if i % 2 == 0 { new.clone() } else { old.clone() };
                    index.put("a.py", next);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let index = index.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        let seen = index.get("a.py").unwrap();
                        let prefix = format!("{}_", seen.content_hash);
                        assert!(seen.symbols.iter().all(|s| s.name.starts_with(&prefix)));
                        assert_eq!(seen.symbols.len(), 50);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_restart_reanalyzes_stale_snapshot_entries() {
        let (dir, _index, scheduler) = scanned_project();
        drop(scheduler);

        // Changed while no process was running
        write(dir.path(), "a.py", "def renamed():\n    pass\n");

        let index = Arc::new(SymbolIndex::new());
        let scanner = scanner_for(dir.path(), index.clone());
        assert!(scanner.hydrate_from_snapshot());
        assert_eq!(index.get("a.py").unwrap().symbols[0].name, "foo");

        scanner.full_scan().unwrap();
        assert_eq!(index.get("a.py").unwrap().symbols[0].name, "renamed");
    }
}

mod scheduling {
    use super::*;

    #[tokio::test]
    async fn test_periodic_drain_publishes_changes() {
        let (dir, index, scheduler) = scanned_project();
        let (_id, mut rx) = scheduler.subscribe();
        let handle = scheduler.spawn();

        write(dir.path(), "c.py", "class Widget:\n    def draw(self):\n        pass\n");
        scheduler.enqueue(dir.path().join("c.py"));

        let note = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("drain within timeout")
            .expect("channel open");
        assert!(note.updated.contains("c.py"));
        assert_eq!(index.get("c.py").unwrap().symbols.len(), 2);

        handle.stop().await;
    }

    #[test]
    fn test_empty_tick_is_silent() {
        let (_dir, _index, scheduler) = scanned_project();
        let (_id, mut rx) = scheduler.subscribe();
        assert!(scheduler.force_drain().is_none());
        assert!(rx.try_recv().is_err());
    }
}

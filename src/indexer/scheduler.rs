//! Change scheduler
//!
//! Watcher events land in a pending set; each drain takes the whole set,
//! runs one incremental scan and publishes one [`ChangeNotification`]. The
//! drain gate makes drains (and forced rescans) strictly sequential.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::index::ChangeNotification;
use crate::indexer::scanner::ProjectScanner;
use crate::indexer::watcher::FileEvent;

pub type SubscriberId = u64;

pub struct ChangeScheduler {
    scanner: Arc<ProjectScanner>,
    interval: Duration,
    pending: Mutex<HashSet<PathBuf>>,
    drain_gate: Mutex<()>,
    subscribers: Mutex<HashMap<SubscriberId, mpsc::UnboundedSender<ChangeNotification>>>,
    next_subscriber: AtomicU64,
}

impl ChangeScheduler {
    pub fn new(scanner: Arc<ProjectScanner>, interval: Duration) -> Self {
        Self {
            scanner,
            interval,
            pending: Mutex::new(HashSet::new()),
            drain_gate: Mutex::new(()),
            subscribers: Mutex::new(HashMap::new()),
            next_subscriber: AtomicU64::new(1),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Marks a path dirty; repeated calls for one path collapse into one entry
    pub fn enqueue(&self, path: impl Into<PathBuf>) {
        self.pending.lock().insert(path.into());
    }

    pub fn enqueue_event(&self, event: &FileEvent) {
        tracing::trace!("{:?} {}", event.kind, event.path.display());
        self.enqueue(event.path.clone());
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn subscribe(&self) -> (SubscriberId, mpsc::UnboundedReceiver<ChangeNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().insert(id, tx);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Applies everything pending and publishes the result.
    ///
    /// Returns `None` when there was nothing pending or nothing changed.
    pub fn drain(&self) -> Option<ChangeNotification> {
        let _gate = self.drain_gate.lock();

        let batch: Vec<PathBuf> = {
            let mut pending = self.pending.lock();
            if pending.is_empty() {
                return None;
            }
            pending.drain().collect()
        };

        tracing::debug!("Draining {} pending paths", batch.len());
        let notification = self.scanner.incremental_scan(&batch).into_notification();
        if notification.is_empty() {
            return None;
        }
        tracing::info!(
            "Index updated: {} changed, {} deleted",
            notification.updated.len(),
            notification.deleted.len()
        );
        self.publish(&notification);
        Some(notification)
    }

    /// Drain requested outside the timer, e.g. by a manual refresh
    pub fn force_drain(&self) -> Option<ChangeNotification> {
        tracing::debug!("Forced drain");
        self.drain()
    }

    /// Full rescan that publishes what changed relative to the current index.
    ///
    /// Pending paths are folded in, since the full scan observes them anyway.
    pub fn force_rescan(&self) -> Result<Option<ChangeNotification>> {
        let _gate = self.drain_gate.lock();
        self.pending.lock().clear();

        let index = self.scanner.index();
        let before: HashMap<String, String> = index
            .all()
            .iter()
            .map(|s| (s.path.clone(), s.content_hash.clone()))
            .collect();

        let after = self.scanner.full_scan()?;

        let mut notification = ChangeNotification::default();
        let mut seen = BTreeSet::new();
        for summary in &after {
            seen.insert(summary.path.clone());
            if before.get(&summary.path) != Some(&summary.content_hash) {
                notification.updated.insert(summary.path.clone());
            }
        }
        notification.deleted = before
            .into_keys()
            .filter(|path| !seen.contains(path))
            .collect();

        if notification.is_empty() {
            return Ok(None);
        }
        self.publish(&notification);
        Ok(Some(notification))
    }

    fn publish(&self, notification: &ChangeNotification) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|id, tx| {
            let alive = tx.send(notification.clone()).is_ok();
            if !alive {
                tracing::debug!("Dropping closed subscriber {}", id);
            }
            alive
        });
    }

    /// Starts the periodic drain loop on the current tokio runtime
    pub fn spawn(self: &Arc<Self>) -> SchedulerHandle {
        let scheduler = Arc::clone(self);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if scheduler.pending_count() == 0 {
                            continue;
                        }
                        let worker = Arc::clone(&scheduler);
                        if let Err(e) = tokio::task::spawn_blocking(move || worker.drain()).await {
                            tracing::error!("Drain task failed: {}", e);
                        }
                    }
                    _ = &mut stop_rx => break,
                }
            }
            tracing::debug!("Scheduler loop stopped");
        });

        SchedulerHandle {
            stop: Some(stop_tx),
            task: Some(task),
        }
    }
}

/// Keeps the periodic drain loop alive; stopping or dropping ends it
pub struct SchedulerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{SnapshotStore, SymbolIndex};
    use crate::indexer::watcher::FileEventKind;
    use crate::languages::AnalyzerRegistry;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<ChangeScheduler>) {
        let dir = TempDir::new().unwrap();
        let scanner = Arc::new(ProjectScanner::new(
            dir.path(),
            Arc::new(AnalyzerRegistry::new()),
            Arc::new(SymbolIndex::new()),
            SnapshotStore::new(dir.path().join(".code-intel/index.json")),
        ));
        let scheduler = Arc::new(ChangeScheduler::new(scanner, Duration::from_millis(50)));
        (dir, scheduler)
    }

    #[test]
    fn test_empty_drain_emits_nothing() {
        let (_dir, scheduler) = setup();
        let (_id, mut rx) = scheduler.subscribe();
        assert!(scheduler.drain().is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_repeated_events_coalesce() {
        let (dir, scheduler) = setup();
        let path = dir.path().join("a.py");
        fs::write(&path, "def foo(): pass\n").unwrap();

        for _ in 0..5 {
            scheduler.enqueue_event(&FileEvent::new(&path, FileEventKind::Modified));
        }
        assert_eq!(scheduler.pending_count(), 1);

        let note = scheduler.drain().unwrap();
        assert_eq!(note.updated.len(), 1);
        assert!(note.updated.contains("a.py"));
        assert!(note.deleted.is_empty());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_unchanged_content_emits_nothing() {
        let (dir, scheduler) = setup();
        let path = dir.path().join("a.py");
        fs::write(&path, "def foo(): pass\n").unwrap();
        scheduler.enqueue(&path);
        assert!(scheduler.drain().is_some());

        // Touch without a content change
        fs::write(&path, "def foo(): pass\n").unwrap();
        scheduler.enqueue(&path);
        assert!(scheduler.drain().is_none());
    }

    #[test]
    fn test_subscribers_receive_and_unsubscribe() {
        let (dir, scheduler) = setup();
        let (first, mut rx1) = scheduler.subscribe();
        let (second, mut rx2) = scheduler.subscribe();
        assert_ne!(first, second);

        let path = dir.path().join("a.py");
        fs::write(&path, "def foo(): pass\n").unwrap();
        scheduler.enqueue(&path);
        scheduler.drain();

        assert!(rx1.try_recv().unwrap().updated.contains("a.py"));
        assert!(rx2.try_recv().unwrap().updated.contains("a.py"));

        assert!(scheduler.unsubscribe(first));
        assert!(!scheduler.unsubscribe(first));
        fs::write(&path, "def bar(): pass\n").unwrap();
        scheduler.enqueue(&path);
        scheduler.force_drain();

        assert!(rx2.try_recv().is_ok());
        assert_eq!(scheduler.subscriber_count(), 1);
    }

    #[test]
    fn test_closed_subscribers_are_pruned() {
        let (dir, scheduler) = setup();
        let (_id, rx) = scheduler.subscribe();
        drop(rx);

        let path = dir.path().join("a.py");
        fs::write(&path, "def foo(): pass\n").unwrap();
        scheduler.enqueue(&path);
        scheduler.drain();
        assert_eq!(scheduler.subscriber_count(), 0);
    }

    #[test]
    fn test_force_rescan_reports_diff() {
        let (dir, scheduler) = setup();
        fs::write(dir.path().join("a.py"), "def foo(): pass\n").unwrap();
        fs::write(dir.path().join("b.py"), "def bar(): pass\n").unwrap();

        let first = scheduler.force_rescan().unwrap().unwrap();
        assert_eq!(first.updated.len(), 2);

        fs::remove_file(dir.path().join("b.py")).unwrap();
        fs::write(dir.path().join("a.py"), "def foo(): return 1\n").unwrap();
        let second = scheduler.force_rescan().unwrap().unwrap();
        assert!(second.updated.contains("a.py"));
        assert!(second.deleted.contains("b.py"));

        assert!(scheduler.force_rescan().unwrap().is_none());
    }

    #[test]
    fn test_concurrent_drains_and_rescans_never_overlap() {
        let (dir, scheduler) = setup();
        for i in 0..8 {
            fs::write(dir.path().join(format!("m{}.py", i)), format!("def f{}(): pass\n", i)).unwrap();
        }

        let workers: Vec<_> = (0..6)
            .map(|worker| {
                let scheduler = Arc::clone(&scheduler);
                let root = dir.path().to_path_buf();
                std::thread::spawn(move || {
                    for round in 0..10 {
                        let path = root.join(format!("m{}.py", (worker + round) % 8));
                        fs::write(&path, format!("def g{}_{}(): pass\n", worker, round)).unwrap();
                        scheduler.enqueue(&path);
                        match (worker + round) % 3 {
                            0 => {
                                scheduler.drain();
                            }
                            1 => {
                                scheduler.force_drain();
                            }
                            _ => {
                                scheduler.force_rescan().unwrap();
                            }
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let scanner = &scheduler.scanner;
        assert_eq!(scanner.peak_concurrent_scans(), 1);

        // Whatever the interleaving, the index ends up matching the disk
        scheduler.force_drain();
        for i in 0..8 {
            let rel = format!("m{}.py", i);
            let content = fs::read(dir.path().join(&rel)).unwrap();
            let summary = scanner.index().get(&rel).unwrap();
            assert_eq!(
                summary.content_hash,
                crate::indexer::hashing::compute_content_hash(&content)
            );
        }
        assert_eq!(scanner.index().len(), 8);
    }

    #[tokio::test]
    async fn test_periodic_loop_drains() {
        let (dir, scheduler) = setup();
        let (_id, mut rx) = scheduler.subscribe();
        let handle = scheduler.spawn();

        let path = dir.path().join("a.py");
        fs::write(&path, "def foo(): pass\n").unwrap();
        scheduler.enqueue(&path);

        let note = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(note.updated.contains("a.py"));
        handle.stop().await;
    }
}

use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::thread::{self, JoinHandle};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{IndexerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherState {
    Stopped,
    Running,
    /// The native notification mechanism could not be started
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Created,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileEventKind,
}

impl FileEvent {
    pub fn new(path: impl Into<PathBuf>, kind: FileEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

struct Running {
    watcher: RecommendedWatcher,
    forwarder: JoinHandle<()>,
}

/// Wraps the platform file watcher and forwards normalized events to a sink
pub struct WatcherService {
    root: PathBuf,
    state: Mutex<WatcherState>,
    running: Mutex<Option<Running>>,
}

impl WatcherService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: Mutex::new(WatcherState::Stopped),
            running: Mutex::new(None),
        }
    }

    pub fn state(&self) -> WatcherState {
        *self.state.lock()
    }

    /// Starts watching; a second call while running is a no-op.
    ///
    /// Failure to start is not an error: the service turns `Inactive` and
    /// the index only changes through explicit rescans.
    pub fn start<F>(&self, sink: F) -> WatcherState
    where
        F: Fn(FileEvent) + Send + 'static,
    {
        let mut running = self.running.lock();
        if running.is_some() {
            return WatcherState::Running;
        }

        match spawn_watcher(&self.root, sink) {
            Ok(r) => {
                tracing::info!("Watching {} for changes", self.root.display());
                *running = Some(r);
                *self.state.lock() = WatcherState::Running;
                WatcherState::Running
            }
            Err(e) => {
                tracing::warn!(
                    "File watcher unavailable for {}, falling back to manual rescans: {}",
                    self.root.display(),
                    e
                );
                *self.state.lock() = WatcherState::Inactive;
                WatcherState::Inactive
            }
        }
    }

    /// Releases the native watch handles and waits for the forwarder to exit
    pub fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        // Dropping the watcher closes the channel, which ends the forwarder
        drop(running.watcher);
        if running.forwarder.join().is_err() {
            tracing::warn!("Watcher forwarding thread panicked");
        }
        *self.state.lock() = WatcherState::Stopped;
        tracing::info!("Stopped watching {}", self.root.display());
    }
}

impl Drop for WatcherService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_watcher<F>(root: &Path, sink: F) -> Result<Running>
where
    F: Fn(FileEvent) + Send + 'static,
{
    let (tx, rx) = channel::<FileEvent>();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for file_event in normalize_event(&event) {
                let _ = tx.send(file_event);
            }
        }
        Err(e) => tracing::error!("Watch error: {}", e),
    })
    .map_err(|e| IndexerError::Watcher(e.to_string()))?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| IndexerError::Watcher(format!("Failed to watch {}: {}", root.display(), e)))?;

    let forwarder = thread::Builder::new()
        .name("code-intel-watch".to_string())
        .spawn(move || {
            while let Ok(event) = rx.recv() {
                sink(event);
            }
        })?;

    Ok(Running { watcher, forwarder })
}

/// Maps a raw notify event onto created/modified/deleted events per path
pub fn normalize_event(event: &Event) -> Vec<FileEvent> {
    let kind_for = |path: &Path| -> Option<FileEventKind> {
        match event.kind {
            EventKind::Create(_) => Some(FileEventKind::Created),
            EventKind::Remove(_) => Some(FileEventKind::Deleted),
            // Renames report both ends; existence tells them apart
            EventKind::Modify(ModifyKind::Name(_)) => Some(if path.exists() {
                FileEventKind::Created
            } else {
                FileEventKind::Deleted
            }),
            EventKind::Modify(_) => Some(FileEventKind::Modified),
            EventKind::Any | EventKind::Other => Some(if path.exists() {
                FileEventKind::Modified
            } else {
                FileEventKind::Deleted
            }),
            EventKind::Access(_) => None,
        }
    };

    event
        .paths
        .iter()
        .filter_map(|path| kind_for(path).map(|kind| FileEvent::new(path.clone(), kind)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, RemoveKind, RenameMode};
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_basic_kinds() {
        let created = Event::new(EventKind::Create(CreateKind::File)).add_path("/p/a.py".into());
        assert_eq!(
            normalize_event(&created),
            vec![FileEvent::new("/p/a.py", FileEventKind::Created)]
        );

        let modified = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path("/p/a.py".into());
        assert_eq!(normalize_event(&modified)[0].kind, FileEventKind::Modified);

        let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path("/p/a.py".into());
        assert_eq!(normalize_event(&removed)[0].kind, FileEventKind::Deleted);

        let access = Event::new(EventKind::Access(AccessKind::Any)).add_path("/p/a.py".into());
        assert!(normalize_event(&access).is_empty());
    }

    #[test]
    fn test_normalize_rename_uses_existence() {
        let dir = TempDir::new().unwrap();
        let new_path = dir.path().join("new.py");
        std::fs::write(&new_path, "").unwrap();
        let old_path = dir.path().join("old.py");

        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(old_path.clone())
            .add_path(new_path.clone());
        let events = normalize_event(&event);

        assert_eq!(
            events,
            vec![
                FileEvent::new(old_path, FileEventKind::Deleted),
                FileEvent::new(new_path, FileEventKind::Created),
            ]
        );
    }

    #[test]
    fn test_state_machine() {
        let dir = TempDir::new().unwrap();
        let service = WatcherService::new(dir.path());
        assert_eq!(service.state(), WatcherState::Stopped);

        let state = service.start(|_| {});
        if state == WatcherState::Inactive {
            // No native watcher on this host; nothing else to check
            return;
        }
        assert_eq!(service.state(), WatcherState::Running);
        // Second start is a no-op
        assert_eq!(service.start(|_| {}), WatcherState::Running);

        service.stop();
        assert_eq!(service.state(), WatcherState::Stopped);
        service.stop();
        assert_eq!(service.state(), WatcherState::Stopped);
    }

    #[test]
    fn test_missing_root_reports_inactive() {
        let dir = TempDir::new().unwrap();
        let service = WatcherService::new(dir.path().join("does-not-exist"));
        assert_eq!(service.start(|_| {}), WatcherState::Inactive);
        assert_eq!(service.state(), WatcherState::Inactive);
    }

    #[test]
    fn test_events_reach_sink() {
        let dir = TempDir::new().unwrap();
        let service = WatcherService::new(dir.path());
        let (tx, rx) = mpsc::channel();
        let tx = std::sync::Mutex::new(tx);

        if service.start(move |e| {
            let _ = tx.lock().unwrap().send(e);
        }) != WatcherState::Running
        {
            return;
        }

        std::fs::write(dir.path().join("a.py"), "def foo(): pass\n").unwrap();
        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(event.path.ends_with("a.py"));
        service.stop();
    }
}

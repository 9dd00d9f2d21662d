use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

/// Counters for the scan currently (or last) running, shared with status readers
#[derive(Clone)]
pub struct ScanProgress {
    inner: Arc<Inner>,
}

struct Inner {
    files_total: AtomicUsize,
    files_processed: AtomicUsize,
    symbols_extracted: AtomicUsize,
    errors: AtomicUsize,
    scans_completed: AtomicUsize,
    is_active: AtomicBool,
    started_at: Mutex<Option<Instant>>,
    finished_ms: Mutex<Option<u64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub is_active: bool,
    pub files_total: usize,
    pub files_processed: usize,
    pub symbols_extracted: usize,
    pub errors: usize,
    pub scans_completed: usize,
    pub elapsed_ms: u64,
    pub progress_pct: f64,
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanProgress {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                files_total: AtomicUsize::new(0),
                files_processed: AtomicUsize::new(0),
                symbols_extracted: AtomicUsize::new(0),
                errors: AtomicUsize::new(0),
                scans_completed: AtomicUsize::new(0),
                is_active: AtomicBool::new(false),
                started_at: Mutex::new(None),
                finished_ms: Mutex::new(None),
            }),
        }
    }

    pub fn start(&self, total_files: usize) {
        self.inner.files_total.store(total_files, Ordering::Release);
        self.inner.files_processed.store(0, Ordering::Release);
        self.inner.symbols_extracted.store(0, Ordering::Release);
        self.inner.errors.store(0, Ordering::Release);
        self.inner.is_active.store(true, Ordering::Release);
        *self.inner.started_at.lock() = Some(Instant::now());
        *self.inner.finished_ms.lock() = None;
    }

    pub fn inc(&self, symbols_count: usize) {
        self.inner.files_processed.fetch_add(1, Ordering::Relaxed);
        self.inner
            .symbols_extracted
            .fetch_add(symbols_count, Ordering::Relaxed);
    }

    /// A file that was processed but recorded an analysis error
    pub fn inc_error(&self) {
        self.inner.files_processed.fetch_add(1, Ordering::Relaxed);
        self.inner.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn finish(&self) {
        let elapsed = self
            .inner
            .started_at
            .lock()
            .map(|t| t.elapsed().as_millis() as u64);
        *self.inner.finished_ms.lock() = elapsed;
        self.inner.scans_completed.fetch_add(1, Ordering::AcqRel);
        self.inner.is_active.store(false, Ordering::Release);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let is_active = self.inner.is_active.load(Ordering::Acquire);
        let files_total = self.inner.files_total.load(Ordering::Acquire);
        let files_processed = self.inner.files_processed.load(Ordering::Acquire);

        let elapsed_ms = match *self.inner.finished_ms.lock() {
            Some(ms) if !is_active => ms,
            _ => self
                .inner
                .started_at
                .lock()
                .map(|t| t.elapsed().as_millis() as u64)
                .unwrap_or(0),
        };

        let progress_pct = if files_total > 0 {
            (files_processed as f64 / files_total as f64) * 100.0
        } else {
            0.0
        };

        ProgressSnapshot {
            is_active,
            files_total,
            files_processed,
            symbols_extracted: self.inner.symbols_extracted.load(Ordering::Acquire),
            errors: self.inner.errors.load(Ordering::Acquire),
            scans_completed: self.inner.scans_completed.load(Ordering::Acquire),
            elapsed_ms,
            progress_pct,
        }
    }
}

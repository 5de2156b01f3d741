use std::sync::Mutex;

use reframe_core::{LogEntry, LogLevel};
use tracing::{error, info, warn};

/// Receives run progress and log lines as they happen.
///
/// Called from the run loop after every record; implementations must not
/// block for long.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, current: usize, total: usize);
    fn on_log(&self, entry: &LogEntry);
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _current: usize, _total: usize) {}
    fn on_log(&self, _entry: &LogEntry) {}
}

/// Mirrors the run log into `tracing`.
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_progress(&self, current: usize, total: usize) {
        if total > 0 {
            info!("progress: {current}/{total}");
        }
    }

    fn on_log(&self, entry: &LogEntry) {
        match entry.level {
            LogLevel::Info | LogLevel::Success => info!("{}", entry.message),
            LogLevel::Warn => warn!("{}", entry.message),
            LogLevel::Error => error!("{}", entry.message),
        }
    }
}

/// Keeps every notification, for tests and embedding callers that poll.
#[derive(Default)]
pub struct RecordingObserver {
    progress: Mutex<Vec<(usize, usize)>>,
    logs: Mutex<Vec<LogEntry>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> Vec<(usize, usize)> {
        self.progress
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Log entries in the order they were emitted (oldest first).
    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_progress(&self, current: usize, total: usize) {
        if let Ok(mut p) = self.progress.lock() {
            p.push((current, total));
        }
    }

    fn on_log(&self, entry: &LogEntry) {
        if let Ok(mut l) = self.logs.lock() {
            l.push(entry.clone());
        }
    }
}

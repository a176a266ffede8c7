//! Change detection for on-disk cache files, grounded on the publisher
//! shape `zif_monitor` describes but implemented as synchronous
//! mtime-polling rather than a background watcher thread (see DESIGN.md:
//! the engine's concurrency model is single-threaded cooperative).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Default)]
pub struct FileMonitor {
    watched: HashMap<PathBuf, Option<SystemTime>>,
}

impl FileMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` for change tracking. Idempotent: watching the same
    /// path twice is a no-op, matching `zif_monitor_add_watch`'s
    /// existing-watch check.
    pub fn watch(&mut self, path: &Path) {
        self.watched
            .entry(path.to_path_buf())
            .or_insert_with(|| mtime_of(path));
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.watched.contains_key(path)
    }

    /// Returns `true` if `path`'s mtime (or existence) has changed since it
    /// was registered or last polled, and updates the stored baseline.
    pub fn poll(&mut self, path: &Path) -> bool {
        let Some(baseline) = self.watched.get_mut(path) else {
            return false;
        };
        let current = mtime_of(path);
        let changed = current != *baseline;
        *baseline = current;
        changed
    }

    /// Returns `true` if any watched path has changed, updating all
    /// baselines.
    pub fn poll_any(&mut self) -> bool {
        let mut changed = false;
        for (path, baseline) in self.watched.iter_mut() {
            let current = mtime_of(path);
            if current != *baseline {
                changed = true;
            }
            *baseline = current;
        }
        changed
    }

    pub fn unwatch(&mut self, path: &Path) {
        self.watched.remove(path);
    }
}

fn mtime_of(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Tick-over-tick directory diffing.
///
/// Each call to [`ActivitySampler::sample`] takes one instantaneous snapshot of
/// the regular files in the watch directory and compares it against the
/// snapshot from the previous call. There is no sleeping inside a sample.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::MonitorError;

/// Size and modification time of one file at the moment it was sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub size: u64,
    pub modified: SystemTime,
}

/// File name → stamp, captured at one point in time. Replaced wholesale on
/// every successful sample; never patched in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSnapshot {
    files: HashMap<String, FileStamp>,
}

impl FileSnapshot {
    /// Reads the regular files directly inside `dir`. Subdirectories are skipped.
    pub fn capture(dir: &Path) -> Result<Self, MonitorError> {
        let io_err = |source: std::io::Error| MonitorError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = HashMap::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            // A file can disappear between listing and stat; skip it.
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            // One file without a usable mtime must not blind the whole tick.
            let Some(stamp) = stamp(meta.len(), meta.modified()) else {
                tracing::debug!("no modification time for {:?}; skipping", entry.file_name());
                continue;
            };
            files.insert(entry.file_name().to_string_lossy().into_owned(), stamp);
        }
        Ok(Self { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Completion predicate: does any file end with `extension` (case-insensitive)?
    pub fn contains_extension(&self, extension: &str) -> bool {
        let ext = extension.to_lowercase();
        self.files.keys().any(|name| name.to_lowercase().ends_with(&ext))
    }

    /// Names of files in `self` that count as activity relative to `previous`.
    pub fn changed_since(&self, previous: &FileSnapshot, size_delta_threshold: u64) -> Vec<&str> {
        let mut changed: Vec<&str> = self
            .files
            .iter()
            .filter(|(name, now)| match previous.files.get(*name) {
                None => true,
                Some(before) => is_activity(before, now, size_delta_threshold),
            })
            .map(|(name, _)| name.as_str())
            .collect();
        changed.sort_unstable();
        changed
    }
}

fn stamp(size: u64, modified: std::io::Result<SystemTime>) -> Option<FileStamp> {
    modified.ok().map(|modified| FileStamp { size, modified })
}

/// Growth of at least the threshold counts. A same-size rewrite counts when the
/// mtime advanced. Growth under the threshold, shrinking and mtime moving
/// backwards do not.
fn is_activity(before: &FileStamp, now: &FileStamp, size_delta_threshold: u64) -> bool {
    if now.size > before.size {
        return now.size - before.size >= size_delta_threshold.max(1);
    }
    now.size == before.size && now.modified > before.modified
}

/// Outcome of a single sample.
#[derive(Debug, Clone)]
pub struct ActivityResult {
    pub changed: bool,
    pub snapshot: FileSnapshot,
}

/// Owns the previous snapshot of the watch directory.
#[derive(Debug)]
pub struct ActivitySampler {
    directory: PathBuf,
    size_delta_threshold: u64,
    /// `None` until the first successful sample establishes a baseline.
    previous: Option<FileSnapshot>,
}

impl ActivitySampler {
    pub fn new(directory: impl Into<PathBuf>, size_delta_threshold: u64) -> Self {
        Self {
            directory: directory.into(),
            size_delta_threshold,
            previous: None,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Snapshots the directory and diffs it against the previous snapshot.
    ///
    /// The first successful call only records a baseline and reports
    /// `changed = false`, so output left over from an earlier render does not
    /// look like activity. On error the previous snapshot is kept.
    pub fn sample(&mut self) -> Result<ActivityResult, MonitorError> {
        let snapshot = FileSnapshot::capture(&self.directory)?;

        let changed = match &self.previous {
            None => false,
            Some(previous) => {
                let names = snapshot.changed_since(previous, self.size_delta_threshold);
                if !names.is_empty() {
                    tracing::debug!(files = ?names, "file activity");
                }
                !names.is_empty()
            }
        };

        tracing::debug!(files = snapshot.len(), changed, "sampled {}", self.directory.display());
        self.previous = Some(snapshot.clone());
        Ok(ActivityResult { changed, snapshot })
    }
}

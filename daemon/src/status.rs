use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::machine::RenderState;

/// Snapshot of the monitor written to the optional status file.
/// It is a copy taken at the end of a tick; nothing reads it back.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MonitorStatus {
    /// Daemon binary version (set from Cargo.toml at compile time).
    pub version: String,
    /// Directory being watched.
    pub watch_directory: String,
    /// Current render state machine state.
    pub state: RenderState,
    /// Whether the renderer is believed to be writing output.
    pub rendering: bool,
    /// Whether the last tick saw any file activity.
    pub file_activity: bool,
    /// Seconds since idleness began, while a render cycle is in progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_secs: Option<u64>,
    /// Remaining seconds on the armed countdown, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown_secs: Option<u64>,
    /// Most recent operator message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Local RFC 3339 time the snapshot was taken.
    pub updated_at: String,
}

impl MonitorStatus {
    /// Constructs the initial idle status on daemon startup.
    pub fn new(watch_directory: &Path) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            watch_directory: watch_directory.display().to_string(),
            state: RenderState::Idle,
            rendering: false,
            file_activity: false,
            idle_secs: None,
            countdown_secs: None,
            message: None,
            updated_at: chrono::Local::now().to_rfc3339(),
        }
    }
}

/// Serializes `status` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist.
/// Logs errors rather than panicking; a status write failure should
/// never stop the display task.
pub fn write_status(path: &Path, status: &MonitorStatus) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create directory {}: {e}", parent.display());
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                tracing::warn!("Failed to write status file: {e}");
            }
        }
        Err(e) => tracing::warn!("Failed to serialize status: {e}"),
    }
}

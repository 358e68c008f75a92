use std::path::PathBuf;
use thiserror::Error;

/// Failures that can occur inside a single poll tick.
///
/// None of these stop the poll loop. Each one is turned into a notification
/// plus a safe fallback state by the caller.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The watch directory could not be read (missing, permissions, vanished mid-run).
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Both the graceful stop and the forced kill left matching processes alive.
    #[error("{process} is still running after terminate and kill (pids: {survivors:?})")]
    TerminationFailed {
        process: String,
        survivors: Vec<u32>,
    },
    /// No known shutdown command exists for this host.
    #[error("shutdown is not supported on {os}")]
    UnsupportedPlatform { os: String },
    /// The shutdown command could not be spawned or exited unsuccessfully.
    #[error("`{command}` failed: {reason}")]
    ShutdownFailed { command: String, reason: String },
}

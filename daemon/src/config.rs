use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_IDLE_GRACE_PERIOD_SECS: u64 = 10;
pub const DEFAULT_TERMINATION_COUNTDOWN_SECS: u64 = 10;
pub const DEFAULT_SHUTDOWN_COUNTDOWN_SECS: u64 = 10;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;
/// After Effects' executable name on Windows.
pub const DEFAULT_TARGET_PROCESS_NAME: &str = "AfterFX.exe";
pub const DEFAULT_SIZE_DELTA_THRESHOLD_BYTES: u64 = 1024;
pub const DEFAULT_COMPLETION_EXTENSION: &str = ".mp4";

/// Root configuration structure. Deserialized from `renderwatch.toml`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Directory the renderer writes its output into. Required once CLI
    /// overrides have been merged.
    #[serde(default)]
    pub watch_directory: Option<PathBuf>,
    /// Continuous no-activity time before the termination countdown may arm.
    #[serde(default = "default_idle_grace_period")]
    pub idle_grace_period_secs: u64,
    #[serde(default = "default_termination_countdown")]
    pub termination_countdown_secs: u64,
    /// 0 disables the shutdown stage entirely.
    #[serde(default = "default_shutdown_countdown")]
    pub shutdown_countdown_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Executable name matched case-insensitively against the process list.
    #[serde(default = "default_target_process_name")]
    pub target_process_name: String,
    /// Size growth below this many bytes is treated as filesystem noise.
    #[serde(default = "default_size_delta_threshold")]
    pub size_delta_threshold_bytes: u64,
    /// Suffix of the file that proves the render produced output (e.g. ".mp4").
    #[serde(default = "default_completion_extension")]
    pub completion_extension: String,
    /// Simulate termination and shutdown: notify, but never act.
    #[serde(default)]
    pub debug_mode: bool,
    /// Optional TOML file that receives a status snapshot every tick.
    #[serde(default)]
    pub status_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_directory: None,
            idle_grace_period_secs: DEFAULT_IDLE_GRACE_PERIOD_SECS,
            termination_countdown_secs: DEFAULT_TERMINATION_COUNTDOWN_SECS,
            shutdown_countdown_secs: DEFAULT_SHUTDOWN_COUNTDOWN_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            target_process_name: DEFAULT_TARGET_PROCESS_NAME.to_string(),
            size_delta_threshold_bytes: DEFAULT_SIZE_DELTA_THRESHOLD_BYTES,
            completion_extension: DEFAULT_COMPLETION_EXTENSION.to_string(),
            debug_mode: false,
            status_file: None,
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn idle_grace_period(&self) -> Duration {
        Duration::from_secs(self.idle_grace_period_secs)
    }

    /// Number of ticks the termination countdown runs for.
    pub fn termination_ticks(&self) -> u32 {
        secs_to_ticks(self.termination_countdown_secs, self.poll_interval_secs)
    }

    /// Number of ticks the shutdown countdown runs for, or `None` when the
    /// shutdown stage is disabled.
    pub fn shutdown_ticks(&self) -> Option<u32> {
        match self.shutdown_countdown_secs {
            0 => None,
            secs => Some(secs_to_ticks(secs, self.poll_interval_secs)),
        }
    }

    /// Returns the configured watch directory, failing if none was given.
    pub fn watch_directory(&self) -> Result<&Path> {
        self.watch_directory
            .as_deref()
            .context("watch_directory is required (set it in the config file or pass --watch-dir)")
    }

    /// Startup checks. Any error here stops the daemon before polling begins.
    pub fn validate(&self) -> Result<()> {
        let dir = self.watch_directory()?;
        let meta = std::fs::metadata(dir)
            .with_context(|| format!("Watch directory is not accessible: {}", dir.display()))?;
        if !meta.is_dir() {
            bail!("Watch directory is not a directory: {}", dir.display());
        }
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be at least 1");
        }
        if self.target_process_name.trim().is_empty() {
            bail!("target_process_name must not be empty");
        }
        if self.completion_extension.trim().is_empty() {
            bail!("completion_extension must not be empty");
        }
        Ok(())
    }
}

/// Ceiling division so a countdown never runs shorter than requested.
fn secs_to_ticks(secs: u64, poll_interval_secs: u64) -> u32 {
    let per_tick = poll_interval_secs.max(1);
    let ticks = secs.div_ceil(per_tick);
    u32::try_from(ticks).unwrap_or(u32::MAX)
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn default_idle_grace_period() -> u64 {
    DEFAULT_IDLE_GRACE_PERIOD_SECS
}

fn default_termination_countdown() -> u64 {
    DEFAULT_TERMINATION_COUNTDOWN_SECS
}

fn default_shutdown_countdown() -> u64 {
    DEFAULT_SHUTDOWN_COUNTDOWN_SECS
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_target_process_name() -> String {
    DEFAULT_TARGET_PROCESS_NAME.to_string()
}

fn default_size_delta_threshold() -> u64 {
    DEFAULT_SIZE_DELTA_THRESHOLD_BYTES
}

fn default_completion_extension() -> String {
    DEFAULT_COMPLETION_EXTENSION.to_string()
}

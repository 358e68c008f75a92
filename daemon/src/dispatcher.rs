/// Terminal actions: stopping the renderer and powering off the host.
///
/// The render state machine only sees the [`Dispatcher`] trait; the real
/// implementation uses `sysinfo` for the process list and the platform's
/// `shutdown` command.
use std::process::Command;
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, Signal, System};

use crate::error::MonitorError;

/// How long a gracefully signalled process gets before it is force-killed.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(3);
/// Upper bound on waiting for a force-killed process to disappear.
const KILL_CONFIRM: Duration = Duration::from_secs(1);
const EXIT_POLL_STEP: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Every matching process is gone. `forced` counts the ones that needed a kill.
    Terminated { stopped: usize, forced: usize },
    /// No process with that name was running.
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Issued,
}

/// Capability the state machine uses to act on the outside world.
pub trait Dispatcher {
    /// Stops every process named `process_name` (case-insensitive exact match).
    /// Safe to call repeatedly; returns `NotFound` once nothing matches.
    fn terminate(&self, process_name: &str) -> Result<Termination, MonitorError>;

    /// Issues the host's shutdown command.
    fn shutdown(&self) -> Result<ShutdownOutcome, MonitorError>;
}

/// Host operating systems with a known shutdown command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
    Unsupported,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Unsupported
        }
    }

    /// Program and arguments that power the machine off immediately.
    pub fn shutdown_command(self) -> Option<(&'static str, &'static [&'static str])> {
        match self {
            Platform::Windows => Some(("shutdown", &["/s", "/t", "0"])),
            Platform::Linux | Platform::MacOs => Some(("sudo", &["shutdown", "-h", "now"])),
            Platform::Unsupported => None,
        }
    }

    /// External command that politely asks `pid` to exit, for platforms where
    /// a signal is not the graceful path. `taskkill` without `/F` posts
    /// WM_CLOSE, letting the application save and exit on its own.
    pub fn graceful_stop_command(self, pid: u32) -> Option<(&'static str, Vec<String>)> {
        match self {
            Platform::Windows => Some(("taskkill", vec!["/PID".to_string(), pid.to_string()])),
            Platform::Linux | Platform::MacOs | Platform::Unsupported => None,
        }
    }
}

/// [`Dispatcher`] backed by the real process table and shutdown command.
pub struct SystemDispatcher {
    platform: Platform,
    grace: Duration,
}

impl SystemDispatcher {
    pub fn new() -> Self {
        Self {
            platform: Platform::current(),
            grace: TERMINATE_GRACE,
        }
    }

    /// Sends the platform's graceful stop. Escalation happens after the grace
    /// window, so a failed request here only costs the wait.
    fn request_stop(&self, sys: &System, pid: Pid) {
        if let Some((program, args)) = self.platform.graceful_stop_command(pid.as_u32()) {
            match Command::new(program).args(&args).status() {
                Ok(status) if !status.success() => {
                    tracing::warn!(pid = pid.as_u32(), "`{program}` exited with {status}");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(pid = pid.as_u32(), "Failed to run `{program}`: {e}"),
            }
            return;
        }

        if let Some(process) = sys.process(pid) {
            // No SIGTERM equivalent on this platform: the kill is the only stop.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
        }
    }

    /// Blocks until none of `pids` is alive or `limit` passes. Returns survivors.
    fn wait_for_exit(sys: &mut System, pids: &[Pid], limit: Duration) -> Vec<Pid> {
        let deadline = Instant::now() + limit;
        loop {
            sys.refresh_processes(ProcessesToUpdate::Some(pids), true);
            let alive: Vec<Pid> = pids.iter().copied().filter(|pid| is_alive(sys, *pid)).collect();
            if alive.is_empty() || Instant::now() >= deadline {
                return alive;
            }
            std::thread::sleep(EXIT_POLL_STEP);
        }
    }
}

impl Default for SystemDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn is_alive(sys: &System, pid: Pid) -> bool {
    sys.process(pid)
        .is_some_and(|p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
}

/// Pids of live processes whose name equals `process_name`, ignoring case.
fn matching_pids(sys: &System, process_name: &str) -> Vec<Pid> {
    let target = process_name.to_lowercase();
    let mut pids: Vec<Pid> = sys
        .processes()
        .iter()
        .filter(|(_, p)| p.name().to_string_lossy().to_lowercase() == target)
        .map(|(pid, _)| *pid)
        .filter(|pid| is_alive(sys, *pid))
        .collect();
    pids.sort_unstable();
    pids
}

impl Dispatcher for SystemDispatcher {
    fn terminate(&self, process_name: &str) -> Result<Termination, MonitorError> {
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::All, true);

        let pids = matching_pids(&sys, process_name);
        if pids.is_empty() {
            return Ok(Termination::NotFound);
        }

        for pid in &pids {
            tracing::info!(pid = pid.as_u32(), "Sending graceful stop to {process_name}");
            self.request_stop(&sys, *pid);
        }

        let survivors = Self::wait_for_exit(&mut sys, &pids, self.grace);
        if survivors.is_empty() {
            return Ok(Termination::Terminated {
                stopped: pids.len(),
                forced: 0,
            });
        }

        for pid in &survivors {
            if let Some(process) = sys.process(*pid) {
                tracing::warn!(pid = pid.as_u32(), "{process_name} ignored graceful stop; killing");
                process.kill();
            }
        }

        let remaining = Self::wait_for_exit(&mut sys, &survivors, KILL_CONFIRM);
        if !remaining.is_empty() {
            return Err(MonitorError::TerminationFailed {
                process: process_name.to_string(),
                survivors: remaining.iter().map(|pid| pid.as_u32()).collect(),
            });
        }

        Ok(Termination::Terminated {
            stopped: pids.len(),
            forced: survivors.len(),
        })
    }

    fn shutdown(&self) -> Result<ShutdownOutcome, MonitorError> {
        let Some((program, args)) = self.platform.shutdown_command() else {
            return Err(MonitorError::UnsupportedPlatform {
                os: std::env::consts::OS.to_string(),
            });
        };
        let command = format!("{program} {}", args.join(" "));
        tracing::info!("Running `{command}`");

        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|e| MonitorError::ShutdownFailed {
                command: command.clone(),
                reason: e.to_string(),
            })?;

        if !status.success() {
            return Err(MonitorError::ShutdownFailed {
                command,
                reason: format!("exited with {status}"),
            });
        }
        Ok(ShutdownOutcome::Issued)
    }
}

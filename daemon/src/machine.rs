/// Render state machine.
///
/// Driven once per tick with the sampler's verdict. All timers live here as
/// plain fields; there are no callbacks or rescheduling. Time is passed in so
/// tests can step the machine with synthetic instants.
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::dispatcher::{Dispatcher, ShutdownOutcome, Termination};
use crate::error::MonitorError;
use crate::notifier::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderState {
    /// Not rendering. Waiting for activity, or for the grace period to run out.
    Idle,
    /// Output files changed on the most recent tick.
    Rendering,
    /// Termination countdown armed; new activity cancels it.
    PendingTermination,
    /// Renderer is gone and the shutdown countdown is armed. Cannot be cancelled.
    PendingShutdown,
    /// Shutdown has been attempted. Nothing further happens.
    Terminated,
}

/// Ticks left before a stage's action fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
}

impl Countdown {
    pub fn arm(start: u32) -> Self {
        Self { remaining: start }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Decrements once and returns what is left. Never goes below zero.
    pub fn tick(&mut self) -> u32 {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining
    }
}

/// What the sampler saw on this tick. The default is an unreadable tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Observation {
    /// The watch directory could be read. When false the other fields carry
    /// no information and armed countdowns are paused.
    pub readable: bool,
    /// At least one file changed since the previous tick.
    pub changed: bool,
    /// A file satisfying the completion predicate exists.
    pub output_present: bool,
}

/// The subset of [`Config`] the machine needs, resolved to ticks and durations.
#[derive(Debug, Clone)]
pub struct MachineSettings {
    pub process_name: String,
    pub completion_extension: String,
    pub idle_grace: Duration,
    pub poll_interval: Duration,
    pub termination_ticks: u32,
    /// `None` disables the shutdown stage.
    pub shutdown_ticks: Option<u32>,
    pub debug_mode: bool,
}

impl From<&Config> for MachineSettings {
    fn from(config: &Config) -> Self {
        Self {
            process_name: config.target_process_name.clone(),
            completion_extension: config.completion_extension.clone(),
            idle_grace: config.idle_grace_period(),
            poll_interval: config.poll_interval(),
            termination_ticks: config.termination_ticks(),
            shutdown_ticks: config.shutdown_ticks(),
            debug_mode: config.debug_mode,
        }
    }
}

pub struct RenderMachine {
    settings: MachineSettings,
    state: RenderState,
    /// When idleness began. `None` while rendering, and while idle with no
    /// render seen since startup or since the last completed cycle.
    idle_since: Option<Instant>,
    /// Tick on which activity was last observed.
    last_activity: Option<Instant>,
    countdown: Option<Countdown>,
    shutdown_issued: bool,
}

impl RenderMachine {
    pub fn new(settings: MachineSettings) -> Self {
        Self {
            settings,
            state: RenderState::Idle,
            idle_since: None,
            last_activity: None,
            countdown: None,
            shutdown_issued: false,
        }
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn idle_since(&self) -> Option<Instant> {
        self.idle_since
    }

    pub fn countdown(&self) -> Option<Countdown> {
        self.countdown
    }

    /// Remaining countdown expressed in seconds, for display.
    pub fn countdown_secs(&self) -> Option<u64> {
        self.countdown()
            .map(|c| u64::from(c.remaining()) * self.settings.poll_interval.as_secs().max(1))
    }

    /// True once the host shutdown command has been issued successfully.
    pub fn shutdown_issued(&self) -> bool {
        self.shutdown_issued
    }

    /// Evaluates exactly one transition for this tick.
    pub fn step<D, N>(&mut self, obs: Observation, now: Instant, dispatcher: &D, notifier: &N) -> RenderState
    where
        D: Dispatcher + ?Sized,
        N: Notifier + ?Sized,
    {
        let state = self.state;
        match state {
            RenderState::Terminated => {}
            // Never advance toward termination or shutdown on a failed read.
            RenderState::Idle | RenderState::PendingTermination | RenderState::PendingShutdown
                if !obs.readable => {}
            // Activity can no longer resume once the renderer is gone.
            RenderState::PendingShutdown => self.tick_shutdown(dispatcher, notifier),
            _ if obs.changed => self.enter_rendering(now, notifier),
            RenderState::Rendering => self.enter_idle(now, notifier),
            RenderState::Idle => self.check_idle(obs, now, notifier),
            RenderState::PendingTermination => self.tick_termination(dispatcher, notifier),
        }
        self.state
    }

    fn enter_rendering<N: Notifier + ?Sized>(&mut self, now: Instant, notifier: &N) {
        let previous = self.state;
        self.state = RenderState::Rendering;
        self.last_activity = Some(now);
        self.idle_since = None;
        self.countdown = None;

        match previous {
            RenderState::Rendering => {}
            RenderState::PendingTermination => {
                tracing::info!("Rendering resumed; termination countdown cancelled");
                notifier.notify(&format!(
                    "Rendering resumed. Cancelled closing {}.",
                    self.settings.process_name
                ));
            }
            _ => {
                tracing::info!("Rendering detected");
                notifier.notify("Rendering detected.");
            }
        }
    }

    fn enter_idle<N: Notifier + ?Sized>(&mut self, now: Instant, notifier: &N) {
        self.state = RenderState::Idle;
        // Idleness began right after the last tick that saw activity.
        self.idle_since = Some(self.last_activity.unwrap_or(now));
        tracing::info!("File activity stopped");
        notifier.notify(&format!(
            "No file activity. Waiting {}s for rendering to resume.",
            self.settings.idle_grace.as_secs()
        ));
    }

    fn check_idle<N: Notifier + ?Sized>(&mut self, obs: Observation, now: Instant, notifier: &N) {
        let Some(since) = self.idle_since else {
            return;
        };
        if now.saturating_duration_since(since) < self.settings.idle_grace {
            return;
        }

        if !obs.output_present {
            // Don't close the renderer before it has produced anything.
            tracing::info!("Idle grace elapsed but no output file exists");
            notifier.notify(&format!(
                "No {} files found. Continuing to check rendering status.",
                self.settings.completion_extension
            ));
            self.idle_since = Some(now);
            return;
        }

        self.state = RenderState::PendingTermination;
        self.countdown = Some(Countdown::arm(self.settings.termination_ticks));
        tracing::info!(ticks = self.settings.termination_ticks, "Termination countdown armed");
        notifier.notify(&format!(
            "Rendering finished. Closing {} in {} seconds.",
            self.settings.process_name,
            self.countdown_secs().unwrap_or(0)
        ));
    }

    fn tick_termination<D, N>(&mut self, dispatcher: &D, notifier: &N)
    where
        D: Dispatcher + ?Sized,
        N: Notifier + ?Sized,
    {
        // Disarmed after a failed termination: hold here until activity resumes.
        let Some(countdown) = self.countdown.as_mut() else {
            return;
        };
        if countdown.tick() > 0 {
            notifier.notify(&format!(
                "Closing {} in {} seconds.",
                self.settings.process_name,
                self.countdown_secs().unwrap_or(0)
            ));
            return;
        }
        self.countdown = None;
        self.fire_termination(dispatcher, notifier);
    }

    fn fire_termination<D, N>(&mut self, dispatcher: &D, notifier: &N)
    where
        D: Dispatcher + ?Sized,
        N: Notifier + ?Sized,
    {
        let name = self.settings.process_name.clone();

        if self.settings.debug_mode {
            let shutdown_note = match self.settings.shutdown_ticks {
                Some(_) => " and shut down the PC",
                None => "",
            };
            tracing::info!("Debug mode: skipping termination of {name}");
            notifier.notify(&format!("DEBUG MODE: would close {name}{shutdown_note}. Skipping."));
            self.reset_to_idle();
            return;
        }

        tracing::info!("Attempting to close {name}");
        match dispatcher.terminate(&name) {
            Ok(Termination::Terminated { stopped, forced }) => {
                tracing::info!(stopped, forced, "{name} terminated");
            }
            Ok(Termination::NotFound) => {
                // Nothing was closed, so nothing proves the render finished.
                tracing::info!("{name} was not running; skipping shutdown");
                self.reset_to_idle();
                notifier.notify(&format!(
                    "{name} is not running; nothing to close. Shutdown skipped."
                ));
                return;
            }
            Err(e) => {
                // Stay in PendingTermination with no countdown: shutting down
                // with the renderer alive could lose its output.
                tracing::error!("Termination failed: {e}");
                notifier.notify(&format!("Error: could not close {name}: {e}. Shutdown cancelled."));
                return;
            }
        }

        match self.settings.shutdown_ticks {
            Some(ticks) => {
                self.state = RenderState::PendingShutdown;
                self.countdown = Some(Countdown::arm(ticks));
                tracing::info!(ticks, "Shutdown countdown armed");
                notifier.notify(&format!(
                    "{name} has been closed. Shutting down PC in {} seconds...",
                    self.countdown_secs().unwrap_or(0)
                ));
            }
            None => {
                self.reset_to_idle();
                notifier.notify(&format!(
                    "{name} has been closed. Shutdown disabled; watching for the next render."
                ));
            }
        }
    }

    fn tick_shutdown<D, N>(&mut self, dispatcher: &D, notifier: &N)
    where
        D: Dispatcher + ?Sized,
        N: Notifier + ?Sized,
    {
        let Some(countdown) = self.countdown.as_mut() else {
            return;
        };
        if countdown.tick() > 0 {
            notifier.notify(&format!(
                "Shutting down PC in {} seconds...",
                self.countdown_secs().unwrap_or(0)
            ));
            return;
        }

        self.countdown = None;
        self.state = RenderState::Terminated;
        match dispatcher.shutdown() {
            Ok(ShutdownOutcome::Issued) => {
                tracing::info!("Shutdown issued");
                self.shutdown_issued = true;
                notifier.notify("Shutdown command issued.");
            }
            Err(e @ MonitorError::UnsupportedPlatform { .. }) => {
                tracing::warn!("{e}");
                notifier.notify("Unsupported OS for shutdown. Please shut down manually.");
            }
            Err(e) => {
                tracing::error!("Shutdown failed: {e}");
                notifier.notify(&format!("Error: shutdown failed: {e}. Please shut down manually."));
            }
        }
    }

    /// Back to Idle with no render cycle in progress.
    fn reset_to_idle(&mut self) {
        self.state = RenderState::Idle;
        self.idle_since = None;
        self.last_activity = None;
        self.countdown = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    // ── fakes ─────────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct FakeDispatcher {
        /// Renderer is running until the first successful terminate.
        gone: Cell<bool>,
        fail_terminate: bool,
        unsupported: bool,
        fail_shutdown: bool,
        terminate_calls: Cell<u32>,
        shutdown_calls: Cell<u32>,
    }

    impl Dispatcher for FakeDispatcher {
        fn terminate(&self, process_name: &str) -> Result<Termination, MonitorError> {
            self.terminate_calls.set(self.terminate_calls.get() + 1);
            if self.fail_terminate {
                return Err(MonitorError::TerminationFailed {
                    process: process_name.to_string(),
                    survivors: vec![1234],
                });
            }
            if self.gone.replace(true) {
                return Ok(Termination::NotFound);
            }
            Ok(Termination::Terminated { stopped: 1, forced: 0 })
        }

        fn shutdown(&self) -> Result<ShutdownOutcome, MonitorError> {
            self.shutdown_calls.set(self.shutdown_calls.get() + 1);
            if self.unsupported {
                return Err(MonitorError::UnsupportedPlatform { os: "plan9".to_string() });
            }
            if self.fail_shutdown {
                return Err(MonitorError::ShutdownFailed {
                    command: "sudo shutdown -h now".to_string(),
                    reason: "exited with exit status: 1".to_string(),
                });
            }
            Ok(ShutdownOutcome::Issued)
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        messages: RefCell<Vec<String>>,
    }

    impl RecordingNotifier {
        fn count(&self) -> usize {
            self.messages.borrow().len()
        }

        fn last(&self) -> String {
            self.messages.borrow().last().cloned().unwrap_or_default()
        }

        fn any(&self, needle: &str) -> bool {
            self.messages.borrow().iter().any(|m| m.contains(needle))
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, message: &str) {
            self.messages.borrow_mut().push(message.to_string());
        }
    }

    // ── harness ───────────────────────────────────────────────────────────────

    fn settings() -> MachineSettings {
        MachineSettings {
            process_name: "AfterFX.exe".to_string(),
            completion_extension: ".mp4".to_string(),
            idle_grace: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            termination_ticks: 10,
            shutdown_ticks: Some(10),
            debug_mode: false,
        }
    }

    const ACTIVE: Observation = Observation { readable: true, changed: true, output_present: true };
    const QUIET: Observation = Observation { readable: true, changed: false, output_present: true };
    const QUIET_NO_OUTPUT: Observation =
        Observation { readable: true, changed: false, output_present: false };
    const UNREADABLE: Observation = Observation { readable: false, changed: false, output_present: false };

    struct Harness {
        machine: RenderMachine,
        dispatcher: FakeDispatcher,
        notifier: RecordingNotifier,
        t0: Instant,
    }

    impl Harness {
        fn new(settings: MachineSettings) -> Self {
            Self::with_dispatcher(settings, FakeDispatcher::default())
        }

        fn with_dispatcher(settings: MachineSettings, dispatcher: FakeDispatcher) -> Self {
            Self {
                machine: RenderMachine::new(settings),
                dispatcher,
                notifier: RecordingNotifier::default(),
                t0: Instant::now(),
            }
        }

        /// One tick at `t` seconds after the scenario start.
        fn at(&mut self, t: u64, obs: Observation) -> RenderState {
            let now = self.t0 + Duration::from_secs(t);
            let state = self.machine.step(obs, now, &self.dispatcher, &self.notifier);
            self.assert_idle_timer_invariant();
            state
        }

        /// Ticks every second in `range`, with activity only where `active(t)`.
        fn run(&mut self, range: std::ops::RangeInclusive<u64>, active: impl Fn(u64) -> bool) {
            for t in range {
                let obs = if active(t) { ACTIVE } else { QUIET };
                self.at(t, obs);
            }
        }

        fn assert_idle_timer_invariant(&self) {
            match self.machine.state() {
                RenderState::Rendering => assert!(self.machine.idle_since().is_none()),
                RenderState::PendingTermination | RenderState::PendingShutdown => {
                    assert!(self.machine.idle_since().is_some())
                }
                RenderState::Idle | RenderState::Terminated => {}
            }
        }

        fn remaining(&self) -> Option<u32> {
            self.machine.countdown().map(|c| c.remaining())
        }
    }

    // ── countdown ─────────────────────────────────────────────────────────────

    #[test]
    fn countdown_decrements_and_saturates() {
        let mut c = Countdown::arm(2);
        assert_eq!(c.tick(), 1);
        assert_eq!(c.tick(), 0);
        assert_eq!(c.tick(), 0);
    }

    // ── scenario A ────────────────────────────────────────────────────────────

    #[test]
    fn empty_directory_stays_idle_without_timer() {
        let mut h = Harness::new(settings());
        for t in 0..=60 {
            assert_eq!(h.at(t, QUIET_NO_OUTPUT), RenderState::Idle);
            assert!(h.machine.idle_since().is_none());
            assert!(h.machine.countdown().is_none());
        }
        assert_eq!(h.notifier.count(), 0);
        assert_eq!(h.dispatcher.terminate_calls.get(), 0);
    }

    #[test]
    fn existing_output_without_any_render_never_arms() {
        let mut h = Harness::new(settings());
        for t in 0..=60 {
            assert_eq!(h.at(t, QUIET), RenderState::Idle);
        }
        assert_eq!(h.dispatcher.terminate_calls.get(), 0);
    }

    // ── scenario B ────────────────────────────────────────────────────────────

    #[test]
    fn single_write_runs_both_countdowns() {
        let mut h = Harness::new(settings());

        assert_eq!(h.at(0, ACTIVE), RenderState::Rendering);
        assert!(h.notifier.any("Rendering detected"));
        assert_eq!(h.at(1, QUIET), RenderState::Idle);
        assert_eq!(h.machine.idle_since(), Some(h.t0));

        h.run(2..=9, |_| false);
        assert_eq!(h.machine.state(), RenderState::Idle);

        assert_eq!(h.at(10, QUIET), RenderState::PendingTermination);
        assert_eq!(h.remaining(), Some(10));
        assert!(h.notifier.last().contains("Closing AfterFX.exe in 10 seconds"));

        h.run(11..=19, |_| false);
        assert_eq!(h.remaining(), Some(1));
        assert_eq!(h.dispatcher.terminate_calls.get(), 0);

        assert_eq!(h.at(20, QUIET), RenderState::PendingShutdown);
        assert_eq!(h.dispatcher.terminate_calls.get(), 1);
        assert_eq!(h.remaining(), Some(10));

        h.run(21..=29, |_| false);
        assert_eq!(h.dispatcher.shutdown_calls.get(), 0);

        assert_eq!(h.at(30, QUIET), RenderState::Terminated);
        assert_eq!(h.dispatcher.shutdown_calls.get(), 1);
        assert!(h.machine.shutdown_issued());

        // Terminal: further ticks do nothing.
        h.run(31..=40, |_| true);
        assert_eq!(h.machine.state(), RenderState::Terminated);
        assert_eq!(h.dispatcher.shutdown_calls.get(), 1);
    }

    #[test]
    fn every_countdown_decrement_notifies_once() {
        let mut h = Harness::new(settings());
        h.run(0..=10, |t| t == 0);
        let before = h.notifier.count();
        h.run(11..=19, |_| false);
        assert_eq!(h.notifier.count() - before, 9);
    }

    #[test]
    fn shutdown_disabled_returns_to_idle_after_termination() {
        let mut h = Harness::new(MachineSettings {
            shutdown_ticks: None,
            ..settings()
        });
        h.run(0..=20, |t| t == 0);
        assert_eq!(h.machine.state(), RenderState::Idle);
        assert!(h.machine.idle_since().is_none());
        assert_eq!(h.dispatcher.terminate_calls.get(), 1);

        // Nothing re-arms without a new render.
        h.run(21..=60, |_| false);
        assert_eq!(h.dispatcher.terminate_calls.get(), 1);
        assert_eq!(h.dispatcher.shutdown_calls.get(), 0);
    }

    #[test]
    fn missing_output_keeps_idle_and_rechecks() {
        let mut h = Harness::new(settings());
        h.at(0, ACTIVE);
        for t in 1..=10 {
            h.at(t, QUIET_NO_OUTPUT);
        }
        assert_eq!(h.machine.state(), RenderState::Idle);
        assert!(h.notifier.last().contains("No .mp4 files found"));
        assert_eq!(h.machine.idle_since(), Some(h.t0 + Duration::from_secs(10)));

        // Output shows up later; the next full grace period arms the countdown.
        for t in 11..=19 {
            assert_eq!(h.at(t, QUIET), RenderState::Idle);
        }
        assert_eq!(h.at(20, QUIET), RenderState::PendingTermination);
    }

    // ── scenario C ────────────────────────────────────────────────────────────

    #[test]
    fn write_mid_countdown_cancels_termination() {
        let mut h = Harness::new(settings());
        h.run(0..=14, |t| t == 0);
        assert_eq!(h.machine.state(), RenderState::PendingTermination);

        assert_eq!(h.at(15, ACTIVE), RenderState::Rendering);
        assert!(h.machine.countdown().is_none());
        assert!(h.machine.idle_since().is_none());
        assert!(h.notifier.last().contains("Rendering resumed"));

        h.run(16..=24, |_| false);
        assert_eq!(h.dispatcher.terminate_calls.get(), 0);
        // Grace restarts from the t=15 write.
        assert_eq!(h.at(25, QUIET), RenderState::PendingTermination);
    }

    #[test]
    fn continuous_rendering_notifies_once() {
        let mut h = Harness::new(settings());
        h.run(0..=30, |_| true);
        assert_eq!(h.machine.state(), RenderState::Rendering);
        assert_eq!(h.notifier.count(), 1);
    }

    // ── scenario D ────────────────────────────────────────────────────────────

    #[test]
    fn debug_mode_simulates_and_returns_to_idle() {
        let mut h = Harness::new(MachineSettings {
            debug_mode: true,
            ..settings()
        });
        h.run(0..=19, |t| t == 0);
        assert_eq!(h.at(20, QUIET), RenderState::Idle);
        assert!(h.notifier.last().contains("DEBUG MODE: would close AfterFX.exe"));
        assert_eq!(h.dispatcher.terminate_calls.get(), 0);

        h.run(21..=60, |_| false);
        assert_eq!(h.dispatcher.shutdown_calls.get(), 0);
        assert_eq!(h.machine.state(), RenderState::Idle);
    }

    // ── no-cancel invariant ───────────────────────────────────────────────────

    #[test]
    fn activity_cannot_cancel_pending_shutdown() {
        let mut h = Harness::new(settings());
        h.run(0..=20, |t| t == 0);
        assert_eq!(h.machine.state(), RenderState::PendingShutdown);

        for t in 21..=29 {
            assert_eq!(h.at(t, ACTIVE), RenderState::PendingShutdown);
        }
        assert_eq!(h.at(30, ACTIVE), RenderState::Terminated);
        assert_eq!(h.dispatcher.shutdown_calls.get(), 1);
    }

    // ── failures ──────────────────────────────────────────────────────────────

    #[test]
    fn failed_termination_halts_before_shutdown() {
        let mut h = Harness::with_dispatcher(
            settings(),
            FakeDispatcher {
                fail_terminate: true,
                ..FakeDispatcher::default()
            },
        );
        h.run(0..=20, |t| t == 0);
        assert_eq!(h.machine.state(), RenderState::PendingTermination);
        assert!(h.machine.countdown().is_none());
        assert!(h.notifier.last().starts_with("Error:"));

        // No retry and no shutdown while halted.
        h.run(21..=60, |_| false);
        assert_eq!(h.dispatcher.terminate_calls.get(), 1);
        assert_eq!(h.dispatcher.shutdown_calls.get(), 0);

        // Activity still pulls it back to Rendering.
        assert_eq!(h.at(61, ACTIVE), RenderState::Rendering);
    }

    #[test]
    fn renderer_already_gone_skips_shutdown() {
        let dispatcher = FakeDispatcher::default();
        dispatcher.gone.set(true);
        let mut h = Harness::with_dispatcher(settings(), dispatcher);
        h.run(0..=20, |t| t == 0);
        assert_eq!(h.machine.state(), RenderState::Idle);
        assert!(h.machine.idle_since().is_none());
        assert!(h.notifier.last().contains("Shutdown skipped"));

        // A mistyped process name must never power the machine off.
        h.run(21..=60, |_| false);
        assert_eq!(h.dispatcher.shutdown_calls.get(), 0);
        assert_eq!(h.dispatcher.terminate_calls.get(), 1);
    }

    #[test]
    fn failed_shutdown_is_notified_and_terminal() {
        let mut h = Harness::with_dispatcher(
            settings(),
            FakeDispatcher {
                fail_shutdown: true,
                ..FakeDispatcher::default()
            },
        );
        h.run(0..=30, |t| t == 0);
        assert_eq!(h.machine.state(), RenderState::Terminated);
        assert!(!h.machine.shutdown_issued());
        assert!(h.notifier.last().starts_with("Error: shutdown failed"));
        assert!(h.notifier.last().contains("Please shut down manually"));

        // No retry from the terminal state.
        h.run(31..=40, |_| false);
        assert_eq!(h.dispatcher.shutdown_calls.get(), 1);
    }

    #[test]
    fn closing_the_renderer_notifies_once() {
        let mut h = Harness::new(settings());
        h.run(0..=19, |t| t == 0);
        let before = h.notifier.count();
        assert_eq!(h.at(20, QUIET), RenderState::PendingShutdown);
        assert_eq!(h.notifier.count() - before, 1);
        assert!(h.notifier.last().contains("AfterFX.exe has been closed"));
        assert!(h.notifier.last().contains("Shutting down PC in 10 seconds"));
    }

    // ── unreadable directory ──────────────────────────────────────────────────

    #[test]
    fn unreadable_ticks_pause_termination_countdown() {
        let mut h = Harness::new(settings());
        h.run(0..=12, |t| t == 0);
        assert_eq!(h.remaining(), Some(8));

        for t in 13..=60 {
            assert_eq!(h.at(t, UNREADABLE), RenderState::PendingTermination);
        }
        assert_eq!(h.remaining(), Some(8));
        assert_eq!(h.dispatcher.terminate_calls.get(), 0);

        // Resumes where it left off once reads work again.
        h.run(61..=67, |_| false);
        assert_eq!(h.remaining(), Some(1));
        assert_eq!(h.at(68, QUIET), RenderState::PendingShutdown);
    }

    #[test]
    fn unreadable_ticks_pause_shutdown_countdown() {
        let mut h = Harness::new(settings());
        h.run(0..=22, |t| t == 0);
        assert_eq!(h.machine.state(), RenderState::PendingShutdown);

        for t in 23..=60 {
            assert_eq!(h.at(t, UNREADABLE), RenderState::PendingShutdown);
        }
        assert_eq!(h.dispatcher.shutdown_calls.get(), 0);
    }

    #[test]
    fn unreadable_ticks_never_arm_from_idle() {
        let mut h = Harness::new(settings());
        h.at(0, ACTIVE);
        for t in 1..=60 {
            assert_eq!(h.at(t, UNREADABLE), RenderState::Idle);
        }
        assert!(h.machine.countdown().is_none());
        assert!(!h.notifier.any("No .mp4 files found"));
    }

    #[test]
    fn unsupported_shutdown_is_notified_and_terminal() {
        let mut h = Harness::with_dispatcher(
            settings(),
            FakeDispatcher {
                unsupported: true,
                ..FakeDispatcher::default()
            },
        );
        h.run(0..=30, |t| t == 0);
        assert_eq!(h.machine.state(), RenderState::Terminated);
        assert!(!h.machine.shutdown_issued());
        assert!(h.notifier.last().contains("Unsupported OS"));
    }

    // ── settings ──────────────────────────────────────────────────────────────

    #[test]
    fn zero_termination_countdown_fires_on_next_tick() {
        let mut h = Harness::new(MachineSettings {
            termination_ticks: 0,
            ..settings()
        });
        h.run(0..=10, |t| t == 0);
        assert_eq!(h.machine.state(), RenderState::PendingTermination);
        assert_eq!(h.at(11, QUIET), RenderState::PendingShutdown);
    }

    #[test]
    fn settings_from_config() {
        let config = Config {
            poll_interval_secs: 2,
            termination_countdown_secs: 5,
            shutdown_countdown_secs: 0,
            debug_mode: true,
            ..Config::default()
        };
        let s = MachineSettings::from(&config);
        assert_eq!(s.termination_ticks, 3);
        assert_eq!(s.shutdown_ticks, None);
        assert_eq!(s.poll_interval, Duration::from_secs(2));
        assert!(s.debug_mode);
    }
}

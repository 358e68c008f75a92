use std::time::Instant;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::machine::{MachineSettings, Observation, RenderMachine, RenderState};
use crate::notifier::Notifier;
use crate::sampler::ActivitySampler;
use crate::status::MonitorStatus;

/// Owns everything one poll tick touches. Only the poll task holds it, so no
/// state here is shared or locked; the display side only ever gets copies.
pub struct Monitor<D, N> {
    sampler: ActivitySampler,
    machine: RenderMachine,
    dispatcher: D,
    notifier: N,
    completion_extension: String,
    /// Set while the watch directory is unreadable, so the operator is told
    /// once when reads start failing and once when they recover.
    io_failing: bool,
}

impl<D: Dispatcher, N: Notifier> Monitor<D, N> {
    /// `config` must already have passed [`Config::validate`].
    pub fn new(config: &Config, dispatcher: D, notifier: N) -> anyhow::Result<Self> {
        Ok(Self {
            sampler: ActivitySampler::new(
                config.watch_directory()?,
                config.size_delta_threshold_bytes,
            ),
            machine: RenderMachine::new(MachineSettings::from(config)),
            dispatcher,
            notifier,
            completion_extension: config.completion_extension.clone(),
            io_failing: false,
        })
    }

    pub fn state(&self) -> RenderState {
        self.machine.state()
    }

    pub fn shutdown_issued(&self) -> bool {
        self.machine.shutdown_issued()
    }

    /// One poll cycle: sample the directory, step the machine, publish a snapshot.
    /// Never fails; an unreadable directory counts as a tick with no activity
    /// and pauses any armed countdown.
    pub fn tick(&mut self, now: Instant) -> RenderState {
        let obs = match self.sampler.sample() {
            Ok(result) => {
                if std::mem::take(&mut self.io_failing) {
                    tracing::info!("Watch directory is readable again");
                    self.notifier.notify("Watch directory is readable again.");
                }
                Observation {
                    readable: true,
                    changed: result.changed,
                    output_present: result.snapshot.contains_extension(&self.completion_extension),
                }
            }
            Err(e) => {
                tracing::warn!("{e}; treating tick as no activity");
                if !self.io_failing {
                    self.io_failing = true;
                    self.notifier.notify(&format!(
                        "Error: {e}. Treating as no file activity; countdowns paused."
                    ));
                }
                Observation::default()
            }
        };

        tracing::debug!(changed = obs.changed, output = obs.output_present, "tick");
        let state = self.machine.step(obs, now, &self.dispatcher, &self.notifier);

        let mut status = MonitorStatus::new(self.sampler.directory());
        status.state = state;
        status.rendering = state == RenderState::Rendering;
        status.file_activity = obs.changed;
        status.idle_secs = self
            .machine
            .idle_since()
            .map(|since| now.saturating_duration_since(since).as_secs());
        status.countdown_secs = self.machine.countdown_secs();
        self.notifier.publish(&status);

        state
    }
}

impl<D, N> Monitor<D, N>
where
    D: Dispatcher + Send + 'static,
    N: Notifier + Send + 'static,
{
    /// Ticks every `poll_interval` until the host shutdown command has been
    /// issued. Ticks that overrun are skipped, not bunched up.
    ///
    /// A tick may block for a few seconds while the renderer is being stopped,
    /// so it runs under `block_in_place` (requires the multi-thread runtime).
    pub async fn run(mut self, poll_interval: Duration) {
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let now = Instant::now();
            tokio::task::block_in_place(|| self.tick(now));

            if self.shutdown_issued() {
                tracing::info!(state = ?self.state(), "Shutdown issued; poll loop finished");
                break;
            }
        }
    }
}

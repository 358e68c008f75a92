mod config;
mod dispatcher;
mod error;
mod event;
mod machine;
mod monitor;
mod notifier;
mod sampler;
mod status;

use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::dispatcher::SystemDispatcher;
use crate::monitor::Monitor;
use crate::notifier::ChannelNotifier;

/// Watches a render output directory. When the renderer stops writing, closes it
/// and then (optionally) shuts the machine down, with a countdown before each step.
#[derive(Parser, Debug)]
#[command(name = "renderwatch", version, about)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "renderwatch.toml")]
    config: PathBuf,

    /// Directory the renderer writes into (overrides config)
    #[arg(short, long)]
    watch_dir: Option<PathBuf>,

    /// Renderer executable name (overrides config)
    #[arg(short, long)]
    process: Option<String>,

    /// Completion file suffix, e.g. ".mp4" (overrides config)
    #[arg(long)]
    extension: Option<String>,

    /// Seconds without file activity before the termination countdown starts
    #[arg(long)]
    idle_grace: Option<u64>,

    /// Seconds between "rendering finished" and closing the renderer
    #[arg(long)]
    termination_countdown: Option<u64>,

    /// Seconds between closing the renderer and shutting down (0 disables)
    #[arg(long)]
    shutdown_countdown: Option<u64>,

    /// Seconds between polls
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Close the renderer but never shut the machine down
    #[arg(long)]
    no_shutdown: bool,

    /// Only report what would be closed; never terminate or shut down
    #[arg(long)]
    debug: bool,

    /// Write a TOML status snapshot here every tick
    #[arg(long)]
    status_file: Option<PathBuf>,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (per-tick sampling detail)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the file config.
    fn apply(&self, mut config: Config) -> Config {
        if let Some(dir) = &self.watch_dir {
            config.watch_directory = Some(dir.clone());
        }
        if let Some(process) = &self.process {
            config.target_process_name = process.clone();
        }
        if let Some(ext) = &self.extension {
            config.completion_extension = ext.clone();
        }
        if let Some(secs) = self.idle_grace {
            config.idle_grace_period_secs = secs;
        }
        if let Some(secs) = self.termination_countdown {
            config.termination_countdown_secs = secs;
        }
        if let Some(secs) = self.shutdown_countdown {
            config.shutdown_countdown_secs = secs;
        }
        if let Some(secs) = self.poll_interval {
            config.poll_interval_secs = secs;
        }
        if self.no_shutdown {
            config.shutdown_countdown_secs = 0;
        }
        if self.debug {
            config.debug_mode = true;
        }
        if let Some(path) = &self.status_file {
            config.status_file = Some(path.clone());
        }
        config
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    // ── Configuration ─────────────────────────────────────────────────────────
    let config = match config::load_or_default(&cli.config) {
        Ok(file_config) => cli.apply(file_config),
        Err(e) => {
            tracing::error!("{e:#}");
            std::process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
    tracing::debug!(?config, "resolved configuration");

    if cli.dry_run {
        println!("{config:#?}");
        return;
    }

    // ── Display task ──────────────────────────────────────────────────────────
    let (display_tx, display_rx) = mpsc::unbounded_channel();
    let display = tokio::spawn(notifier::run_display(display_rx, config.status_file.clone()));

    // ── Poll loop ─────────────────────────────────────────────────────────────
    let monitor = match Monitor::new(
        &config,
        SystemDispatcher::new(),
        ChannelNotifier::new(display_tx),
    ) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!("{e:#}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "renderwatch v{} watching {} for {}{}",
        env!("CARGO_PKG_VERSION"),
        config
            .watch_directory
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        config.target_process_name,
        if config.debug_mode { " (debug mode)" } else { "" },
    );

    let mut poller = tokio::spawn(monitor.run(config.poll_interval()));

    let failed = tokio::select! {
        res = &mut poller => res.is_err_and(|e| {
            tracing::error!("Poll loop ended unexpectedly: {e}");
            true
        }),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted; exiting");
            poller.abort();
            let _ = poller.await;
            false
        }
    };

    // The poll task held the last sender; let queued messages print.
    let _ = display.await;
    if failed {
        std::process::exit(1);
    }
}

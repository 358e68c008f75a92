/// Operator-facing status stream.
///
/// The poll loop only ever pushes into an unbounded channel, so notifying never
/// blocks a tick. A separate task drains the channel and renders it.
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::event::DisplayEvent;
use crate::status::{self, MonitorStatus};

/// Receives human-readable status lines.
pub trait Notifier {
    fn notify(&self, message: &str);

    /// Receives a state snapshot at the end of every tick. Optional.
    fn publish(&self, _status: &MonitorStatus) {}
}

/// [`Notifier`] that forwards everything to the display task.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<DisplayEvent>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::UnboundedSender<DisplayEvent>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, message: &str) {
        // The display task only goes away during process exit.
        let _ = self.tx.send(DisplayEvent::Message(message.to_string()));
    }

    fn publish(&self, status: &MonitorStatus) {
        let _ = self.tx.send(DisplayEvent::Status(status.clone()));
    }
}

/// Display task: prints messages with a local timestamp and, when a status file
/// is configured, rewrites it with every snapshot. Ends when all senders drop.
pub async fn run_display(mut rx: mpsc::UnboundedReceiver<DisplayEvent>, status_file: Option<PathBuf>) {
    let mut last_message: Option<String> = None;

    while let Some(event) = rx.recv().await {
        match event {
            DisplayEvent::Message(message) => {
                println!("[{}] {message}", chrono::Local::now().format("%H:%M:%S"));
                last_message = Some(message);
            }
            DisplayEvent::Status(mut snapshot) => {
                if let Some(path) = &status_file {
                    snapshot.message = last_message.clone();
                    status::write_status(path, &snapshot);
                }
            }
        }
    }
}

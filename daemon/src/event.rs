use crate::status::MonitorStatus;

/// Messages flowing one way, from the poll loop to the display task.
#[derive(Debug, Clone)]
pub enum DisplayEvent {
    /// A human-readable status line for the operator.
    Message(String),
    /// A copy of the monitor state taken at the end of a tick.
    Status(MonitorStatus),
}

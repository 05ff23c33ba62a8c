use std::fmt;

use serde::{Deserialize, Serialize};

use super::SysError;

/// Operating system process identifier. Stable for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// A switchable process as the registry last described it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessHandle {
    pub pid: ProcessId,
    pub name: String,
}

impl ProcessHandle {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        ProcessHandle { pid: ProcessId(pid), name: name.into() }
    }
}

/// Enumerates and controls foreground-capable processes.
///
/// Activation notifications are not part of this trait: implementations post
/// them onto the engine's event channel as they happen.
pub trait ProcessRegistry {
    /// Running processes that may be switched to, front-most first when the
    /// platform knows the order.
    fn list_foreground_capable(&self) -> Vec<ProcessHandle>;

    fn current_foreground(&self) -> Option<ProcessHandle>;

    /// Whether the process is still running, visible and allowed to take
    /// the foreground.
    fn is_switchable(&self, pid: ProcessId) -> bool;

    /// Requests that the process be brought to front. Completion is reported
    /// as an activation event, not through the return value.
    fn activate(&mut self, pid: ProcessId) -> Result<(), SysError>;

    fn terminate(&mut self, pid: ProcessId) -> Result<(), SysError>;
}

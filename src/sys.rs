//! Seams to the operating system.
//!
//! The engine never talks to the platform directly; it is handed
//! implementations of the traits in this module. [`headless`] provides
//! in-memory ones.

pub mod app;
pub mod headless;
pub mod hotkey;
pub mod timer;
pub mod window;

use app::ProcessId;
use window::WindowHandle;

/// Failures reported by platform collaborators.
///
/// These are never retried by the engine; the next user action is the retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SysError {
    #[error("process {0} is no longer running")]
    NoSuchProcess(ProcessId),
    #[error("failed to activate process {0}")]
    ActivationFailed(ProcessId),
    #[error("failed to terminate process {0}")]
    TerminateFailed(ProcessId),
    #[error("window {0:?} could not be raised")]
    RaiseFailed(WindowHandle),
}

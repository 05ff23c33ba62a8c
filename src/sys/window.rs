use serde::{Deserialize, Serialize};

use super::SysError;
use super::app::ProcessId;

/// Opaque window reference assigned by the window source when the window is
/// first enumerated. Never derived from memory addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowHandle(pub u64);

/// A window as enumerated by the platform, in enumeration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    /// Window-server number, when the platform exposes one.
    pub number: Option<u32>,
    pub title: String,
}

pub trait WindowSource {
    fn windows(&self, pid: ProcessId) -> Vec<WindowInfo>;
    fn is_live(&self, handle: WindowHandle) -> bool;
    fn raise(&mut self, handle: WindowHandle) -> Result<(), SysError>;
}

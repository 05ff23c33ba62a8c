//! In-memory platform for replays and tests.
//!
//! All collaborators share one [`HeadlessState`]. Like a real backend, they
//! report activations, terminations and hotkey edges by posting events to the
//! switcher's channel instead of calling into it.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::SysError;
use super::app::{ProcessHandle, ProcessId, ProcessRegistry};
use super::hotkey::{Hotkey, HotkeyEdge, HotkeyEdgeSource, HotkeyError, HotkeyId};
use super::window::{WindowHandle, WindowInfo, WindowSource};
use crate::actor::switcher::{self, Event};
use crate::common::collections::{HashMap, HashSet};
use crate::ui::picker::{PickerView, Presenter};

/// A request the engine made of the platform, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Activate(ProcessId),
    Terminate(ProcessId),
    Raise(WindowHandle),
    Register(HotkeyId, Hotkey),
    Unregister(HotkeyId),
    UnregisterAll,
    Suppress(bool),
    Show,
    Update,
    Hide,
    Message(String),
}

#[derive(Debug, Default)]
pub struct HeadlessState {
    /// Running processes in launch order.
    pub processes: Vec<ProcessHandle>,
    pub frontmost: Option<ProcessId>,
    pub hidden: HashSet<ProcessId>,
    pub refuse_activation: HashSet<ProcessId>,
    pub windows: HashMap<ProcessId, Vec<WindowInfo>>,
    /// Windows that are still enumerated but no longer valid.
    pub stale_windows: HashSet<WindowHandle>,
    pub registered: HashMap<HotkeyId, Hotkey>,
    pub suppressed: bool,
    pub picker: Option<PickerView>,
    pub calls: Vec<Call>,
}

impl HeadlessState {
    fn process(&self, pid: ProcessId) -> Option<&ProcessHandle> {
        self.processes.iter().find(|p| p.pid == pid)
    }
}

/// Owner of the shared state; hands out collaborators and drives the
/// simulated system.
#[derive(Clone)]
pub struct HeadlessSystem {
    state: Arc<Mutex<HeadlessState>>,
    events: switcher::Sender,
}

impl HeadlessSystem {
    pub fn new(events: switcher::Sender) -> Self {
        HeadlessSystem {
            state: Arc::new(Mutex::new(HeadlessState::default())),
            events,
        }
    }

    pub fn registry(&self) -> HeadlessProcesses { HeadlessProcesses(self.clone()) }

    pub fn window_source(&self) -> HeadlessWindows { HeadlessWindows(self.clone()) }

    pub fn hotkeys(&self) -> HeadlessHotkeys { HeadlessHotkeys(self.clone()) }

    pub fn presenter(&self) -> HeadlessPresenter { HeadlessPresenter(self.clone()) }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut HeadlessState) -> R) -> R {
        f(&mut *self.state.lock())
    }

    pub fn take_calls(&self) -> Vec<Call> { std::mem::take(&mut self.state.lock().calls) }

    pub fn launch(&self, pid: u32, name: &str) {
        let handle = ProcessHandle::new(pid, name);
        let mut state = self.state.lock();
        if state.process(handle.pid).is_none() {
            state.processes.push(handle);
        }
    }

    /// The user brought a process forward without going through the switcher.
    pub fn focus(&self, pid: u32) {
        let pid = ProcessId(pid);
        let handle = {
            let mut state = self.state.lock();
            let Some(handle) = state.process(pid).cloned() else {
                return;
            };
            state.frontmost = Some(pid);
            state.hidden.remove(&pid);
            handle
        };
        self.events.send(Event::ProcessActivated(handle));
    }

    pub fn quit(&self, pid: u32) {
        let pid = ProcessId(pid);
        if self.remove_process(pid) {
            self.events.send(Event::ProcessTerminated(pid));
        }
    }

    pub fn hide(&self, pid: u32) {
        let pid = ProcessId(pid);
        self.state.lock().hidden.insert(pid);
        self.events.send(Event::ProcessHidden(pid));
    }

    pub fn open_window(&self, pid: u32, handle: u64, number: Option<u32>, title: &str) {
        let info = WindowInfo {
            handle: WindowHandle(handle),
            number,
            title: title.to_string(),
        };
        self.state.lock().windows.entry(ProcessId(pid)).or_default().push(info);
    }

    /// Removes the window from enumeration.
    pub fn close_window(&self, handle: u64) {
        let handle = WindowHandle(handle);
        let mut state = self.state.lock();
        for windows in state.windows.values_mut() {
            windows.retain(|w| w.handle != handle);
        }
        state.stale_windows.remove(&handle);
    }

    /// Invalidates the window while enumeration still reports it.
    pub fn invalidate_window(&self, handle: u64) {
        self.state.lock().stale_windows.insert(WindowHandle(handle));
    }

    /// Delivers a hotkey edge if the combination is registered and delivery
    /// is not suppressed. Returns whether the edge was delivered.
    pub fn hotkey(&self, id: HotkeyId, edge: HotkeyEdge) -> bool {
        {
            let state = self.state.lock();
            if state.suppressed || !state.registered.contains_key(&id) {
                debug!(?id, ?edge, suppressed = state.suppressed, "hotkey edge dropped");
                return false;
            }
        }
        self.events.send(Event::Hotkey { id, edge });
        true
    }

    fn remove_process(&self, pid: ProcessId) -> bool {
        let mut state = self.state.lock();
        let before = state.processes.len();
        state.processes.retain(|p| p.pid != pid);
        state.windows.remove(&pid);
        state.hidden.remove(&pid);
        if state.frontmost == Some(pid) {
            state.frontmost = None;
        }
        state.processes.len() != before
    }

    fn record(&self, call: Call) { self.state.lock().calls.push(call); }
}

pub struct HeadlessProcesses(HeadlessSystem);

impl ProcessRegistry for HeadlessProcesses {
    fn list_foreground_capable(&self) -> Vec<ProcessHandle> {
        let state = self.0.state.lock();
        state.processes.iter().filter(|p| !state.hidden.contains(&p.pid)).cloned().collect()
    }

    fn current_foreground(&self) -> Option<ProcessHandle> {
        let state = self.0.state.lock();
        state.frontmost.and_then(|pid| state.process(pid).cloned())
    }

    fn is_switchable(&self, pid: ProcessId) -> bool {
        let state = self.0.state.lock();
        state.process(pid).is_some() && !state.hidden.contains(&pid)
    }

    fn activate(&mut self, pid: ProcessId) -> Result<(), SysError> {
        self.0.record(Call::Activate(pid));
        let handle = {
            let mut state = self.0.state.lock();
            let Some(handle) = state.process(pid).cloned() else {
                return Err(SysError::NoSuchProcess(pid));
            };
            if state.refuse_activation.contains(&pid) {
                return Err(SysError::ActivationFailed(pid));
            }
            state.frontmost = Some(pid);
            state.hidden.remove(&pid);
            handle
        };
        self.0.events.send(Event::ProcessActivated(handle));
        Ok(())
    }

    fn terminate(&mut self, pid: ProcessId) -> Result<(), SysError> {
        self.0.record(Call::Terminate(pid));
        if !self.0.remove_process(pid) {
            return Err(SysError::TerminateFailed(pid));
        }
        self.0.events.send(Event::ProcessTerminated(pid));
        Ok(())
    }
}

pub struct HeadlessWindows(HeadlessSystem);

impl WindowSource for HeadlessWindows {
    fn windows(&self, pid: ProcessId) -> Vec<WindowInfo> {
        self.0.state.lock().windows.get(&pid).cloned().unwrap_or_default()
    }

    fn is_live(&self, handle: WindowHandle) -> bool {
        let state = self.0.state.lock();
        !state.stale_windows.contains(&handle)
            && state.windows.values().flatten().any(|w| w.handle == handle)
    }

    fn raise(&mut self, handle: WindowHandle) -> Result<(), SysError> {
        self.0.record(Call::Raise(handle));
        if self.is_live(handle) { Ok(()) } else { Err(SysError::RaiseFailed(handle)) }
    }
}

pub struct HeadlessHotkeys(HeadlessSystem);

impl HotkeyEdgeSource for HeadlessHotkeys {
    fn register(&mut self, id: HotkeyId, hotkey: Hotkey) -> Result<(), HotkeyError> {
        self.0.record(Call::Register(id, hotkey));
        let mut state = self.0.state.lock();
        if let Some((&existing, _)) =
            state.registered.iter().find(|&(other, key)| *other != id && *key == hotkey)
        {
            return Err(HotkeyError::Conflict { hotkey, existing });
        }
        state.registered.insert(id, hotkey);
        Ok(())
    }

    fn unregister(&mut self, id: HotkeyId) {
        self.0.record(Call::Unregister(id));
        self.0.state.lock().registered.remove(&id);
    }

    fn unregister_all(&mut self) {
        self.0.record(Call::UnregisterAll);
        self.0.state.lock().registered.clear();
    }

    fn set_suppressed(&mut self, suppressed: bool) {
        self.0.record(Call::Suppress(suppressed));
        self.0.state.lock().suppressed = suppressed;
    }
}

/// Keeps the last shown view and logs what a real overlay would draw.
pub struct HeadlessPresenter(HeadlessSystem);

impl HeadlessPresenter {
    fn log_view(view: &PickerView) {
        let rows: Vec<String> = view
            .candidates
            .iter()
            .enumerate()
            .map(|(idx, handle)| {
                let marker = if Some(idx) == view.selected { ">" } else { " " };
                format!("{marker}{} {}", idx + 1, handle.name)
            })
            .collect();
        info!(search = %view.search, "picker: [{}]", rows.join(", "));
    }
}

impl Presenter for HeadlessPresenter {
    fn show(&mut self, view: &PickerView) {
        Self::log_view(view);
        self.0.record(Call::Show);
        self.0.state.lock().picker = Some(view.clone());
    }

    fn update(&mut self, view: &PickerView) {
        Self::log_view(view);
        self.0.record(Call::Update);
        self.0.state.lock().picker = Some(view.clone());
    }

    fn hide(&mut self) {
        info!("picker hidden");
        self.0.record(Call::Hide);
        self.0.state.lock().picker = None;
    }

    fn show_transient_message(&mut self, text: &str) {
        info!("picker message: {text}");
        self.0.record(Call::Message(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::actor;

    fn alt_tab() -> Hotkey { "Alt+Tab".parse().unwrap() }

    #[test]
    fn unregistered_hotkey_stops_delivering_edges() {
        let (tx, mut rx) = actor::channel();
        let system = HeadlessSystem::new(tx);
        let mut hotkeys = system.hotkeys();
        hotkeys.register(HotkeyId::AppSwitch, alt_tab()).unwrap();
        hotkeys.register(HotkeyId::WindowCycle, "Alt+`".parse().unwrap()).unwrap();

        assert!(system.hotkey(HotkeyId::AppSwitch, HotkeyEdge::Pressed));
        assert!(matches!(
            rx.try_recv(),
            Some((_, Event::Hotkey { id: HotkeyId::AppSwitch, edge: HotkeyEdge::Pressed }))
        ));

        hotkeys.unregister(HotkeyId::AppSwitch);
        assert!(!system.hotkey(HotkeyId::AppSwitch, HotkeyEdge::Released));
        assert!(rx.try_recv().is_none());
        assert!(system.hotkey(HotkeyId::WindowCycle, HotkeyEdge::Pressed));

        let calls = system.take_calls();
        assert_eq!(calls.last(), Some(&Call::Unregister(HotkeyId::AppSwitch)));
    }

    #[test]
    fn unregistering_frees_the_combination() {
        let (tx, _rx) = actor::channel();
        let system = HeadlessSystem::new(tx);
        let mut hotkeys = system.hotkeys();
        hotkeys.register(HotkeyId::Toggle, alt_tab()).unwrap();
        assert!(matches!(
            hotkeys.register(HotkeyId::Overlay, alt_tab()),
            Err(HotkeyError::Conflict { existing: HotkeyId::Toggle, .. })
        ));

        hotkeys.unregister(HotkeyId::Toggle);
        hotkeys.unregister(HotkeyId::Toggle);
        assert_eq!(hotkeys.register(HotkeyId::Overlay, alt_tab()), Ok(()));
    }
}

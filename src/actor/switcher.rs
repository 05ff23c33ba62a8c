//! The switching engine.
//!
//! Owns the MRU list, the press machine, the open picker and the window cycle
//! stacks. Every input (hotkey edges, activations reported by the platform,
//! picker keys and clicks, setting changes and the long-press timer) is
//! handled one at a time on the actor's task.

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

use crate::actor;
use crate::common::config::{SwitchMode, SwitcherSettings, clamp_long_press};
use crate::common::settings_store::{SettingsError, SettingsStore};
use crate::model::mru::MruTracker;
use crate::model::picker::{PickerEffect, PickerSession};
use crate::model::press::{PressAction, PressMachine, PressResponse, TimerRequest, TimerToken};
use crate::model::recording::{RecorderId, ShortcutBus, ShortcutEvent, ShortcutId};
use crate::model::window_cycle::WindowCycler;
use crate::sys::app::{ProcessHandle, ProcessId, ProcessRegistry};
use crate::sys::hotkey::{Hotkey, HotkeyEdge, HotkeyEdgeSource, HotkeyId, KeyInput};
use crate::sys::timer::Timer;
use crate::sys::window::WindowSource;
use crate::ui::picker::{PickerView, Presenter};


#[derive(Debug)]
pub enum Event {
    Hotkey {
        id: HotkeyId,
        edge: HotkeyEdge,
    },
    ProcessActivated(ProcessHandle),
    ProcessTerminated(ProcessId),
    ProcessHidden(ProcessId),
    /// A key pressed while the picker has keyboard focus. `reply` learns
    /// whether the key was consumed.
    Key {
        input: KeyInput,
        reply: Option<oneshot::Sender<bool>>,
    },
    PickerClicked(usize),
    LongPressElapsed(TimerToken),
    SetMode(SwitchMode),
    SetLongPressThreshold(f64),
    SetAutoSelectSingleResult(bool),
    SetShowNumberBadges(bool),
    BeginRecording(RecorderId),
    EndRecording(RecorderId),
    CommitShortcut {
        id: ShortcutId,
        value: Hotkey,
    },
    SubscribeShortcuts(oneshot::Sender<mpsc::UnboundedReceiver<ShortcutEvent>>),
}

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

/// The platform services the engine drives.
pub struct Platform {
    pub processes: Box<dyn ProcessRegistry>,
    pub windows: Box<dyn WindowSource>,
    pub hotkeys: Box<dyn HotkeyEdgeSource>,
    pub presenter: Box<dyn Presenter>,
    pub settings: Box<dyn SettingsStore>,
}

pub struct Switcher {
    platform: Platform,
    rx: Receiver,
    settings: SwitcherSettings,
    mru: MruTracker,
    press: PressMachine,
    long_press: Option<(TimerToken, Instant)>,
    picker: Option<PickerSession>,
    cycler: WindowCycler,
    bus: ShortcutBus,
}

impl Switcher {
    /// Builds the engine with settings loaded from the platform's store.
    /// `own_pid` is never offered as a switch target.
    pub fn new(platform: Platform, rx: Receiver, own_pid: ProcessId) -> Self {
        let settings = SwitcherSettings::load(&*platform.settings);
        Switcher {
            platform,
            rx,
            press: PressMachine::new(settings.long_press()),
            settings,
            mru: MruTracker::new(own_pid),
            long_press: None,
            picker: None,
            cycler: WindowCycler::new(),
            bus: ShortcutBus::new(),
        }
    }

    pub fn settings(&self) -> &SwitcherSettings { &self.settings }

    pub fn picker(&self) -> Option<&PickerSession> { self.picker.as_ref() }

    pub fn picker_view(&self) -> Option<PickerView> {
        self.picker.as_ref().map(|p| p.view(self.settings.picker_flags()))
    }

    pub fn mru(&mut self) -> Vec<ProcessHandle> {
        let processes = &self.platform.processes;
        self.mru.snapshot(|pid| processes.is_switchable(pid))
    }

    /// Deadline of the pending long-press expiry, if one is armed.
    pub fn long_press_deadline(&self) -> Option<(TimerToken, Instant)> { self.long_press }

    pub fn subscribe_shortcuts(&mut self) -> mpsc::UnboundedReceiver<ShortcutEvent> {
        self.bus.subscribe()
    }

    /// Seeds the MRU list from the running processes and registers the
    /// hotkeys of the current mode.
    pub fn start(&mut self) {
        let frontmost = self.platform.processes.current_foreground();
        let candidates = self.platform.processes.list_foreground_capable();
        self.mru.seed(frontmost, candidates);
        let seeded = self.mru().len();
        self.register_hotkeys();
        self.platform.hotkeys.set_suppressed(false);
        info!(mode = ?self.settings.mode, seeded, "switcher started");
    }

    pub async fn run(mut self) {
        let mut timer = Timer::manual();
        loop {
            match self.long_press {
                Some((_, deadline)) if timer.deadline() != Some(deadline) => {
                    timer.set_deadline(deadline)
                }
                Some(_) => {}
                None => timer.cancel(),
            }

            tokio::select! {
                _ = &mut timer, if timer.is_armed() => {
                    if let Some((token, _)) = self.long_press {
                        self.handle_event(Event::LongPressElapsed(token));
                    }
                }

                maybe = self.rx.recv() => {
                    let Some((span, event)) = maybe else { break };
                    let _enter = span.enter();
                    self.handle_event(event);
                }
            }
        }
        debug!("switcher channel closed");
    }

    /// Handles everything already queued without waiting.
    pub fn process_pending(&mut self) {
        while let Some((span, event)) = self.rx.try_recv() {
            let _enter = span.enter();
            self.handle_event(event);
        }
    }

    #[instrument(name = "switcher::handle_event", skip(self))]
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Hotkey { id, edge } => self.handle_hotkey(id, edge, Instant::now()),
            Event::ProcessActivated(handle) => self.on_process_activated(handle),
            Event::ProcessTerminated(pid) => self.forget_process(pid),
            Event::ProcessHidden(pid) => self.forget_process(pid),
            Event::Key { input, reply } => {
                let consumed = self.handle_key(input);
                if let Some(reply) = reply {
                    _ = reply.send(consumed);
                }
            }
            Event::PickerClicked(idx) => self.click(idx),
            Event::LongPressElapsed(token) => self.on_long_press_elapsed(token),
            Event::SetMode(mode) => self.set_mode(mode),
            Event::SetLongPressThreshold(secs) => self.set_long_press_threshold(secs),
            Event::SetAutoSelectSingleResult(on) => self.set_auto_select_single_result(on),
            Event::SetShowNumberBadges(on) => self.set_show_number_badges(on),
            Event::BeginRecording(recorder) => self.begin_recording(recorder),
            Event::EndRecording(recorder) => self.end_recording(recorder),
            Event::CommitShortcut { id, value } => self.commit_shortcut(id, value),
            Event::SubscribeShortcuts(reply) => {
                _ = reply.send(self.bus.subscribe());
            }
        }
    }

    pub fn handle_hotkey(&mut self, id: HotkeyId, edge: HotkeyEdge, now: Instant) {
        use HotkeyEdge::{Pressed, Released};
        match (self.settings.mode, id, edge) {
            (_, HotkeyId::WindowCycle, Pressed) => self.cycle_windows(),
            (SwitchMode::Combined, HotkeyId::AppSwitch, Pressed) => {
                let response = self.press.on_press(now);
                self.apply_press(response);
            }
            (SwitchMode::Combined, HotkeyId::AppSwitch, Released) => {
                let response = self.press.on_release();
                self.apply_press(response);
            }
            (SwitchMode::Separate, HotkeyId::Toggle, Pressed) => self.quick_switch(),
            (SwitchMode::Separate, HotkeyId::Overlay, Pressed) => {
                if self.picker.is_some() {
                    self.advance_picker();
                } else {
                    self.open_picker();
                }
            }
            (_, _, Released) => {}
            (mode, id, _) => debug!(?mode, ?id, "hotkey not bound in this mode"),
        }
    }

    pub fn on_long_press_elapsed(&mut self, token: TimerToken) {
        if self.long_press.is_some_and(|(armed, _)| armed == token) {
            self.long_press = None;
        }
        if let Some(action) = self.press.on_timer(token) {
            self.perform(action);
        }
    }

    fn apply_press(&mut self, response: PressResponse) {
        match response.timer {
            TimerRequest::Keep => {}
            TimerRequest::Arm { token, deadline } => self.long_press = Some((token, deadline)),
            TimerRequest::Cancel => self.long_press = None,
        }
        if let Some(action) = response.action {
            self.perform(action);
        }
    }

    fn perform(&mut self, action: PressAction) {
        trace!(?action, picker_open = self.picker.is_some(), "press action");
        match (action, self.picker.is_some()) {
            (PressAction::Tap, false) => self.quick_switch(),
            (PressAction::Tap, true) => self.advance_picker(),
            (PressAction::Hold, false) => self.open_picker(),
            (PressAction::Hold, true) => self.cancel_picker(),
        }
    }

    /// Activates the previous process in MRU order, or the only one.
    pub fn quick_switch(&mut self) {
        let processes = &self.platform.processes;
        match self.mru.quick_switch_target(|pid| processes.is_switchable(pid)) {
            Some(target) => {
                debug!(target = %target.name, "quick switch");
                self.activate(&target);
            }
            None => debug!("nothing to switch to"),
        }
    }

    /// Opens a fresh picker over the current MRU list, replacing any open one.
    pub fn open_picker(&mut self) {
        if self.picker.take().is_some() {
            debug!("replacing open picker");
        }
        let candidates = self.mru();
        let origin = self.platform.processes.current_foreground();
        let session =
            PickerSession::open(candidates, origin, self.settings.auto_select_single_result);
        let view = session.view(self.settings.picker_flags());
        info!(candidates = view.candidates.len(), "opening picker");
        self.picker = Some(session);
        self.platform.presenter.show(&view);
    }

    fn advance_picker(&mut self) {
        if let Some(session) = &mut self.picker {
            let effect = session.move_selection(1);
            self.apply_picker_effect(effect);
        }
    }

    fn cancel_picker(&mut self) {
        if let Some(session) = &self.picker {
            let effect = session.cancel();
            self.apply_picker_effect(effect);
        }
    }

    /// Feeds a key to the open picker. Returns whether it was consumed.
    pub fn handle_key(&mut self, input: KeyInput) -> bool {
        let bindings = self.settings.shortcuts.picker_bindings();
        let Some(session) = &mut self.picker else {
            return false;
        };
        match session.handle_key(&input, &bindings) {
            Some(effect) => {
                self.apply_picker_effect(effect);
                true
            }
            None => false,
        }
    }

    pub fn click(&mut self, idx: usize) {
        let Some(session) = &mut self.picker else {
            debug!(idx, "click without an open picker");
            return;
        };
        let effect = session.commit_index(idx);
        self.apply_picker_effect(effect);
    }

    fn apply_picker_effect(&mut self, effect: PickerEffect) {
        match effect {
            PickerEffect::None => {}
            PickerEffect::Redraw => self.redraw_picker(),
            PickerEffect::Commit(target) => {
                info!(target = %target.name, "picker committed");
                self.close_picker();
                self.activate(&target);
            }
            PickerEffect::Cancel { restore } => {
                info!(restore = ?restore.as_ref().map(|h| &h.name), "picker cancelled");
                self.close_picker();
                if let Some(origin) = restore {
                    if self.platform.processes.is_switchable(origin.pid) {
                        self.activate(&origin);
                    }
                }
            }
            PickerEffect::Quit(target) => self.quit_from_picker(target),
        }
    }

    fn quit_from_picker(&mut self, target: ProcessHandle) {
        if let Err(err) = self.platform.processes.terminate(target.pid) {
            warn!(target = %target.name, "could not quit process: {err}");
            return;
        }
        info!(target = %target.name, "quit from picker");
        self.mru.remove(target.pid);
        if let Some(session) = &mut self.picker {
            session.remove(target.pid);
        }
        self.redraw_picker();
        self.platform.presenter.show_transient_message(&format!("Quit {}", target.name));
    }

    fn redraw_picker(&mut self) {
        if let Some(view) = self.picker_view() {
            self.platform.presenter.update(&view);
        }
    }

    fn close_picker(&mut self) {
        if self.picker.take().is_some() {
            self.platform.presenter.hide();
        }
    }

    fn activate(&mut self, target: &ProcessHandle) {
        if let Err(err) = self.platform.processes.activate(target.pid) {
            warn!(target = %target.name, "activation failed: {err}");
        }
    }

    /// Raises the next window of the frontmost process.
    pub fn cycle_windows(&mut self) {
        let Some(front) = self.platform.processes.current_foreground() else {
            debug!("no frontmost process to cycle");
            return;
        };
        let Some(entry) = self.cycler.cycle(front.pid, &*self.platform.windows) else {
            debug!(process = %front.name, "no other window to cycle to");
            return;
        };
        debug!(process = %front.name, window = %entry.title, "cycling window");
        if let Err(err) = self.platform.windows.raise(entry.handle) {
            warn!(window = %entry.title, "could not raise window: {err}");
        }
        if let Err(err) = self.platform.processes.activate(front.pid) {
            warn!(process = %front.name, "could not activate after raise: {err}");
        }
    }

    pub fn on_process_activated(&mut self, handle: ProcessHandle) {
        let pid = handle.pid;
        if pid == self.mru.own_pid() {
            // Our own overlay taking focus must not dismiss it.
            trace!("own process activated");
            return;
        }
        let processes = &self.platform.processes;
        self.mru.on_process_activated(handle, |pid| processes.is_switchable(pid));
        self.cycler.reset_all_except(pid);
        if self.picker.is_some() {
            info!(%pid, "focus moved elsewhere, closing picker");
            self.close_picker();
        }
    }

    fn forget_process(&mut self, pid: ProcessId) {
        self.mru.remove(pid);
        let removed = self.picker.as_mut().is_some_and(|session| session.remove(pid));
        if removed {
            self.redraw_picker();
        }
    }

    pub fn set_mode(&mut self, mode: SwitchMode) {
        info!(?mode, "switch mode changed");
        self.settings.mode = mode;
        let response = self.press.reset();
        self.apply_press(response);
        self.persist("mode", |s, store| s.save_mode(store));
        self.register_hotkeys();
    }

    /// Applies a new threshold in seconds, clamped to the supported range. A
    /// press in flight is rescheduled against its original press time.
    pub fn set_long_press_threshold(&mut self, secs: f64) {
        let clamped = clamp_long_press(secs);
        if clamped != secs {
            debug!(requested = secs, clamped, "long-press threshold clamped");
        }
        self.settings.long_press_threshold = clamped;
        let response = self.press.set_threshold(self.settings.long_press());
        self.apply_press(response);
        self.persist("long_press_threshold", |s, store| s.save_long_press(store));
    }

    pub fn set_auto_select_single_result(&mut self, enabled: bool) {
        self.settings.auto_select_single_result = enabled;
        if let Some(session) = &mut self.picker {
            session.set_auto_select(enabled);
        }
        self.persist("auto_select_single_result", |s, store| s.save_auto_select(store));
    }

    pub fn set_show_number_badges(&mut self, enabled: bool) {
        self.settings.show_number_badges = enabled;
        self.redraw_picker();
        self.persist("show_number_badges", |s, store| s.save_number_badges(store));
    }

    /// Stores a shortcut and re-registers the global hotkeys if it is one.
    pub fn set_shortcut(&mut self, id: ShortcutId, value: Hotkey) {
        info!(?id, %value, "shortcut changed");
        self.settings.shortcuts.set(id, value);
        self.persist(id.settings_key(), |s, store| s.save_shortcut(store, id));
        if !matches!(id, ShortcutId::PickerSelect | ShortcutId::PickerQuit) {
            self.register_hotkeys();
        }
    }

    pub fn commit_shortcut(&mut self, id: ShortcutId, value: Hotkey) {
        self.set_shortcut(id, value);
        self.bus.publish(ShortcutEvent::ShortcutCommitted { id, value });
    }

    /// Suppresses hotkey delivery while a shortcut field is capturing keys.
    pub fn begin_recording(&mut self, recorder: RecorderId) {
        self.bus.begin_recording(recorder);
        self.platform.hotkeys.set_suppressed(true);
        let response = self.press.reset();
        self.apply_press(response);
    }

    pub fn end_recording(&mut self, recorder: RecorderId) {
        if self.bus.end_recording(recorder) && !self.bus.is_recording() {
            self.register_hotkeys();
            self.platform.hotkeys.set_suppressed(false);
        }
    }

    fn register_hotkeys(&mut self) {
        let shortcuts = self.settings.shortcuts;
        let bindings = match self.settings.mode {
            SwitchMode::Combined => vec![
                (HotkeyId::AppSwitch, shortcuts.app_switch),
                (HotkeyId::WindowCycle, shortcuts.window_cycle),
            ],
            SwitchMode::Separate => vec![
                (HotkeyId::Toggle, shortcuts.toggle),
                (HotkeyId::Overlay, shortcuts.overlay),
                (HotkeyId::WindowCycle, shortcuts.window_cycle),
            ],
        };
        let hotkeys = &mut self.platform.hotkeys;
        hotkeys.unregister_all();
        for (id, hotkey) in bindings {
            if let Err(err) = hotkeys.register(id, hotkey) {
                warn!(?id, %hotkey, "could not register hotkey: {err}");
            }
        }
    }

    fn persist(
        &mut self,
        key: &str,
        save: impl FnOnce(&SwitcherSettings, &mut dyn SettingsStore) -> Result<(), SettingsError>,
    ) {
        if let Err(err) = save(&self.settings, &mut *self.platform.settings) {
            warn!(key, "could not persist setting: {err}");
        }
    }
}

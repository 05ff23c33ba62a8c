//! Coordination between shortcut recorders in the settings UI and the engine.
//!
//! Recorders announce themselves on the bus; at most one may be recording at
//! a time. Subscribers see every event in publish order.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::sys::hotkey::Hotkey;

/// Identifies one shortcut recording field in the configuration UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecorderId(pub u32);

/// Every user-configurable shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutId {
    AppSwitch,
    WindowCycle,
    PickerSelect,
    PickerQuit,
    Toggle,
    Overlay,
}

impl ShortcutId {
    pub const ALL: [ShortcutId; 6] = [
        ShortcutId::AppSwitch,
        ShortcutId::WindowCycle,
        ShortcutId::PickerSelect,
        ShortcutId::PickerQuit,
        ShortcutId::Toggle,
        ShortcutId::Overlay,
    ];

    /// Key under which the shortcut is persisted.
    pub fn settings_key(self) -> &'static str {
        match self {
            ShortcutId::AppSwitch => "shortcuts.app_switch",
            ShortcutId::WindowCycle => "shortcuts.window_cycle",
            ShortcutId::PickerSelect => "shortcuts.picker_select",
            ShortcutId::PickerQuit => "shortcuts.picker_quit",
            ShortcutId::Toggle => "shortcuts.toggle",
            ShortcutId::Overlay => "shortcuts.overlay",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortcutEvent {
    ShortcutCommitted { id: ShortcutId, value: Hotkey },
    BeginRecording { recorder: RecorderId },
    EndRecording { recorder: RecorderId },
    /// Another recorder took over; the named one must revert its field.
    RecordingCancelled { recorder: RecorderId },
}

#[derive(Debug, Default)]
pub struct ShortcutBus {
    subscribers: Vec<mpsc::UnboundedSender<ShortcutEvent>>,
    active: Option<RecorderId>,
}

impl ShortcutBus {
    pub fn new() -> Self { Self::default() }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ShortcutEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn publish(&mut self, event: ShortcutEvent) {
        debug!(?event, "publishing shortcut event");
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn active_recorder(&self) -> Option<RecorderId> { self.active }

    pub fn is_recording(&self) -> bool { self.active.is_some() }

    /// Makes `recorder` the active one. Returns the recorder it displaced.
    pub fn begin_recording(&mut self, recorder: RecorderId) -> Option<RecorderId> {
        let displaced = self.active.replace(recorder).filter(|prev| *prev != recorder);
        if let Some(prev) = displaced {
            info!(?prev, ?recorder, "recording taken over by another field");
            self.publish(ShortcutEvent::RecordingCancelled { recorder: prev });
        }
        self.publish(ShortcutEvent::BeginRecording { recorder });
        displaced
    }

    /// Ends a recording. Ending one that is not active (e.g. it was already
    /// displaced) is ignored.
    pub fn end_recording(&mut self, recorder: RecorderId) -> bool {
        if self.active != Some(recorder) {
            debug!(?recorder, "ignoring end of inactive recording");
            return false;
        }
        self.active = None;
        self.publish(ShortcutEvent::EndRecording { recorder });
        true
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<ShortcutEvent>) -> Vec<ShortcutEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn second_recorder_cancels_the_first() {
        let mut bus = ShortcutBus::new();
        let mut rx = bus.subscribe();

        assert_eq!(bus.begin_recording(RecorderId(1)), None);
        assert_eq!(bus.begin_recording(RecorderId(2)), Some(RecorderId(1)));
        assert_eq!(bus.active_recorder(), Some(RecorderId(2)));

        assert!(!bus.end_recording(RecorderId(1)));
        assert!(bus.is_recording());
        assert!(bus.end_recording(RecorderId(2)));
        assert!(!bus.is_recording());

        assert_eq!(drain(&mut rx), vec![
            ShortcutEvent::BeginRecording { recorder: RecorderId(1) },
            ShortcutEvent::RecordingCancelled { recorder: RecorderId(1) },
            ShortcutEvent::BeginRecording { recorder: RecorderId(2) },
            ShortcutEvent::EndRecording { recorder: RecorderId(2) },
        ]);
    }

    #[test]
    fn closed_subscribers_are_dropped() {
        let mut bus = ShortcutBus::new();
        let rx = bus.subscribe();
        let mut kept = bus.subscribe();
        drop(rx);

        let value = "Alt+Tab".parse().unwrap();
        bus.publish(ShortcutEvent::ShortcutCommitted { id: ShortcutId::AppSwitch, value });
        assert_eq!(bus.subscribers.len(), 1);
        assert_eq!(drain(&mut kept), vec![ShortcutEvent::ShortcutCommitted {
            id: ShortcutId::AppSwitch,
            value,
        }]);
    }

    #[test]
    fn settings_keys_are_distinct_per_mode() {
        let keys: Vec<&str> = ShortcutId::ALL.iter().map(|id| id.settings_key()).collect();
        let mut unique = keys.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), keys.len());
    }
}

//! Scripted sessions against the headless platform.
//!
//! A script seeds some processes and then lists steps (hotkey edges, typing,
//! clicks, system changes, pauses) that are fed through the real actor loop.
//! The result is the ordered list of requests the engine made of the
//! platform.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{Instrument, info, info_span, warn};

use crate::actor::{self, switcher};
use crate::actor::switcher::{Event, Platform, Switcher};
use crate::common::config::SwitchMode;
use crate::common::settings_store::SettingsStore;
use crate::model::recording::{RecorderId, ShortcutId};
use crate::sys::app::ProcessId;
use crate::sys::headless::{Call, HeadlessSystem};
use crate::sys::hotkey::{Hotkey, HotkeyEdge, HotkeyId, KeyInput};

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid script: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum Step {
    Launch { pid: u32, name: String },
    Quit(u32),
    Hide(u32),
    /// Focus change made outside the switcher.
    Focus(u32),
    OpenWindow {
        pid: u32,
        handle: u64,
        #[serde(default)]
        number: Option<u32>,
        #[serde(default)]
        title: String,
    },
    CloseWindow(u64),
    InvalidateWindow(u64),
    Press(HotkeyId),
    Release(HotkeyId),
    /// Types text into the picker, one key per character.
    Type(String),
    Key(Hotkey),
    Click(usize),
    /// Pause in milliseconds.
    Wait(u64),
    SetMode(SwitchMode),
    SetLongPressThreshold(f64),
    SetAutoSelect(bool),
    SetNumberBadges(bool),
    SetShortcut { id: ShortcutId, value: Hotkey },
    BeginRecording(u32),
    EndRecording(u32),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Script {
    /// Running before the engine starts, in MRU order.
    #[serde(default)]
    pub processes: Vec<(u32, String)>,
    /// Defaults to the first process.
    #[serde(default)]
    pub frontmost: Option<u32>,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn parse(text: &str) -> Result<Self, ReplayError> { Ok(ron::from_str(text)?) }

    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ReplayError::Read { path: path.to_path_buf(), source })?;
        Self::parse(&text)
    }
}

/// Process id the replayed engine treats as its own.
pub const REPLAY_OWN_PID: ProcessId = ProcessId(0);

/// Runs `script` to completion and returns every platform request in order.
pub async fn run(script: Script, settings: Box<dyn SettingsStore>) -> Vec<Call> {
    let (tx, rx) = actor::channel();
    let system = HeadlessSystem::new(tx.clone());
    for (pid, name) in &script.processes {
        system.launch(*pid, name);
    }
    let frontmost = script.frontmost.or_else(|| script.processes.first().map(|(pid, _)| *pid));
    system.with_state(|s| s.frontmost = frontmost.map(ProcessId));

    let platform = Platform {
        processes: Box::new(system.registry()),
        windows: Box::new(system.window_source()),
        hotkeys: Box::new(system.hotkeys()),
        presenter: Box::new(system.presenter()),
        settings,
    };
    let mut engine = Switcher::new(platform, rx, REPLAY_OWN_PID);
    engine.start();

    let driver = async {
        for (idx, step) in script.steps.into_iter().enumerate() {
            info!(idx, ?step, "replaying");
            perform(&system, &tx, step).instrument(info_span!("step", idx)).await;
            // The engine is polled first, so one yield lets it drain
            // everything this step produced before the next step runs.
            tokio::task::yield_now().await;
        }
    };

    tokio::select! {
        biased;
        _ = engine.run() => warn!("switcher stopped before the script finished"),
        _ = driver => {}
    }
    system.take_calls()
}

async fn perform(system: &HeadlessSystem, tx: &switcher::Sender, step: Step) {
    match step {
        Step::Launch { pid, name } => system.launch(pid, &name),
        Step::Quit(pid) => system.quit(pid),
        Step::Hide(pid) => system.hide(pid),
        Step::Focus(pid) => system.focus(pid),
        Step::OpenWindow { pid, handle, number, title } => {
            system.open_window(pid, handle, number, &title)
        }
        Step::CloseWindow(handle) => system.close_window(handle),
        Step::InvalidateWindow(handle) => system.invalidate_window(handle),
        Step::Press(id) => {
            system.hotkey(id, HotkeyEdge::Pressed);
        }
        Step::Release(id) => {
            system.hotkey(id, HotkeyEdge::Released);
        }
        Step::Type(text) => {
            for c in text.chars() {
                match KeyInput::typed(c) {
                    Some(input) => tx.send(Event::Key { input, reply: None }),
                    None => warn!(?c, "no key produces this character"),
                }
            }
        }
        Step::Key(hotkey) => tx.send(Event::Key { input: hotkey.into(), reply: None }),
        Step::Click(idx) => tx.send(Event::PickerClicked(idx)),
        Step::Wait(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
        Step::SetMode(mode) => tx.send(Event::SetMode(mode)),
        Step::SetLongPressThreshold(secs) => tx.send(Event::SetLongPressThreshold(secs)),
        Step::SetAutoSelect(on) => tx.send(Event::SetAutoSelectSingleResult(on)),
        Step::SetNumberBadges(on) => tx.send(Event::SetShowNumberBadges(on)),
        Step::SetShortcut { id, value } => tx.send(Event::CommitShortcut { id, value }),
        Step::BeginRecording(id) => tx.send(Event::BeginRecording(RecorderId(id))),
        Step::EndRecording(id) => tx.send(Event::EndRecording(RecorderId(id))),
    }
}

//! State of an open picker: candidates, type-ahead text and selection.

use tracing::debug;

use super::search::Query;
use crate::sys::app::{ProcessHandle, ProcessId};
use crate::sys::hotkey::{Hotkey, KeyCode, KeyInput, Modifiers};

/// Keys the picker reacts to besides navigation and typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickerBindings {
    pub select: Hotkey,
    pub quit: Hotkey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PickerFlags {
    pub show_number_badges: bool,
}

/// Everything the presenter needs to draw the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerView {
    pub candidates: Vec<ProcessHandle>,
    pub selected: Option<usize>,
    pub search: String,
    pub flags: PickerFlags,
}

/// What the engine has to do after the session changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerEffect {
    /// Consumed, nothing visible changed.
    None,
    Redraw,
    /// Activate the process and close the picker.
    Commit(ProcessHandle),
    /// Close the picker and give focus back to `restore`.
    Cancel { restore: Option<ProcessHandle> },
    /// Terminate the process and keep the picker open.
    Quit(ProcessHandle),
}

#[derive(Debug)]
pub struct PickerSession {
    search: String,
    candidates: Vec<ProcessHandle>,
    filtered: Vec<ProcessHandle>,
    selected: Option<usize>,
    origin: Option<ProcessHandle>,
    auto_select: bool,
}

impl PickerSession {
    pub fn open(
        candidates: Vec<ProcessHandle>,
        origin: Option<ProcessHandle>,
        auto_select: bool,
    ) -> Self {
        let selected = (!candidates.is_empty()).then_some(0);
        Self {
            search: String::new(),
            filtered: candidates.clone(),
            candidates,
            selected,
            origin,
            auto_select,
        }
    }

    pub fn search(&self) -> &str { &self.search }

    pub fn filtered(&self) -> &[ProcessHandle] { &self.filtered }

    pub fn selected(&self) -> Option<usize> { self.selected }

    pub fn selected_handle(&self) -> Option<&ProcessHandle> {
        self.selected.and_then(|idx| self.filtered.get(idx))
    }

    pub fn set_auto_select(&mut self, enabled: bool) { self.auto_select = enabled; }

    pub fn view(&self, flags: PickerFlags) -> PickerView {
        PickerView {
            candidates: self.filtered.clone(),
            selected: self.selected,
            search: self.search.clone(),
            flags,
        }
    }

    pub fn append_search_char(&mut self, c: char) -> PickerEffect {
        self.search.push(c);
        self.refilter()
    }

    pub fn backspace(&mut self) -> PickerEffect {
        if self.search.pop().is_none() {
            return PickerEffect::None;
        }
        self.refilter()
    }

    pub fn clear_search(&mut self) -> PickerEffect {
        if self.search.is_empty() {
            return PickerEffect::None;
        }
        self.search.clear();
        self.refilter()
    }

    pub fn move_selection(&mut self, delta: isize) -> PickerEffect {
        let len = self.filtered.len();
        if len == 0 {
            return PickerEffect::None;
        }
        let step = delta.rem_euclid(len as isize) as usize;
        self.selected = Some((self.selected.unwrap_or(0) + step) % len);
        PickerEffect::Redraw
    }

    /// `1`-`9` pick the first nine rows, `0` the tenth.
    pub fn select_by_digit(&mut self, digit: u8) -> PickerEffect {
        let idx = match digit {
            0 => 9,
            1..=9 => usize::from(digit - 1),
            _ => return PickerEffect::None,
        };
        self.commit_index(idx)
    }

    pub fn commit_index(&mut self, idx: usize) -> PickerEffect {
        if idx >= self.filtered.len() {
            return PickerEffect::None;
        }
        self.selected = Some(idx);
        self.commit_selected()
    }

    pub fn commit_selected(&self) -> PickerEffect {
        match self.selected_handle() {
            Some(handle) => PickerEffect::Commit(handle.clone()),
            None => PickerEffect::None,
        }
    }

    pub fn cancel(&self) -> PickerEffect { PickerEffect::Cancel { restore: self.origin.clone() } }

    /// Drops a process from the session, keeping the selection on the same
    /// row when possible and on the last row otherwise.
    pub fn remove(&mut self, pid: ProcessId) -> bool {
        self.candidates.retain(|h| h.pid != pid);
        let Some(idx) = self.filtered.iter().position(|h| h.pid == pid) else {
            return false;
        };
        self.filtered.remove(idx);
        self.clamp_selection();
        true
    }

    pub fn handle_key(&mut self, input: &KeyInput, bindings: &PickerBindings) -> Option<PickerEffect> {
        if bindings.select.matches(input) {
            return Some(self.commit_selected());
        }
        if bindings.quit.matches(input) {
            return Some(match self.selected_handle() {
                Some(handle) => PickerEffect::Quit(handle.clone()),
                None => PickerEffect::None,
            });
        }
        let effect = match input.key {
            KeyCode::Escape if self.search.is_empty() => self.cancel(),
            KeyCode::Escape => self.clear_search(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Left => self.move_selection(-1),
            KeyCode::Right => self.move_selection(1),
            KeyCode::Tab if input.modifiers.contains(Modifiers::SHIFT) => self.move_selection(-1),
            KeyCode::Tab => self.move_selection(1),
            key if key.digit().is_some() && input.modifiers.is_empty() => {
                self.select_by_digit(key.digit()?)
            }
            _ => self.append_search_char(input.printable()?),
        };
        Some(effect)
    }

    fn refilter(&mut self) -> PickerEffect {
        let query = Query::new(&self.search);
        self.filtered =
            self.candidates.iter().filter(|h| query.matches(&h.name)).cloned().collect();
        self.clamp_selection();
        debug!(search = %self.search, matches = self.filtered.len(), "picker refiltered");

        if self.auto_select && !query.is_empty() && self.filtered.len() == 1 {
            return PickerEffect::Commit(self.filtered[0].clone());
        }
        PickerEffect::Redraw
    }

    fn clamp_selection(&mut self) {
        self.selected = match self.filtered.len() {
            0 => None,
            len => Some(self.selected.unwrap_or(0).min(len - 1)),
        };
    }
}

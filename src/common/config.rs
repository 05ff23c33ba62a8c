use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::settings_store::{self, SettingsError, SettingsStore};
use crate::model::picker::{PickerBindings, PickerFlags};
use crate::model::recording::ShortcutId;
use crate::sys::hotkey::{Hotkey, KeyCode, Modifiers};

pub const MIN_LONG_PRESS_SECS: f64 = 0.05;
pub const MAX_LONG_PRESS_SECS: f64 = 5.0;
pub const DEFAULT_LONG_PRESS_SECS: f64 = 0.3;

const MODE_KEY: &str = "mode";
const THRESHOLD_KEY: &str = "long_press_threshold";
const AUTO_SELECT_KEY: &str = "auto_select_single_result";
const BADGES_KEY: &str = "show_number_badges";

/// How the app-switch hotkeys are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchMode {
    /// One hotkey: tap to quick-switch, hold to open the picker.
    #[default]
    Combined,
    /// Separate quick-switch and picker hotkeys, no timing.
    Separate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shortcuts {
    pub app_switch: Hotkey,
    pub window_cycle: Hotkey,
    pub picker_select: Hotkey,
    pub picker_quit: Hotkey,
    pub toggle: Hotkey,
    pub overlay: Hotkey,
}

impl Default for Shortcuts {
    fn default() -> Self {
        Shortcuts {
            app_switch: Hotkey::new(Modifiers::ALT, KeyCode::Tab),
            window_cycle: Hotkey::new(Modifiers::ALT, KeyCode::Grave),
            picker_select: Hotkey::new(Modifiers::empty(), KeyCode::Return),
            picker_quit: Hotkey::new(Modifiers::META, KeyCode::Q),
            toggle: Hotkey::new(Modifiers::ALT, KeyCode::Tab),
            overlay: Hotkey::new(Modifiers::ALT, KeyCode::Space),
        }
    }
}

impl Shortcuts {
    pub fn get(&self, id: ShortcutId) -> Hotkey {
        match id {
            ShortcutId::AppSwitch => self.app_switch,
            ShortcutId::WindowCycle => self.window_cycle,
            ShortcutId::PickerSelect => self.picker_select,
            ShortcutId::PickerQuit => self.picker_quit,
            ShortcutId::Toggle => self.toggle,
            ShortcutId::Overlay => self.overlay,
        }
    }

    pub fn set(&mut self, id: ShortcutId, hotkey: Hotkey) {
        let slot = match id {
            ShortcutId::AppSwitch => &mut self.app_switch,
            ShortcutId::WindowCycle => &mut self.window_cycle,
            ShortcutId::PickerSelect => &mut self.picker_select,
            ShortcutId::PickerQuit => &mut self.picker_quit,
            ShortcutId::Toggle => &mut self.toggle,
            ShortcutId::Overlay => &mut self.overlay,
        };
        *slot = hotkey;
    }

    pub fn picker_bindings(&self) -> PickerBindings {
        PickerBindings {
            select: self.picker_select,
            quit: self.picker_quit,
        }
    }
}

/// User preferences of the switcher.
///
/// The combined-mode hotkey and the separate-mode toggle/overlay hotkeys live
/// under distinct keys, so each mode remembers its own shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitcherSettings {
    pub mode: SwitchMode,
    pub long_press_threshold: f64,
    pub auto_select_single_result: bool,
    pub show_number_badges: bool,
    pub shortcuts: Shortcuts,
}

impl Default for SwitcherSettings {
    fn default() -> Self {
        SwitcherSettings {
            mode: SwitchMode::Combined,
            long_press_threshold: DEFAULT_LONG_PRESS_SECS,
            auto_select_single_result: false,
            show_number_badges: true,
            shortcuts: Shortcuts::default(),
        }
    }
}

pub fn clamp_long_press(secs: f64) -> f64 {
    if secs.is_nan() {
        return DEFAULT_LONG_PRESS_SECS;
    }
    secs.clamp(MIN_LONG_PRESS_SECS, MAX_LONG_PRESS_SECS)
}

fn read_or<T: DeserializeOwned>(store: &dyn SettingsStore, key: &str, default: T) -> T {
    match settings_store::read(store, key) {
        Some(Ok(value)) => value,
        Some(Err(err)) => {
            warn!(key, "ignoring unreadable setting: {err}");
            default
        }
        None => default,
    }
}

impl SwitcherSettings {
    /// Loads every key independently; anything missing or malformed falls
    /// back to its default.
    pub fn load(store: &dyn SettingsStore) -> Self {
        let defaults = SwitcherSettings::default();
        let mut shortcuts = defaults.shortcuts;
        for id in ShortcutId::ALL {
            shortcuts.set(id, read_or(store, id.settings_key(), defaults.shortcuts.get(id)));
        }
        SwitcherSettings {
            mode: read_or(store, MODE_KEY, defaults.mode),
            long_press_threshold: clamp_long_press(read_or(
                store,
                THRESHOLD_KEY,
                defaults.long_press_threshold,
            )),
            auto_select_single_result: read_or(
                store,
                AUTO_SELECT_KEY,
                defaults.auto_select_single_result,
            ),
            show_number_badges: read_or(store, BADGES_KEY, defaults.show_number_badges),
            shortcuts,
        }
    }

    pub fn long_press(&self) -> Duration { Duration::from_secs_f64(self.long_press_threshold) }

    pub fn picker_flags(&self) -> PickerFlags {
        PickerFlags { show_number_badges: self.show_number_badges }
    }

    pub fn save_mode(&self, store: &mut dyn SettingsStore) -> Result<(), SettingsError> {
        settings_store::write(store, MODE_KEY, &self.mode)
    }

    pub fn save_long_press(&self, store: &mut dyn SettingsStore) -> Result<(), SettingsError> {
        settings_store::write(store, THRESHOLD_KEY, &self.long_press_threshold)
    }

    pub fn save_auto_select(&self, store: &mut dyn SettingsStore) -> Result<(), SettingsError> {
        settings_store::write(store, AUTO_SELECT_KEY, &self.auto_select_single_result)
    }

    pub fn save_number_badges(&self, store: &mut dyn SettingsStore) -> Result<(), SettingsError> {
        settings_store::write(store, BADGES_KEY, &self.show_number_badges)
    }

    pub fn save_shortcut(
        &self,
        store: &mut dyn SettingsStore,
        id: ShortcutId,
    ) -> Result<(), SettingsError> {
        settings_store::write(store, id.settings_key(), &self.shortcuts.get(id))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::common::settings_store::{MemorySettingsStore, write};

    #[test]
    fn empty_store_yields_defaults() {
        let store = MemorySettingsStore::new();
        assert_eq!(SwitcherSettings::load(&store), SwitcherSettings::default());
    }

    #[test]
    fn malformed_keys_fall_back_individually() {
        let mut store = MemorySettingsStore::new();
        write(&mut store, "mode", &"sideways").unwrap();
        write(&mut store, "auto_select_single_result", &true).unwrap();
        write(&mut store, "shortcuts.overlay", &"Alt+Banana").unwrap();
        write(&mut store, "shortcuts.toggle", &"Ctrl+Tab").unwrap();

        let settings = SwitcherSettings::load(&store);
        assert_eq!(settings.mode, SwitchMode::Combined);
        assert!(settings.auto_select_single_result);
        assert_eq!(settings.shortcuts.overlay, Shortcuts::default().overlay);
        assert_eq!(settings.shortcuts.toggle.to_string(), "Ctrl+Tab");
    }

    #[test]
    fn threshold_is_clamped_on_load() {
        let mut store = MemorySettingsStore::new();
        write(&mut store, "long_press_threshold", &60.0).unwrap();
        assert_eq!(SwitcherSettings::load(&store).long_press_threshold, MAX_LONG_PRESS_SECS);

        write(&mut store, "long_press_threshold", &0.0).unwrap();
        assert_eq!(SwitcherSettings::load(&store).long_press_threshold, MIN_LONG_PRESS_SECS);
        assert_eq!(clamp_long_press(f64::NAN), DEFAULT_LONG_PRESS_SECS);
    }

    #[test]
    fn saved_values_load_back() {
        let mut store = MemorySettingsStore::new();
        let mut settings = SwitcherSettings::default();
        settings.mode = SwitchMode::Separate;
        settings.shortcuts.overlay = "Meta+Space".parse().unwrap();
        settings.save_mode(&mut store).unwrap();
        settings.save_shortcut(&mut store, ShortcutId::Overlay).unwrap();

        let loaded = SwitcherSettings::load(&store);
        assert_eq!(loaded.mode, SwitchMode::Separate);
        assert_eq!(loaded.shortcuts.overlay, settings.shortcuts.overlay);
        assert_eq!(loaded.shortcuts.app_switch, Shortcuts::default().app_switch);
    }

    #[test]
    fn whole_settings_serialize_as_toml() {
        let text = toml::to_string(&SwitcherSettings::default()).unwrap();
        assert!(text.contains(r#"mode = "combined""#));
        assert!(text.contains(r#"app_switch = "Alt+Tab""#));
        let back: SwitcherSettings = toml::from_str(&text).unwrap();
        assert_eq!(back, SwitcherSettings::default());
    }
}

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum KeyCode {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    #[strum(to_string = "0")]
    Digit0,
    #[strum(to_string = "1")]
    Digit1,
    #[strum(to_string = "2")]
    Digit2,
    #[strum(to_string = "3")]
    Digit3,
    #[strum(to_string = "4")]
    Digit4,
    #[strum(to_string = "5")]
    Digit5,
    #[strum(to_string = "6")]
    Digit6,
    #[strum(to_string = "7")]
    Digit7,
    #[strum(to_string = "8")]
    Digit8,
    #[strum(to_string = "9")]
    Digit9,
    Space,
    Tab,
    #[strum(to_string = "Return", serialize = "Enter")]
    Return,
    #[strum(to_string = "Escape", serialize = "Esc")]
    Escape,
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    #[strum(to_string = "Grave", serialize = "`")]
    Grave,
    #[strum(to_string = "Minus", serialize = "-")]
    Minus,
    #[strum(to_string = "Equal", serialize = "=")]
    Equal,
    #[strum(to_string = "Comma", serialize = ",")]
    Comma,
    #[strum(to_string = "Period", serialize = ".")]
    Period,
    #[strum(to_string = "Slash", serialize = "/")]
    Slash,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

impl KeyCode {
    /// The numeric value of a digit row key.
    pub fn digit(self) -> Option<u8> {
        use KeyCode::*;
        Some(match self {
            Digit0 => 0,
            Digit1 => 1,
            Digit2 => 2,
            Digit3 => 3,
            Digit4 => 4,
            Digit5 => 5,
            Digit6 => 6,
            Digit7 => 7,
            Digit8 => 8,
            Digit9 => 9,
            _ => return None,
        })
    }

    /// Best-effort mapping from a typed character to the key that produces it
    /// on a US layout.
    pub fn from_char(c: char) -> Option<KeyCode> {
        match c {
            ' ' => Some(KeyCode::Space),
            '\t' => Some(KeyCode::Tab),
            '_' => Some(KeyCode::Minus),
            '+' => Some(KeyCode::Equal),
            c => KeyCode::from_str(c.encode_utf8(&mut [0; 4])).ok(),
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2;
        const META = 1 << 3;
    }
}

impl Modifiers {
    fn parse_one(name: &str) -> Option<Modifiers> {
        match name.to_ascii_lowercase().as_str() {
            "shift" => Some(Modifiers::SHIFT),
            "ctrl" | "control" => Some(Modifiers::CONTROL),
            "alt" | "opt" | "option" => Some(Modifiers::ALT),
            "meta" | "cmd" | "command" | "super" | "win" => Some(Modifiers::META),
            _ => None,
        }
    }

    /// Modifiers that turn a key press into a command rather than text.
    pub fn is_command(self) -> bool { self.intersects(Modifiers::CONTROL | Modifiers::META) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HotkeyParseError {
    #[error("empty key combination")]
    Empty,
    #[error("unknown modifier `{0}`")]
    UnknownModifier(String),
    #[error("unknown key `{0}`")]
    UnknownKey(String),
}

/// A key combination, e.g. `Alt+Shift+Tab`.
///
/// Serialized as its canonical string form so settings stay human editable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hotkey {
    pub modifiers: Modifiers,
    pub key: KeyCode,
}

impl Hotkey {
    pub const fn new(modifiers: Modifiers, key: KeyCode) -> Self { Hotkey { modifiers, key } }

    pub fn matches(&self, input: &KeyInput) -> bool {
        self.key == input.key && self.modifiers == input.modifiers
    }
}

impl FromStr for Hotkey {
    type Err = HotkeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let Some((key, modifiers)) = parts.split_last() else {
            return Err(HotkeyParseError::Empty);
        };
        if key.is_empty() {
            return Err(HotkeyParseError::Empty);
        }
        let mut mods = Modifiers::empty();
        for name in modifiers.iter().filter(|m| !m.is_empty()) {
            mods |= Modifiers::parse_one(name)
                .ok_or_else(|| HotkeyParseError::UnknownModifier(name.to_string()))?;
        }
        let key =
            KeyCode::from_str(key).map_err(|_| HotkeyParseError::UnknownKey(key.to_string()))?;
        Ok(Hotkey::new(mods, key))
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const ORDER: [(Modifiers, &str); 4] = [
            (Modifiers::META, "Meta"),
            (Modifiers::CONTROL, "Ctrl"),
            (Modifiers::ALT, "Alt"),
            (Modifiers::SHIFT, "Shift"),
        ];
        for (flag, name) in ORDER {
            if self.modifiers.contains(flag) {
                write!(f, "{name}+")?;
            }
        }
        write!(f, "{}", self.key)
    }
}

impl TryFrom<String> for Hotkey {
    type Error = HotkeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl From<Hotkey> for String {
    fn from(hotkey: Hotkey) -> Self { hotkey.to_string() }
}

/// A key-down event seen by the picker's keyboard monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: KeyCode,
    pub modifiers: Modifiers,
    /// The character the key would type, if any.
    pub text: Option<char>,
}

impl KeyInput {
    pub fn new(key: KeyCode, modifiers: Modifiers) -> Self {
        KeyInput { key, modifiers, text: None }
    }

    pub fn typed(c: char) -> Option<Self> {
        let key = KeyCode::from_char(c)?;
        let modifiers = if c.is_ascii_uppercase() || c == '_' || c == '+' {
            Modifiers::SHIFT
        } else {
            Modifiers::empty()
        };
        Some(KeyInput { key, modifiers, text: Some(c) })
    }

    /// The printable character for this event, if it should be treated as text.
    pub fn printable(&self) -> Option<char> {
        if self.modifiers.is_command() {
            return None;
        }
        self.text.filter(|c| !c.is_control())
    }
}

impl From<Hotkey> for KeyInput {
    fn from(hotkey: Hotkey) -> Self { KeyInput::new(hotkey.key, hotkey.modifiers) }
}

/// Logical identity of a globally registered hotkey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotkeyId {
    /// Combined mode: tap to quick-switch, hold to open the picker.
    AppSwitch,
    WindowCycle,
    /// Separate mode quick-switch.
    Toggle,
    /// Separate mode picker open/advance.
    Overlay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotkeyEdge {
    Pressed,
    Released,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HotkeyError {
    #[error("{hotkey} is already registered for {existing:?}")]
    Conflict { hotkey: Hotkey, existing: HotkeyId },
    #[error("the system refused to register {0}")]
    Unavailable(Hotkey),
}

/// Platform facility that reports press and release edges for registered
/// key combinations.
///
/// Implementations deliver edges onto the engine's event channel, never by
/// calling into the engine directly.
pub trait HotkeyEdgeSource {
    fn register(&mut self, id: HotkeyId, hotkey: Hotkey) -> Result<(), HotkeyError>;
    /// No-op when `id` is not registered.
    fn unregister(&mut self, id: HotkeyId);
    fn unregister_all(&mut self);
    /// While suppressed no edges are delivered at all, so raw key events reach
    /// whatever surface is recording a new shortcut.
    fn set_suppressed(&mut self, suppressed: bool);
}

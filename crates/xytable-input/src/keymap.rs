//! Static mapping from keys to motion and output actions

use std::fmt;
use xytable_core::{Axis, AxisKey, DigitalOutput, Direction};

/// Key identity as seen by the translator
///
/// Character keys are stored lowercase so `W` and `w` are the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Char(char),
}

impl Key {
    /// Character key, case-folded
    pub fn char(c: char) -> Self {
        Key::Char(c.to_ascii_lowercase())
    }

    /// Case-folded form of the key
    pub fn normalized(self) -> Self {
        match self {
            Key::Char(c) => Key::char(c),
            other => other,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::ArrowUp => write!(f, "ArrowUp"),
            Key::ArrowDown => write!(f, "ArrowDown"),
            Key::ArrowLeft => write!(f, "ArrowLeft"),
            Key::ArrowRight => write!(f, "ArrowRight"),
            Key::Char(c) => write!(f, "{}", c),
        }
    }
}

/// Meaning of a mapped key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Move one axis in one direction
    Move(AxisKey),
    /// Switch a digital output
    Output {
        output: DigitalOutput,
        state: bool,
    },
}

const MOTION_KEYS: [(Key, AxisKey); 8] = [
    (Key::ArrowUp, AxisKey::new(Axis::Y, Direction::Positive)),
    (Key::Char('w'), AxisKey::new(Axis::Y, Direction::Positive)),
    (Key::ArrowDown, AxisKey::new(Axis::Y, Direction::Negative)),
    (Key::Char('s'), AxisKey::new(Axis::Y, Direction::Negative)),
    (Key::ArrowLeft, AxisKey::new(Axis::X, Direction::Negative)),
    (Key::Char('a'), AxisKey::new(Axis::X, Direction::Negative)),
    (Key::ArrowRight, AxisKey::new(Axis::X, Direction::Positive)),
    (Key::Char('d'), AxisKey::new(Axis::X, Direction::Positive)),
];

/// Key bindings of the console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMap {
    output: DigitalOutput,
}

impl KeyMap {
    /// Arrow keys and WASD move; `.` and `,` switch `output` on and off
    pub fn new(output: DigitalOutput) -> Self {
        Self { output }
    }

    /// Look up a key; unmapped keys yield `None`
    pub fn resolve(&self, key: Key) -> Option<KeyAction> {
        let key = key.normalized();
        match key {
            Key::Char('.') => Some(KeyAction::Output {
                output: self.output,
                state: true,
            }),
            Key::Char(',') => Some(KeyAction::Output {
                output: self.output,
                state: false,
            }),
            _ => MOTION_KEYS
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, axis_key)| KeyAction::Move(*axis_key)),
        }
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::new(DigitalOutput::default())
    }
}

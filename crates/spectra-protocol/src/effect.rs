//! Effect identities and the per-category effect payloads a backend can
//! instantiate. The core treats every `param` block as opaque data; only
//! the backends flatten grids into their native layouts.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{color::Color, DeviceCategory, DeviceUid};

/// Handle to one effect instance created by a backend. Values are only
/// ever minted by a backend; the client merely carries them around.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectId(Uuid);

impl EffectId {
    /// Sentinel meaning "no effect active".
    pub const NONE: EffectId = EffectId(Uuid::nil());

    pub const fn from_u128(v: u128) -> Self {
        EffectId(Uuid::from_u128(v))
    }

    pub const fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    pub fn is_none(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub const KEYBOARD_ROWS: usize = 6;
pub const KEYBOARD_COLS: usize = 22;
pub const MOUSE_ROWS: usize = 9;
pub const MOUSE_COLS: usize = 7;
pub const KEYPAD_ROWS: usize = 4;
pub const KEYPAD_COLS: usize = 5;
pub const MOUSEPAD_LEDS: usize = 15;
pub const HEADSET_LEDS: usize = 5;
pub const LINK_LEDS: usize = 5;

/// Per-key color map for the full keyboard matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardGrid(pub [[Color; KEYBOARD_COLS]; KEYBOARD_ROWS]);

impl KeyboardGrid {
    pub fn get(&self, row: usize, col: usize) -> Option<Color> {
        self.0.get(row)?.get(col).copied()
    }

    pub fn set(&mut self, row: usize, col: usize, color: Color) -> bool {
        match self.0.get_mut(row).and_then(|r| r.get_mut(col)) {
            Some(slot) => {
                *slot = color;
                true
            }
            None => false,
        }
    }

    pub fn fill(&mut self, color: Color) {
        self.0 = [[color; KEYBOARD_COLS]; KEYBOARD_ROWS];
    }

    /// Row-major packed words, the layout the native SDK consumes.
    pub fn bgr_words(&self) -> Vec<u32> {
        self.0.iter().flatten().map(|c| c.to_bgr()).collect()
    }
}

/// Per-LED color map for the mouse matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseGrid(pub [[Color; MOUSE_COLS]; MOUSE_ROWS]);

impl MouseGrid {
    pub fn get(&self, row: usize, col: usize) -> Option<Color> {
        self.0.get(row)?.get(col).copied()
    }

    pub fn set(&mut self, row: usize, col: usize, color: Color) -> bool {
        match self.0.get_mut(row).and_then(|r| r.get_mut(col)) {
            Some(slot) => {
                *slot = color;
                true
            }
            None => false,
        }
    }

    pub fn bgr_words(&self) -> Vec<u32> {
        self.0.iter().flatten().map(|c| c.to_bgr()).collect()
    }
}

/// Per-key color map for the keypad matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeypadGrid(pub [[Color; KEYPAD_COLS]; KEYPAD_ROWS]);

impl KeypadGrid {
    pub fn get(&self, row: usize, col: usize) -> Option<Color> {
        self.0.get(row)?.get(col).copied()
    }

    pub fn set(&mut self, row: usize, col: usize, color: Color) -> bool {
        match self.0.get_mut(row).and_then(|r| r.get_mut(col)) {
            Some(slot) => {
                *slot = color;
                true
            }
            None => false,
        }
    }

    pub fn bgr_words(&self) -> Vec<u32> {
        self.0.iter().flatten().map(|c| c.to_bgr()).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", content = "param", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyboardEffect {
    None,
    Static { color: Color },
    Custom(KeyboardGrid),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", content = "param", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MouseEffect {
    None,
    Static { color: Color },
    Custom(MouseGrid),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", content = "param", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MousepadEffect {
    None,
    Static { color: Color },
    Custom([Color; MOUSEPAD_LEDS]),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", content = "param", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeadsetEffect {
    None,
    Static { color: Color },
    Custom([Color; HEADSET_LEDS]),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", content = "param", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeypadEffect {
    None,
    Static { color: Color },
    Custom(KeypadGrid),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", content = "param", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkEffect {
    None,
    Static { color: Color },
    Custom([Color; LINK_LEDS]),
}

/// Effects available on devices with no known layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", content = "param", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenericEffect {
    None,
    Static { color: Color },
}

/// One create-effect request, category and parameters together. Forwarded
/// unchanged to whichever backend is active.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum EffectPayload {
    Keyboard(KeyboardEffect),
    Mouse(MouseEffect),
    Mousepad(MousepadEffect),
    Headset(HeadsetEffect),
    Keypad(KeypadEffect),
    Link(LinkEffect),
    Generic { device: DeviceUid, effect: GenericEffect },
}

impl EffectPayload {
    pub fn category(&self) -> DeviceCategory {
        match self {
            EffectPayload::Keyboard(_) => DeviceCategory::Keyboard,
            EffectPayload::Mouse(_) => DeviceCategory::Mouse,
            EffectPayload::Mousepad(_) => DeviceCategory::Mousepad,
            EffectPayload::Headset(_) => DeviceCategory::Headset,
            EffectPayload::Keypad(_) => DeviceCategory::Keypad,
            EffectPayload::Link(_) => DeviceCategory::Link,
            EffectPayload::Generic { .. } => DeviceCategory::Generic,
        }
    }

    /// Whether this payload names the category's "nothing active" kind.
    pub fn is_none_kind(&self) -> bool {
        matches!(
            self,
            EffectPayload::Keyboard(KeyboardEffect::None)
                | EffectPayload::Mouse(MouseEffect::None)
                | EffectPayload::Mousepad(MousepadEffect::None)
                | EffectPayload::Headset(HeadsetEffect::None)
                | EffectPayload::Keypad(KeypadEffect::None)
                | EffectPayload::Link(LinkEffect::None)
                | EffectPayload::Generic { effect: GenericEffect::None, .. }
        )
    }
}

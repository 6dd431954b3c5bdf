//! Key codes sent in `KeysDown`/`KeysUp` commands.
//!
//! The canonical representation is USB HID Usage IDs (page 0x07,
//! Keyboard/Keypad page), so the agent can map each code onto whatever input
//! backend the automated application uses without a per-platform table on
//! the driver side.
//!
//! Reference: USB HID Usage Tables 1.3, Section 10.

use serde::{Deserialize, Serialize};

/// USB HID Usage ID for keyboard keys (page 0x07).
///
/// The numeric value of each variant is its HID Usage ID.
/// [`KeyCode::Unknown`] (0x0000) stands in for keys with no standard mapping;
/// the codec still transmits it so the agent can decide what to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum KeyCode {
    // Letters (HID 0x04–0x1D)
    KeyA = 0x04,
    KeyB = 0x05,
    KeyC = 0x06,
    KeyD = 0x07,
    KeyE = 0x08,
    KeyF = 0x09,
    KeyG = 0x0A,
    KeyH = 0x0B,
    KeyI = 0x0C,
    KeyJ = 0x0D,
    KeyK = 0x0E,
    KeyL = 0x0F,
    KeyM = 0x10,
    KeyN = 0x11,
    KeyO = 0x12,
    KeyP = 0x13,
    KeyQ = 0x14,
    KeyR = 0x15,
    KeyS = 0x16,
    KeyT = 0x17,
    KeyU = 0x18,
    KeyV = 0x19,
    KeyW = 0x1A,
    KeyX = 0x1B,
    KeyY = 0x1C,
    KeyZ = 0x1D,

    // Digits (HID 0x1E–0x27)
    Digit1 = 0x1E,
    Digit2 = 0x1F,
    Digit3 = 0x20,
    Digit4 = 0x21,
    Digit5 = 0x22,
    Digit6 = 0x23,
    Digit7 = 0x24,
    Digit8 = 0x25,
    Digit9 = 0x26,
    Digit0 = 0x27,

    // Control keys (HID 0x28–0x2C)
    Enter = 0x28,
    Escape = 0x29,
    Backspace = 0x2A,
    Tab = 0x2B,
    Space = 0x2C,

    // Function keys (HID 0x3A–0x45)
    F1 = 0x3A,
    F2 = 0x3B,
    F3 = 0x3C,
    F4 = 0x3D,
    F5 = 0x3E,
    F6 = 0x3F,
    F7 = 0x40,
    F8 = 0x41,
    F9 = 0x42,
    F10 = 0x43,
    F11 = 0x44,
    F12 = 0x45,

    // Navigation cluster (HID 0x49–0x52)
    Insert = 0x49,
    Home = 0x4A,
    PageUp = 0x4B,
    Delete = 0x4C,
    End = 0x4D,
    PageDown = 0x4E,
    ArrowRight = 0x4F,
    ArrowLeft = 0x50,
    ArrowDown = 0x51,
    ArrowUp = 0x52,

    // Modifier keys (HID 0xE0–0xE7)
    ControlLeft = 0xE0,
    ShiftLeft = 0xE1,
    AltLeft = 0xE2,
    MetaLeft = 0xE3,
    ControlRight = 0xE4,
    ShiftRight = 0xE5,
    AltRight = 0xE6,
    MetaRight = 0xE7,

    /// Sentinel for keys with no HID mapping.
    Unknown = 0x0000,
}

impl KeyCode {
    /// Converts a raw u16 HID Usage ID to a [`KeyCode`].
    ///
    /// Returns [`KeyCode::Unknown`] for values with no variant.
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x04 => KeyCode::KeyA,
            0x05 => KeyCode::KeyB,
            0x06 => KeyCode::KeyC,
            0x07 => KeyCode::KeyD,
            0x08 => KeyCode::KeyE,
            0x09 => KeyCode::KeyF,
            0x0A => KeyCode::KeyG,
            0x0B => KeyCode::KeyH,
            0x0C => KeyCode::KeyI,
            0x0D => KeyCode::KeyJ,
            0x0E => KeyCode::KeyK,
            0x0F => KeyCode::KeyL,
            0x10 => KeyCode::KeyM,
            0x11 => KeyCode::KeyN,
            0x12 => KeyCode::KeyO,
            0x13 => KeyCode::KeyP,
            0x14 => KeyCode::KeyQ,
            0x15 => KeyCode::KeyR,
            0x16 => KeyCode::KeyS,
            0x17 => KeyCode::KeyT,
            0x18 => KeyCode::KeyU,
            0x19 => KeyCode::KeyV,
            0x1A => KeyCode::KeyW,
            0x1B => KeyCode::KeyX,
            0x1C => KeyCode::KeyY,
            0x1D => KeyCode::KeyZ,
            0x1E => KeyCode::Digit1,
            0x1F => KeyCode::Digit2,
            0x20 => KeyCode::Digit3,
            0x21 => KeyCode::Digit4,
            0x22 => KeyCode::Digit5,
            0x23 => KeyCode::Digit6,
            0x24 => KeyCode::Digit7,
            0x25 => KeyCode::Digit8,
            0x26 => KeyCode::Digit9,
            0x27 => KeyCode::Digit0,
            0x28 => KeyCode::Enter,
            0x29 => KeyCode::Escape,
            0x2A => KeyCode::Backspace,
            0x2B => KeyCode::Tab,
            0x2C => KeyCode::Space,
            0x3A => KeyCode::F1,
            0x3B => KeyCode::F2,
            0x3C => KeyCode::F3,
            0x3D => KeyCode::F4,
            0x3E => KeyCode::F5,
            0x3F => KeyCode::F6,
            0x40 => KeyCode::F7,
            0x41 => KeyCode::F8,
            0x42 => KeyCode::F9,
            0x43 => KeyCode::F10,
            0x44 => KeyCode::F11,
            0x45 => KeyCode::F12,
            0x49 => KeyCode::Insert,
            0x4A => KeyCode::Home,
            0x4B => KeyCode::PageUp,
            0x4C => KeyCode::Delete,
            0x4D => KeyCode::End,
            0x4E => KeyCode::PageDown,
            0x4F => KeyCode::ArrowRight,
            0x50 => KeyCode::ArrowLeft,
            0x51 => KeyCode::ArrowDown,
            0x52 => KeyCode::ArrowUp,
            0xE0 => KeyCode::ControlLeft,
            0xE1 => KeyCode::ShiftLeft,
            0xE2 => KeyCode::AltLeft,
            0xE3 => KeyCode::MetaLeft,
            0xE4 => KeyCode::ControlRight,
            0xE5 => KeyCode::ShiftRight,
            0xE6 => KeyCode::AltRight,
            0xE7 => KeyCode::MetaRight,
            _ => KeyCode::Unknown,
        }
    }

    /// Returns the raw USB HID Usage ID value for this key code.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns `true` if this is a modifier key.
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            KeyCode::ControlLeft
                | KeyCode::ControlRight
                | KeyCode::ShiftLeft
                | KeyCode::ShiftRight
                | KeyCode::AltLeft
                | KeyCode::AltRight
                | KeyCode::MetaLeft
                | KeyCode::MetaRight
        )
    }
}

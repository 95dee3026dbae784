//! Decoded input events.
//!
//! The decoder turns terminal bytes into these values; nothing here touches
//! I/O. Mouse coordinates are raw screen cells as reported by the terminal;
//! the coordinator rebases them onto the content area.

use crate::types::CellCoord;

bitflags::bitflags! {
    /// Key modifier state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const ALT = 1 << 1;
        const CONTROL = 1 << 2;
    }
}

impl Modifiers {
    /// Decode an xterm modifier parameter: `max(0, m - 1)` gives a bitfield
    /// with Shift at bit 0, Alt at bit 1, Control at bit 2.
    pub fn from_mask(mask: i32) -> Modifiers {
        let mask = (mask - 1).max(0);
        let mut mods = Modifiers::empty();
        if mask & 1 != 0 {
            mods |= Modifiers::SHIFT;
        }
        if mask & 2 != 0 {
            mods |= Modifiers::ALT;
        }
        if mask & 4 != 0 {
            mods |= Modifiers::CONTROL;
        }
        mods
    }
}

/// A key identity, separate from its modifier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Delete,
    Insert,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    /// Function key, 1-based.
    F(u8),
}

/// A key press with its modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub mods: Modifiers,
}

impl KeyEvent {
    pub const fn new(code: KeyCode, mods: Modifiers) -> Self {
        Self { code, mods }
    }

    pub const fn plain(code: KeyCode) -> Self {
        Self::new(code, Modifiers::empty())
    }

    pub const fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c), Modifiers::CONTROL)
    }

    pub fn with_alt(mut self) -> Self {
        self.mods |= Modifiers::ALT;
        self
    }

    /// Map a raw function-key ordinal onto F1-F12, folding the upper range
    /// into shifted keys. Terminals report Shift+F1 as F13 (or F11 on some),
    /// so ordinals above `shift_base` come back as Shift+F(n - shift_base).
    pub fn function(n: u8, shift_base: u8) -> Self {
        if n > shift_base && n <= shift_base + 12 {
            Self::new(KeyCode::F(n - shift_base), Modifiers::SHIFT)
        } else {
            Self::plain(KeyCode::F(n))
        }
    }
}

/// Which physical mouse button. Middle clicks are not reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

/// What the mouse did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Press(MouseButton),
    Release(MouseButton),
    /// Motion, including drag while a button is held.
    Move,
    /// Wheel motion; positive scrolls down by that many lines.
    Scroll(i32),
}

/// A mouse event at a raw screen cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub action: MouseAction,
    pub pos: CellCoord,
    pub mods: Modifiers,
}

/// Anything the input layer can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Key(KeyEvent),
    Mouse(MouseEvent),
    FocusIn,
    FocusOut,
    /// New screen dimensions, synthesized by the coordinator after SIGWINCH.
    Resize(CellCoord),
}

impl From<KeyEvent> for Event {
    fn from(key: KeyEvent) -> Event {
        Event::Key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_mask_decodes_bits() {
        assert_eq!(Modifiers::from_mask(0), Modifiers::empty());
        assert_eq!(Modifiers::from_mask(1), Modifiers::empty());
        assert_eq!(Modifiers::from_mask(2), Modifiers::SHIFT);
        assert_eq!(Modifiers::from_mask(3), Modifiers::ALT);
        assert_eq!(Modifiers::from_mask(5), Modifiers::CONTROL);
        assert_eq!(Modifiers::from_mask(8), Modifiers::all());
    }

    #[test]
    fn function_key_folds_shifted_range() {
        assert_eq!(KeyEvent::function(3, 12), KeyEvent::plain(KeyCode::F(3)));
        assert_eq!(
            KeyEvent::function(15, 12),
            KeyEvent::new(KeyCode::F(3), Modifiers::SHIFT)
        );
        // Beyond the shifted range the ordinal passes through untouched.
        assert_eq!(KeyEvent::function(25, 12), KeyEvent::plain(KeyCode::F(25)));
    }
}

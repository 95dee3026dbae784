//! Escape-sequence decoder.
//!
//! Turns terminal bytes into [`Event`]s:
//!
//! - CSI sequences: optional private-mode byte (`?` `<` `=` `>`), up to 16
//!   `;`-separated decimal parameters, then a selector in `0x40..=0x7e`.
//! - SGR mouse reports (`ESC [ < b ; x ; y M/m`) and the legacy X10 form
//!   (`ESC [ M` plus three bytes biased by 32).
//! - UTF-8 multibyte characters, control characters, Alt via ESC prefix.
//!
//! The decoder is pure over a [`ByteSource`]; its only state is the pressed
//! mouse-button latch used to classify drags and to infer which button a
//! legacy release belongs to. An unparseable CSI degrades to Alt plus the
//! regular decoding of the byte that followed ESC, matching what terminals
//! that predate these sequences would have meant.

use std::io;

use crate::input::events::{
    Event, KeyCode, KeyEvent, Modifiers, MouseAction, MouseButton, MouseEvent,
};
use crate::input::source::ByteSource;
use crate::types::CellCoord;

const PRESSED_LEFT: u8 = 0x1;
const PRESSED_RIGHT: u8 = 0x2;

/// What one decoding step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    Event(Event),
    /// Ctrl-Z: the caller owns process suspension.
    Suspend,
}

impl Decoded {
    fn key(code: KeyCode, mods: Modifiers) -> Decoded {
        Decoded::Event(Event::Key(KeyEvent::new(code, mods)))
    }
}

/// Stateful byte-stream decoder.
#[derive(Debug)]
pub struct Decoder {
    mouse_state: u8,
    wheel_scroll_amount: i32,
}

impl Decoder {
    pub fn new() -> Self {
        Self { mouse_state: 0, wheel_scroll_amount: 3 }
    }

    /// Lines scrolled per wheel tick.
    pub fn set_wheel_scroll_amount(&mut self, amount: i32) {
        self.wheel_scroll_amount = amount;
    }

    /// Decode the next event, or `None` when the source has no input.
    pub fn decode_next(&mut self, src: &mut dyn ByteSource) -> io::Result<Option<Decoded>> {
        let Some(c) = src.try_read()? else {
            return Ok(None);
        };
        if c == 0x1b {
            return self.decode_escape(src).map(Some);
        }
        self.decode_byte(c, src, Modifiers::empty()).map(Some)
    }

    /// After a leading ESC: lone ESC is the Escape key, `[` opens a CSI,
    /// anything else is the Alt-modified form of its plain decoding.
    fn decode_escape(&mut self, src: &mut dyn ByteSource) -> io::Result<Decoded> {
        let Some(next) = src.try_read()? else {
            return Ok(Decoded::key(KeyCode::Escape, Modifiers::empty()));
        };
        if next == b'[' {
            if let Some(decoded) = self.parse_csi(src)? {
                return Ok(decoded);
            }
            return Ok(Decoded::key(KeyCode::Char('['), Modifiers::ALT));
        }
        self.decode_byte(next, src, Modifiers::ALT)
    }

    /// Decode a non-escape byte: control characters, then UTF-8.
    fn decode_byte(
        &mut self,
        c: u8,
        src: &mut dyn ByteSource,
        mods: Modifiers,
    ) -> io::Result<Decoded> {
        match c {
            0x0d | 0x0a => Ok(Decoded::key(KeyCode::Enter, mods)),
            0x09 => Ok(Decoded::key(KeyCode::Tab, mods)),
            0x08 | 0x7f => Ok(Decoded::key(KeyCode::Backspace, mods)),
            0x1a => Ok(Decoded::Suspend),
            c @ 1..=26 => Ok(Decoded::key(
                KeyCode::Char((c - 1 + b'a') as char),
                mods | Modifiers::CONTROL,
            )),
            c => Ok(Decoded::key(KeyCode::Char(self.read_utf8(c, src)?), mods)),
        }
    }

    /// Finish a UTF-8 scalar whose leading byte was already consumed.
    fn read_utf8(&mut self, lead: u8, src: &mut dyn ByteSource) -> io::Result<char> {
        let len = match lead {
            0x00..=0x7f => return Ok(lead as char),
            0xc0..=0xdf => 2,
            0xe0..=0xef => 3,
            0xf0..=0xf7 => 4,
            _ => return Err(invalid_utf8()),
        };
        let mut buf = [lead, 0, 0, 0];
        for slot in buf.iter_mut().take(len).skip(1) {
            let Some(b) = src.try_read()? else {
                return Err(invalid_utf8());
            };
            *slot = b;
        }
        match std::str::from_utf8(&buf[..len]) {
            Ok(s) => Ok(s.chars().next().unwrap_or('\u{fffd}')),
            Err(_) => Err(invalid_utf8()),
        }
    }

    /// Parse the remainder of a CSI sequence; `None` means the input did not
    /// form one we understand and the caller should degrade.
    fn parse_csi(&mut self, src: &mut dyn ByteSource) -> io::Result<Option<Decoded>> {
        // Missing bytes read as 0xff, which fails the selector check below.
        let mut next = |src: &mut dyn ByteSource| -> io::Result<u8> {
            Ok(src.try_read()?.unwrap_or(0xff))
        };

        let mut c = next(src)?;
        let mut private_mode = 0u8;
        if matches!(c, b'?' | b'<' | b'=' | b'>') {
            private_mode = c;
            c = next(src)?;
        }

        let mut params = [0i32; 16];
        let mut count = 0;
        while count < 16 && (0x30..=0x3f).contains(&c) {
            match c {
                b'0'..=b'9' => params[count] = params[count] * 10 + (c - b'0') as i32,
                b';' => count += 1,
                _ => return Ok(None),
            }
            c = next(src)?;
        }
        if !(0x40..=0x7e).contains(&c) {
            return Ok(None);
        }

        match c {
            b'A'..=b'F' => {
                const DIRECTION: [KeyCode; 6] = [
                    KeyCode::Up,
                    KeyCode::Down,
                    KeyCode::Right,
                    KeyCode::Left,
                    KeyCode::Home,
                    KeyCode::End,
                ];
                let mods = Modifiers::from_mask(params[1]);
                Ok(Some(Decoded::key(DIRECTION[(c - b'A') as usize], mods)))
            }
            b'~' if (2..=24).contains(&params[0]) => {
                // Parameter-to-key table with historical gaps.
                const SPECIAL: [Option<KeyCode>; 23] = [
                    Some(KeyCode::Insert),   // 2
                    Some(KeyCode::Delete),   // 3
                    None,                    // 4
                    Some(KeyCode::PageUp),   // 5
                    Some(KeyCode::PageDown), // 6
                    Some(KeyCode::Home),     // 7
                    Some(KeyCode::End),      // 8
                    None,                    // 9
                    None,                    // 10
                    Some(KeyCode::F(1)),     // 11
                    Some(KeyCode::F(2)),     // 12
                    Some(KeyCode::F(3)),     // 13
                    Some(KeyCode::F(4)),     // 14
                    None,                    // 15
                    Some(KeyCode::F(5)),     // 16
                    Some(KeyCode::F(6)),     // 17
                    Some(KeyCode::F(7)),     // 18
                    Some(KeyCode::F(8)),     // 19
                    Some(KeyCode::F(9)),     // 20
                    Some(KeyCode::F(10)),    // 21
                    None,                    // 22
                    Some(KeyCode::F(11)),    // 23
                    Some(KeyCode::F(12)),    // 24
                ];
                let mods = Modifiers::from_mask(params[1]);
                Ok(SPECIAL[(params[0] - 2) as usize].map(|code| Decoded::key(code, mods)))
            }
            b'Z' => Ok(Some(Decoded::key(KeyCode::Tab, Modifiers::SHIFT))),
            b'I' => Ok(Some(Decoded::Event(Event::FocusIn))),
            b'O' => Ok(Some(Decoded::Event(Event::FocusOut))),
            b'M' | b'm' if private_mode == b'<' => {
                let pos = CellCoord::new(params[2] - 1, params[1] - 1);
                let mods = Modifiers::from_mask(1 + ((params[0] >> 2) & 0x7));
                let release = c == b'm';
                let event = match params[0] & 0x43 {
                    0 => self.mouse_button(mods, pos, MouseButton::Left, release),
                    2 => self.mouse_button(mods, pos, MouseButton::Right, release),
                    64 => self.scroll(mods, -self.wheel_scroll_amount, pos),
                    65 => self.scroll(mods, self.wheel_scroll_amount, pos),
                    _ => Event::Mouse(MouseEvent { action: MouseAction::Move, pos, mods }),
                };
                Ok(Some(Decoded::Event(event)))
            }
            b'M' => {
                // X10 encoding: button byte and 1-based coordinates, each +32.
                let b = next(src)? as i32 - 32;
                let x = next(src)? as i32 - 32 - 1;
                let y = next(src)? as i32 - 32 - 1;
                let pos = CellCoord::new(y, x);
                let mods = Modifiers::from_mask(1 + ((b >> 2) & 0x7));
                let event = match b & 0x43 {
                    0 => self.mouse_button(mods, pos, MouseButton::Left, false),
                    2 => self.mouse_button(mods, pos, MouseButton::Right, false),
                    // Releases do not say which button; the latch remembers.
                    3 if self.mouse_state & PRESSED_LEFT != 0 => {
                        self.mouse_button(mods, pos, MouseButton::Left, true)
                    }
                    3 if self.mouse_state & PRESSED_RIGHT != 0 => {
                        self.mouse_button(mods, pos, MouseButton::Right, true)
                    }
                    64 => self.scroll(mods, -self.wheel_scroll_amount, pos),
                    65 => self.scroll(mods, self.wheel_scroll_amount, pos),
                    _ => Event::Mouse(MouseEvent { action: MouseAction::Move, pos, mods }),
                };
                Ok(Some(Decoded::Event(event)))
            }
            _ => Ok(None),
        }
    }

    /// Press/release with the drag latch: a press while the button is
    /// already latched is motion, not a second press.
    fn mouse_button(
        &mut self,
        mods: Modifiers,
        pos: CellCoord,
        button: MouseButton,
        release: bool,
    ) -> Event {
        let mask = match button {
            MouseButton::Left => PRESSED_LEFT,
            MouseButton::Right => PRESSED_RIGHT,
        };
        let action = if release {
            self.mouse_state &= !mask;
            MouseAction::Release(button)
        } else if self.mouse_state & mask != 0 {
            MouseAction::Move
        } else {
            self.mouse_state |= mask;
            MouseAction::Press(button)
        };
        Event::Mouse(MouseEvent { action, pos, mods })
    }

    fn scroll(&self, mods: Modifiers, amount: i32, pos: CellCoord) -> Event {
        Event::Mouse(MouseEvent { action: MouseAction::Scroll(amount), pos, mods })
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid_utf8() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "invalid utf-8 in input")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::source::VecSource;

    fn decode_all(bytes: &[u8]) -> Vec<Decoded> {
        let mut decoder = Decoder::new();
        let mut src = VecSource::new(bytes);
        let mut out = Vec::new();
        while let Some(d) = decoder.decode_next(&mut src).unwrap() {
            out.push(d);
        }
        out
    }

    fn decode_one(bytes: &[u8]) -> Decoded {
        let all = decode_all(bytes);
        assert_eq!(all.len(), 1, "expected a single event from {bytes:?}");
        all[0]
    }

    #[test]
    fn plain_ascii() {
        assert_eq!(decode_one(b"a"), Decoded::key(KeyCode::Char('a'), Modifiers::empty()));
    }

    #[test]
    fn control_characters() {
        assert_eq!(decode_one(b"\x01"), Decoded::key(KeyCode::Char('a'), Modifiers::CONTROL));
        assert_eq!(decode_one(b"\x0d"), Decoded::key(KeyCode::Enter, Modifiers::empty()));
        assert_eq!(decode_one(b"\x09"), Decoded::key(KeyCode::Tab, Modifiers::empty()));
        assert_eq!(decode_one(b"\x7f"), Decoded::key(KeyCode::Backspace, Modifiers::empty()));
        assert_eq!(decode_one(b"\x1a"), Decoded::Suspend);
    }

    #[test]
    fn utf8_two_byte_scalar() {
        assert_eq!(decode_one("é".as_bytes()), Decoded::key(KeyCode::Char('é'), Modifiers::empty()));
    }

    #[test]
    fn utf8_truncated_is_an_error() {
        let mut decoder = Decoder::new();
        let mut src = VecSource::new(&[0xc3]);
        assert!(decoder.decode_next(&mut src).is_err());
    }

    #[test]
    fn lone_escape_is_escape_key() {
        assert_eq!(decode_one(b"\x1b"), Decoded::key(KeyCode::Escape, Modifiers::empty()));
    }

    #[test]
    fn alt_prefixes_plain_keys() {
        assert_eq!(decode_one(b"\x1bx"), Decoded::key(KeyCode::Char('x'), Modifiers::ALT));
        assert_eq!(
            decode_one(b"\x1b\x01"),
            Decoded::key(KeyCode::Char('a'), Modifiers::ALT | Modifiers::CONTROL)
        );
    }

    #[test]
    fn csi_arrows_and_modifier_masks() {
        assert_eq!(decode_one(b"\x1b[A"), Decoded::key(KeyCode::Up, Modifiers::empty()));
        assert_eq!(decode_one(b"\x1b[1;2A"), Decoded::key(KeyCode::Up, Modifiers::SHIFT));
        assert_eq!(
            decode_one(b"\x1b[1;6C"),
            Decoded::key(KeyCode::Right, Modifiers::SHIFT | Modifiers::CONTROL)
        );
        assert_eq!(decode_one(b"\x1b[F"), Decoded::key(KeyCode::End, Modifiers::empty()));
    }

    #[test]
    fn csi_tilde_table() {
        assert_eq!(decode_one(b"\x1b[2~"), Decoded::key(KeyCode::Insert, Modifiers::empty()));
        assert_eq!(decode_one(b"\x1b[3~"), Decoded::key(KeyCode::Delete, Modifiers::empty()));
        assert_eq!(decode_one(b"\x1b[5~"), Decoded::key(KeyCode::PageUp, Modifiers::empty()));
        assert_eq!(decode_one(b"\x1b[11~"), Decoded::key(KeyCode::F(1), Modifiers::empty()));
        assert_eq!(decode_one(b"\x1b[16~"), Decoded::key(KeyCode::F(5), Modifiers::empty()));
        assert_eq!(decode_one(b"\x1b[24~"), Decoded::key(KeyCode::F(12), Modifiers::empty()));
        assert_eq!(decode_one(b"\x1b[3;5~"), Decoded::key(KeyCode::Delete, Modifiers::CONTROL));
    }

    #[test]
    fn csi_tilde_gaps_do_not_produce_keys() {
        // 4, 9, 10, 15 and 22 have no key assigned.
        assert_eq!(decode_one(b"\x1b[4~"), Decoded::key(KeyCode::Char('['), Modifiers::ALT));
        assert_eq!(decode_one(b"\x1b[22~"), Decoded::key(KeyCode::Char('['), Modifiers::ALT));
    }

    #[test]
    fn csi_shift_tab_and_focus() {
        assert_eq!(decode_one(b"\x1b[Z"), Decoded::key(KeyCode::Tab, Modifiers::SHIFT));
        assert_eq!(decode_one(b"\x1b[I"), Decoded::Event(Event::FocusIn));
        assert_eq!(decode_one(b"\x1b[O"), Decoded::Event(Event::FocusOut));
    }

    #[test]
    fn unparseable_csi_degrades_to_alt_bracket() {
        assert_eq!(decode_one(b"\x1b[:"), Decoded::key(KeyCode::Char('['), Modifiers::ALT));
    }

    #[test]
    fn sgr_mouse_press_and_release() {
        let events = decode_all(b"\x1b[<0;5;3M\x1b[<0;6;3m");
        assert_eq!(
            events[0],
            Decoded::Event(Event::Mouse(MouseEvent {
                action: MouseAction::Press(MouseButton::Left),
                pos: CellCoord::new(2, 4),
                mods: Modifiers::empty(),
            }))
        );
        assert_eq!(
            events[1],
            Decoded::Event(Event::Mouse(MouseEvent {
                action: MouseAction::Release(MouseButton::Left),
                pos: CellCoord::new(2, 5),
                mods: Modifiers::empty(),
            }))
        );
    }

    #[test]
    fn sgr_press_while_latched_is_a_drag() {
        let events = decode_all(b"\x1b[<0;2;2M\x1b[<0;3;2M\x1b[<0;3;2m");
        let actions: Vec<_> = events
            .iter()
            .map(|d| match d {
                Decoded::Event(Event::Mouse(m)) => m.action,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            actions,
            vec![
                MouseAction::Press(MouseButton::Left),
                MouseAction::Move,
                MouseAction::Release(MouseButton::Left),
            ]
        );
    }

    #[test]
    fn sgr_wheel_scrolls_by_configured_amount() {
        let mut decoder = Decoder::new();
        decoder.set_wheel_scroll_amount(5);
        let mut src = VecSource::new(b"\x1b[<64;1;1M\x1b[<65;1;1M");
        let up = decoder.decode_next(&mut src).unwrap().unwrap();
        let down = decoder.decode_next(&mut src).unwrap().unwrap();
        let amount = |d: Decoded| match d {
            Decoded::Event(Event::Mouse(MouseEvent { action: MouseAction::Scroll(n), .. })) => n,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(amount(up), -5);
        assert_eq!(amount(down), 5);
    }

    #[test]
    fn sgr_mouse_modifier_bits() {
        // Button 16 = control held on a left press.
        let event = decode_one(b"\x1b[<16;1;1M");
        assert_eq!(
            event,
            Decoded::Event(Event::Mouse(MouseEvent {
                action: MouseAction::Press(MouseButton::Left),
                pos: CellCoord::new(0, 0),
                mods: Modifiers::CONTROL,
            }))
        );
    }

    #[test]
    fn legacy_mouse_release_uses_the_latch() {
        // Press right (byte 32+2), then the anonymous release (32+3).
        let events = decode_all(b"\x1b[M\x22\x25\x24\x1b[M\x23\x25\x24");
        assert_eq!(
            events[0],
            Decoded::Event(Event::Mouse(MouseEvent {
                action: MouseAction::Press(MouseButton::Right),
                pos: CellCoord::new(3, 4),
                mods: Modifiers::empty(),
            }))
        );
        assert_eq!(
            events[1],
            Decoded::Event(Event::Mouse(MouseEvent {
                action: MouseAction::Release(MouseButton::Right),
                pos: CellCoord::new(3, 4),
                mods: Modifiers::empty(),
            }))
        );
    }

    #[test]
    fn legacy_release_with_nothing_latched_is_motion() {
        let event = decode_one(b"\x1b[M\x23\x25\x24");
        assert_eq!(
            event,
            Decoded::Event(Event::Mouse(MouseEvent {
                action: MouseAction::Move,
                pos: CellCoord::new(3, 4),
                mods: Modifiers::empty(),
            }))
        );
    }
}

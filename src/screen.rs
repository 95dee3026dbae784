//! Physical terminal output.
//!
//! Three concerns live here:
//! - [`OutputBuffer`]: accumulates escape sequences and text so each frame
//!   reaches the terminal in one write.
//! - [`ScreenWriter`]: pushes cells while tracking the active pair and
//!   attributes, emitting only the SGR toggles that actually differ.
//! - Terminal mode control: raw mode, alternate screen, mouse/focus
//!   reporting, window title, palette reset, and the window-size query.

use std::fmt::{self, Write as _};
use std::io::{self, Write};

use crate::palette::PairColors;
use crate::types::{Attr, CellCoord};

// =============================================================================
// OutputBuffer
// =============================================================================

/// Accumulates terminal output for batched writing.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    data: Vec<u8>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self { data: Vec::with_capacity(16 * 1024) }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
    }

    #[inline]
    pub fn push_str(&mut self, s: &str) {
        self.data.extend_from_slice(s.as_bytes());
    }

    #[inline]
    pub fn push_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.data.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Write everything to stdout in one syscall and clear the buffer.
    pub fn flush_stdout(&mut self) -> io::Result<()> {
        if self.data.is_empty() {
            return Ok(());
        }
        let mut stdout = io::stdout().lock();
        stdout.write_all(&self.data)?;
        stdout.flush()?;
        self.data.clear();
        Ok(())
    }
}

impl fmt::Write for OutputBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

// =============================================================================
// Escape emission
// =============================================================================

/// Move the cursor to a 0-based grid position.
#[inline]
pub fn cursor_to(out: &mut OutputBuffer, pos: CellCoord) {
    let _ = write!(out, "\x1b[{};{}H", pos.line + 1, pos.col + 1);
}

pub fn cursor_show(out: &mut OutputBuffer) {
    out.push_str("\x1b[?25h");
}

pub fn cursor_hide(out: &mut OutputBuffer) {
    out.push_str("\x1b[?25l");
}

pub fn enter_alt_screen(out: &mut OutputBuffer) {
    out.push_str("\x1b[?1049h");
}

pub fn exit_alt_screen(out: &mut OutputBuffer) {
    out.push_str("\x1b[?1049l");
}

pub fn clear_screen(out: &mut OutputBuffer) {
    out.push_str("\x1b[2J");
}

/// Enable or disable mouse and focus reporting.
///
/// `sgr` additionally requests the SGR coordinate protocol; without it the
/// terminal reports through the legacy byte-biased protocol.
pub fn set_mouse_reporting(out: &mut OutputBuffer, enabled: bool, sgr: bool) {
    if enabled {
        if sgr {
            out.push_str("\x1b[?1006h");
        }
        out.push_str("\x1b[?1004h");
        out.push_str("\x1b[?1000h");
        out.push_str("\x1b[?1002h");
    } else {
        out.push_str("\x1b[?1002l");
        out.push_str("\x1b[?1000l");
        out.push_str("\x1b[?1004l");
        out.push_str("\x1b[?1006l");
    }
}

/// Set the terminal title, dropping non-ASCII-printable characters.
pub fn set_title(out: &mut OutputBuffer, title: &str) {
    out.push_str("\x1b]2;");
    for b in title.bytes() {
        out.push_char(if (0x20..=0x7e).contains(&b) { b as char } else { '?' });
    }
    out.push_str("\x07");
}

/// Ask the terminal to restore its default palette.
pub fn reset_palette(out: &mut OutputBuffer) {
    out.push_str("\x1b]104\x07");
}

/// Program palette slot `index` to an RGB value.
pub fn program_color(out: &mut OutputBuffer, index: i32, r: u8, g: u8, b: u8) {
    let _ = write!(out, "\x1b]4;{};rgb:{:02x}/{:02x}/{:02x}\x07", index, r, g, b);
}

// =============================================================================
// ScreenWriter
// =============================================================================

/// Pushes cells to the output while remembering the active style.
///
/// Only the attributes and colors differing from the remembered style are
/// emitted. [`ScreenWriter::reset`] marks the remembered style inactive,
/// forcing the next cell to repush everything.
#[derive(Debug)]
pub struct ScreenWriter {
    last_line: i32,
    last_col: i32,
    pair: Option<i32>,
    attrs: Option<Attr>,
}

impl ScreenWriter {
    pub fn new() -> Self {
        Self { last_line: -1, last_col: -1, pair: None, attrs: None }
    }

    /// Forget the active style and cursor position.
    pub fn reset(&mut self) {
        self.last_line = -1;
        self.last_col = -1;
        self.pair = None;
        self.attrs = None;
    }

    /// Emit one cell at an absolute position. `width` is the glyph's column
    /// count; continuation cells (width 0) only advance tracking.
    pub fn put_cell(
        &mut self,
        out: &mut OutputBuffer,
        pos: CellCoord,
        ch: char,
        width: u8,
        pair: i32,
        colors: PairColors,
        attrs: Attr,
    ) {
        if width == 0 {
            return;
        }

        if pos.line != self.last_line || pos.col != self.last_col {
            cursor_to(out, pos);
        }

        self.set_style(out, pair, colors, attrs);

        out.push_char(ch);
        self.last_line = pos.line;
        self.last_col = pos.col + width as i32;
    }

    fn set_style(&mut self, out: &mut OutputBuffer, pair: i32, colors: PairColors, attrs: Attr) {
        let attrs = attrs & Attr::TERMINAL;

        if self.pair != Some(pair) {
            if colors.fg >= 0 {
                let _ = write!(out, "\x1b[38;5;{}m", colors.fg);
            } else {
                out.push_str("\x1b[39m");
            }
            if colors.bg >= 0 {
                let _ = write!(out, "\x1b[48;5;{}m", colors.bg);
            } else {
                out.push_str("\x1b[49m");
            }
            self.pair = Some(pair);
        }

        let active = match self.attrs {
            Some(a) => a,
            None => {
                // Unknown active state: clear everything first.
                out.push_str("\x1b[22;23;24;25;27m");
                Attr::empty()
            }
        };

        if active != attrs {
            let changed = active ^ attrs;
            // Bold and dim share the reset code 22; turning either off
            // clears both, so the survivor must be re-enabled.
            if changed.intersects(Attr::BOLD | Attr::DIM)
                && (active & (Attr::BOLD | Attr::DIM)) != Attr::empty()
                && !(attrs.contains(active & (Attr::BOLD | Attr::DIM)))
            {
                out.push_str("\x1b[22m");
                if attrs.contains(Attr::BOLD) {
                    out.push_str("\x1b[1m");
                }
                if attrs.contains(Attr::DIM) {
                    out.push_str("\x1b[2m");
                }
            } else {
                if changed.contains(Attr::BOLD) {
                    out.push_str(if attrs.contains(Attr::BOLD) { "\x1b[1m" } else { "\x1b[22m" });
                }
                if changed.contains(Attr::DIM) {
                    out.push_str(if attrs.contains(Attr::DIM) { "\x1b[2m" } else { "\x1b[22m" });
                }
            }
            if changed.contains(Attr::ITALIC) {
                out.push_str(if attrs.contains(Attr::ITALIC) { "\x1b[3m" } else { "\x1b[23m" });
            }
            if changed.contains(Attr::UNDERLINE) {
                out.push_str(if attrs.contains(Attr::UNDERLINE) { "\x1b[4m" } else { "\x1b[24m" });
            }
            if changed.contains(Attr::BLINK) {
                out.push_str(if attrs.contains(Attr::BLINK) { "\x1b[5m" } else { "\x1b[25m" });
            }
            if changed.contains(Attr::REVERSE) {
                out.push_str(if attrs.contains(Attr::REVERSE) { "\x1b[7m" } else { "\x1b[27m" });
            }
        }
        self.attrs = Some(attrs);
    }
}

impl Default for ScreenWriter {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Terminal modes and geometry (unix)
// =============================================================================

/// Raw-mode guard: saves the termios state on entry, restores it on exit
/// (and on drop, so panics do not leave the terminal raw).
#[cfg(unix)]
#[derive(Debug)]
pub struct RawMode {
    saved: Option<libc::termios>,
}

#[cfg(unix)]
impl RawMode {
    pub fn enter() -> io::Result<Self> {
        let fd = libc::STDIN_FILENO;
        if unsafe { libc::isatty(fd) } == 0 {
            // Not a terminal (piped input, tests): nothing to configure.
            return Ok(Self { saved: None });
        }
        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(fd, &mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }
            let saved = termios;
            termios.c_iflag &= !(libc::BRKINT
                | libc::PARMRK
                | libc::ISTRIP
                | libc::INLCR
                | libc::IGNCR
                | libc::ICRNL
                | libc::IXON);
            termios.c_oflag &= !libc::OPOST;
            termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
            termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
            termios.c_cflag |= libc::CS8;
            termios.c_cc[libc::VMIN] = 1;
            termios.c_cc[libc::VTIME] = 0;
            if libc::tcsetattr(fd, libc::TCSAFLUSH, &termios) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(Self { saved: Some(saved) })
        }
    }

    /// Restore the saved state. Idempotent.
    pub fn exit(&mut self) -> io::Result<()> {
        if let Some(saved) = self.saved.take() {
            let rc = unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, &saved) };
            if rc != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    /// Re-enter raw mode after a suspend, reusing the saved state.
    pub fn reenter(&mut self) -> io::Result<()> {
        if self.saved.is_none() {
            *self = Self::enter()?;
        }
        Ok(())
    }
}

#[cfg(unix)]
impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = self.exit();
    }
}

/// Scoped descriptor: closed on every exit path.
#[cfg(unix)]
struct TtyFd(libc::c_int);

#[cfg(unix)]
impl TtyFd {
    fn open() -> io::Result<Self> {
        let fd = unsafe { libc::open(c"/dev/tty".as_ptr(), libc::O_RDWR) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self(fd))
    }
}

#[cfg(unix)]
impl Drop for TtyFd {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.0);
        }
    }
}

/// Query the controlling terminal's size as (lines, columns).
#[cfg(unix)]
pub fn winsize() -> io::Result<CellCoord> {
    let tty = TtyFd::open()?;
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::ioctl(tty.0, libc::TIOCGWINSZ, &mut ws) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(CellCoord::new(ws.ws_row as i32, ws.ws_col as i32))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(
        writer: &mut ScreenWriter,
        out: &mut OutputBuffer,
        pos: CellCoord,
        ch: char,
        pair: i32,
        attrs: Attr,
    ) {
        writer.put_cell(out, pos, ch, 1, pair, PairColors { fg: 7, bg: -1 }, attrs);
    }

    #[test]
    fn sequential_cells_skip_cursor_moves() {
        let mut writer = ScreenWriter::new();
        let mut out = OutputBuffer::new();
        cell(&mut writer, &mut out, CellCoord::new(0, 0), 'a', 1, Attr::empty());
        let first = out.as_bytes().len();
        out.clear();
        cell(&mut writer, &mut out, CellCoord::new(0, 1), 'b', 1, Attr::empty());
        assert!(out.as_bytes().len() < first);
        assert_eq!(out.as_bytes(), b"b");
    }

    #[test]
    fn attribute_toggles_are_minimal() {
        let mut writer = ScreenWriter::new();
        let mut out = OutputBuffer::new();
        cell(&mut writer, &mut out, CellCoord::new(0, 0), 'a', 1, Attr::BOLD);
        out.clear();
        cell(&mut writer, &mut out, CellCoord::new(0, 1), 'b', 1, Attr::BOLD | Attr::UNDERLINE);
        let s = String::from_utf8_lossy(out.as_bytes()).into_owned();
        assert!(s.contains("\x1b[4m"), "underline enabled: {s:?}");
        assert!(!s.contains("\x1b[1m"), "bold not re-emitted: {s:?}");
    }

    #[test]
    fn bold_off_preserves_dim() {
        let mut writer = ScreenWriter::new();
        let mut out = OutputBuffer::new();
        cell(&mut writer, &mut out, CellCoord::new(0, 0), 'a', 1, Attr::BOLD | Attr::DIM);
        out.clear();
        cell(&mut writer, &mut out, CellCoord::new(0, 1), 'b', 1, Attr::DIM);
        let s = String::from_utf8_lossy(out.as_bytes()).into_owned();
        assert!(s.contains("\x1b[22m"));
        assert!(s.contains("\x1b[2m"), "dim restored after shared reset: {s:?}");
    }

    #[test]
    fn reset_forces_full_repush() {
        let mut writer = ScreenWriter::new();
        let mut out = OutputBuffer::new();
        cell(&mut writer, &mut out, CellCoord::new(0, 0), 'a', 1, Attr::empty());
        writer.reset();
        out.clear();
        cell(&mut writer, &mut out, CellCoord::new(0, 1), 'a', 1, Attr::empty());
        let s = String::from_utf8_lossy(out.as_bytes()).into_owned();
        assert!(s.contains("\x1b[1;2H"), "cursor re-addressed: {s:?}");
        assert!(s.contains("38;5;7"), "colors re-emitted: {s:?}");
    }

    #[test]
    fn title_drops_non_ascii() {
        let mut out = OutputBuffer::new();
        set_title(&mut out, "ab\u{263a}c");
        let s = String::from_utf8_lossy(out.as_bytes()).into_owned();
        assert!(s.starts_with("\x1b]2;ab"));
        assert!(s.ends_with("c\x07"));
        assert!(s.contains('?'));
    }

    #[test]
    fn mouse_reporting_sequences() {
        let mut out = OutputBuffer::new();
        set_mouse_reporting(&mut out, true, true);
        let s = String::from_utf8_lossy(out.as_bytes()).into_owned();
        for seq in ["\x1b[?1006h", "\x1b[?1004h", "\x1b[?1000h", "\x1b[?1002h"] {
            assert!(s.contains(seq));
        }
        out.clear();
        set_mouse_reporting(&mut out, true, false);
        let s = String::from_utf8_lossy(out.as_bytes()).into_owned();
        assert!(!s.contains("\x1b[?1006h"));
    }
}

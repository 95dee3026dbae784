//! Surface: an addressable rectangular paint buffer.
//!
//! A Surface owns a row-major grid of cells plus a write cursor. Content is
//! painted with [`Surface::write_text`] and later pushed onto the physical
//! screen with [`Surface::compose`]; flushing is batched by the coordinator.
//! Wide glyphs occupy a lead cell plus a zero-width continuation cell.

use unicode_width::UnicodeWidthChar;

use crate::palette::Palette;
use crate::screen::{OutputBuffer, ScreenWriter};
use crate::types::{Attr, CellCoord};

/// A resolved style: palette pair id plus attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellStyle {
    pub pair: i32,
    pub attrs: Attr,
}

impl CellStyle {
    /// Pair 0, no attributes: "no override".
    pub const DEFAULT: CellStyle = CellStyle { pair: 0, attrs: Attr::empty() };
}

/// One grid cell. `width == 0` marks the continuation of a wide glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub width: u8,
    pub style: CellStyle,
}

impl Cell {
    fn blank(style: CellStyle) -> Self {
        Self { ch: ' ', width: 1, style }
    }
}

/// A rectangular paint buffer positioned on the screen.
#[derive(Debug)]
pub struct Surface {
    pos: CellCoord,
    size: CellCoord,
    cells: Vec<Cell>,
    cursor: CellCoord,
    background: CellStyle,
}

impl Surface {
    /// An invalid (zero-sized) surface.
    pub fn new() -> Self {
        Self {
            pos: CellCoord::default(),
            size: CellCoord::default(),
            cells: Vec::new(),
            cursor: CellCoord::default(),
            background: CellStyle::DEFAULT,
        }
    }

    /// Allocate the buffer. Any previous content is discarded; a resize is
    /// always destroy + create.
    pub fn create(&mut self, pos: CellCoord, size: CellCoord) {
        debug_assert!(size.line >= 0 && size.col >= 0, "surface sizes are never negative");
        self.pos = pos;
        self.size = size;
        self.cursor = CellCoord::default();
        self.cells = vec![Cell::blank(self.background); (size.line * size.col).max(0) as usize];
    }

    /// Release the buffer and clear position and size.
    pub fn destroy(&mut self) {
        self.pos = CellCoord::default();
        self.size = CellCoord::default();
        self.cursor = CellCoord::default();
        self.cells = Vec::new();
    }

    /// A surface is valid iff it has a non-empty extent.
    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.size.is_empty()
    }

    #[inline]
    pub fn pos(&self) -> CellCoord {
        self.pos
    }

    #[inline]
    pub fn size(&self) -> CellCoord {
        self.size
    }

    /// Rectangle covered by this surface, in screen coordinates.
    pub fn rect(&self) -> crate::types::Rect {
        crate::types::Rect::new(self.pos, self.size)
    }

    /// Position the write head. The caller guarantees in-bounds coordinates.
    pub fn move_cursor(&mut self, coord: CellCoord) {
        debug_assert!(
            coord.line >= 0 && coord.col >= 0 && coord.line < self.size.line.max(1),
            "cursor out of bounds"
        );
        self.cursor = coord;
    }

    /// Fill style for cells blanked after this call.
    pub fn set_background(&mut self, style: CellStyle) {
        self.background = style;
    }

    /// Paint styled text at the cursor.
    ///
    /// A trailing newline that still fits the remaining width renders as one
    /// blank cell (pad to end of run). Content wider than the remaining
    /// column budget is clipped at a glyph boundary, never wrapped; a wide
    /// glyph whose second column does not fit is dropped entirely.
    pub fn write_text(&mut self, text: &str, style: CellStyle) {
        if !self.is_valid() || self.cursor.line >= self.size.line {
            return;
        }

        let remaining = self.size.col - self.cursor.col;
        let (body, pad) = match text.strip_suffix('\n') {
            Some(body) if text_width(body) < remaining => (body, true),
            Some(body) => (body, false),
            None => (text, false),
        };

        for ch in body.chars() {
            let Some(w) = ch.width() else { continue };
            if w == 0 {
                continue;
            }
            if self.cursor.col + w as i32 > self.size.col {
                return;
            }
            self.put(ch, w as u8, style);
        }
        if pad && self.cursor.col < self.size.col {
            self.put(' ', 1, style);
        }
    }

    /// Blank from the cursor to the end of the line with the background style.
    pub fn clear_to_end_of_line(&mut self) {
        if !self.is_valid() || self.cursor.line >= self.size.line {
            return;
        }
        let row = self.cursor.line * self.size.col;
        for col in self.cursor.col..self.size.col {
            self.cells[(row + col) as usize] = Cell::blank(self.background);
        }
    }

    fn put(&mut self, ch: char, width: u8, style: CellStyle) {
        let idx = (self.cursor.line * self.size.col + self.cursor.col) as usize;
        self.cells[idx] = Cell { ch, width, style };
        if width == 2 && self.cursor.col + 1 < self.size.col {
            self.cells[idx + 1] = Cell { ch: ' ', width: 0, style };
        }
        self.cursor.col += width as i32;
    }

    /// Cell lookup, mainly for tests and composition.
    pub fn cell(&self, line: i32, col: i32) -> Option<&Cell> {
        if line < 0 || col < 0 || line >= self.size.line || col >= self.size.col {
            return None;
        }
        self.cells.get((line * self.size.col + col) as usize)
    }

    /// Schedule the buffer onto the physical screen. Nothing is flushed
    /// here; the coordinator flushes once per frame. `force` invalidates the
    /// writer's remembered style so every cell is repushed.
    pub fn compose(
        &self,
        writer: &mut ScreenWriter,
        palette: &Palette,
        out: &mut OutputBuffer,
        force: bool,
    ) {
        if !self.is_valid() {
            return;
        }
        if force {
            writer.reset();
        }
        for line in 0..self.size.line {
            for col in 0..self.size.col {
                let cell = self.cells[(line * self.size.col + col) as usize];
                writer.put_cell(
                    out,
                    self.pos + CellCoord::new(line, col),
                    cell.ch,
                    cell.width,
                    cell.style.pair,
                    palette.pair_colors(cell.style.pair),
                    cell.style.attrs,
                );
            }
        }
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::new()
    }
}

fn text_width(s: &str) -> i32 {
    unicode_width::UnicodeWidthStr::width(s) as i32
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn style(pair: i32) -> CellStyle {
        CellStyle { pair, attrs: Attr::empty() }
    }

    #[test]
    fn create_then_destroy_invalidates() {
        let mut s = Surface::new();
        assert!(!s.is_valid());
        s.create(CellCoord::new(1, 2), CellCoord::new(3, 4));
        assert!(s.is_valid());
        s.destroy();
        assert!(!s.is_valid());
        assert_eq!(s.pos(), CellCoord::default());
        assert_eq!(s.size(), CellCoord::default());
    }

    #[test]
    fn trailing_newline_renders_one_blank_cell() {
        let mut s = Surface::new();
        s.create(CellCoord::default(), CellCoord::new(1, 10));
        s.write_text("ab\n", style(3));
        assert_eq!(s.cell(0, 0).unwrap().ch, 'a');
        assert_eq!(s.cell(0, 1).unwrap().ch, 'b');
        // The newline became a styled blank, not a break.
        let pad = s.cell(0, 2).unwrap();
        assert_eq!(pad.ch, ' ');
        assert_eq!(pad.style.pair, 3);
        assert_eq!(s.cell(0, 3).unwrap().style.pair, 0);
    }

    #[test]
    fn overflow_clips_at_column_boundary() {
        let mut s = Surface::new();
        s.create(CellCoord::default(), CellCoord::new(1, 3));
        s.write_text("abcdef", style(1));
        assert_eq!(s.cell(0, 2).unwrap().ch, 'c');
        // Nothing wrapped to a second line (there is none), cursor clamped.
        s.move_cursor(CellCoord::new(0, 0));
    }

    #[test]
    fn wide_glyph_is_never_split() {
        let mut s = Surface::new();
        s.create(CellCoord::default(), CellCoord::new(1, 3));
        s.write_text("a你x", style(1));
        assert_eq!(s.cell(0, 0).unwrap().ch, 'a');
        assert_eq!(s.cell(0, 1).unwrap().ch, '你');
        assert_eq!(s.cell(0, 2).unwrap().width, 0, "continuation cell");
    }

    #[test]
    fn wide_glyph_not_fitting_is_dropped() {
        let mut s = Surface::new();
        s.create(CellCoord::default(), CellCoord::new(1, 2));
        s.write_text("a你", style(1));
        assert_eq!(s.cell(0, 1).unwrap().ch, ' ', "second column stays blank");
    }

    #[test]
    fn clear_to_end_of_line_uses_background() {
        let mut s = Surface::new();
        s.create(CellCoord::default(), CellCoord::new(1, 4));
        s.write_text("abcd", style(1));
        s.set_background(style(9));
        s.move_cursor(CellCoord::new(0, 2));
        s.clear_to_end_of_line();
        assert_eq!(s.cell(0, 1).unwrap().style.pair, 1);
        assert_eq!(s.cell(0, 2).unwrap().style.pair, 9);
        assert_eq!(s.cell(0, 3).unwrap().ch, ' ');
    }

    #[test]
    fn compose_emits_at_absolute_position() {
        use crate::palette::TermCaps;

        let mut s = Surface::new();
        s.create(CellCoord::new(2, 3), CellCoord::new(1, 2));
        s.write_text("hi", CellStyle::DEFAULT);

        let palette = Palette::new(TermCaps::default());
        let mut writer = ScreenWriter::new();
        let mut out = OutputBuffer::new();
        s.compose(&mut writer, &palette, &mut out, false);
        let text = String::from_utf8_lossy(out.as_bytes()).into_owned();
        assert!(text.contains("\x1b[3;4H"), "row 2 col 3 is 1-based 3;4: {text:?}");
        assert!(text.contains("hi"));
    }
}

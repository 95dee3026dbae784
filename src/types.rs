//! Core types shared across the crate.
//!
//! Geometry is signed: popup placement math routinely goes negative before
//! clamping, so coordinates are `i32` cells rather than `u16`.

use std::ops::{Add, AddAssign, Sub};

use unicode_width::UnicodeWidthStr;

// =============================================================================
// Geometry
// =============================================================================

/// A position or extent on the character grid, in (line, column) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellCoord {
    pub line: i32,
    pub col: i32,
}

impl CellCoord {
    pub const fn new(line: i32, col: i32) -> Self {
        Self { line, col }
    }

    /// True when either extent is zero or negative.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.line <= 0 || self.col <= 0
    }
}

impl Add for CellCoord {
    type Output = CellCoord;
    fn add(self, rhs: CellCoord) -> CellCoord {
        CellCoord::new(self.line + rhs.line, self.col + rhs.col)
    }
}

impl AddAssign for CellCoord {
    fn add_assign(&mut self, rhs: CellCoord) {
        self.line += rhs.line;
        self.col += rhs.col;
    }
}

impl Sub for CellCoord {
    type Output = CellCoord;
    fn sub(self, rhs: CellCoord) -> CellCoord {
        CellCoord::new(self.line - rhs.line, self.col - rhs.col)
    }
}

/// A rectangle on the grid: origin plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub pos: CellCoord,
    pub size: CellCoord,
}

impl Rect {
    pub const fn new(pos: CellCoord, size: CellCoord) -> Self {
        Self { pos, size }
    }

    /// One past the bottom-right corner.
    #[inline]
    pub fn end(&self) -> CellCoord {
        self.pos + self.size
    }
}

/// Round-up integer division for positive operands.
#[inline]
pub fn div_round_up(a: i32, b: i32) -> i32 {
    (a - 1) / b + 1
}

// =============================================================================
// Color and Face
// =============================================================================

/// An abstract color: terminal default, one of the 16 named indices, or RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Default,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BrightBlack,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
    Rgb { r: u8, g: u8, b: u8 },
}

bitflags::bitflags! {
    /// Text attributes, stored as a bitfield so style diffs are one XOR.
    ///
    /// `FINAL` is not a terminal attribute: it marks a face whose attributes
    /// stand alone when merged with a fallback face (see [`Face::merged`]).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attr: u8 {
        const UNDERLINE = 1 << 0;
        const REVERSE = 1 << 1;
        const BLINK = 1 << 2;
        const BOLD = 1 << 3;
        const DIM = 1 << 4;
        const ITALIC = 1 << 5;
        const FINAL = 1 << 6;
    }
}

impl Attr {
    /// The attributes that map to terminal SGR codes.
    pub const TERMINAL: Attr = Attr::UNDERLINE
        .union(Attr::REVERSE)
        .union(Attr::BLINK)
        .union(Attr::BOLD)
        .union(Attr::DIM)
        .union(Attr::ITALIC);
}

/// A foreground/background color pair plus attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Face {
    pub fg: Color,
    pub bg: Color,
    pub attrs: Attr,
}

impl Default for Face {
    fn default() -> Self {
        Self {
            fg: Color::Default,
            bg: Color::Default,
            attrs: Attr::empty(),
        }
    }
}

impl Face {
    pub const fn new(fg: Color, bg: Color, attrs: Attr) -> Self {
        Self { fg, bg, attrs }
    }

    /// Merge this face over a fallback face.
    ///
    /// Colors equal to `Color::Default` take the fallback's color.
    /// Attributes are the union of both faces, unless this face carries
    /// `Attr::FINAL`, in which case its attributes stand alone.
    pub fn merged(self, fallback: Face) -> Face {
        let attrs = if self.attrs.contains(Attr::FINAL) {
            self.attrs
        } else {
            self.attrs | fallback.attrs
        };
        Face {
            fg: if self.fg == Color::Default { fallback.fg } else { self.fg },
            bg: if self.bg == Color::Default { fallback.bg } else { self.bg },
            attrs,
        }
    }
}

// =============================================================================
// Display model (consumed, not constructed here)
// =============================================================================

/// A run of text painted with a single face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledRun {
    pub text: String,
    pub face: Face,
}

impl StyledRun {
    pub fn new(text: impl Into<String>, face: Face) -> Self {
        Self { text: text.into(), face }
    }

    /// Column width of the run's content.
    pub fn width(&self) -> i32 {
        UnicodeWidthStr::width(self.text.as_str()) as i32
    }
}

/// One display line: an ordered sequence of styled runs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyledLine {
    pub runs: Vec<StyledRun>,
}

impl StyledLine {
    pub fn new(runs: Vec<StyledRun>) -> Self {
        Self { runs }
    }

    /// A single-run line with the given face.
    pub fn plain(text: impl Into<String>, face: Face) -> Self {
        Self { runs: vec![StyledRun::new(text, face)] }
    }

    /// Total column width across runs.
    pub fn width(&self) -> i32 {
        self.runs.iter().map(StyledRun::width).sum()
    }

    /// A copy clipped to at most `max_width` columns, cutting the last run
    /// at a glyph boundary.
    pub fn clipped(&self, max_width: i32) -> StyledLine {
        use unicode_segmentation::UnicodeSegmentation;

        let mut out = Vec::new();
        let mut budget = max_width;
        for run in &self.runs {
            if budget <= 0 {
                break;
            }
            let w = run.width();
            if w <= budget {
                out.push(run.clone());
                budget -= w;
                continue;
            }
            let mut text = String::new();
            for g in run.text.graphemes(true) {
                let gw = UnicodeWidthStr::width(g) as i32;
                if gw > budget {
                    break;
                }
                text.push_str(g);
                budget -= gw;
            }
            if !text.is_empty() {
                out.push(StyledRun::new(text, run.face));
            }
            break;
        }
        StyledLine { runs: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_colors_fall_back_on_default() {
        let base = Face::new(Color::White, Color::Blue, Attr::BOLD);
        let over = Face::new(Color::Default, Color::Red, Attr::empty());
        let merged = over.merged(base);
        assert_eq!(merged.fg, Color::White);
        assert_eq!(merged.bg, Color::Red);
    }

    #[test]
    fn merged_attrs_union_by_default() {
        let base = Face::new(Color::Default, Color::Default, Attr::BOLD);
        let over = Face::new(Color::Default, Color::Default, Attr::UNDERLINE);
        assert_eq!(over.merged(base).attrs, Attr::BOLD | Attr::UNDERLINE);
    }

    #[test]
    fn merged_attrs_final_stands_alone() {
        let base = Face::new(Color::Default, Color::Default, Attr::BOLD);
        let over = Face::new(Color::Default, Color::Default, Attr::UNDERLINE | Attr::FINAL);
        assert_eq!(over.merged(base).attrs, Attr::UNDERLINE | Attr::FINAL);
    }

    #[test]
    fn styled_line_clip_respects_wide_glyphs() {
        let line = StyledLine::plain("a你b", Face::default());
        // "a" (1) + "你" (2) = 3 columns; budget 2 cannot split the wide glyph.
        let clipped = line.clipped(2);
        assert_eq!(clipped.runs[0].text, "a");
    }

    #[test]
    fn styled_line_width_sums_runs() {
        let line = StyledLine::new(vec![
            StyledRun::new("ab", Face::default()),
            StyledRun::new("你", Face::default()),
        ]);
        assert_eq!(line.width(), 4);
    }
}

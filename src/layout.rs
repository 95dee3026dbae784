//! Popup layout: anchored placement, word wrapping, bubble framing, and the
//! grid-menu scrollbar math.
//!
//! Everything here is pure geometry and string building; the coordinator
//! owns the surfaces these shapes end up on.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::types::{div_round_up, CellCoord, Rect};

fn width(s: &str) -> i32 {
    UnicodeWidthStr::width(s) as i32
}

// =============================================================================
// Anchored placement
// =============================================================================

/// Place a popup of `size` near `anchor` inside `rect`.
///
/// The box goes below the anchor by default, flips above when it would
/// overflow the bottom, and is clamped horizontally. A non-empty `to_avoid`
/// rectangle (the menu) forces the box above or below it when they would
/// intersect.
pub fn compute_popup_position(
    anchor: CellCoord,
    size: CellCoord,
    rect: Rect,
    to_avoid: Rect,
    prefer_above: bool,
) -> CellCoord {
    let mut pos = CellCoord::default();
    let mut above = prefer_above;
    if above {
        pos = CellCoord::new(anchor.line - size.line, anchor.col);
        if pos.line < 0 {
            above = false;
        }
    }
    let rect_end = rect.end();
    if !above {
        pos = CellCoord::new(anchor.line + 1, anchor.col);
        if pos.line + size.line > rect_end.line {
            pos.line = rect.pos.line.max(anchor.line - size.line);
        }
    }
    if pos.col + size.col > rect_end.col {
        pos.col = rect.pos.col.max(rect_end.col - size.col);
    }

    if to_avoid.size != CellCoord::default() {
        let avoid_end = to_avoid.end();
        let end = pos + size;
        let intersects = !(end.line < to_avoid.pos.line
            || end.col < to_avoid.pos.col
            || pos.line > avoid_end.line
            || pos.col > avoid_end.col);
        if intersects {
            pos.line = to_avoid.pos.line.min(anchor.line) - size.line;
            if pos.line < 0 {
                pos.line = avoid_end.line.max(anchor.line);
            }
        }
    }

    pos
}

// =============================================================================
// Word wrapping
// =============================================================================

/// Greedy word wrap. Paragraph breaks are preserved, lines never exceed
/// `max_width` columns, and words wider than a whole line are hard-split at
/// grapheme boundaries.
pub fn wrap_text(text: &str, max_width: i32) -> Vec<String> {
    debug_assert!(max_width > 0);
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut line_width = 0;
        for chunk in paragraph.split_word_bounds() {
            let w = width(chunk);
            if line_width + w <= max_width {
                line.push_str(chunk);
                line_width += w;
                continue;
            }
            if !line.is_empty() {
                let trimmed = line.trim_end();
                lines.push(trimmed.to_owned());
                line.clear();
                line_width = 0;
            }
            if chunk.trim().is_empty() {
                continue;
            }
            if w <= max_width {
                line.push_str(chunk);
                line_width = w;
            } else {
                // A single word wider than the line.
                for g in chunk.graphemes(true) {
                    let gw = width(g);
                    if line_width + gw > max_width {
                        lines.push(std::mem::take(&mut line));
                        line_width = 0;
                    }
                    line.push_str(g);
                    line_width += gw;
                }
            }
        }
        lines.push(line.trim_end().to_owned());
    }
    lines
}

// =============================================================================
// Info boxes
// =============================================================================

/// A laid-out box: its extent and one string per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoBox {
    pub size: CellCoord,
    pub lines: Vec<String>,
}

impl InfoBox {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Build a speech-bubble box: wrapped message framed in box-drawing
/// characters, the title (if any) centered in the top border, and an
/// optional assistant art block vertically centered to the left.
pub fn make_info_box(title: &str, message: &str, max_width: i32, assistant: &[&str]) -> InfoBox {
    let assistant_size = if assistant.is_empty() {
        CellCoord::default()
    } else {
        CellCoord::new(assistant.len() as i32, width(assistant[0]))
    };

    let max_bubble_width = max_width - assistant_size.col - 6;
    if max_bubble_width < 4 {
        return InfoBox::default();
    }

    let wrapped = wrap_text(message, max_bubble_width);
    let mut bubble_width = width(title) + 2;
    for line in &wrapped {
        bubble_width = bubble_width.max(width(line));
    }

    let line_count = (assistant_size.line - 1).max(wrapped.len() as i32 + 2);
    let assistant_top_margin = (line_count - assistant_size.line + 1) / 2;

    let mut result = InfoBox {
        size: CellCoord::new(line_count, bubble_width + assistant_size.col + 4),
        lines: Vec::with_capacity(line_count as usize),
    };
    for i in 0..line_count {
        let mut line = String::new();
        if !assistant.is_empty() {
            let row = if i >= assistant_top_margin {
                (i - assistant_top_margin).min(assistant_size.line - 1)
            } else {
                assistant_size.line - 1
            };
            line.push_str(assistant[row as usize]);
        }
        if i == 0 {
            if title.is_empty() {
                line.push_str("╭─");
                push_dashes(&mut line, bubble_width);
                line.push_str("─╮");
            } else {
                let dash_count = bubble_width - width(title) - 2;
                line.push_str("╭─");
                push_dashes(&mut line, dash_count / 2);
                line.push('┤');
                line.push_str(title);
                line.push('├');
                push_dashes(&mut line, dash_count - dash_count / 2);
                line.push_str("─╮");
            }
        } else if (i as usize) < wrapped.len() + 1 {
            let text = &wrapped[i as usize - 1];
            line.push_str("│ ");
            line.push_str(text);
            for _ in 0..(bubble_width - width(text)) {
                line.push(' ');
            }
            line.push_str(" │");
        } else if i as usize == wrapped.len() + 1 {
            line.push_str("╰─");
            push_dashes(&mut line, bubble_width);
            line.push_str("─╯");
        }
        result.lines.push(line);
    }
    result
}

/// An unframed box: wrapped content, extent = line count by widest line.
pub fn make_simple_info_box(content: &str, max_width: i32) -> InfoBox {
    let mut result = InfoBox::default();
    for line in wrap_text(content, max_width) {
        result.size.line += 1;
        result.size.col = result.size.col.max(width(&line));
        result.lines.push(line);
    }
    result
}

fn push_dashes(line: &mut String, count: i32) {
    for _ in 0..count {
        line.push('─');
    }
}

// =============================================================================
// Grid-menu scrollbar
// =============================================================================

/// Scrollbar mark for a column-paged grid menu: returns `(line, height)` of
/// the filled segment within a `win_height`-tall track.
///
/// The mark height scales with the visible share of the grid
/// (`win_height² / total_lines`, rounded up, capped at the track); its
/// position tracks the first visible column's share of the scrollable
/// columns.
pub fn scrollbar_mark(
    win_height: i32,
    total_lines: i32,
    first_col: i32,
    total_cols: i32,
    visible_cols: i32,
) -> (i32, i32) {
    let mark_height = div_round_up(win_height * win_height, total_lines).min(win_height);
    let mark_line = (win_height - mark_height) * first_col / (total_cols - visible_cols).max(1);
    (mark_line, mark_height)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn screen() -> Rect {
        Rect::new(CellCoord::default(), CellCoord::new(24, 80))
    }

    #[test]
    fn popup_goes_below_the_anchor() {
        let pos = compute_popup_position(
            CellCoord::new(5, 10),
            CellCoord::new(4, 20),
            screen(),
            Rect::default(),
            false,
        );
        assert_eq!(pos, CellCoord::new(6, 10));
    }

    #[test]
    fn popup_flips_above_when_below_overflows() {
        let pos = compute_popup_position(
            CellCoord::new(22, 10),
            CellCoord::new(4, 20),
            screen(),
            Rect::default(),
            false,
        );
        assert_eq!(pos.line, 18, "placed fully above the anchor");
    }

    #[test]
    fn popup_prefer_above_falls_back_below_near_the_top() {
        let pos = compute_popup_position(
            CellCoord::new(1, 0),
            CellCoord::new(4, 10),
            screen(),
            Rect::default(),
            true,
        );
        assert_eq!(pos.line, 2);
    }

    #[test]
    fn popup_is_clamped_horizontally() {
        let pos = compute_popup_position(
            CellCoord::new(5, 75),
            CellCoord::new(3, 20),
            screen(),
            Rect::default(),
            false,
        );
        assert_eq!(pos.col, 60);
    }

    #[test]
    fn popup_dodges_the_avoid_rect() {
        let menu = Rect::new(CellCoord::new(6, 0), CellCoord::new(5, 40));
        let pos = compute_popup_position(
            CellCoord::new(5, 10),
            CellCoord::new(3, 20),
            screen(),
            menu,
            false,
        );
        // Overlapping the menu pushes the box above it.
        assert_eq!(pos.line, 2);
    }

    #[test]
    fn wrap_keeps_lines_within_width() {
        let lines = wrap_text("the quick brown fox jumps over the lazy dog", 10);
        for line in &lines {
            assert!(width(line) <= 10, "{line:?} too wide");
        }
    }

    #[test]
    fn wrap_preserves_every_word() {
        let text = "alpha beta gamma delta epsilon";
        let lines = wrap_text(text, 12);
        let rejoined: Vec<_> = lines.join(" ").split_whitespace().map(str::to_owned).collect();
        let original: Vec<_> = text.split_whitespace().map(str::to_owned).collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn wrap_hard_splits_oversized_words() {
        let lines = wrap_text("abcdefghij", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn wrap_preserves_paragraph_breaks() {
        let lines = wrap_text("one\ntwo", 20);
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[test]
    fn info_box_frames_and_centers_the_title() {
        let boxed = make_info_box("hi", "some text", 40, &[]);
        assert!(boxed.lines[0].starts_with("╭─"));
        assert!(boxed.lines[0].contains("┤hi├"));
        assert!(boxed.lines.last().unwrap().starts_with("╰─"));
        assert_eq!(boxed.size.line, boxed.lines.len() as i32);
        for line in &boxed.lines {
            assert_eq!(width(line), boxed.size.col);
        }
    }

    #[test]
    fn info_box_too_narrow_is_empty() {
        assert!(make_info_box("t", "message", 9, &[]).is_empty());
    }

    #[test]
    fn info_box_embeds_assistant_art() {
        let art = ["(o_o) ", " /|\\  ", "      "];
        let boxed = make_info_box("", "hello", 60, &art);
        // bubble (5) + art column (6) + frame (4)
        assert_eq!(boxed.size.col, 15);
        assert!(boxed.lines.iter().any(|l| l.contains("(o_o)")));
    }

    #[test]
    fn simple_info_box_measures_content() {
        let boxed = make_simple_info_box("abc def", 5);
        assert_eq!(boxed.size, CellCoord::new(2, 3));
    }

    #[test]
    fn scrollbar_mark_scales_with_visible_share() {
        // 4 visible lines of a 10-line grid: ceil(16/10) = 2 cells of mark.
        let (line, height) = scrollbar_mark(4, 10, 0, 5, 2);
        assert_eq!(height, 2);
        assert_eq!(line, 0);
        // Scrolled to the last column page the mark sits at the bottom.
        let (line, height) = scrollbar_mark(4, 10, 3, 5, 2);
        assert_eq!(height, 2);
        assert_eq!(line, 2);
    }
}

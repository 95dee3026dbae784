//! Terminal UI coordinator.
//!
//! Owns the screen: the main surface, the menu and info popups, the palette,
//! the input decoder, and the output buffer. Single-threaded; signal
//! handlers only set flags (see [`crate::signals`]) which [`Ui::step`]
//! consumes. Each refresh composes main surface, then menu, then info, and
//! flushes the terminal once.

use std::io;

use crate::input::{ByteSource, Decoded, Decoder, Event, KeyCode, KeyEvent, TtySource};
use crate::layout::{self, InfoBox};
use crate::palette::{Palette, TermCaps};
use crate::screen::{self, OutputBuffer, RawMode, ScreenWriter};
use crate::signals;
use crate::surface::{CellStyle, Surface};
use crate::types::{div_round_up, CellCoord, Face, Rect, StyledLine, StyledRun};

// =============================================================================
// Options
// =============================================================================

/// Assistant art shown next to prompt info boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Assistant {
    #[default]
    Clippy,
    Cat,
    Dilbert,
    None,
}

/// Runtime-adjustable behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiOptions {
    pub assistant: Assistant,
    /// Status line at the top instead of the bottom.
    pub status_on_top: bool,
    /// Mirror the mode line into the terminal title.
    pub set_title: bool,
    /// Function-key ordinal where the shifted F-key range starts.
    pub shift_function_key: u8,
    /// Program palette slots for RGB colors instead of approximating.
    pub change_colors: bool,
    pub enable_mouse: bool,
    /// Lines scrolled per wheel tick.
    pub wheel_scroll_amount: i32,
    /// Request SGR mouse coordinates; without it the terminal falls back to
    /// the legacy byte-biased protocol.
    pub sgr_mouse: bool,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            assistant: Assistant::Clippy,
            status_on_top: false,
            set_title: true,
            shift_function_key: 12,
            change_colors: true,
            enable_mouse: true,
            wheel_scroll_amount: 3,
            sgr_mouse: true,
        }
    }
}

/// Which coordinate space the hardware cursor follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    Content,
    Prompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuStyle {
    /// Bottom-anchored, full width, multi-column grid.
    Prompt,
    /// Single column next to the anchor.
    Inline,
    /// One horizontally-paged line over the status area.
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoStyle {
    /// Bubble with assistant art near the status line.
    Prompt,
    /// Plain box below the anchor.
    Inline,
    /// Plain box above the anchor.
    InlineAbove,
    /// Bubble centered on the screen.
    Modal,
    /// Plain box docked beside the menu.
    MenuDoc,
}

fn height_limit(style: MenuStyle) -> i32 {
    match style {
        MenuStyle::Inline => 10,
        MenuStyle::Prompt => 10,
        MenuStyle::Search => 3,
    }
}

// =============================================================================
// Assistant art
// =============================================================================

const ASSISTANT_CLIPPY: &[&str] = &[
    " ╭──╮   ",
    " │  │   ",
    " @  @  ╭",
    " ││ ││ │",
    " ││ ││ ╯",
    " │╰─╯│  ",
    " ╰───╯  ",
    "        ",
];

const ASSISTANT_CAT: &[&str] = &[
    "  ___            ",
    " (__ \\           ",
    "   / /          ╭",
    "  .' '·.        │",
    " '      ”       │",
    " ╰       /\\_/|  │",
    "  | .         \\ │",
    "  ╰_J`    | | | ╯",
    "      ' \\__- _/  ",
    "      \\_\\   \\_\\  ",
    "                 ",
];

const ASSISTANT_DILBERT: &[&str] = &[
    "  დოოოოოდ   ",
    "  |     |   ",
    "  |     |  ╭",
    "  |-ᱛ ᱛ-|  │",
    " Ͼ   ∪   Ͽ │",
    "  |     |  ╯",
    " ˏ`-.ŏ.-´ˎ  ",
    "     @      ",
    "      @     ",
    "            ",
];

fn assistant_art(kind: Assistant) -> &'static [&'static str] {
    match kind {
        Assistant::Clippy => ASSISTANT_CLIPPY,
        Assistant::Cat => ASSISTANT_CAT,
        Assistant::Dilbert => ASSISTANT_DILBERT,
        Assistant::None => &[],
    }
}

// =============================================================================
// Popup state
// =============================================================================

#[derive(Debug)]
struct Menu {
    surface: Surface,
    items: Vec<StyledLine>,
    fg: Face,
    bg: Face,
    style: MenuStyle,
    anchor: CellCoord,
    selected_item: i32,
    first_item: i32,
    columns: i32,
}

impl Default for Menu {
    fn default() -> Self {
        Self {
            surface: Surface::new(),
            items: Vec::new(),
            fg: Face::default(),
            bg: Face::default(),
            style: MenuStyle::Prompt,
            anchor: CellCoord::default(),
            selected_item: 0,
            first_item: 0,
            columns: 0,
        }
    }
}

#[derive(Debug)]
struct Info {
    surface: Surface,
    title: String,
    content: String,
    anchor: CellCoord,
    face: Face,
    style: InfoStyle,
}

impl Default for Info {
    fn default() -> Self {
        Self {
            surface: Surface::new(),
            title: String::new(),
            content: String::new(),
            anchor: CellCoord::default(),
            face: Face::default(),
            style: InfoStyle::Inline,
        }
    }
}

// =============================================================================
// Pure geometry helpers (kept free so they are testable without a tty)
// =============================================================================

#[derive(Debug, PartialEq, Eq)]
struct MenuGeometry {
    pos: CellCoord,
    size: CellCoord,
    columns: i32,
    item_max_width: i32,
}

#[allow(clippy::too_many_arguments)]
fn menu_geometry(
    style: MenuStyle,
    anchor: CellCoord,
    longest: i32,
    item_count: i32,
    dim: CellCoord,
    status_on_top: bool,
    content_offset: i32,
) -> MenuGeometry {
    let max_width = dim.col - 1;
    let is_inline = style == MenuStyle::Inline;
    let is_search = style == MenuStyle::Search;
    let columns = if is_search {
        0
    } else if is_inline {
        1
    } else {
        (max_width / (longest + 1)).max(1)
    };

    let max_height = height_limit(style).min(anchor.line.max(dim.line - anchor.line - 1));
    let height = if is_search {
        1
    } else {
        max_height.min(div_round_up(item_count, columns))
    };

    let item_max_width =
        if columns > 1 && item_count > 1 { max_width / columns - 1 } else { max_width };

    let anchor_line = if is_inline { anchor.line + content_offset } else { anchor.line };

    let mut line = anchor_line + 1;
    let mut column = anchor.col.min(dim.col - longest - 1).max(0);
    if is_search {
        line = if status_on_top { 0 } else { dim.line };
        column = dim.col / 2;
    } else if !is_inline {
        line = if status_on_top { 1 } else { dim.line - height };
    } else if line + height > dim.line {
        line = anchor_line - height;
    }

    let width = if is_search {
        dim.col - dim.col / 2
    } else if is_inline {
        (longest + 1).min(dim.col)
    } else {
        dim.col
    };

    MenuGeometry {
        pos: CellCoord::new(line, column),
        size: CellCoord::new(height, width),
        columns,
        item_max_width,
    }
}

/// First visible item after selecting in a column-paged grid.
fn grid_first_item(selected: i32, first_item: i32, win_height: i32, columns: i32, item_count: i32) -> i32 {
    let menu_cols = div_round_up(item_count, win_height);
    let first_col = first_item / win_height;
    let selected_col = selected / win_height;
    if selected_col < first_col {
        return selected_col * win_height;
    }
    if selected_col >= first_col + columns {
        return selected_col.min(menu_cols - columns) * win_height;
    }
    first_item
}

/// First visible item after selecting in the horizontal (search) menu.
fn horizontal_first_item(items: &[StyledLine], selected: i32, width: i32) -> i32 {
    let mut first = 0;
    let mut item_col = 0;
    for i in 0..=selected {
        let item_width = items[i as usize].width() + 1;
        if item_col + item_width > width {
            first = i;
            item_col = item_width;
        } else {
            item_col += item_width;
        }
    }
    first
}

/// Cut `cut` columns from the start of a line, at grapheme granularity.
fn trim_left(line: &StyledLine, cut: i32) -> StyledLine {
    use unicode_segmentation::UnicodeSegmentation;
    use unicode_width::UnicodeWidthStr;

    let mut remaining = cut;
    let mut runs = Vec::new();
    for run in &line.runs {
        if remaining <= 0 {
            runs.push(run.clone());
            continue;
        }
        let w = run.width();
        if w <= remaining {
            remaining -= w;
            continue;
        }
        let mut text = String::new();
        for g in run.text.graphemes(true) {
            let gw = UnicodeWidthStr::width(g) as i32;
            if remaining > 0 {
                remaining -= gw;
                continue;
            }
            text.push_str(g);
        }
        if !text.is_empty() {
            runs.push(StyledRun::new(text, run.face));
        }
    }
    StyledLine::new(runs)
}

/// Paint a styled line onto a surface, resolving each run's face against the
/// fallback and clipping to `max_width` columns.
fn draw_line(
    surface: &mut Surface,
    palette: &mut Palette,
    out: &mut OutputBuffer,
    line: &StyledLine,
    max_width: i32,
    fallback: Face,
) {
    for run in &line.clipped(max_width).runs {
        let face = run.face.merged(fallback);
        let style = CellStyle { pair: palette.pair_for(&face, out), attrs: face.attrs };
        surface.write_text(&run.text, style);
    }
}

// =============================================================================
// Ui
// =============================================================================

pub type EventHandler = Box<dyn FnMut(Event)>;

/// What the coordinator needs from the terminal side: input bytes,
/// readiness, and geometry. Tests substitute canned bytes and a fixed size.
trait Endpoint {
    fn source(&mut self) -> &mut dyn ByteSource;
    fn wait_readable(&mut self, timeout_ms: i32) -> io::Result<bool>;
    fn size(&mut self) -> io::Result<CellCoord>;
}

struct TtyEndpoint {
    source: TtySource,
}

impl TtyEndpoint {
    fn new() -> io::Result<Self> {
        Ok(Self { source: TtySource::new(libc::STDIN_FILENO)? })
    }
}

impl Endpoint for TtyEndpoint {
    fn source(&mut self) -> &mut dyn ByteSource {
        &mut self.source
    }

    fn wait_readable(&mut self, timeout_ms: i32) -> io::Result<bool> {
        self.source.wait_readable(timeout_ms)
    }

    fn size(&mut self) -> io::Result<CellCoord> {
        screen::winsize()
    }
}

/// The terminal interaction layer.
pub struct Ui {
    out: OutputBuffer,
    writer: ScreenWriter,
    palette: Palette,
    decoder: Decoder,
    endpoint: Box<dyn Endpoint>,
    raw: Option<RawMode>,
    window: Surface,
    menu: Menu,
    info: Info,
    cursor_mode: CursorMode,
    cursor_pos: CellCoord,
    dimensions: CellCoord,
    status_len: i32,
    dirty: bool,
    alive: bool,
    resize_pending: bool,
    mouse_enabled: bool,
    options: UiOptions,
    on_event: Option<EventHandler>,
}

impl Ui {
    /// Take over the terminal: raw mode, alternate screen, signal handlers,
    /// mouse and focus reporting.
    pub fn new(options: UiOptions) -> io::Result<Self> {
        let raw = RawMode::enter()?;
        signals::install()?;
        let mut ui = Self::with_endpoint(Box::new(TtyEndpoint::new()?), Some(raw), options);

        screen::enter_alt_screen(&mut ui.out);
        screen::cursor_hide(&mut ui.out);
        screen::clear_screen(&mut ui.out);
        let _ = ui.palette.reconfigure(options.change_colors, &mut ui.out);
        ui.decoder.set_wheel_scroll_amount(options.wheel_scroll_amount);
        ui.set_mouse(options.enable_mouse);
        ui.check_resize(true)?;
        ui.out.flush_stdout()?;
        Ok(ui)
    }

    fn with_endpoint(endpoint: Box<dyn Endpoint>, raw: Option<RawMode>, options: UiOptions) -> Self {
        Self {
            out: OutputBuffer::new(),
            writer: ScreenWriter::new(),
            palette: Palette::new(TermCaps::detect()),
            decoder: Decoder::new(),
            endpoint,
            raw,
            window: Surface::new(),
            menu: Menu::default(),
            info: Info::default(),
            cursor_mode: CursorMode::Content,
            cursor_pos: CellCoord::default(),
            dimensions: CellCoord::default(),
            status_len: 0,
            dirty: false,
            alive: true,
            resize_pending: false,
            mouse_enabled: false,
            options,
            on_event: None,
        }
    }

    /// False once SIGHUP was observed; the terminal is gone.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn dimensions(&self) -> CellCoord {
        self.dimensions
    }

    fn content_line_offset(&self) -> i32 {
        if self.options.status_on_top { 1 } else { 0 }
    }

    pub fn set_event_handler(&mut self, handler: EventHandler) {
        self.on_event = Some(handler);
        // Report the initial geometry right away so the client can draw.
        self.resize_pending = true;
    }

    // -------------------------------------------------------------------------
    // Event loop
    // -------------------------------------------------------------------------

    /// One round of the event loop: consume pending signals, wait up to
    /// `timeout_ms` for input, decode and deliver everything available.
    /// Returns false once the terminal hung up.
    pub fn step(&mut self, timeout_ms: i32) -> io::Result<bool> {
        if signals::take_hangup() {
            self.alive = false;
            return Ok(false);
        }
        self.check_resize(false)?;
        if self.resize_pending {
            self.resize_pending = false;
            let dim = self.dimensions;
            self.deliver(Event::Resize(dim));
        }
        if self.endpoint.wait_readable(timeout_ms)? {
            self.handle_input()?;
        }
        Ok(self.alive)
    }

    fn handle_input(&mut self) -> io::Result<()> {
        loop {
            match self.decoder.decode_next(self.endpoint.source()) {
                Ok(None) => return Ok(()),
                Ok(Some(Decoded::Suspend)) => self.suspend()?,
                Ok(Some(Decoded::Event(event))) => self.deliver(event),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    self.alive = false;
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::InvalidData => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn deliver(&mut self, event: Event) {
        let event = match event {
            Event::Key(KeyEvent { code: KeyCode::F(n), mods }) => {
                let fixed = KeyEvent::function(n, self.options.shift_function_key);
                Event::Key(KeyEvent::new(fixed.code, mods | fixed.mods))
            }
            Event::Mouse(mut mouse) => {
                mouse.pos.line -= self.content_line_offset();
                Event::Mouse(mouse)
            }
            other => other,
        };
        if let Some(handler) = self.on_event.as_mut() {
            handler(event);
        }
    }

    /// Hand the terminal back, stop the whole process group, and take the
    /// terminal over again once resumed.
    fn suspend(&mut self) -> io::Result<()> {
        let mouse_was_enabled = self.mouse_enabled;
        self.set_mouse(false);
        screen::cursor_show(&mut self.out);
        screen::exit_alt_screen(&mut self.out);
        self.out.flush_stdout()?;
        if let Some(raw) = self.raw.as_mut() {
            raw.exit()?;
        }

        unsafe {
            libc::kill(0, libc::SIGTSTP);
        }

        if let Some(raw) = self.raw.as_mut() {
            raw.reenter()?;
        }
        screen::enter_alt_screen(&mut self.out);
        screen::cursor_hide(&mut self.out);
        self.check_resize(true)?;
        self.set_mouse(mouse_was_enabled);
        self.out.flush_stdout()
    }

    // -------------------------------------------------------------------------
    // Geometry
    // -------------------------------------------------------------------------

    /// Re-query the terminal size and rebuild every surface. Popups are
    /// recreated with their stored content; the menu keeps its selection.
    pub fn check_resize(&mut self, force: bool) -> io::Result<()> {
        if !force && !signals::take_resize() {
            return Ok(());
        }

        let ws = self.endpoint.size()?;
        let had_menu = self.menu.surface.is_valid();
        let had_info = self.info.surface.is_valid();
        self.window.destroy();
        self.menu.surface.destroy();
        self.info.surface.destroy();

        self.window.create(CellCoord::default(), ws);
        self.dimensions = CellCoord::new(ws.line - 1, ws.col);

        if had_menu {
            let items = std::mem::take(&mut self.menu.items);
            let selected = self.menu.selected_item;
            let (anchor, fg, bg, style) =
                (self.menu.anchor, self.menu.fg, self.menu.bg, self.menu.style);
            self.menu_show(&items, anchor, fg, bg, style);
            self.menu_select(selected);
        }
        if had_info {
            self.info_refresh();
        }

        self.resize_pending = true;
        self.writer.reset();
        screen::clear_screen(&mut self.out);
        self.dirty = true;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Content and status
    // -------------------------------------------------------------------------

    /// Paint the content area: one styled line per row, remaining rows
    /// filled with `~` in the padding face.
    pub fn draw(&mut self, lines: &[StyledLine], default_face: Face, padding_face: Face) {
        let dim = self.dimensions;
        let offset = self.content_line_offset();

        let background =
            CellStyle { pair: self.palette.pair_for(&default_face, &mut self.out), attrs: default_face.attrs };
        self.window.set_background(background);

        let mut line_index = offset;
        for line in lines.iter().take(dim.line as usize) {
            self.window.move_cursor(CellCoord::new(line_index, 0));
            self.window.clear_to_end_of_line();
            draw_line(&mut self.window, &mut self.palette, &mut self.out, line, dim.col, default_face);
            line_index += 1;
        }

        let padding = padding_face.merged(default_face);
        let padding_style =
            CellStyle { pair: self.palette.pair_for(&padding, &mut self.out), attrs: padding.attrs };
        self.window.set_background(padding_style);
        while line_index < dim.line + offset {
            self.window.move_cursor(CellCoord::new(line_index, 0));
            self.window.clear_to_end_of_line();
            self.window.write_text("~", padding_style);
            line_index += 1;
        }

        self.dirty = true;
    }

    /// Paint the status row: status line left-aligned, mode line
    /// right-aligned, trimmed from the left behind a `…` when it does not
    /// fit. Optionally mirrors the mode line into the terminal title.
    pub fn draw_status(&mut self, status_line: &StyledLine, mode_line: &StyledLine, default_face: Face) {
        let status_pos = if self.options.status_on_top { 0 } else { self.dimensions.line };
        let dim = self.dimensions;

        let background =
            CellStyle { pair: self.palette.pair_for(&default_face, &mut self.out), attrs: default_face.attrs };
        self.window.set_background(background);
        self.window.move_cursor(CellCoord::new(status_pos, 0));
        self.window.clear_to_end_of_line();
        draw_line(&mut self.window, &mut self.palette, &mut self.out, status_line, dim.col, default_face);

        let mode_len = mode_line.width();
        self.status_len = status_line.width();
        let remaining = dim.col - self.status_len;
        if mode_len < remaining {
            self.window.move_cursor(CellCoord::new(status_pos, dim.col - mode_len));
            draw_line(&mut self.window, &mut self.palette, &mut self.out, mode_line, mode_len, default_face);
        } else if remaining > 2 {
            let mut trimmed = trim_left(mode_line, mode_len + 2 - remaining).clipped(remaining - 2);
            trimmed.runs.insert(0, StyledRun::new("…", Face::default()));
            self.window.move_cursor(CellCoord::new(status_pos, dim.col - remaining + 1));
            draw_line(&mut self.window, &mut self.palette, &mut self.out, &trimmed, remaining - 1, default_face);
        }

        if self.options.set_title {
            let title: String = mode_line.runs.iter().map(|r| r.text.as_str()).collect();
            screen::set_title(&mut self.out, &title);
        }

        self.dirty = true;
    }

    pub fn set_cursor(&mut self, mode: CursorMode, coord: CellCoord) {
        self.cursor_mode = mode;
        self.cursor_pos = coord;
    }

    // -------------------------------------------------------------------------
    // Menu
    // -------------------------------------------------------------------------

    /// Show the completion menu near `anchor`. `fg` styles the selected
    /// item, `bg` everything else.
    pub fn menu_show(
        &mut self,
        items: &[StyledLine],
        anchor: CellCoord,
        fg: Face,
        bg: Face,
        style: MenuStyle,
    ) {
        if self.menu.surface.is_valid() {
            self.menu.surface.destroy();
            self.dirty = true;
        }

        self.menu.fg = fg;
        self.menu.bg = bg;
        self.menu.style = style;
        self.menu.anchor = anchor;

        if self.dimensions.col <= 2 {
            return;
        }

        let item_count = items.len() as i32;
        let longest = items.iter().map(StyledLine::width).max().unwrap_or(1).max(1);
        let geometry = menu_geometry(
            style,
            anchor,
            longest,
            item_count,
            self.dimensions,
            self.options.status_on_top,
            self.content_line_offset(),
        );

        self.menu.columns = geometry.columns;
        self.menu.items = items.iter().map(|item| item.clipped(geometry.item_max_width)).collect();
        self.menu.surface.create(geometry.pos, geometry.size);
        self.menu.selected_item = item_count;
        self.menu.first_item = 0;

        self.draw_menu();

        // The info box dodges the menu, so it must be recomputed.
        if self.info.surface.is_valid() {
            self.info_refresh();
        }
    }

    /// Change the selected item, scrolling it into view; out-of-range
    /// deselects.
    pub fn menu_select(&mut self, selected: i32) {
        // menu_show may not have created the surface if it did not fit; a
        // zero-height grid has no pages to scroll through.
        if !self.menu.surface.is_valid() {
            return;
        }
        let item_count = self.menu.items.len() as i32;
        if selected < 0 || selected >= item_count {
            self.menu.selected_item = -1;
            self.menu.first_item = 0;
        } else if self.menu.columns == 0 {
            self.menu.selected_item = selected;
            let width = self.menu.surface.size().col - 3;
            self.menu.first_item = horizontal_first_item(&self.menu.items, selected, width);
        } else {
            self.menu.selected_item = selected;
            self.menu.first_item = grid_first_item(
                selected,
                self.menu.first_item,
                self.menu.surface.size().line,
                self.menu.columns,
                item_count,
            );
        }
        self.draw_menu();
    }

    pub fn menu_hide(&mut self) {
        if !self.menu.surface.is_valid() {
            return;
        }
        self.menu.items.clear();
        self.menu.surface.destroy();
        self.dirty = true;

        // The info box no longer needs to avoid the menu.
        if self.info.surface.is_valid() {
            self.info_refresh();
        }
    }

    fn draw_menu(&mut self) {
        // menu_show may not have created the surface if it did not fit.
        if !self.menu.surface.is_valid() {
            return;
        }

        let bg = self.menu.bg;
        let fg = self.menu.fg;
        let bg_style = CellStyle { pair: self.palette.pair_for(&bg, &mut self.out), attrs: bg.attrs };
        self.menu.surface.set_background(bg_style);

        let item_count = self.menu.items.len() as i32;
        if self.menu.columns == 0 {
            // Horizontally paged single line.
            let win_width = self.menu.surface.size().col - 4;
            let mut pos = 0;
            self.menu.surface.move_cursor(CellCoord::default());
            self.menu.surface.write_text(
                if self.menu.first_item > 0 { "< " } else { "  " },
                bg_style,
            );

            let mut i = self.menu.first_item;
            while i < item_count && pos < win_width {
                let item = self.menu.items[i as usize].clone();
                let item_width = item.width();
                let face = if i == self.menu.selected_item { fg } else { bg };
                draw_line(
                    &mut self.menu.surface,
                    &mut self.palette,
                    &mut self.out,
                    &item,
                    win_width - pos,
                    face,
                );
                if item_width > win_width - pos {
                    self.menu.surface.write_text("…", bg_style);
                } else {
                    self.menu.surface.write_text(" ", bg_style);
                }
                pos += item_width + 1;
                i += 1;
            }

            if pos <= win_width {
                for _ in 0..(win_width - pos + 1) {
                    self.menu.surface.write_text(" ", bg_style);
                }
            }
            self.menu.surface.write_text(if i == item_count { " " } else { ">" }, bg_style);
            self.dirty = true;
            return;
        }

        let total_lines = div_round_up(item_count, self.menu.columns);
        let win_height = self.menu.surface.size().line;
        let column_width = (self.menu.surface.size().col - 1) / self.menu.columns;

        let total_cols = div_round_up(item_count, win_height);
        let first_col = self.menu.first_item / win_height;
        let (mark_line, mark_height) =
            layout::scrollbar_mark(win_height, total_lines, first_col, total_cols, self.menu.columns);

        for line in 0..win_height {
            self.menu.surface.move_cursor(CellCoord::new(line, 0));
            for col in 0..self.menu.columns {
                let item_idx = (first_col + col) * win_height + line;
                if item_idx >= item_count {
                    continue;
                }
                let item = self.menu.items[item_idx as usize].clone();
                let face = if item_idx == self.menu.selected_item { fg } else { bg };
                draw_line(
                    &mut self.menu.surface,
                    &mut self.palette,
                    &mut self.out,
                    &item,
                    column_width,
                    face,
                );
                // Pad to the column edge in the item's face so selection
                // highlighting covers the whole cell.
                let pad_face = face.merged(bg);
                let pad_style =
                    CellStyle { pair: self.palette.pair_for(&pad_face, &mut self.out), attrs: pad_face.attrs };
                for _ in 0..(column_width - item.width()) {
                    self.menu.surface.write_text(" ", pad_style);
                }
            }
            self.menu.surface.clear_to_end_of_line();
            let is_mark = line >= mark_line && line < mark_line + mark_height;
            self.menu.surface.move_cursor(CellCoord::new(line, self.menu.surface.size().col - 1));
            self.menu.surface.write_text(if is_mark { "█" } else { "░" }, bg_style);
        }
        self.dirty = true;
    }

    // -------------------------------------------------------------------------
    // Info box
    // -------------------------------------------------------------------------

    /// Show an info popup. Placement and framing depend on the style; a box
    /// that cannot fit is silently not shown.
    pub fn info_show(
        &mut self,
        title: &str,
        content: &str,
        mut anchor: CellCoord,
        face: Face,
        style: InfoStyle,
    ) {
        self.info_hide();

        self.info.title = title.to_owned();
        self.info.content = content.to_owned();
        self.info.anchor = anchor;
        self.info.face = face;
        self.info.style = style;

        let dim = self.dimensions;
        let rect = Rect::new(CellCoord::new(self.content_line_offset(), 0), dim);
        let menu_rect =
            if self.menu.surface.is_valid() { self.menu.surface.rect() } else { Rect::default() };

        let info_box: InfoBox;
        match style {
            InfoStyle::Prompt => {
                info_box =
                    layout::make_info_box(title, content, dim.col, assistant_art(self.options.assistant));
                anchor = CellCoord::new(
                    if self.options.status_on_top { 0 } else { dim.line },
                    dim.col - 1,
                );
                anchor = layout::compute_popup_position(anchor, info_box.size, rect, menu_rect, false);
            }
            InfoStyle::Modal => {
                info_box = layout::make_info_box(title, content, dim.col, &[]);
                let half = |c: CellCoord| CellCoord::new(c.line / 2, c.col / 2);
                anchor = rect.pos + half(rect.size) - half(info_box.size);
            }
            InfoStyle::MenuDoc => {
                if !self.menu.surface.is_valid() {
                    return;
                }
                let menu = self.menu.surface.rect();
                let right_max_width = dim.col - (menu.pos.col + menu.size.col);
                let left_max_width = menu.pos.col;
                let max_width = right_max_width.max(left_max_width);
                if max_width < 4 {
                    return;
                }
                info_box = layout::make_simple_info_box(content, max_width);
                anchor.line = menu.pos.line;
                anchor.col = if info_box.size.col <= right_max_width || right_max_width >= left_max_width
                {
                    menu.pos.col + menu.size.col
                } else {
                    menu.pos.col - info_box.size.col
                };
            }
            InfoStyle::Inline | InfoStyle::InlineAbove => {
                let max_width = dim.col - anchor.col;
                if max_width < 4 {
                    return;
                }
                info_box = layout::make_simple_info_box(content, max_width);
                anchor = layout::compute_popup_position(
                    anchor,
                    info_box.size,
                    rect,
                    menu_rect,
                    style == InfoStyle::InlineAbove,
                );
                anchor.line += self.content_line_offset();
            }
        }

        // The box does not fit on screen.
        let end = anchor + info_box.size;
        let rect_end = rect.end();
        if anchor.line < rect.pos.line
            || anchor.col < rect.pos.col
            || end.line > rect_end.line
            || end.col > rect_end.col
        {
            return;
        }

        self.info.surface.create(anchor, info_box.size);
        let style = CellStyle { pair: self.palette.pair_for(&face, &mut self.out), attrs: face.attrs };
        self.info.surface.set_background(style);
        for (line, text) in info_box.lines.iter().enumerate() {
            self.info.surface.move_cursor(CellCoord::new(line as i32, 0));
            self.info.surface.clear_to_end_of_line();
            self.info.surface.write_text(text, style);
        }
        self.dirty = true;
    }

    pub fn info_hide(&mut self) {
        if !self.info.surface.is_valid() {
            return;
        }
        self.info.surface.destroy();
        self.dirty = true;
    }

    fn info_refresh(&mut self) {
        let (title, content) = (self.info.title.clone(), self.info.content.clone());
        let (anchor, face, style) = (self.info.anchor, self.info.face, self.info.style);
        self.info_show(&title, &content, anchor, face, style);
    }

    // -------------------------------------------------------------------------
    // Composition
    // -------------------------------------------------------------------------

    /// Push dirty state to the terminal: main surface, then menu, then info,
    /// then the hardware cursor, in one flush.
    pub fn refresh(&mut self, force: bool) -> io::Result<()> {
        if self.dirty || force {
            self.redraw(force)?;
        }
        self.dirty = false;
        Ok(())
    }

    fn redraw(&mut self, force: bool) -> io::Result<()> {
        self.window.compose(&mut self.writer, &self.palette, &mut self.out, force);

        // The search menu overlays the status line; skip it while it would
        // cover status content.
        if self.menu.surface.is_valid()
            && (self.menu.columns != 0 || self.menu.surface.pos().col > self.status_len)
        {
            self.menu.surface.compose(&mut self.writer, &self.palette, &mut self.out, false);
        }
        if self.info.surface.is_valid() {
            self.info.surface.compose(&mut self.writer, &self.palette, &mut self.out, false);
        }

        let cursor = match self.cursor_mode {
            CursorMode::Prompt => CellCoord::new(
                if self.options.status_on_top { 0 } else { self.dimensions.line },
                self.cursor_pos.col,
            ),
            CursorMode::Content => self.cursor_pos + CellCoord::new(self.content_line_offset(), 0),
        };
        screen::cursor_to(&mut self.out, cursor);
        // The manual cursor move invalidates the writer's position memory.
        self.writer.reset();

        self.out.flush_stdout()
    }

    // -------------------------------------------------------------------------
    // Options
    // -------------------------------------------------------------------------

    fn set_mouse(&mut self, enabled: bool) {
        if enabled == self.mouse_enabled {
            return;
        }
        self.mouse_enabled = enabled;
        screen::set_mouse_reporting(&mut self.out, enabled, self.options.sgr_mouse);
    }

    /// Apply a new option set, toggling terminal modes as needed.
    pub fn set_ui_options(&mut self, options: UiOptions) -> io::Result<()> {
        if self.palette.reconfigure(options.change_colors, &mut self.out) {
            self.writer.reset();
            self.dirty = true;
        }
        self.decoder.set_wheel_scroll_amount(options.wheel_scroll_amount);

        // Changing the mouse protocol requires re-requesting it.
        if options.sgr_mouse != self.options.sgr_mouse {
            self.set_mouse(false);
        }
        let want_mouse = options.enable_mouse;
        self.options = options;
        self.set_mouse(want_mouse);
        self.out.flush_stdout()
    }
}

impl Drop for Ui {
    fn drop(&mut self) {
        self.set_mouse(false);
        screen::reset_palette(&mut self.out);
        screen::cursor_show(&mut self.out);
        screen::exit_alt_screen(&mut self.out);
        let _ = self.out.flush_stdout();
        if let Some(raw) = self.raw.as_mut() {
            let _ = raw.exit();
        }
        signals::restore_default();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::input::VecSource;
    use crate::types::Face;

    fn items(widths: &[usize]) -> Vec<StyledLine> {
        widths
            .iter()
            .map(|w| StyledLine::plain("x".repeat(*w), Face::default()))
            .collect()
    }

    struct FakeEndpoint {
        source: VecSource,
        size: Rc<Cell<CellCoord>>,
    }

    impl Endpoint for FakeEndpoint {
        fn source(&mut self) -> &mut dyn ByteSource {
            &mut self.source
        }

        fn wait_readable(&mut self, _timeout_ms: i32) -> io::Result<bool> {
            Ok(!self.source.is_empty())
        }

        fn size(&mut self) -> io::Result<CellCoord> {
            Ok(self.size.get())
        }
    }

    /// A coordinator over canned input and an adjustable window size,
    /// touching no terminal.
    fn test_ui(size: CellCoord) -> (Ui, Rc<Cell<CellCoord>>) {
        let shared = Rc::new(Cell::new(size));
        let endpoint = FakeEndpoint { source: VecSource::new(&[]), size: Rc::clone(&shared) };
        let mut ui = Ui::with_endpoint(Box::new(endpoint), None, UiOptions::default());
        ui.check_resize(true).unwrap();
        (ui, shared)
    }

    #[test]
    fn prompt_menu_spans_the_bottom() {
        let g = menu_geometry(
            MenuStyle::Prompt,
            CellCoord::new(10, 5),
            8,
            30,
            CellCoord::new(24, 80),
            false,
            0,
        );
        assert_eq!(g.size.col, 80);
        assert_eq!(g.pos.line + g.size.line, 24, "flush with the status line");
        assert!(g.columns > 1);
    }

    #[test]
    fn search_menu_is_one_half_width_line() {
        let g = menu_geometry(
            MenuStyle::Search,
            CellCoord::default(),
            8,
            30,
            CellCoord::new(24, 80),
            false,
            0,
        );
        assert_eq!(g.size, CellCoord::new(1, 40));
        assert_eq!(g.pos, CellCoord::new(24, 40));
        assert_eq!(g.columns, 0);
    }

    #[test]
    fn inline_menu_flips_above_when_below_does_not_fit() {
        let g = menu_geometry(
            MenuStyle::Inline,
            CellCoord::new(22, 4),
            10,
            5,
            CellCoord::new(24, 80),
            false,
            0,
        );
        assert_eq!(g.columns, 1);
        assert_eq!(g.pos.line, 22 - g.size.line);
    }

    #[test]
    fn grid_first_item_pages_by_column() {
        // 10-line window, 2 visible columns, 50 items (5 columns total).
        assert_eq!(grid_first_item(5, 0, 10, 2, 50), 0, "already visible");
        assert_eq!(grid_first_item(25, 0, 10, 2, 50), 20, "scrolled right");
        assert_eq!(grid_first_item(5, 20, 10, 2, 50), 0, "scrolled back left");
        // Clamped so the last page stays full.
        assert_eq!(grid_first_item(49, 0, 10, 2, 50), 30);
    }

    #[test]
    fn horizontal_first_item_packs_whole_items() {
        let menu = items(&[4, 4, 4, 4]);
        // Each item takes 5 columns; three fit in 12.
        assert_eq!(horizontal_first_item(&menu, 1, 12), 0);
        assert_eq!(horizontal_first_item(&menu, 2, 12), 2);
    }

    #[test]
    fn trim_left_cuts_columns_across_runs() {
        let line = StyledLine::new(vec![
            StyledRun::new("abc", Face::default()),
            StyledRun::new("def", Face::default()),
        ]);
        let trimmed = trim_left(&line, 4);
        assert_eq!(trimmed.width(), 2);
        assert_eq!(trimmed.runs[0].text, "ef");
    }

    #[test]
    fn menu_height_is_capped_per_style() {
        assert_eq!(height_limit(MenuStyle::Prompt), 10);
        assert_eq!(height_limit(MenuStyle::Inline), 10);
        assert_eq!(height_limit(MenuStyle::Search), 3);
        let g = menu_geometry(
            MenuStyle::Prompt,
            CellCoord::new(20, 0),
            5,
            500,
            CellCoord::new(24, 80),
            false,
            0,
        );
        assert!(g.size.line <= 10);
    }

    #[test]
    fn resize_preserves_menu_items_and_selection() {
        let (mut ui, size) = test_ui(CellCoord::new(25, 80));
        ui.menu_show(
            &items(&[5, 5, 5, 5, 5, 5]),
            CellCoord::new(3, 0),
            Face::default(),
            Face::default(),
            MenuStyle::Prompt,
        );
        ui.menu_select(2);
        assert_eq!(ui.menu.selected_item, 2);

        size.set(CellCoord::new(20, 60));
        ui.check_resize(true).unwrap();

        assert!(ui.menu.surface.is_valid());
        assert_eq!(ui.menu.items.len(), 6);
        assert_eq!(ui.menu.selected_item, 2);
    }

    #[test]
    fn select_on_a_menu_that_did_not_fit_is_a_no_op() {
        // Two rows leave no room for a prompt menu: its surface ends up with
        // zero height and must never be paged through.
        let (mut ui, _size) = test_ui(CellCoord::new(2, 80));
        ui.menu_show(
            &items(&[5, 5, 5, 5]),
            CellCoord::new(0, 5),
            Face::default(),
            Face::default(),
            MenuStyle::Prompt,
        );
        assert!(!ui.menu.surface.is_valid());
        ui.menu_select(1);
    }

    #[test]
    fn mouse_mode_toggles_emit_once_per_change() {
        let (mut ui, _size) = test_ui(CellCoord::new(25, 80));
        ui.out.clear();

        ui.set_mouse(true);
        let enabled = String::from_utf8_lossy(ui.out.as_bytes()).into_owned();
        assert!(enabled.contains("\x1b[?1000h"));

        ui.set_mouse(true);
        assert_eq!(ui.out.as_bytes().len(), enabled.len(), "repeat enable is silent");

        ui.set_mouse(false);
        let full = String::from_utf8_lossy(ui.out.as_bytes()).into_owned();
        assert!(full.contains("\x1b[?1000l"));
        assert_eq!(full.matches("\x1b[?1000h").count(), 1);
    }
}

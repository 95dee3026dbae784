//! termweave: the terminal interaction core of a full-screen application.
//!
//! What lives here:
//!
//! - [`input`]: escape-sequence decoding (CSI keys, SGR and legacy mouse,
//!   focus reports, UTF-8, Alt via ESC prefix).
//! - [`surface`]: rectangular paint buffers with wide-glyph handling.
//! - [`palette`]: abstract colors to terminal color pairs, with dynamic
//!   palette programming or nearest-color approximation.
//! - [`screen`]: batched escape output and minimal SGR diffing.
//! - [`layout`]: popup placement, word wrapping, info-box framing, menu
//!   scrollbar math.
//! - [`ui`]: the coordinator tying it together over a raw-mode terminal.
//!
//! Everything runs on one thread; signal handlers only set atomic flags
//! ([`signals`]) that the coordinator polls.

pub mod input;
pub mod layout;
pub mod palette;
pub mod screen;
pub mod surface;
pub mod types;

#[cfg(unix)]
pub mod signals;
#[cfg(unix)]
pub mod ui;

pub use input::{Event, KeyCode, KeyEvent, Modifiers, MouseAction, MouseButton, MouseEvent};
pub use surface::{Cell, CellStyle, Surface};
pub use types::{Attr, CellCoord, Color, Face, Rect, StyledLine, StyledRun};

#[cfg(unix)]
pub use ui::{Assistant, CursorMode, InfoStyle, MenuStyle, Ui, UiOptions};

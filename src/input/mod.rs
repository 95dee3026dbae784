//! Terminal input: byte sources, the escape-sequence decoder, and the
//! event types it produces.

pub mod decoder;
pub mod events;
pub mod source;

pub use decoder::{Decoded, Decoder};
pub use events::{Event, KeyCode, KeyEvent, Modifiers, MouseAction, MouseButton, MouseEvent};
pub use source::{ByteSource, VecSource};

#[cfg(unix)]
pub use source::TtySource;

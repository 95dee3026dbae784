//! Color palette: abstract colors to terminal color-pair ids.
//!
//! Named colors hit a static table. RGB colors either program a palette slot
//! dynamically (ring of slots from 16 up, oldest mapping silently
//! overwritten) or fall back to the nearest entry of a built-in 256-color
//! table by squared RGB distance. (fg, bg) pairs are memoized with ids
//! assigned monotonically per session; pair 0 is reserved as "no override".

use std::collections::HashMap;

use crate::screen::{self, OutputBuffer};
use crate::types::{Color, Face};

/// First palette slot available for dynamic programming.
const FIRST_DYNAMIC_SLOT: i32 = 16;

/// Terminal color capabilities, injected so tests can exercise both the
/// dynamic and the nearest-color paths.
#[derive(Debug, Clone, Copy)]
pub struct TermCaps {
    pub max_colors: i32,
    pub can_change_color: bool,
}

impl TermCaps {
    /// Guess capabilities from `$TERM`.
    pub fn detect() -> Self {
        let term = std::env::var("TERM").unwrap_or_default();
        let has_256 = term.contains("256color");
        Self {
            max_colors: if has_256 { 256 } else { 16 },
            can_change_color: has_256,
        }
    }
}

impl Default for TermCaps {
    fn default() -> Self {
        Self { max_colors: 256, can_change_color: false }
    }
}

/// Resolved terminal color indices for one pair. -1 means terminal default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairColors {
    pub fg: i32,
    pub bg: i32,
}

/// The session palette: color and pair caches plus the allocation cursors.
#[derive(Debug)]
pub struct Palette {
    colors: HashMap<Color, i32>,
    pair_ids: HashMap<(Color, Color), i32>,
    pair_defs: Vec<PairColors>,
    next_color: i32,
    change_colors: bool,
    caps: TermCaps,
}

impl Palette {
    pub fn new(caps: TermCaps) -> Self {
        Self {
            colors: named_colors(),
            pair_ids: HashMap::new(),
            pair_defs: vec![PairColors { fg: -1, bg: -1 }],
            next_color: FIRST_DYNAMIC_SLOT,
            change_colors: false,
            caps,
        }
    }

    /// Resolve an abstract color to a terminal color index.
    pub fn resolve(&mut self, color: Color, out: &mut OutputBuffer) -> i32 {
        if let Some(&idx) = self.colors.get(&color) {
            return idx;
        }
        // Every non-RGB discriminant is seeded in the cache; a miss here is
        // a contract violation, not a runtime condition.
        let Color::Rgb { r, g, b } = color else {
            unreachable!("non-RGB color missing from the static table")
        };

        if self.change_colors && self.caps.can_change_color && self.caps.max_colors > 16 {
            if self.next_color >= self.caps.max_colors {
                self.next_color = FIRST_DYNAMIC_SLOT;
            }
            let slot = self.next_color;
            self.next_color += 1;
            screen::program_color(out, slot, r, g, b);
            self.colors.insert(color, slot);
            slot
        } else {
            nearest_builtin(r, g, b, self.caps.max_colors)
        }
    }

    /// Memoized (fg, bg) to pair id; a new key takes the next sequential id.
    pub fn pair_for(&mut self, face: &Face, out: &mut OutputBuffer) -> i32 {
        let key = (face.fg, face.bg);
        if let Some(&id) = self.pair_ids.get(&key) {
            return id;
        }
        let colors = PairColors {
            fg: self.resolve(face.fg, out),
            bg: self.resolve(face.bg, out),
        };
        let id = self.pair_defs.len() as i32;
        self.pair_defs.push(colors);
        self.pair_ids.insert(key, id);
        id
    }

    /// The resolved indices behind a pair id. Pair 0 is the default pair.
    pub fn pair_colors(&self, pair: i32) -> PairColors {
        self.pair_defs
            .get(pair as usize)
            .copied()
            .unwrap_or(PairColors { fg: -1, bg: -1 })
    }

    /// Toggle dynamic color programming.
    ///
    /// When the terminal supports reprogramming and the setting changes, the
    /// terminal palette is reset and both caches restart at their base ids;
    /// returns true so callers can invalidate remembered styles. Otherwise
    /// the setting is stored and nothing else happens.
    pub fn reconfigure(&mut self, change_colors: bool, out: &mut OutputBuffer) -> bool {
        let reset = self.caps.can_change_color && self.change_colors != change_colors;
        if reset {
            screen::reset_palette(out);
            self.colors = named_colors();
            self.pair_ids.clear();
            self.pair_defs.truncate(1);
            self.next_color = FIRST_DYNAMIC_SLOT;
        }
        self.change_colors = change_colors;
        reset
    }
}

fn named_colors() -> HashMap<Color, i32> {
    HashMap::from([
        (Color::Default, -1),
        (Color::Black, 0),
        (Color::Red, 1),
        (Color::Green, 2),
        (Color::Yellow, 3),
        (Color::Blue, 4),
        (Color::Magenta, 5),
        (Color::Cyan, 6),
        (Color::White, 7),
        (Color::BrightBlack, 8),
        (Color::BrightRed, 9),
        (Color::BrightGreen, 10),
        (Color::BrightYellow, 11),
        (Color::BrightBlue, 12),
        (Color::BrightMagenta, 13),
        (Color::BrightCyan, 14),
        (Color::BrightWhite, 15),
    ])
}

/// Index of the built-in palette entry minimizing squared RGB distance;
/// ties resolve to the lowest index.
fn nearest_builtin(r: u8, g: u8, b: u8, max_colors: i32) -> i32 {
    let limit = (BUILTIN_COLORS.len() as i32).min(max_colors).max(1) as usize;
    let sq = |x: i32| x * x;
    let mut best = 0;
    let mut best_dist = i32::MAX;
    for (i, &(cr, cg, cb)) in BUILTIN_COLORS[..limit].iter().enumerate() {
        let dist = sq(r as i32 - cr as i32) + sq(g as i32 - cg as i32) + sq(b as i32 - cb as i32);
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best as i32
}

/// The xterm-style 256-entry palette used for nearest-color approximation.
#[rustfmt::skip]
const BUILTIN_COLORS: [(u8, u8, u8); 256] = [
    (0x00,0x00,0x00), (0x80,0x00,0x00), (0x00,0x80,0x00), (0x80,0x80,0x00),
    (0x00,0x00,0x80), (0x80,0x00,0x80), (0x00,0x80,0x80), (0xc0,0xc0,0xc0),
    (0x80,0x80,0x80), (0xff,0x00,0x00), (0x00,0xff,0x00), (0xff,0xff,0x00),
    (0x00,0x00,0xff), (0xff,0x00,0xff), (0x00,0xff,0xff), (0xff,0xff,0xff),
    (0x00,0x00,0x00), (0x00,0x00,0x5f), (0x00,0x00,0x87), (0x00,0x00,0xaf),
    (0x00,0x00,0xd7), (0x00,0x00,0xff), (0x00,0x5f,0x00), (0x00,0x5f,0x5f),
    (0x00,0x5f,0x87), (0x00,0x5f,0xaf), (0x00,0x5f,0xd7), (0x00,0x5f,0xff),
    (0x00,0x87,0x00), (0x00,0x87,0x5f), (0x00,0x87,0x87), (0x00,0x87,0xaf),
    (0x00,0x87,0xd7), (0x00,0x87,0xff), (0x00,0xaf,0x00), (0x00,0xaf,0x5f),
    (0x00,0xaf,0x87), (0x00,0xaf,0xaf), (0x00,0xaf,0xd7), (0x00,0xaf,0xff),
    (0x00,0xd7,0x00), (0x00,0xd7,0x5f), (0x00,0xd7,0x87), (0x00,0xd7,0xaf),
    (0x00,0xd7,0xd7), (0x00,0xd7,0xff), (0x00,0xff,0x00), (0x00,0xff,0x5f),
    (0x00,0xff,0x87), (0x00,0xff,0xaf), (0x00,0xff,0xd7), (0x00,0xff,0xff),
    (0x5f,0x00,0x00), (0x5f,0x00,0x5f), (0x5f,0x00,0x87), (0x5f,0x00,0xaf),
    (0x5f,0x00,0xd7), (0x5f,0x00,0xff), (0x5f,0x5f,0x00), (0x5f,0x5f,0x5f),
    (0x5f,0x5f,0x87), (0x5f,0x5f,0xaf), (0x5f,0x5f,0xd7), (0x5f,0x5f,0xff),
    (0x5f,0x87,0x00), (0x5f,0x87,0x5f), (0x5f,0x87,0x87), (0x5f,0x87,0xaf),
    (0x5f,0x87,0xd7), (0x5f,0x87,0xff), (0x5f,0xaf,0x00), (0x5f,0xaf,0x5f),
    (0x5f,0xaf,0x87), (0x5f,0xaf,0xaf), (0x5f,0xaf,0xd7), (0x5f,0xaf,0xff),
    (0x5f,0xd7,0x00), (0x5f,0xd7,0x5f), (0x5f,0xd7,0x87), (0x5f,0xd7,0xaf),
    (0x5f,0xd7,0xd7), (0x5f,0xd7,0xff), (0x5f,0xff,0x00), (0x5f,0xff,0x5f),
    (0x5f,0xff,0x87), (0x5f,0xff,0xaf), (0x5f,0xff,0xd7), (0x5f,0xff,0xff),
    (0x87,0x00,0x00), (0x87,0x00,0x5f), (0x87,0x00,0x87), (0x87,0x00,0xaf),
    (0x87,0x00,0xd7), (0x87,0x00,0xff), (0x87,0x5f,0x00), (0x87,0x5f,0x5f),
    (0x87,0x5f,0x87), (0x87,0x5f,0xaf), (0x87,0x5f,0xd7), (0x87,0x5f,0xff),
    (0x87,0x87,0x00), (0x87,0x87,0x5f), (0x87,0x87,0x87), (0x87,0x87,0xaf),
    (0x87,0x87,0xd7), (0x87,0x87,0xff), (0x87,0xaf,0x00), (0x87,0xaf,0x5f),
    (0x87,0xaf,0x87), (0x87,0xaf,0xaf), (0x87,0xaf,0xd7), (0x87,0xaf,0xff),
    (0x87,0xd7,0x00), (0x87,0xd7,0x5f), (0x87,0xd7,0x87), (0x87,0xd7,0xaf),
    (0x87,0xd7,0xd7), (0x87,0xd7,0xff), (0x87,0xff,0x00), (0x87,0xff,0x5f),
    (0x87,0xff,0x87), (0x87,0xff,0xaf), (0x87,0xff,0xd7), (0x87,0xff,0xff),
    (0xaf,0x00,0x00), (0xaf,0x00,0x5f), (0xaf,0x00,0x87), (0xaf,0x00,0xaf),
    (0xaf,0x00,0xd7), (0xaf,0x00,0xff), (0xaf,0x5f,0x00), (0xaf,0x5f,0x5f),
    (0xaf,0x5f,0x87), (0xaf,0x5f,0xaf), (0xaf,0x5f,0xd7), (0xaf,0x5f,0xff),
    (0xaf,0x87,0x00), (0xaf,0x87,0x5f), (0xaf,0x87,0x87), (0xaf,0x87,0xaf),
    (0xaf,0x87,0xd7), (0xaf,0x87,0xff), (0xaf,0xaf,0x00), (0xaf,0xaf,0x5f),
    (0xaf,0xaf,0x87), (0xaf,0xaf,0xaf), (0xaf,0xaf,0xd7), (0xaf,0xaf,0xff),
    (0xaf,0xd7,0x00), (0xaf,0xd7,0x5f), (0xaf,0xd7,0x87), (0xaf,0xd7,0xaf),
    (0xaf,0xd7,0xd7), (0xaf,0xd7,0xff), (0xaf,0xff,0x00), (0xaf,0xff,0x5f),
    (0xaf,0xff,0x87), (0xaf,0xff,0xaf), (0xaf,0xff,0xd7), (0xaf,0xff,0xff),
    (0xd7,0x00,0x00), (0xd7,0x00,0x5f), (0xd7,0x00,0x87), (0xd7,0x00,0xaf),
    (0xd7,0x00,0xd7), (0xd7,0x00,0xff), (0xd7,0x5f,0x00), (0xd7,0x5f,0x5f),
    (0xd7,0x5f,0x87), (0xd7,0x5f,0xaf), (0xd7,0x5f,0xd7), (0xd7,0x5f,0xff),
    (0xd7,0x87,0x00), (0xd7,0x87,0x5f), (0xd7,0x87,0x87), (0xd7,0x87,0xaf),
    (0xd7,0x87,0xd7), (0xd7,0x87,0xff), (0xd7,0xaf,0x00), (0xd7,0xaf,0x5f),
    (0xd7,0xaf,0x87), (0xd7,0xaf,0xaf), (0xd7,0xaf,0xd7), (0xd7,0xaf,0xff),
    (0xd7,0xd7,0x00), (0xd7,0xd7,0x5f), (0xd7,0xd7,0x87), (0xd7,0xd7,0xaf),
    (0xd7,0xd7,0xd7), (0xd7,0xd7,0xff), (0xd7,0xff,0x00), (0xd7,0xff,0x5f),
    (0xd7,0xff,0x87), (0xd7,0xff,0xaf), (0xd7,0xff,0xd7), (0xd7,0xff,0xff),
    (0xff,0x00,0x00), (0xff,0x00,0x5f), (0xff,0x00,0x87), (0xff,0x00,0xaf),
    (0xff,0x00,0xd7), (0xff,0x00,0xff), (0xff,0x5f,0x00), (0xff,0x5f,0x5f),
    (0xff,0x5f,0x87), (0xff,0x5f,0xaf), (0xff,0x5f,0xd7), (0xff,0x5f,0xff),
    (0xff,0x87,0x00), (0xff,0x87,0x5f), (0xff,0x87,0x87), (0xff,0x87,0xaf),
    (0xff,0x87,0xd7), (0xff,0x87,0xff), (0xff,0xaf,0x00), (0xff,0xaf,0x5f),
    (0xff,0xaf,0x87), (0xff,0xaf,0xaf), (0xff,0xaf,0xd7), (0xff,0xaf,0xff),
    (0xff,0xd7,0x00), (0xff,0xd7,0x5f), (0xff,0xd7,0x87), (0xff,0xd7,0xaf),
    (0xff,0xd7,0xd7), (0xff,0xd7,0xff), (0xff,0xff,0x00), (0xff,0xff,0x5f),
    (0xff,0xff,0x87), (0xff,0xff,0xaf), (0xff,0xff,0xd7), (0xff,0xff,0xff),
    (0x08,0x08,0x08), (0x12,0x12,0x12), (0x1c,0x1c,0x1c), (0x26,0x26,0x26),
    (0x30,0x30,0x30), (0x3a,0x3a,0x3a), (0x44,0x44,0x44), (0x4e,0x4e,0x4e),
    (0x58,0x58,0x58), (0x60,0x60,0x60), (0x66,0x66,0x66), (0x76,0x76,0x76),
    (0x80,0x80,0x80), (0x8a,0x8a,0x8a), (0x94,0x94,0x94), (0x9e,0x9e,0x9e),
    (0xa8,0xa8,0xa8), (0xb2,0xb2,0xb2), (0xbc,0xbc,0xbc), (0xc6,0xc6,0xc6),
    (0xd0,0xd0,0xd0), (0xda,0xda,0xda), (0xe4,0xe4,0xe4), (0xee,0xee,0xee),
];

// =============================================================================
// Tests
// =============================================================================

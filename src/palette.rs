//! Tile colors and the sources that generate them.
//!
//! A `Color` is an index into a `Palette`. The grid never stores names or
//! letters, only indices, so any palette size the engine accepts works with
//! every other module unchanged.
//!
//! Colors are produced by a `TileSource`. The engine uses `RandomTileSource`
//! in play; `ScriptedTileSource` replays a fixed script so cascades can be
//! reproduced exactly.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::EngineError;

/// Smallest palette the engine accepts. With fewer colors a match-free
/// refill is so unlikely that cascades would practically never settle.
pub const MIN_PALETTE_SIZE: usize = 3;

/// Largest palette that still has a distinct display letter per color.
/// Six named letters plus `EXTRA_LETTERS`.
pub const MAX_PALETTE_SIZE: usize = 36;

/// Palette size of the reference configuration.
pub const DEFAULT_PALETTE_SIZE: usize = 6;

/// Skin used when the host asks for one the palette does not know.
pub const DEFAULT_SKIN: &str = "orange";

// Letters for colors past the named ones; skips every named letter.
const EXTRA_LETTERS: &str = "ACDEFHIJKLMNQSTUVWXZ0123456789";

const NAMED_COLORS: [(&str, char); DEFAULT_PALETTE_SIZE] = [
    ("red", 'R'),
    ("blue", 'B'),
    ("green", 'G'),
    ("yellow", 'Y'),
    ("purple", 'P'),
    ("orange", 'O'),
];

/// A tile color, stored as its index into the palette.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Color(pub u8);

impl Color {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// ANSI background code used by the terminal display.
    pub(crate) fn ansi_background(self) -> &'static str {
        match self.0 % 6 {
            0 => "41",
            1 => "44",
            2 => "42",
            3 => "43",
            4 => "45",
            _ => "46",
        }
    }
}

/// The set of colors tiles are drawn from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    size: usize,
}

impl Palette {
    /// Creates a palette of `size` colors.
    ///
    /// The first six colors are the named reference colors; any further
    /// colors are anonymous and get the remaining letters and digits.
    ///
    /// # Examples
    /// ```
    /// use match3_engine::palette::{Color, Palette};
    /// let palette = Palette::new(6).unwrap();
    /// assert_eq!(palette.letter(Color(0)), 'R');
    /// assert_eq!(palette.name(Color(5)), Some("orange"));
    /// assert!(Palette::new(2).is_err());
    /// ```
    pub fn new(size: usize) -> Result<Self, EngineError> {
        if !(MIN_PALETTE_SIZE..=MAX_PALETTE_SIZE).contains(&size) {
            return Err(EngineError::PaletteSize {
                min: MIN_PALETTE_SIZE,
                max: MAX_PALETTE_SIZE,
                got: size,
            });
        }
        Ok(Palette { size })
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn colors(&self) -> impl Iterator<Item = Color> {
        (0..self.size as u8).map(Color)
    }

    pub fn contains(&self, color: Color) -> bool {
        color.index() < self.size
    }

    /// Name of a reference color, `None` for anonymous extra colors.
    pub fn name(&self, color: Color) -> Option<&'static str> {
        if !self.contains(color) {
            return None;
        }
        NAMED_COLORS.get(color.index()).map(|(name, _)| *name)
    }

    /// Single-character display letter for `color`.
    pub fn letter(&self, color: Color) -> char {
        match NAMED_COLORS.get(color.index()) {
            Some((_, letter)) => *letter,
            None => EXTRA_LETTERS
                .chars()
                .nth(color.index() - DEFAULT_PALETTE_SIZE)
                .unwrap_or('?'),
        }
    }

    /// Inverse of `letter`, case-insensitive.
    pub fn color_for_letter(&self, letter: char) -> Option<Color> {
        let upper = letter.to_ascii_uppercase();
        self.colors().find(|&color| self.letter(color) == upper)
    }

    /// Maps a host skin id onto a palette color name, falling back to
    /// `DEFAULT_SKIN` for ids the palette does not carry.
    pub fn resolve_skin(&self, skin: &str) -> String {
        let known = self
            .colors()
            .filter_map(|color| self.name(color))
            .any(|name| name.eq_ignore_ascii_case(skin));
        if known {
            skin.to_ascii_lowercase()
        } else {
            DEFAULT_SKIN.to_string()
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette {
            size: DEFAULT_PALETTE_SIZE,
        }
    }
}

/// Produces tile colors for grid construction, repair and refill.
///
/// Implementors only supply `next_index`; the color helpers are built on
/// top of it so every source picks colors the same way.
pub trait TileSource {
    /// Returns a value in `0..bound`. `bound` is never zero.
    fn next_index(&mut self, bound: usize) -> usize;

    /// Any color of the palette.
    fn next_color(&mut self, palette: &Palette) -> Color {
        Color(self.next_index(palette.len()) as u8)
    }

    /// A color not in `avoid`, or any color when `avoid` covers the palette.
    fn next_color_avoiding(&mut self, palette: &Palette, avoid: &[Color]) -> Color {
        let allowed: Vec<Color> = palette.colors().filter(|c| !avoid.contains(c)).collect();
        if allowed.is_empty() {
            return self.next_color(palette);
        }
        allowed[self.next_index(allowed.len())]
    }
}

/// Pseudo-random colors from a `SmallRng`.
#[derive(Clone, Debug)]
pub struct RandomTileSource {
    rng: SmallRng,
}

impl RandomTileSource {
    /// Reproducible source: the same seed always yields the same colors.
    pub fn with_seed(seed: u64) -> Self {
        RandomTileSource {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        RandomTileSource {
            rng: SmallRng::from_entropy(),
        }
    }
}

impl TileSource for RandomTileSource {
    fn next_index(&mut self, bound: usize) -> usize {
        self.rng.gen_range(0..bound)
    }
}

/// Replays a fixed script of indices, wrapping around at the end.
///
/// Each script entry is reduced modulo the requested bound, so a script of
/// color indices used for refill yields exactly those colors.
#[derive(Clone, Debug, Default)]
pub struct ScriptedTileSource {
    script: Vec<usize>,
    cursor: usize,
}

impl ScriptedTileSource {
    pub fn new(script: Vec<usize>) -> Self {
        ScriptedTileSource { script, cursor: 0 }
    }

    /// Builds a script from palette letters, e.g. `"RBGYPO"`.
    /// Unknown letters are skipped.
    pub fn from_letters(palette: &Palette, letters: &str) -> Self {
        let script = letters
            .chars()
            .filter_map(|ch| palette.color_for_letter(ch))
            .map(Color::index)
            .collect();
        ScriptedTileSource::new(script)
    }

    /// Number of values handed out so far.
    pub fn consumed(&self) -> usize {
        self.cursor
    }
}

impl TileSource for ScriptedTileSource {
    fn next_index(&mut self, bound: usize) -> usize {
        if self.script.is_empty() {
            return 0;
        }
        let value = self.script[self.cursor % self.script.len()];
        self.cursor += 1;
        value % bound
    }
}

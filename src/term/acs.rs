//! Alternate character set
//!
//! The `acsc` capability pairs VT100 graphic keys with the characters a
//! terminal prints for them while the alternate set is selected. The map is
//! parsed once into a table indexed by printable ASCII.

const FIRST: u32 = 0x20;
const LAST: u32 = 0x7e;
const SLOTS: usize = (LAST - FIRST + 1) as usize;

/// Printed when a symbol has no glyph.
pub const MISSING_GLYPH: char = '?';

/// Line-drawing and graphic symbols, keyed by their VT100 codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AltChar {
    UpperLeftCorner,
    LowerLeftCorner,
    UpperRightCorner,
    LowerRightCorner,
    LeftTee,
    RightTee,
    BottomTee,
    TopTee,
    HorizontalLine,
    VerticalLine,
    Plus,
    Scan1,
    Scan3,
    Scan7,
    Scan9,
    Diamond,
    Checkerboard,
    Degree,
    PlusMinus,
    Bullet,
    LeftArrow,
    RightArrow,
    DownArrow,
    UpArrow,
    Board,
    Lantern,
    Block,
    LessEqual,
    GreaterEqual,
    Pi,
    NotEqual,
    Sterling,
}

impl AltChar {
    /// The VT100 key for this symbol.
    pub fn key(self) -> char {
        match self {
            AltChar::UpperLeftCorner => 'l',
            AltChar::LowerLeftCorner => 'm',
            AltChar::UpperRightCorner => 'k',
            AltChar::LowerRightCorner => 'j',
            AltChar::LeftTee => 't',
            AltChar::RightTee => 'u',
            AltChar::BottomTee => 'v',
            AltChar::TopTee => 'w',
            AltChar::HorizontalLine => 'q',
            AltChar::VerticalLine => 'x',
            AltChar::Plus => 'n',
            AltChar::Scan1 => 'o',
            AltChar::Scan3 => 'p',
            AltChar::Scan7 => 'r',
            AltChar::Scan9 => 's',
            AltChar::Diamond => '`',
            AltChar::Checkerboard => 'a',
            AltChar::Degree => 'f',
            AltChar::PlusMinus => 'g',
            AltChar::Bullet => '~',
            AltChar::LeftArrow => ',',
            AltChar::RightArrow => '+',
            AltChar::DownArrow => '.',
            AltChar::UpArrow => '-',
            AltChar::Board => 'h',
            AltChar::Lantern => 'i',
            AltChar::Block => '0',
            AltChar::LessEqual => 'y',
            AltChar::GreaterEqual => 'z',
            AltChar::Pi => '{',
            AltChar::NotEqual => '|',
            AltChar::Sterling => '}',
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcsMap {
    glyphs: [Option<char>; SLOTS],
}

impl Default for AcsMap {
    fn default() -> Self {
        Self {
            glyphs: [None; SLOTS],
        }
    }
}

impl AcsMap {
    /// Parse an `acsc` string of key/glyph pairs. A trailing odd character
    /// and keys outside printable ASCII are ignored.
    pub fn parse(acsc: &str) -> Self {
        let mut map = Self::default();
        let mut chars = acsc.chars();
        while let (Some(key), Some(glyph)) = (chars.next(), chars.next()) {
            if let Some(slot) = slot(key) {
                map.glyphs[slot] = Some(glyph);
            }
        }
        map
    }

    /// Glyph for a raw VT100 key.
    pub fn glyph(&self, key: char) -> Option<char> {
        slot(key).and_then(|slot| self.glyphs[slot])
    }

    pub fn lookup(&self, symbol: AltChar) -> Option<char> {
        self.glyph(symbol.key())
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.iter().all(Option::is_none)
    }
}

fn slot(key: char) -> Option<usize> {
    let code = u32::from(key);
    (FIRST..=LAST)
        .contains(&code)
        .then(|| (code - FIRST) as usize)
}

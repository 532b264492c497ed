//! Console colors
//!
//! Sixteen symbolic colors, numbered like the Windows console attribute
//! nibble (bit 0 blue, bit 1 green, bit 2 red, bit 3 intensity). ANSI
//! terminals number the same colors red-green-blue, so the ANSI index is a
//! lookup rather than a cast.

use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConsoleColor {
    Black = 0,
    DarkBlue = 1,
    DarkGreen = 2,
    DarkCyan = 3,
    DarkRed = 4,
    DarkMagenta = 5,
    DarkYellow = 6,
    Gray = 7,
    DarkGray = 8,
    Blue = 9,
    Green = 10,
    Cyan = 11,
    Red = 12,
    Magenta = 13,
    Yellow = 14,
    White = 15,
}

bitflags! {
    /// Native console character attributes (`WORD` attribute).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ConsoleAttributes: u16 {
        const FOREGROUND_BLUE = 0x0001;
        const FOREGROUND_GREEN = 0x0002;
        const FOREGROUND_RED = 0x0004;
        const FOREGROUND_INTENSITY = 0x0008;
        const BACKGROUND_BLUE = 0x0010;
        const BACKGROUND_GREEN = 0x0020;
        const BACKGROUND_RED = 0x0040;
        const BACKGROUND_INTENSITY = 0x0080;

        const FOREGROUND_MASK = 0x000f;
        const BACKGROUND_MASK = 0x00f0;

        // Bits above the color nibbles (grid lines, reverse video, ...)
        const _ = !0;
    }
}

impl ConsoleAttributes {
    /// Replace the foreground nibble, keeping every other bit.
    pub fn with_foreground(self, color: ConsoleColor) -> Self {
        (self - Self::FOREGROUND_MASK) | color.foreground_attributes()
    }

    /// Replace the background nibble, keeping every other bit.
    pub fn with_background(self, color: ConsoleColor) -> Self {
        (self - Self::BACKGROUND_MASK) | color.background_attributes()
    }

    pub fn foreground(self) -> ConsoleColor {
        ConsoleColor::from_index((self.bits() & 0x0f) as u8)
    }

    pub fn background(self) -> ConsoleColor {
        ConsoleColor::from_index(((self.bits() >> 4) & 0x0f) as u8)
    }
}

/// Native attribute word for a color pair.
pub fn native_attributes(foreground: ConsoleColor, background: ConsoleColor) -> ConsoleAttributes {
    foreground.foreground_attributes() | background.background_attributes()
}

impl ConsoleColor {
    pub const ALL: [ConsoleColor; 16] = [
        ConsoleColor::Black,
        ConsoleColor::DarkBlue,
        ConsoleColor::DarkGreen,
        ConsoleColor::DarkCyan,
        ConsoleColor::DarkRed,
        ConsoleColor::DarkMagenta,
        ConsoleColor::DarkYellow,
        ConsoleColor::Gray,
        ConsoleColor::DarkGray,
        ConsoleColor::Blue,
        ConsoleColor::Green,
        ConsoleColor::Cyan,
        ConsoleColor::Red,
        ConsoleColor::Magenta,
        ConsoleColor::Yellow,
        ConsoleColor::White,
    ];

    /// Color for a native attribute nibble; only the low four bits are used.
    pub fn from_index(index: u8) -> Self {
        Self::ALL[usize::from(index & 0x0f)]
    }

    /// Index in the 16-color ANSI palette (`setaf` / `setab`).
    pub fn ansi16(self) -> u8 {
        match self {
            ConsoleColor::Black => 0,
            ConsoleColor::DarkRed => 1,
            ConsoleColor::DarkGreen => 2,
            ConsoleColor::DarkYellow => 3,
            ConsoleColor::DarkBlue => 4,
            ConsoleColor::DarkMagenta => 5,
            ConsoleColor::DarkCyan => 6,
            ConsoleColor::Gray => 7,
            ConsoleColor::DarkGray => 8,
            ConsoleColor::Red => 9,
            ConsoleColor::Green => 10,
            ConsoleColor::Yellow => 11,
            ConsoleColor::Blue => 12,
            ConsoleColor::Magenta => 13,
            ConsoleColor::Cyan => 14,
            ConsoleColor::White => 15,
        }
    }

    /// Index in the 8-color ANSI palette; intensity is dropped.
    pub fn ansi8(self) -> u8 {
        self.ansi16() & 0x07
    }

    /// Index for the legacy `setf` / `setb` capabilities, which use the
    /// blue-green-red order of the native console.
    pub fn legacy8(self) -> u8 {
        self as u8 & 0x07
    }

    pub fn foreground_attributes(self) -> ConsoleAttributes {
        ConsoleAttributes::from_bits_retain(u16::from(self as u8))
    }

    pub fn background_attributes(self) -> ConsoleAttributes {
        ConsoleAttributes::from_bits_retain(u16::from(self as u8) << 4)
    }

    pub fn name(self) -> &'static str {
        match self {
            ConsoleColor::Black => "black",
            ConsoleColor::DarkBlue => "dark-blue",
            ConsoleColor::DarkGreen => "dark-green",
            ConsoleColor::DarkCyan => "dark-cyan",
            ConsoleColor::DarkRed => "dark-red",
            ConsoleColor::DarkMagenta => "dark-magenta",
            ConsoleColor::DarkYellow => "dark-yellow",
            ConsoleColor::Gray => "gray",
            ConsoleColor::DarkGray => "dark-gray",
            ConsoleColor::Blue => "blue",
            ConsoleColor::Green => "green",
            ConsoleColor::Cyan => "cyan",
            ConsoleColor::Red => "red",
            ConsoleColor::Magenta => "magenta",
            ConsoleColor::Yellow => "yellow",
            ConsoleColor::White => "white",
        }
    }
}

//! Terminal capabilities
//!
//! A small built-in terminal database keyed by `TERM`, with per-capability
//! overrides layered on top from the configuration file. Capability names
//! follow terminfo.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::{debug, warn};

use super::tparm::Template;

/// String capabilities the console uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    CursorAddress,
    CursorUp,
    CursorDown,
    CursorBack,
    CursorForward,
    CursorInvisible,
    CursorNormal,
    CursorVeryVisible,
    ClearScreen,
    ClearScrollback,
    ClearToEndOfScreen,
    ClearToStartOfScreen,
    ClearToEndOfLine,
    ClearToStartOfLine,
    ClearLine,
    SetAnsiForeground,
    SetAnsiBackground,
    SetForeground,
    SetBackground,
    OriginalPair,
    Bell,
    ToStatusLine,
    FromStatusLine,
    CursorPositionRequest,
    EnterAltCharset,
    ExitAltCharset,
}

impl Capability {
    pub const ALL: [Capability; 26] = [
        Capability::CursorAddress,
        Capability::CursorUp,
        Capability::CursorDown,
        Capability::CursorBack,
        Capability::CursorForward,
        Capability::CursorInvisible,
        Capability::CursorNormal,
        Capability::CursorVeryVisible,
        Capability::ClearScreen,
        Capability::ClearScrollback,
        Capability::ClearToEndOfScreen,
        Capability::ClearToStartOfScreen,
        Capability::ClearToEndOfLine,
        Capability::ClearToStartOfLine,
        Capability::ClearLine,
        Capability::SetAnsiForeground,
        Capability::SetAnsiBackground,
        Capability::SetForeground,
        Capability::SetBackground,
        Capability::OriginalPair,
        Capability::Bell,
        Capability::ToStatusLine,
        Capability::FromStatusLine,
        Capability::CursorPositionRequest,
        Capability::EnterAltCharset,
        Capability::ExitAltCharset,
    ];

    /// The terminfo name.
    pub fn name(self) -> &'static str {
        match self {
            Capability::CursorAddress => "cup",
            Capability::CursorUp => "cuu",
            Capability::CursorDown => "cud",
            Capability::CursorBack => "cub",
            Capability::CursorForward => "cuf",
            Capability::CursorInvisible => "civis",
            Capability::CursorNormal => "cnorm",
            Capability::CursorVeryVisible => "cvvis",
            Capability::ClearScreen => "clear",
            Capability::ClearScrollback => "E3",
            Capability::ClearToEndOfScreen => "ed",
            Capability::ClearToStartOfScreen => "ed1",
            Capability::ClearToEndOfLine => "el",
            Capability::ClearToStartOfLine => "el1",
            Capability::ClearLine => "el2",
            Capability::SetAnsiForeground => "setaf",
            Capability::SetAnsiBackground => "setab",
            Capability::SetForeground => "setf",
            Capability::SetBackground => "setb",
            Capability::OriginalPair => "op",
            Capability::Bell => "bel",
            Capability::ToStatusLine => "tsl",
            Capability::FromStatusLine => "fsl",
            Capability::CursorPositionRequest => "u7",
            Capability::EnterAltCharset => "smacs",
            Capability::ExitAltCharset => "rmacs",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|cap| cap.name() == name)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type Table = &'static [(Capability, &'static str)];

const ANSI_MOTION: Table = &[
    (Capability::CursorAddress, "\x1b[%i%p1%d;%p2%dH"),
    (Capability::CursorUp, "\x1b[%p1%dA"),
    (Capability::CursorDown, "\x1b[%p1%dB"),
    (Capability::CursorForward, "\x1b[%p1%dC"),
    (Capability::CursorBack, "\x1b[%p1%dD"),
    (Capability::ClearToEndOfScreen, "\x1b[J"),
    (Capability::ClearToStartOfScreen, "\x1b[1J"),
    (Capability::ClearToEndOfLine, "\x1b[K"),
    (Capability::ClearToStartOfLine, "\x1b[1K"),
    (Capability::ClearLine, "\x1b[2K"),
    (Capability::Bell, "\x07"),
    (Capability::CursorPositionRequest, "\x1b[6n"),
];

const XTERM: Table = &[
    (Capability::CursorInvisible, "\x1b[?25l"),
    (Capability::CursorNormal, "\x1b[?12l\x1b[?25h"),
    (Capability::CursorVeryVisible, "\x1b[?12;25h"),
    (Capability::ClearScreen, "\x1b[H\x1b[2J"),
    (Capability::ClearScrollback, "\x1b[3J"),
    (
        Capability::SetAnsiForeground,
        "\x1b[%?%p1%{8}%<%t3%p1%d%e%p1%{16}%<%t9%p1%{8}%-%d%e38;5;%p1%d%;m",
    ),
    (
        Capability::SetAnsiBackground,
        "\x1b[%?%p1%{8}%<%t4%p1%d%e%p1%{16}%<%t10%p1%{8}%-%d%e48;5;%p1%d%;m",
    ),
    (Capability::OriginalPair, "\x1b[39;49m"),
    (Capability::ToStatusLine, "\x1b]0;"),
    (Capability::FromStatusLine, "\x07"),
    (Capability::EnterAltCharset, "\x1b(0"),
    (Capability::ExitAltCharset, "\x1b(B"),
];

const MS_TERMINAL: Table = &[
    (Capability::CursorInvisible, "\x1b[?25l"),
    (Capability::CursorNormal, "\x1b[?25h"),
    (Capability::CursorVeryVisible, "\x1b[?25h"),
    (Capability::ClearScreen, "\x1b[H\x1b[2J"),
    (Capability::ClearScrollback, "\x1b[3J"),
    (
        Capability::SetAnsiForeground,
        "\x1b[%?%p1%{8}%<%t3%p1%d%e%p1%{16}%<%t9%p1%{8}%-%d%e38;5;%p1%d%;m",
    ),
    (
        Capability::SetAnsiBackground,
        "\x1b[%?%p1%{8}%<%t4%p1%d%e%p1%{16}%<%t10%p1%{8}%-%d%e48;5;%p1%d%;m",
    ),
    (Capability::OriginalPair, "\x1b[39;49m"),
    (Capability::ToStatusLine, "\x1b]0;"),
    (Capability::FromStatusLine, "\x07"),
    (Capability::EnterAltCharset, "\x1b(0"),
    (Capability::ExitAltCharset, "\x1b(B"),
];

const LINUX: Table = &[
    (Capability::CursorInvisible, "\x1b[?25l\x1b[?1c"),
    (Capability::CursorNormal, "\x1b[?25h\x1b[?0c"),
    (Capability::CursorVeryVisible, "\x1b[?25h\x1b[?8c"),
    (Capability::ClearScreen, "\x1b[H\x1b[J"),
    (Capability::ClearScrollback, "\x1b[3J"),
    (Capability::SetAnsiForeground, "\x1b[3%p1%dm"),
    (Capability::SetAnsiBackground, "\x1b[4%p1%dm"),
    (Capability::OriginalPair, "\x1b[39;49m"),
    (Capability::EnterAltCharset, "\x0e"),
    (Capability::ExitAltCharset, "\x0f"),
];

const VT100: Table = &[
    (Capability::ClearScreen, "\x1b[H\x1b[J"),
    (Capability::EnterAltCharset, "\x0e"),
    (Capability::ExitAltCharset, "\x0f"),
];

const DUMB: Table = &[(Capability::Bell, "\x07")];

const XTERM_ACSC: &str = "``aaffggiijjkkllmmnnooppqqrrssttuuvvwwxxyyzz{{||}}~~";
const LINUX_ACSC: &str =
    "++,,--..00__``aaffgghhiijjkkllmmnnooppqqrrssttuuvvwwxxyyzz{{||}c~~";
const VT100_ACSC: &str = "``aaffggjjkkllmmnnooppqqrrssttuuvvwwxxyyzz{{||}}~~";

/// Resolved capabilities for one terminal type.
#[derive(Debug, Clone)]
pub struct TerminalCapabilities {
    name: String,
    strings: HashMap<Capability, String>,
    acsc: Option<String>,
    cols: Option<u16>,
    lines: Option<u16>,
    colors: Option<u16>,
}

impl TerminalCapabilities {
    fn from_tables(name: &str, tables: &[Table]) -> Self {
        let strings = tables
            .iter()
            .flat_map(|table| table.iter())
            .map(|&(cap, text)| (cap, text.to_string()))
            .collect();
        Self {
            name: name.to_string(),
            strings,
            acsc: None,
            cols: Some(80),
            lines: Some(24),
            colors: None,
        }
    }

    /// Look up the built-in description for `name`.
    ///
    /// Unknown names get the xterm description.
    pub fn builtin(name: &str) -> Self {
        let family = name.split('-').next().unwrap_or(name);
        let mut caps = match family {
            "xterm" | "screen" | "tmux" | "rxvt" | "alacritty" | "kitty" | "wezterm" | "foot"
            | "st" | "konsole" | "gnome" | "vte" => Self::xterm(name),
            "ms" if name == "ms-terminal" => {
                let mut caps = Self::from_tables(name, &[ANSI_MOTION, MS_TERMINAL]);
                caps.acsc = Some(XTERM_ACSC.to_string());
                caps.colors = Some(256);
                caps.cols = Some(120);
                caps.lines = Some(30);
                caps
            }
            "linux" => {
                let mut caps = Self::from_tables(name, &[ANSI_MOTION, LINUX]);
                caps.acsc = Some(LINUX_ACSC.to_string());
                caps.colors = Some(8);
                caps
            }
            "vt100" | "vt102" | "vt220" => {
                let mut caps = Self::from_tables(name, &[ANSI_MOTION, VT100]);
                caps.acsc = Some(VT100_ACSC.to_string());
                caps
            }
            "dumb" => Self::from_tables(name, &[DUMB]),
            _ => {
                warn!(terminal = name, "unknown terminal type, using xterm capabilities");
                Self::xterm(name)
            }
        };
        caps.name = name.to_string();
        debug!(
            terminal = name,
            capabilities = caps.strings.len(),
            colors = ?caps.colors,
            "terminal capabilities resolved"
        );
        caps
    }

    fn xterm(name: &str) -> Self {
        let mut caps = Self::from_tables(name, &[ANSI_MOTION, XTERM]);
        caps.acsc = Some(XTERM_ACSC.to_string());
        let rich = name.contains("256color")
            || name.contains("direct")
            || ["alacritty", "kitty", "wezterm", "foot"]
                .iter()
                .any(|family| name.starts_with(family));
        caps.colors = Some(if rich { 256 } else { 8 });
        caps
    }

    /// Apply `name = template` overrides. `acsc`, `cols`, `lines` and
    /// `colors` are accepted as well; unknown names are ignored with a warning.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, String>) -> Self {
        for (key, value) in overrides {
            match key.as_str() {
                "acsc" => self.acsc = Some(value.clone()),
                "cols" | "lines" | "colors" => match value.trim().parse::<u16>() {
                    Ok(n) if key == "cols" => self.cols = Some(n),
                    Ok(n) if key == "lines" => self.lines = Some(n),
                    Ok(n) => self.colors = Some(n),
                    Err(_) => warn!(capability = %key, value = %value, "not a number, ignored"),
                },
                _ => match Capability::from_name(key) {
                    Some(cap) if value.is_empty() => {
                        self.strings.remove(&cap);
                    }
                    Some(cap) => {
                        self.strings.insert(cap, value.clone());
                    }
                    None => warn!(capability = %key, "unknown capability override ignored"),
                },
            }
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lookup(&self, cap: Capability) -> Option<Template<'_>> {
        self.strings.get(&cap).map(|s| Template::new(s))
    }

    pub fn has(&self, cap: Capability) -> bool {
        self.strings.contains_key(&cap)
    }

    /// The raw alternate character set key/glyph string.
    pub fn acsc(&self) -> Option<&str> {
        self.acsc.as_deref()
    }

    pub fn cols(&self) -> Option<u16> {
        self.cols
    }

    pub fn lines(&self) -> Option<u16> {
        self.lines
    }

    pub fn colors(&self) -> Option<u16> {
        self.colors
    }
}

/// `TERM`, or the platform's console type when unset.
pub fn default_terminal_name() -> String {
    match std::env::var("TERM") {
        Ok(term) if !term.is_empty() => term,
        _ if cfg!(windows) => "ms-terminal".to_string(),
        _ => "xterm".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trip() {
        for cap in Capability::ALL {
            assert_eq!(Capability::from_name(cap.name()), Some(cap));
        }
        assert_eq!(Capability::from_name("nope"), None);
    }

    #[test]
    fn test_xterm_family() {
        let caps = TerminalCapabilities::builtin("xterm-256color");
        assert_eq!(caps.name(), "xterm-256color");
        assert_eq!(caps.colors(), Some(256));
        let cup = caps.lookup(Capability::CursorAddress).unwrap();
        assert_eq!(cup.expand(&[4, 9]).unwrap(), "\x1b[5;10H");
        assert_eq!(
            caps.lookup(Capability::CursorPositionRequest).unwrap().source(),
            "\x1b[6n"
        );

        assert_eq!(TerminalCapabilities::builtin("xterm").colors(), Some(8));
        assert_eq!(TerminalCapabilities::builtin("tmux-256color").colors(), Some(256));
        assert!(TerminalCapabilities::builtin("screen").has(Capability::EnterAltCharset));
    }

    #[test]
    fn test_unknown_falls_back_to_xterm() {
        let caps = TerminalCapabilities::builtin("no-such-terminal");
        assert_eq!(caps.name(), "no-such-terminal");
        assert!(caps.has(Capability::CursorAddress));
        assert!(caps.acsc().is_some());
    }

    #[test]
    fn test_dumb_has_almost_nothing() {
        let caps = TerminalCapabilities::builtin("dumb");
        assert!(caps.lookup(Capability::CursorPositionRequest).is_none());
        assert!(caps.lookup(Capability::CursorAddress).is_none());
        assert!(caps.has(Capability::Bell));
        assert_eq!(caps.cols(), Some(80));
        assert_eq!(caps.acsc(), None);
    }

    #[test]
    fn test_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert("u7".to_string(), String::new());
        overrides.insert("civis".to_string(), "\x1b[?25l\x1b[?1c".to_string());
        overrides.insert("colors".to_string(), "16".to_string());
        overrides.insert("cols".to_string(), "wide".to_string());
        overrides.insert("bogus".to_string(), "x".to_string());

        let caps = TerminalCapabilities::builtin("xterm").with_overrides(&overrides);
        assert!(!caps.has(Capability::CursorPositionRequest));
        assert_eq!(
            caps.lookup(Capability::CursorInvisible).unwrap().source(),
            "\x1b[?25l\x1b[?1c"
        );
        assert_eq!(caps.colors(), Some(16));
        assert_eq!(caps.cols(), Some(80));
    }
}

//! Console backends
//!
//! Two implementations of [`ConsoleBackend`] sit behind the facade:
//!
//! - **native**: Windows console API calls (attribute words, explicit
//!   coordinates, screen-buffer info). Windows only.
//! - **ansi**: capability templates written through the [`EscapeEmitter`],
//!   cursor position read back with the CPR protocol.
//!
//! The choice is made once, when the console is opened.
//!
//! [`EscapeEmitter`]: emitter::EscapeEmitter

pub mod ansi;
pub mod emitter;
#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

use std::io::{self, IsTerminal, Write};

use crate::core::cpr::CursorPosition;
use crate::core::error::Result;
use crate::term::color::ConsoleColor;

/// Environment variable that forces the ANSI backend on Windows.
pub const FORCE_ANSI_ENV: &str = "TINYCONSOLE_FORCE_ANSI";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Native,
    Ansi,
}

impl BackendKind {
    /// Native on Windows unless ANSI is forced, ANSI everywhere else.
    pub fn select(force_ansi: bool) -> Self {
        if cfg!(windows) && !force_ansi {
            BackendKind::Native
        } else {
            BackendKind::Ansi
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Native => "native",
            BackendKind::Ansi => "ansi",
        }
    }
}

/// Whether the `force-ansi` feature, the environment or the configuration
/// asks for escape codes on Windows.
pub fn force_ansi_requested(configured: bool) -> bool {
    cfg!(feature = "force-ansi")
        || configured
        || std::env::var(FORCE_ANSI_ENV)
            .map(|v| !matches!(v.trim(), "" | "0" | "false" | "no"))
            .unwrap_or(false)
}

/// Which standard streams are redirected away from the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RedirectionState {
    pub input: bool,
    pub output: bool,
    pub error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputChannel {
    Stdout,
    Stderr,
}

impl OutputChannel {
    pub fn writer(self) -> Box<dyn Write + Send> {
        match self {
            OutputChannel::Stdout => Box::new(io::stdout()),
            OutputChannel::Stderr => Box::new(io::stderr()),
        }
    }
}

impl RedirectionState {
    pub fn detect() -> Self {
        Self {
            input: !io::stdin().is_terminal(),
            output: !io::stdout().is_terminal(),
            error: !io::stderr().is_terminal(),
        }
    }

    /// Nothing redirected.
    pub fn terminal() -> Self {
        Self::default()
    }

    /// Escape sequences need stdout or stderr to reach the terminal.
    pub fn escapes_available(&self) -> bool {
        !(self.output && self.error)
    }

    /// Stream for text and escapes: stdout, or stderr when stdout is redirected.
    pub fn text_channel(&self) -> OutputChannel {
        if self.output {
            OutputChannel::Stderr
        } else {
            OutputChannel::Stdout
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorVisibility {
    Invisible,
    Normal,
    HighVisibility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorDirection {
    Up,
    Down,
    Back,
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseMode {
    FromCursorToEndOfScreen,
    FromBeginningOfScreenToCursor,
    EntireScreen,
    EntireConsoleBuffer,
    FromCursorToEndOfLine,
    FromBeginningOfLineToCursor,
    EntireLine,
}

impl EraseMode {
    pub const ALL: [EraseMode; 7] = [
        EraseMode::FromCursorToEndOfScreen,
        EraseMode::FromBeginningOfScreenToCursor,
        EraseMode::EntireScreen,
        EraseMode::EntireConsoleBuffer,
        EraseMode::FromCursorToEndOfLine,
        EraseMode::FromBeginningOfLineToCursor,
        EraseMode::EntireLine,
    ];

    /// Short name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            EraseMode::FromCursorToEndOfScreen => "screen-end",
            EraseMode::FromBeginningOfScreenToCursor => "screen-start",
            EraseMode::EntireScreen => "screen",
            EraseMode::EntireConsoleBuffer => "buffer",
            EraseMode::FromCursorToEndOfLine => "line-end",
            EraseMode::FromBeginningOfLineToCursor => "line-start",
            EraseMode::EntireLine => "line",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|mode| mode.name() == name)
    }
}

/// Operations both backends implement.
///
/// Text output and the alternate character set go through the shared
/// emitter and are not part of this trait.
pub trait ConsoleBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn foreground(&self) -> Result<ConsoleColor>;
    fn background(&self) -> Result<ConsoleColor>;
    fn set_foreground(&self, color: ConsoleColor) -> Result<()>;
    fn set_background(&self, color: ConsoleColor) -> Result<()>;
    fn reset_color(&self) -> Result<()>;

    fn set_cursor_visibility(&self, visibility: CursorVisibility) -> Result<()>;
    fn cursor_position(&self) -> Result<CursorPosition>;
    fn set_cursor_position(&self, left: u16, top: u16) -> Result<()>;
    /// Move the cursor `count` cells; zero is a no-op.
    fn move_cursor(&self, direction: CursorDirection, count: u16) -> Result<()>;

    /// `(width, height)` of the window in cells.
    fn window_size(&self) -> Result<(u16, u16)>;
    fn set_title(&self, title: &str) -> Result<()>;
    fn beep(&self) -> Result<()>;
    fn erase(&self, mode: EraseMode) -> Result<()>;
}

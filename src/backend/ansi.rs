//! ANSI escape code backend
//!
//! Every operation is a capability template written through the shared
//! [`EscapeEmitter`]. Terminals cannot report their colors, so the current
//! pair is tracked here; the cursor position is read back with a CPR query.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::emitter::EscapeEmitter;
use super::{BackendKind, ConsoleBackend, CursorDirection, CursorVisibility, EraseMode};
use crate::core::cpr::{CursorPosition, CursorQuery};
use crate::core::error::{ConsoleError, Result};
use crate::core::input::ConsoleInput;
use crate::core::token::Token;
use crate::term::caps::Capability;
use crate::term::color::ConsoleColor;

/// Live window size, `None` when the terminal cannot be asked.
pub type SizeProbe = Box<dyn Fn() -> Option<(u16, u16)> + Send + Sync>;

pub const DEFAULT_FOREGROUND: ConsoleColor = ConsoleColor::Gray;
pub const DEFAULT_BACKGROUND: ConsoleColor = ConsoleColor::Black;

pub struct AnsiBackend<T: Token> {
    emitter: Arc<EscapeEmitter>,
    input: Arc<ConsoleInput<T>>,
    query: CursorQuery<T>,
    input_redirected: bool,
    size_probe: Option<SizeProbe>,
    foreground: AtomicU8,
    background: AtomicU8,
}

impl<T: Token> AnsiBackend<T> {
    pub fn new(
        emitter: Arc<EscapeEmitter>,
        input: Arc<ConsoleInput<T>>,
        query: CursorQuery<T>,
        input_redirected: bool,
    ) -> Self {
        Self {
            emitter,
            input,
            query,
            input_redirected,
            size_probe: None,
            foreground: AtomicU8::new(DEFAULT_FOREGROUND as u8),
            background: AtomicU8::new(DEFAULT_BACKGROUND as u8),
        }
    }

    pub fn with_size_probe(mut self, probe: SizeProbe) -> Self {
        self.size_probe = Some(probe);
        self
    }

    pub fn query(&self) -> &CursorQuery<T> {
        &self.query
    }

    /// `setaf`/`setab` with the palette the terminal supports, else the
    /// legacy `setf`/`setb`.
    fn apply_color(&self, color: ConsoleColor, background: bool) -> Result<()> {
        let caps = self.emitter.capabilities();
        let (ansi, legacy) = if background {
            (Capability::SetAnsiBackground, Capability::SetBackground)
        } else {
            (Capability::SetAnsiForeground, Capability::SetForeground)
        };
        let operation = if background {
            "set the background color"
        } else {
            "set the foreground color"
        };

        if caps.has(ansi) {
            let index = if caps.colors().unwrap_or(8) >= 16 {
                color.ansi16()
            } else {
                color.ansi8()
            };
            self.emitter.emit(ansi, &[i32::from(index)], operation)
        } else if caps.has(legacy) {
            self.emitter
                .emit(legacy, &[i32::from(color.legacy8())], operation)
        } else {
            Err(self.emitter.unsupported(ansi.name()))
        }
    }

    fn tracked(&self, slot: &AtomicU8, operation: &'static str) -> Result<ConsoleColor> {
        if !self.emitter.escapes_available() {
            return Err(ConsoleError::OutputUnavailable { operation });
        }
        Ok(ConsoleColor::from_index(slot.load(Ordering::Acquire)))
    }
}

impl<T: Token> ConsoleBackend for AnsiBackend<T> {
    fn kind(&self) -> BackendKind {
        BackendKind::Ansi
    }

    fn foreground(&self) -> Result<ConsoleColor> {
        self.tracked(&self.foreground, "get the foreground color")
    }

    fn background(&self) -> Result<ConsoleColor> {
        self.tracked(&self.background, "get the background color")
    }

    fn set_foreground(&self, color: ConsoleColor) -> Result<()> {
        self.apply_color(color, false)?;
        self.foreground.store(color as u8, Ordering::Release);
        Ok(())
    }

    fn set_background(&self, color: ConsoleColor) -> Result<()> {
        self.apply_color(color, true)?;
        self.background.store(color as u8, Ordering::Release);
        Ok(())
    }

    fn reset_color(&self) -> Result<()> {
        if self.emitter.capabilities().has(Capability::OriginalPair) {
            self.emitter
                .emit(Capability::OriginalPair, &[], "reset the colors")?;
        } else {
            self.apply_color(DEFAULT_FOREGROUND, false)?;
            self.apply_color(DEFAULT_BACKGROUND, true)?;
        }
        self.foreground
            .store(DEFAULT_FOREGROUND as u8, Ordering::Release);
        self.background
            .store(DEFAULT_BACKGROUND as u8, Ordering::Release);
        Ok(())
    }

    fn set_cursor_visibility(&self, visibility: CursorVisibility) -> Result<()> {
        let caps = self.emitter.capabilities();
        let cap = match visibility {
            CursorVisibility::Invisible => Capability::CursorInvisible,
            CursorVisibility::Normal => Capability::CursorNormal,
            CursorVisibility::HighVisibility if caps.has(Capability::CursorVeryVisible) => {
                Capability::CursorVeryVisible
            }
            CursorVisibility::HighVisibility => Capability::CursorNormal,
        };
        self.emitter.emit(cap, &[], "change the cursor visibility")
    }

    fn cursor_position(&self) -> Result<CursorPosition> {
        const OPERATION: &str = "get the cursor position";
        if self.input_redirected {
            return Err(ConsoleError::InputUnavailable {
                operation: OPERATION,
            });
        }
        let request = self
            .emitter
            .render(Capability::CursorPositionRequest, &[])?;
        let mut writer = self.emitter.escape_writer(OPERATION)?;
        let position = self
            .input
            .query_cursor(&self.query, &request, &mut **writer)?;
        debug!(left = position.left, top = position.top, "cursor position");
        Ok(position)
    }

    fn set_cursor_position(&self, left: u16, top: u16) -> Result<()> {
        self.emitter.emit(
            Capability::CursorAddress,
            &[i32::from(top), i32::from(left)],
            "set the cursor position",
        )
    }

    fn move_cursor(&self, direction: CursorDirection, count: u16) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let cap = match direction {
            CursorDirection::Up => Capability::CursorUp,
            CursorDirection::Down => Capability::CursorDown,
            CursorDirection::Back => Capability::CursorBack,
            CursorDirection::Forward => Capability::CursorForward,
        };
        self.emitter
            .emit(cap, &[i32::from(count)], "move the cursor")
    }

    fn window_size(&self) -> Result<(u16, u16)> {
        if let Some((width, height)) = self.size_probe.as_ref().and_then(|probe| probe()) {
            if width > 0 && height > 0 {
                return Ok((width, height));
            }
        }
        let caps = self.emitter.capabilities();
        let width = caps.cols().ok_or_else(|| self.emitter.unsupported("cols"))?;
        let height = caps
            .lines()
            .ok_or_else(|| self.emitter.unsupported("lines"))?;
        Ok((width, height))
    }

    fn set_title(&self, title: &str) -> Result<()> {
        const OPERATION: &str = "set the window title";
        let start = self.emitter.render(Capability::ToStatusLine, &[])?;
        let end = self.emitter.render(Capability::FromStatusLine, &[])?;
        self.emitter
            .emit_raw(&format!("{start}{title}{end}"), OPERATION)
    }

    fn beep(&self) -> Result<()> {
        self.emitter.emit(Capability::Bell, &[], "beep")
    }

    fn erase(&self, mode: EraseMode) -> Result<()> {
        const OPERATION: &str = "erase the console";
        let cap = match mode {
            EraseMode::FromCursorToEndOfScreen => Capability::ClearToEndOfScreen,
            EraseMode::FromBeginningOfScreenToCursor => Capability::ClearToStartOfScreen,
            EraseMode::EntireScreen => Capability::ClearScreen,
            EraseMode::FromCursorToEndOfLine => Capability::ClearToEndOfLine,
            EraseMode::FromBeginningOfLineToCursor => Capability::ClearToStartOfLine,
            EraseMode::EntireLine => Capability::ClearLine,
            EraseMode::EntireConsoleBuffer => {
                // clear + E3; terminals without E3 only lose the screen.
                let mut text = self.emitter.render(Capability::ClearScreen, &[])?;
                if let Ok(scrollback) = self.emitter.render(Capability::ClearScrollback, &[]) {
                    text.push_str(&scrollback);
                }
                return self.emitter.emit_raw(&text, OPERATION);
            }
        };
        self.emitter.emit(cap, &[], OPERATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cpr::{QueryTiming, TokenSource, DEFAULT_SCAN_CAPACITY};
    use crate::core::error::ErrorKind;
    use crate::term::caps::TerminalCapabilities;
    use std::collections::BTreeMap;
    use std::io::{self, Write};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn take(&self) -> String {
            String::from_utf8(std::mem::take(&mut *self.0.lock().unwrap())).unwrap()
        }
    }

    struct Silent;

    impl TokenSource<u8> for Silent {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn read_reply_token(&mut self) -> io::Result<Option<u8>> {
            Ok(None)
        }
    }

    fn backend(caps: TerminalCapabilities) -> (AnsiBackend<u8>, Capture) {
        let out = Capture::default();
        let emitter = Arc::new(EscapeEmitter::new(caps, Box::new(out.clone()), true));
        let input = Arc::new(ConsoleInput::new(Box::new(Silent)));
        let query = CursorQuery::new(QueryTiming::default(), DEFAULT_SCAN_CAPACITY);
        (AnsiBackend::new(emitter, input, query, false), out)
    }

    #[test]
    fn test_high_visibility_falls_back_to_normal() {
        let mut overrides = BTreeMap::new();
        overrides.insert("cvvis".to_string(), String::new());
        let caps = TerminalCapabilities::builtin("xterm").with_overrides(&overrides);
        let (backend, out) = backend(caps);
        backend
            .set_cursor_visibility(CursorVisibility::HighVisibility)
            .unwrap();
        assert_eq!(out.take(), "\x1b[?12l\x1b[?25h");
    }

    #[test]
    fn test_buffer_clear_without_scrollback_capability() {
        let (backend, out) = backend(TerminalCapabilities::builtin("vt100"));
        backend.erase(EraseMode::EntireConsoleBuffer).unwrap();
        assert_eq!(out.take(), "\x1b[H\x1b[J");
    }

    #[test]
    fn test_empty_probe_result_uses_capabilities() {
        let (backend, _) = backend(TerminalCapabilities::builtin("linux"));
        let backend = backend.with_size_probe(Box::new(|| Some((0, 0))));
        assert_eq!(backend.window_size().unwrap(), (80, 24));
    }

    #[test]
    fn test_failed_color_is_not_tracked() {
        let (backend, _) = backend(TerminalCapabilities::builtin("dumb"));
        let err = backend.set_background(ConsoleColor::Blue).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedCapability);
        assert_eq!(backend.background().unwrap(), DEFAULT_BACKGROUND);
    }

    #[test]
    fn test_silent_terminal_leaves_scanner_idle() {
        let (backend, out) = backend(TerminalCapabilities::builtin("xterm"));
        let err = backend.cursor_position().unwrap_err();
        assert!(err.is_timeout());
        assert!(backend.query().is_idle());
        assert_eq!(out.take(), "\x1b[6n");
    }
}

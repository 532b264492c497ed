//! Console session
//!
//! [`Console`] is the one object the rest of a program talks to. It resolves
//! the terminal description, decides once between the native and the ANSI
//! backend, and then forwards every call to that backend. Text output and
//! the alternate character set go through the shared emitter on both.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::ansi::{AnsiBackend, SizeProbe};
use crate::backend::emitter::{EscapeEmitter, SharedWriter};
use crate::backend::{
    BackendKind, ConsoleBackend, CursorDirection, CursorVisibility, EraseMode, RedirectionState,
};
use crate::core::cpr::{CursorPosition, CursorQuery, QueryTiming, TokenSource, DEFAULT_SCAN_CAPACITY};
use crate::core::error::Result;
use crate::core::input::ConsoleInput;
use crate::core::token::Token;
use crate::term::acs::AltChar;
use crate::term::caps::TerminalCapabilities;
use crate::term::color::ConsoleColor;
use crate::InputToken;

#[cfg(any(unix, windows))]
use crate::config::Config;

/// A console session: capabilities, backend, input stream and text writer.
pub struct Console<T: Token = InputToken> {
    backend: Box<dyn ConsoleBackend>,
    emitter: Arc<EscapeEmitter>,
    input: Arc<ConsoleInput<T>>,
    redirection: RedirectionState,
}

#[cfg(any(unix, windows))]
impl Console<InputToken> {
    /// Open the process's own console.
    pub fn open(config: &Config) -> Result<Self> {
        let redirection = RedirectionState::detect();
        let kind = BackendKind::select(crate::backend::force_ansi_requested(config.force_ansi));
        let emitter = Arc::new(EscapeEmitter::for_process(config.capabilities(), &redirection));
        let input = Arc::new(ConsoleInput::new(platform::input_source(&redirection)?));
        platform::prepare_output(&redirection);

        let backend: Box<dyn ConsoleBackend> = match kind {
            #[cfg(windows)]
            BackendKind::Native => Box::new(crate::backend::windows::NativeBackend::new(
                &redirection,
                Arc::clone(&emitter),
            )),
            _ => Box::new(
                AnsiBackend::new(
                    Arc::clone(&emitter),
                    Arc::clone(&input),
                    CursorQuery::new(
                        config.cursor_query.timing(),
                        config.cursor_query.scan_capacity(),
                    ),
                    redirection.input,
                )
                .with_size_probe(Box::new(platform::window_size)),
            ),
        };

        debug!(
            backend = kind.name(),
            terminal = emitter.capabilities().name(),
            ?redirection,
            "console opened"
        );
        Ok(Self::start(backend, emitter, input, redirection))
    }
}

impl<T: Token> Console<T> {
    /// Builder for a console over an arbitrary writer and token source.
    pub fn builder(caps: TerminalCapabilities) -> ConsoleBuilder<T> {
        ConsoleBuilder::new(caps)
    }

    fn start(
        backend: Box<dyn ConsoleBackend>,
        emitter: Arc<EscapeEmitter>,
        input: Arc<ConsoleInput<T>>,
        redirection: RedirectionState,
    ) -> Self {
        if let Err(e) = emitter.reset_charset() {
            warn!(error = %e, "could not reset the character set");
        }
        Self {
            backend,
            emitter,
            input,
            redirection,
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn capabilities(&self) -> &TerminalCapabilities {
        self.emitter.capabilities()
    }

    pub fn redirection(&self) -> RedirectionState {
        self.redirection
    }

    /// The input stream, with tokens intercepted by cursor queries replayed first.
    pub fn input(&self) -> &ConsoleInput<T> {
        &self.input
    }

    // Colors

    pub fn foreground(&self) -> Result<ConsoleColor> {
        self.backend.foreground()
    }

    pub fn set_foreground(&self, color: ConsoleColor) -> Result<()> {
        self.backend.set_foreground(color)
    }

    pub fn background(&self) -> Result<ConsoleColor> {
        self.backend.background()
    }

    pub fn set_background(&self, color: ConsoleColor) -> Result<()> {
        self.backend.set_background(color)
    }

    pub fn reset_color(&self) -> Result<()> {
        self.backend.reset_color()
    }

    // Cursor

    pub fn set_cursor_visibility(&self, visibility: CursorVisibility) -> Result<()> {
        self.backend.set_cursor_visibility(visibility)
    }

    /// Where the cursor is, relative to the window's top-left corner.
    ///
    /// On the ANSI backend this asks the terminal. Keys typed while the
    /// reply is awaited are kept and returned by later reads.
    pub fn cursor_position(&self) -> Result<CursorPosition> {
        self.backend.cursor_position()
    }

    pub fn set_cursor_position(&self, left: u16, top: u16) -> Result<()> {
        self.backend.set_cursor_position(left, top)
    }

    pub fn cursor_left(&self) -> Result<u16> {
        Ok(self.cursor_position()?.left)
    }

    pub fn set_cursor_left(&self, left: u16) -> Result<()> {
        let top = self.cursor_position()?.top;
        self.set_cursor_position(left, top)
    }

    pub fn cursor_top(&self) -> Result<u16> {
        Ok(self.cursor_position()?.top)
    }

    pub fn set_cursor_top(&self, top: u16) -> Result<()> {
        let left = self.cursor_position()?.left;
        self.set_cursor_position(left, top)
    }

    pub fn cursor_up(&self, count: u16) -> Result<()> {
        self.backend.move_cursor(CursorDirection::Up, count)
    }

    pub fn cursor_down(&self, count: u16) -> Result<()> {
        self.backend.move_cursor(CursorDirection::Down, count)
    }

    pub fn cursor_back(&self, count: u16) -> Result<()> {
        self.backend.move_cursor(CursorDirection::Back, count)
    }

    pub fn cursor_forward(&self, count: u16) -> Result<()> {
        self.backend.move_cursor(CursorDirection::Forward, count)
    }

    // Window

    pub fn window_width(&self) -> Result<u16> {
        Ok(self.backend.window_size()?.0)
    }

    pub fn window_height(&self) -> Result<u16> {
        Ok(self.backend.window_size()?.1)
    }

    pub fn set_title(&self, title: &str) -> Result<()> {
        self.backend.set_title(title)
    }

    pub fn beep(&self) -> Result<()> {
        self.backend.beep()
    }

    /// Clear the whole buffer, scrollback included where the terminal allows.
    pub fn clear(&self) -> Result<()> {
        self.backend.erase(EraseMode::EntireConsoleBuffer)
    }

    pub fn erase(&self, mode: EraseMode) -> Result<()> {
        self.backend.erase(mode)
    }

    // Output

    /// Write an escape sequence as is.
    pub fn output_escape_code(&self, code: &str) -> Result<()> {
        self.emitter.emit_raw(code, "write an escape code")
    }

    pub fn write_str(&self, text: &str) -> Result<()> {
        self.emitter.write_text(text)
    }

    pub fn write_line(&self, text: &str) -> Result<()> {
        self.emitter.write_text(&format!("{text}\n"))
    }

    pub fn write_alt_char(&self, symbol: AltChar) -> Result<()> {
        self.emitter.write_alt_char(symbol)
    }
}

/// Source for a console with no input.
struct NoInput;

impl<T: Token> TokenSource<T> for NoInput {
    fn read(&mut self, _buf: &mut [T]) -> std::io::Result<usize> {
        Ok(0)
    }

    fn read_reply_token(&mut self) -> std::io::Result<Option<T>> {
        Ok(None)
    }
}

/// Assembles an ANSI console from explicit parts.
///
/// Used for simulated terminals and for embedding the console on streams
/// other than the process's own.
pub struct ConsoleBuilder<T: Token> {
    caps: TerminalCapabilities,
    redirection: RedirectionState,
    writer: Option<SharedWriter>,
    source: Option<Box<dyn TokenSource<T>>>,
    size_probe: Option<SizeProbe>,
    timing: QueryTiming,
    scan_capacity: usize,
}

impl<T: Token> ConsoleBuilder<T> {
    pub fn new(caps: TerminalCapabilities) -> Self {
        Self {
            caps,
            redirection: RedirectionState::terminal(),
            writer: None,
            source: None,
            size_probe: None,
            timing: QueryTiming::default(),
            scan_capacity: DEFAULT_SCAN_CAPACITY,
        }
    }

    pub fn redirection(mut self, redirection: RedirectionState) -> Self {
        self.redirection = redirection;
        self
    }

    pub fn writer(mut self, writer: SharedWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn input(mut self, source: Box<dyn TokenSource<T>>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn size_probe(mut self, probe: SizeProbe) -> Self {
        self.size_probe = Some(probe);
        self
    }

    pub fn timing(mut self, timing: QueryTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn scan_capacity(mut self, capacity: usize) -> Self {
        self.scan_capacity = capacity;
        self
    }

    pub fn build(self) -> Console<T> {
        let redirection = self.redirection;
        let writer = self
            .writer
            .unwrap_or_else(|| redirection.text_channel().writer());
        let emitter = Arc::new(EscapeEmitter::new(
            self.caps,
            writer,
            redirection.escapes_available(),
        ));
        let source = self.source.unwrap_or_else(|| Box::new(NoInput));
        let input = Arc::new(ConsoleInput::new(source));

        let mut backend = AnsiBackend::new(
            Arc::clone(&emitter),
            Arc::clone(&input),
            CursorQuery::new(self.timing, self.scan_capacity),
            redirection.input,
        );
        if let Some(probe) = self.size_probe {
            backend = backend.with_size_probe(probe);
        }
        Console::start(Box::new(backend), emitter, input, redirection)
    }
}

#[cfg(unix)]
mod platform {
    use crate::backend::unix::{self, StdinSource};
    use crate::backend::RedirectionState;
    use crate::core::cpr::TokenSource;
    use crate::core::error::Result;

    pub fn input_source(_redirection: &RedirectionState) -> Result<Box<dyn TokenSource<u8>>> {
        Ok(Box::new(StdinSource::new()))
    }

    pub fn prepare_output(_redirection: &RedirectionState) {}

    pub fn window_size() -> Option<(u16, u16)> {
        unix::window_size()
    }
}

#[cfg(windows)]
mod platform {
    use tracing::warn;

    use crate::backend::windows::{self, ConsoleCharSource, RedirectedStdin};
    use crate::backend::RedirectionState;
    use crate::core::cpr::TokenSource;
    use crate::core::error::{ConsoleError, Result};

    pub fn input_source(redirection: &RedirectionState) -> Result<Box<dyn TokenSource<char>>> {
        if redirection.input {
            return Ok(Box::new(RedirectedStdin::new()));
        }
        let source = ConsoleCharSource::new().map_err(ConsoleError::io("open the console input"))?;
        Ok(Box::new(source))
    }

    pub fn prepare_output(redirection: &RedirectionState) {
        if let Err(e) = windows::enable_virtual_terminal(redirection) {
            warn!(error = %e, "virtual terminal processing unavailable");
        }
    }

    pub fn window_size() -> Option<(u16, u16)> {
        windows::window_size()
    }
}

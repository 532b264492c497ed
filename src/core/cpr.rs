//! Cursor position report (CPR) protocol
//!
//! Writing the `u7` request makes the terminal answer `ESC [ row ; col R` on
//! the input stream, possibly after keystrokes the user already typed. The
//! scanner below picks the reply out of that stream one token at a time and
//! hands every other token to the push-back buffer in arrival order.
//!
//! ```text
//!            ESC               '['             ';'
//!  Ground ────────▶ Escape ────────▶ Row ────────────▶ Column
//!    ▲                │               │ digits          │ digits
//!    │   other token: │               │ 'R' ─┐          │ 'R' ─┐
//!    └─ flush ◀───────┴───────────────┴──────┼──────────┘      │
//!                                            ▼                 ▼
//!                                         reply             reply
//! ```
//!
//! A token that breaks a candidate is not part of it: the candidate is
//! flushed and the token is examined again from `Ground`, so an `ESC` in the
//! middle of a broken candidate starts a new one.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, trace};

use super::error::{ConsoleError, ProtocolFault, Result};
use super::pushback::PushbackBuffer;
use super::token::{render_tokens, Token, ESC};

/// Default scratch-buffer bound, in tokens.
pub const DEFAULT_SCAN_CAPACITY: usize = 256;

/// Zero-based cursor coordinates relative to the window's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CursorPosition {
    pub left: u16,
    pub top: u16,
}

impl CursorPosition {
    pub fn new(left: u16, top: u16) -> Self {
        Self { left, top }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Ground,
    Escape,
    Row,
    Column,
}

/// Incremental CPR matcher with a bounded scratch buffer.
#[derive(Debug)]
pub struct CprScanner<T> {
    state: ScanState,
    scratch: Vec<T>,
    capacity: usize,
}

impl<T: Token> CprScanner<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(8);
        Self {
            state: ScanState::Ground,
            scratch: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// True when no candidate is in progress.
    pub fn is_idle(&self) -> bool {
        self.state == ScanState::Ground && self.scratch.is_empty()
    }

    /// Feed one token read from the live stream.
    ///
    /// Tokens that do not belong to a reply go to `rejects` in the order they
    /// were read. Returns `Ok(Some(_))` once a complete reply was matched.
    pub fn feed<E: Extend<T>>(&mut self, token: T, rejects: &mut E) -> Result<Option<CursorPosition>> {
        loop {
            let c = token.to_char();
            match self.state {
                ScanState::Ground => {
                    if c == ESC {
                        self.accept(token, rejects)?;
                        self.state = ScanState::Escape;
                    } else {
                        trace!(token = ?token, "passing through");
                        rejects.extend(Some(token));
                    }
                    return Ok(None);
                }
                ScanState::Escape => {
                    if c == '[' {
                        self.accept(token, rejects)?;
                        self.state = ScanState::Row;
                        return Ok(None);
                    }
                }
                ScanState::Row | ScanState::Column => {
                    if c.is_ascii_digit() {
                        self.accept(token, rejects)?;
                        return Ok(None);
                    }
                    if c == ';' && self.state == ScanState::Row {
                        self.accept(token, rejects)?;
                        self.state = ScanState::Column;
                        return Ok(None);
                    }
                    if c == 'R' {
                        self.accept(token, rejects)?;
                        return self.finish().map(Some);
                    }
                }
            }

            // The token broke the candidate. Give the candidate back and look
            // at the token again from the ground state.
            trace!(candidate = %render_tokens(&self.scratch), "candidate rejected");
            rejects.extend(self.scratch.drain(..));
            self.state = ScanState::Ground;
        }
    }

    /// Give up on the current candidate, returning it to `rejects`.
    ///
    /// Returns the abandoned candidate rendered for diagnostics.
    pub fn abandon<E: Extend<T>>(&mut self, rejects: &mut E) -> String {
        let raw = render_tokens(&self.scratch);
        rejects.extend(self.scratch.drain(..));
        self.state = ScanState::Ground;
        raw
    }

    fn accept<E: Extend<T>>(&mut self, token: T, rejects: &mut E) -> Result<()> {
        if self.scratch.len() < self.capacity {
            self.scratch.push(token);
            return Ok(());
        }
        let mut raw = render_tokens(&self.scratch);
        token.render(&mut raw);
        rejects.extend(self.scratch.drain(..));
        rejects.extend(Some(token));
        self.state = ScanState::Ground;
        Err(ConsoleError::Protocol {
            raw,
            fault: ProtocolFault::ReplyTooLong,
        })
    }

    /// Parse the completed `ESC [ row ; col R` held in the scratch buffer.
    /// The reply is consumed whether or not its fields are in range.
    fn finish(&mut self) -> Result<CursorPosition> {
        let parsed = parse_reply(&self.scratch);
        let raw = render_tokens(&self.scratch);
        self.scratch.clear();
        self.state = ScanState::Ground;
        parsed.map_err(|fault| ConsoleError::Protocol { raw, fault })
    }
}

fn parse_reply<T: Token>(reply: &[T]) -> std::result::Result<CursorPosition, ProtocolFault> {
    // ESC '[' fields 'R'
    let body = &reply[2..reply.len() - 1];
    let (row, column) = match body.iter().position(|t| t.to_char() == ';') {
        Some(split) => (&body[..split], Some(&body[split + 1..])),
        None => (body, None),
    };
    let top = parse_field(row)?;
    let left = match column {
        Some(digits) => parse_field(digits)?,
        None => 0,
    };
    Ok(CursorPosition { left, top })
}

/// One 1-based field, returned 0-based. An empty field means 1.
fn parse_field<T: Token>(digits: &[T]) -> std::result::Result<u16, ProtocolFault> {
    if digits.is_empty() {
        return Ok(0);
    }
    let mut value: u32 = 0;
    for token in digits {
        let digit = token.to_char().to_digit(10).ok_or(ProtocolFault::FieldOutOfRange)?;
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(digit))
            .ok_or(ProtocolFault::FieldOverflow)?;
    }
    if value < 1 {
        return Err(ProtocolFault::FieldOutOfRange);
    }
    u16::try_from(value - 1).map_err(|_| ProtocolFault::FieldOverflow)
}

/// Raw-mode read policy for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTiming {
    /// Minimum characters per read (termios `VMIN`).
    pub min_chars: u8,
    /// Read timeout in deciseconds (termios `VTIME`).
    pub timeout_ds: u8,
}

/// Timeouts for the first and for later cursor queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTiming {
    pub first_timeout_ds: u8,
    pub timeout_ds: u8,
}

impl Default for QueryTiming {
    fn default() -> Self {
        Self {
            first_timeout_ds: 100,
            timeout_ds: 10,
        }
    }
}

/// Live input stream underneath the push-back buffer.
pub trait TokenSource<T: Token>: Send {
    /// Ordinary blocking read. `Ok(0)` means end of input.
    fn read(&mut self, buf: &mut [T]) -> io::Result<usize>;

    /// Read one token while a cursor query is scanning.
    /// `Ok(None)` means the read timed out.
    fn read_reply_token(&mut self) -> io::Result<Option<T>>;

    /// Prepare the stream for a query (raw mode, timeouts).
    fn begin_query(&mut self, _timing: ReadTiming) -> io::Result<()> {
        Ok(())
    }

    /// Undo [`TokenSource::begin_query`].
    fn end_query(&mut self) {}
}

/// Keeps a source in query mode until dropped.
struct QueryScope<'a, T: Token> {
    source: &'a mut dyn TokenSource<T>,
}

impl<'a, T: Token> QueryScope<'a, T> {
    fn begin(source: &'a mut dyn TokenSource<T>, timing: ReadTiming) -> io::Result<Self> {
        source.begin_query(timing)?;
        Ok(Self { source })
    }

    fn read_reply_token(&mut self) -> io::Result<Option<T>> {
        self.source.read_reply_token()
    }
}

impl<T: Token> Drop for QueryScope<'_, T> {
    fn drop(&mut self) {
        self.source.end_query();
    }
}

/// Cursor position query engine.
///
/// Holds the scanner and the process-wide timing history. Concurrent queries
/// on one engine are not supported; the push-back lock serializes them but
/// token ownership between them is undefined.
#[derive(Debug)]
pub struct CursorQuery<T> {
    timing: QueryTiming,
    scanner: Mutex<CprScanner<T>>,
    first_request: AtomicBool,
    ever_replied: AtomicBool,
}

impl<T: Token> CursorQuery<T> {
    pub fn new(timing: QueryTiming, scan_capacity: usize) -> Self {
        Self {
            timing,
            scanner: Mutex::new(CprScanner::new(scan_capacity)),
            first_request: AtomicBool::new(true),
            ever_replied: AtomicBool::new(false),
        }
    }

    /// Read policy for the next query.
    ///
    /// The first query waits long and may return with nothing; once the
    /// terminal has answered at least once, later reads wait for a token.
    pub fn next_timing(&self) -> ReadTiming {
        let first = self.first_request.load(Ordering::Acquire);
        let replied = self.ever_replied.load(Ordering::Acquire);
        ReadTiming {
            min_chars: u8::from(replied),
            timeout_ds: if first {
                self.timing.first_timeout_ds
            } else {
                self.timing.timeout_ds
            },
        }
    }

    pub fn is_idle(&self) -> bool {
        self.scanner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_idle()
    }

    /// Send `request` and scan `source` for the reply.
    ///
    /// Tokens read that are not part of the reply are appended to `pushback`,
    /// whose lock is held for the whole exchange. On every error path the
    /// partial candidate is appended too, so no input is lost.
    pub fn run(
        &self,
        request: &str,
        output: &mut dyn Write,
        source: &mut dyn TokenSource<T>,
        pushback: &PushbackBuffer<T>,
    ) -> Result<CursorPosition> {
        let mut pending = pushback.lock();
        let mut scanner = self.scanner.lock().unwrap_or_else(PoisonError::into_inner);

        let timing = self.next_timing();
        self.first_request.store(false, Ordering::Release);

        let mut scope =
            QueryScope::begin(source, timing).map_err(ConsoleError::io("enter raw mode"))?;

        output
            .write_all(request.as_bytes())
            .and_then(|()| output.flush())
            .map_err(ConsoleError::io("request the cursor position"))?;

        loop {
            let token = match scope.read_reply_token() {
                Ok(Some(token)) => token,
                Ok(None) => {
                    let raw = scanner.abandon(&mut pending);
                    debug!(?timing, raw = %raw, "cursor position query timed out");
                    return Err(ConsoleError::Protocol {
                        raw,
                        fault: ProtocolFault::Timeout,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    scanner.abandon(&mut pending);
                    return Err(ConsoleError::io("read the cursor position")(e));
                }
            };

            if let Some(position) = scanner.feed(token, &mut pending)? {
                self.ever_replied.store(true, Ordering::Release);
                debug!(
                    left = position.left,
                    top = position.top,
                    ?timing,
                    pushed_back = pending.len(),
                    "cursor position received"
                );
                return Ok(position);
            }
        }
    }
}

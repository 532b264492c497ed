//! Ordinary console input
//!
//! Reads are served from the push-back buffer first and fall through to the
//! live stream only when it is empty, so tokens intercepted by a cursor query
//! reach the program as if they had never been touched.

use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::cpr::{CursorPosition, CursorQuery, TokenSource};
use super::error::Result;
use super::pushback::PushbackBuffer;
use super::token::Token;

/// One input stream direction: the live source plus its push-back buffer.
pub struct ConsoleInput<T: Token> {
    pushback: PushbackBuffer<T>,
    live: Mutex<Box<dyn TokenSource<T>>>,
}

impl<T: Token> ConsoleInput<T> {
    pub fn new(source: Box<dyn TokenSource<T>>) -> Self {
        Self {
            pushback: PushbackBuffer::new(),
            live: Mutex::new(source),
        }
    }

    pub fn pushback(&self) -> &PushbackBuffer<T> {
        &self.pushback
    }

    fn live(&self) -> MutexGuard<'_, Box<dyn TokenSource<T>>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read up to `buf.len()` tokens. `Ok(0)` means end of input.
    pub fn read(&self, buf: &mut [T]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let replayed = self.pushback.dequeue(buf);
        if replayed > 0 {
            return Ok(replayed);
        }
        self.live().read(buf)
    }

    /// Read a single token, or `None` at end of input.
    pub fn read_token(&self) -> io::Result<Option<T>> {
        let mut one = [T::default()];
        Ok((self.read(&mut one)? == 1).then_some(one[0]))
    }

    /// Look at the next token without consuming it.
    ///
    /// A token fetched from the live stream is parked in the push-back buffer.
    pub fn peek(&self) -> io::Result<Option<T>> {
        if let Some(token) = self.pushback.peek() {
            return Ok(Some(token));
        }
        let mut live = self.live();
        let mut one = [T::default()];
        if live.read(&mut one)? == 0 {
            return Ok(None);
        }
        self.pushback.enqueue(one[0]);
        Ok(Some(one[0]))
    }

    /// Read one line without its terminator. `None` at end of input.
    pub fn read_line(&self) -> io::Result<Option<String>> {
        let mut line = Vec::new();
        loop {
            match self.read_token()? {
                None if line.is_empty() => return Ok(None),
                None => break,
                Some(token) if token.to_char() == '\n' => break,
                Some(token) => line.push(token),
            }
        }
        if line.last().map(|t| t.to_char()) == Some('\r') {
            line.pop();
        }
        Ok(Some(T::decode(&line)))
    }

    /// Run a cursor position query against this stream.
    pub fn query_cursor(
        &self,
        query: &CursorQuery<T>,
        request: &str,
        output: &mut dyn io::Write,
    ) -> Result<CursorPosition> {
        let mut live = self.live();
        query.run(request, output, &mut **live, &self.pushback)
    }
}

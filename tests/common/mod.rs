//! Simulated terminal shared by the integration tests.
//!
//! Output written by the console is recorded. A `ESC [ 6 n` request makes
//! the terminal queue its reply behind whatever the "user" has typed; a
//! `ESC [ r ; c H` moves its cursor.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tinyconsole::core::cpr::{ReadTiming, TokenSource};
use tinyconsole::{Console, RedirectionState, TerminalCapabilities};

#[derive(Default)]
struct State {
    input: VecDeque<u8>,
    output: Vec<u8>,
    row: u32,
    col: u32,
    /// Replaces the computed reply when set.
    canned_reply: Option<Vec<u8>>,
    silent: bool,
    queries: Vec<ReadTiming>,
    raw_mode: bool,
}

#[derive(Clone)]
pub struct SimTerminal {
    state: Arc<Mutex<State>>,
}

impl SimTerminal {
    /// A terminal with its cursor at the 1-based `row` and `col`.
    pub fn at(row: u32, col: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                row,
                col,
                ..Default::default()
            })),
        }
    }

    /// Answer every request with `reply` instead of the real position.
    pub fn replying(reply: &[u8]) -> Self {
        let term = Self::at(1, 1);
        term.state.lock().unwrap().canned_reply = Some(reply.to_vec());
        term
    }

    /// A terminal that never answers.
    pub fn silent() -> Self {
        let term = Self::at(1, 1);
        term.state.lock().unwrap().silent = true;
        term
    }

    /// Keys the user typed before the request arrives.
    pub fn type_keys(&self, keys: &[u8]) {
        self.state.lock().unwrap().input.extend(keys);
    }

    pub fn take_output(&self) -> String {
        let mut state = self.state.lock().unwrap();
        String::from_utf8(std::mem::take(&mut state.output)).unwrap()
    }

    pub fn cursor(&self) -> (u32, u32) {
        let state = self.state.lock().unwrap();
        (state.row, state.col)
    }

    pub fn query_timings(&self) -> Vec<ReadTiming> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn in_raw_mode(&self) -> bool {
        self.state.lock().unwrap().raw_mode
    }

    pub fn console(&self, term: &str) -> Console<u8> {
        self.console_with(term, RedirectionState::terminal())
    }

    pub fn console_with(&self, term: &str, redirection: RedirectionState) -> Console<u8> {
        let console = Console::<u8>::builder(TerminalCapabilities::builtin(term))
            .redirection(redirection)
            .writer(Box::new(self.clone()))
            .input(Box::new(self.clone()))
            .build();
        self.take_output();
        console
    }
}

fn parse_cup(seq: &[u8]) -> Option<(u32, u32)> {
    let body = seq.strip_prefix(b"\x1b[")?.strip_suffix(b"H")?;
    let text = std::str::from_utf8(body).ok()?;
    let (row, col) = text.split_once(';')?;
    Some((row.parse().ok()?, col.parse().ok()?))
}

impl Write for SimTerminal {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        state.output.extend_from_slice(buf);
        if buf == b"\x1b[6n" && !state.silent {
            let reply = match &state.canned_reply {
                Some(reply) => reply.clone(),
                None => format!("\x1b[{};{}R", state.row, state.col).into_bytes(),
            };
            state.input.extend(reply);
        } else if let Some((row, col)) = parse_cup(buf) {
            state.row = row;
            state.col = col;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl TokenSource<u8> for SimTerminal {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        let n = buf.len().min(state.input.len());
        for (slot, b) in buf.iter_mut().zip(state.input.drain(..n)) {
            *slot = b;
        }
        Ok(n)
    }

    fn read_reply_token(&mut self) -> io::Result<Option<u8>> {
        Ok(self.state.lock().unwrap().input.pop_front())
    }

    fn begin_query(&mut self, timing: ReadTiming) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(timing);
        state.raw_mode = true;
        Ok(())
    }

    fn end_query(&mut self) {
        self.state.lock().unwrap().raw_mode = false;
    }
}

/// Everything left on the console's input, pushed-back tokens first.
pub fn drain_input(console: &Console<u8>) -> Vec<u8> {
    let mut all = Vec::new();
    let mut buf = [0u8; 64];
    loop {
        let n = console.input().read(&mut buf).unwrap();
        if n == 0 {
            return all;
        }
        all.extend_from_slice(&buf[..n]);
    }
}

//! Unix terminal input
//!
//! Cursor queries put stdin in a non-canonical, non-echoing mode with the
//! `VMIN`/`VTIME` policy chosen by the query engine, then read single bytes
//! until the reply arrives or a read comes back empty.

use std::io;
use std::os::fd::{AsFd, AsRawFd};

use nix::errno::Errno;
use nix::sys::termios::{self, LocalFlags, SetArg, SpecialCharacterIndices, Termios};
use nix::unistd;
use tracing::{debug, warn};

use crate::core::cpr::{ReadTiming, TokenSource};

/// Restores the saved termios of stdin on drop.
///
/// Settings are applied with `TCSANOW`: flushing would throw away keys the
/// user typed before the query.
pub struct RawModeGuard {
    original: Termios,
}

impl RawModeGuard {
    pub fn enter(timing: ReadTiming) -> io::Result<Self> {
        let stdin = io::stdin();
        let original = termios::tcgetattr(stdin.as_fd())?;

        let mut raw = original.clone();
        raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = timing.min_chars;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = timing.timeout_ds;
        termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &raw)?;

        debug!(
            min_chars = timing.min_chars,
            timeout_ds = timing.timeout_ds,
            "stdin switched to raw mode"
        );
        Ok(Self { original })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = termios::tcsetattr(io::stdin().as_fd(), SetArg::TCSANOW, &self.original) {
            warn!(error = %e, "failed to restore terminal mode");
        } else {
            debug!("stdin mode restored");
        }
    }
}

/// Byte source on file descriptor 0.
#[derive(Default)]
pub struct StdinSource {
    raw_mode: Option<RawModeGuard>,
}

impl StdinSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read_stdin(buf: &mut [u8]) -> io::Result<usize> {
    let fd = io::stdin().as_raw_fd();
    loop {
        match unistd::read(fd, buf) {
            Err(Errno::EINTR) => continue,
            result => return result.map_err(io::Error::from),
        }
    }
}

impl TokenSource<u8> for StdinSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        read_stdin(buf)
    }

    /// In raw mode a zero-length read means `VTIME` expired.
    fn read_reply_token(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        Ok((read_stdin(&mut byte)? == 1).then_some(byte[0]))
    }

    fn begin_query(&mut self, timing: ReadTiming) -> io::Result<()> {
        self.raw_mode = Some(RawModeGuard::enter(timing)?);
        Ok(())
    }

    fn end_query(&mut self) {
        self.raw_mode = None;
    }
}

/// Window size from the kernel, if stdout or stdin is a terminal.
pub fn window_size() -> Option<(u16, u16)> {
    crossterm::terminal::size().ok()
}

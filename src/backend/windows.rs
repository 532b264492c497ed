//! Windows console
//!
//! The native backend drives the console through its own API: attribute
//! words for colors, explicit coordinates for the cursor, character and
//! attribute fills for erasing. No escape sequences are involved except
//! `E3`, which modern hosts need to drop their scrollback.
//!
//! Input comes from the console as UTF-16. Cursor queries on the ANSI
//! backend read key events one at a time with `ReadConsoleInputW`, which
//! has no timeout: a terminal that never answers blocks the caller.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::Arc;

use tracing::{debug, warn};
use windows::core::PCWSTR;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::System::Console::{
    FillConsoleOutputAttribute, FillConsoleOutputCharacterW, GetConsoleCursorInfo,
    GetConsoleMode, GetConsoleScreenBufferInfo, GetStdHandle, ReadConsoleInputW, ReadConsoleW,
    SetConsoleCursorInfo, SetConsoleCursorPosition, SetConsoleMode, SetConsoleTextAttribute,
    SetConsoleTitleW, CONSOLE_CHARACTER_ATTRIBUTES, CONSOLE_CURSOR_INFO, CONSOLE_MODE,
    CONSOLE_SCREEN_BUFFER_INFO, COORD, ENABLE_VIRTUAL_TERMINAL_PROCESSING, INPUT_RECORD,
    KEY_EVENT, STD_ERROR_HANDLE, STD_HANDLE, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE,
};

use super::emitter::EscapeEmitter;
use super::{
    BackendKind, ConsoleBackend, CursorDirection, CursorVisibility, EraseMode, RedirectionState,
};
use crate::core::cpr::{CursorPosition, TokenSource};
use crate::core::error::{ConsoleError, Result};
use crate::core::token::Utf8Decoder;
use crate::term::caps::Capability;
use crate::term::color::{native_attributes, ConsoleAttributes, ConsoleColor};

/// A standard console handle.
#[derive(Clone, Copy)]
struct ConsoleHandle(HANDLE);

// Safety: console handles are process-wide and the console API serializes
// calls on them.
unsafe impl Send for ConsoleHandle {}
unsafe impl Sync for ConsoleHandle {}

impl ConsoleHandle {
    fn standard(which: STD_HANDLE) -> io::Result<Self> {
        let handle = unsafe { GetStdHandle(which) }.map_err(to_io)?;
        if handle.is_invalid() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no console handle"));
        }
        Ok(Self(handle))
    }
}

fn to_io(e: windows::core::Error) -> io::Error {
    io::Error::from_raw_os_error(e.code().0)
}

fn api(operation: &'static str) -> impl FnOnce(windows::core::Error) -> ConsoleError {
    move |e| ConsoleError::io(operation)(to_io(e))
}

/// Turn on escape-sequence interpretation for the console output handle.
pub fn enable_virtual_terminal(redirection: &RedirectionState) -> io::Result<()> {
    let which = match output_handle_kind(redirection) {
        Some(which) => which,
        None => return Ok(()),
    };
    let handle = ConsoleHandle::standard(which)?;
    let mut mode = CONSOLE_MODE::default();
    unsafe { GetConsoleMode(handle.0, &mut mode) }.map_err(to_io)?;
    if !mode.contains(ENABLE_VIRTUAL_TERMINAL_PROCESSING) {
        unsafe { SetConsoleMode(handle.0, mode | ENABLE_VIRTUAL_TERMINAL_PROCESSING) }
            .map_err(to_io)?;
        debug!("virtual terminal processing enabled");
    }
    Ok(())
}

fn output_handle_kind(redirection: &RedirectionState) -> Option<STD_HANDLE> {
    if !redirection.output {
        Some(STD_OUTPUT_HANDLE)
    } else if !redirection.error {
        Some(STD_ERROR_HANDLE)
    } else {
        None
    }
}

/// Native console API backend.
pub struct NativeBackend {
    output: Option<ConsoleHandle>,
    emitter: Arc<EscapeEmitter>,
    initial: ConsoleAttributes,
}

impl NativeBackend {
    pub fn new(redirection: &RedirectionState, emitter: Arc<EscapeEmitter>) -> Self {
        let output = output_handle_kind(redirection).and_then(|which| {
            ConsoleHandle::standard(which)
                .map_err(|e| warn!(error = %e, "console output handle unavailable"))
                .ok()
        });
        let mut backend = Self {
            output,
            emitter,
            initial: native_attributes(ConsoleColor::Gray, ConsoleColor::Black),
        };
        if let Ok(info) = backend.screen_info("read the console attributes") {
            backend.initial = ConsoleAttributes::from_bits_retain(info.wAttributes.0);
        }
        backend
    }

    fn handle(&self, operation: &'static str) -> Result<HANDLE> {
        self.output
            .map(|h| h.0)
            .ok_or(ConsoleError::OutputUnavailable { operation })
    }

    fn screen_info(&self, operation: &'static str) -> Result<CONSOLE_SCREEN_BUFFER_INFO> {
        let handle = self.handle(operation)?;
        let mut info = CONSOLE_SCREEN_BUFFER_INFO::default();
        unsafe { GetConsoleScreenBufferInfo(handle, &mut info) }.map_err(api(operation))?;
        Ok(info)
    }

    fn attributes(&self, operation: &'static str) -> Result<ConsoleAttributes> {
        let info = self.screen_info(operation)?;
        Ok(ConsoleAttributes::from_bits_retain(info.wAttributes.0))
    }

    fn set_attributes(&self, attrs: ConsoleAttributes, operation: &'static str) -> Result<()> {
        let handle = self.handle(operation)?;
        unsafe { SetConsoleTextAttribute(handle, CONSOLE_CHARACTER_ATTRIBUTES(attrs.bits())) }
            .map_err(api(operation))
    }

    fn move_to(&self, x: i16, y: i16, operation: &'static str) -> Result<()> {
        let handle = self.handle(operation)?;
        unsafe { SetConsoleCursorPosition(handle, COORD { X: x, Y: y }) }.map_err(api(operation))
    }

    /// Blank `length` cells from `(x, y)` with the current attributes.
    fn fill(&self, x: i16, y: i16, length: i32, attrs: u16, operation: &'static str) -> Result<()> {
        if length <= 0 {
            return Ok(());
        }
        let handle = self.handle(operation)?;
        let at = COORD { X: x, Y: y };
        let mut written = 0u32;
        unsafe {
            FillConsoleOutputCharacterW(handle, u16::from(b' '), length as u32, at, &mut written)
                .map_err(api(operation))?;
            FillConsoleOutputAttribute(handle, attrs, length as u32, at, &mut written)
                .map_err(api(operation))?;
        }
        Ok(())
    }
}

impl ConsoleBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn foreground(&self) -> Result<ConsoleColor> {
        Ok(self.attributes("get the foreground color")?.foreground())
    }

    fn background(&self) -> Result<ConsoleColor> {
        Ok(self.attributes("get the background color")?.background())
    }

    fn set_foreground(&self, color: ConsoleColor) -> Result<()> {
        const OPERATION: &str = "set the foreground color";
        let attrs = self.attributes(OPERATION)?.with_foreground(color);
        self.set_attributes(attrs, OPERATION)
    }

    fn set_background(&self, color: ConsoleColor) -> Result<()> {
        const OPERATION: &str = "set the background color";
        let attrs = self.attributes(OPERATION)?.with_background(color);
        self.set_attributes(attrs, OPERATION)
    }

    fn reset_color(&self) -> Result<()> {
        const OPERATION: &str = "reset the colors";
        let attrs = self
            .attributes(OPERATION)?
            .with_foreground(self.initial.foreground())
            .with_background(self.initial.background());
        self.set_attributes(attrs, OPERATION)
    }

    fn set_cursor_visibility(&self, visibility: CursorVisibility) -> Result<()> {
        const OPERATION: &str = "change the cursor visibility";
        let handle = self.handle(OPERATION)?;
        let mut info = CONSOLE_CURSOR_INFO::default();
        unsafe { GetConsoleCursorInfo(handle, &mut info) }.map_err(api(OPERATION))?;
        let (visible, size) = cursor_shape(visibility);
        info.bVisible = visible.into();
        info.dwSize = size;
        unsafe { SetConsoleCursorInfo(handle, &info) }.map_err(api(OPERATION))
    }

    fn cursor_position(&self) -> Result<CursorPosition> {
        let info = self.screen_info("get the cursor position")?;
        let left = info.dwCursorPosition.X - info.srWindow.Left;
        let top = info.dwCursorPosition.Y - info.srWindow.Top;
        Ok(CursorPosition::new(left.max(0) as u16, top.max(0) as u16))
    }

    fn set_cursor_position(&self, left: u16, top: u16) -> Result<()> {
        const OPERATION: &str = "set the cursor position";
        let info = self.screen_info(OPERATION)?;
        let window = info.srWindow;
        let width = i32::from(window.Right) - i32::from(window.Left) + 1;
        let height = i32::from(window.Bottom) - i32::from(window.Top) + 1;
        if i32::from(left) >= width {
            return Err(ConsoleError::InvalidArgument {
                name: "left",
                value: i64::from(left),
            });
        }
        if i32::from(top) >= height {
            return Err(ConsoleError::InvalidArgument {
                name: "top",
                value: i64::from(top),
            });
        }
        self.move_to(
            window.Left + left as i16,
            window.Top + top as i16,
            OPERATION,
        )
    }

    fn move_cursor(&self, direction: CursorDirection, count: u16) -> Result<()> {
        const OPERATION: &str = "move the cursor";
        if count == 0 {
            return Ok(());
        }
        let info = self.screen_info(OPERATION)?;
        let window = info.srWindow;
        let COORD { X: x, Y: y } = info.dwCursorPosition;
        let step = count.min(i16::MAX as u16) as i16;
        let (x, y) = match direction {
            CursorDirection::Up => (x, y.saturating_sub(step).max(window.Top)),
            CursorDirection::Down => (x, y.saturating_add(step).min(window.Bottom)),
            CursorDirection::Back => (x.saturating_sub(step).max(window.Left), y),
            CursorDirection::Forward => (x.saturating_add(step).min(window.Right), y),
        };
        self.move_to(x, y, OPERATION)
    }

    fn window_size(&self) -> Result<(u16, u16)> {
        let window = self.screen_info("get the window size")?.srWindow;
        let width = (window.Right - window.Left + 1).max(0) as u16;
        let height = (window.Bottom - window.Top + 1).max(0) as u16;
        Ok((width, height))
    }

    fn set_title(&self, title: &str) -> Result<()> {
        let wide: Vec<u16> = title.encode_utf16().chain(Some(0)).collect();
        unsafe { SetConsoleTitleW(PCWSTR(wide.as_ptr())) }.map_err(api("set the window title"))
    }

    fn beep(&self) -> Result<()> {
        self.handle("beep")?;
        self.emitter.write_text("\x07")
    }

    fn erase(&self, mode: EraseMode) -> Result<()> {
        const OPERATION: &str = "erase the console";
        let info = self.screen_info(OPERATION)?;
        let window = info.srWindow;
        let cursor = info.dwCursorPosition;
        let attrs = info.wAttributes.0;
        let width = i32::from(window.Right) - i32::from(window.Left) + 1;

        match mode {
            EraseMode::FromCursorToEndOfScreen => {
                self.fill(
                    cursor.X,
                    cursor.Y,
                    i32::from(window.Right) - i32::from(cursor.X) + 1,
                    attrs,
                    OPERATION,
                )?;
                for row in cursor.Y + 1..=window.Bottom {
                    self.fill(window.Left, row, width, attrs, OPERATION)?;
                }
            }
            EraseMode::FromBeginningOfScreenToCursor => {
                for row in window.Top..cursor.Y {
                    self.fill(window.Left, row, width, attrs, OPERATION)?;
                }
                self.fill(
                    window.Left,
                    cursor.Y,
                    i32::from(cursor.X) - i32::from(window.Left) + 1,
                    attrs,
                    OPERATION,
                )?;
            }
            EraseMode::EntireScreen => {
                self.move_to(window.Left, window.Top, OPERATION)?;
                for row in window.Top..=window.Bottom {
                    self.fill(window.Left, row, width, attrs, OPERATION)?;
                }
            }
            EraseMode::EntireConsoleBuffer => {
                self.move_to(0, 0, OPERATION)?;
                let cells = i32::from(info.dwSize.X) * i32::from(info.dwSize.Y);
                self.fill(0, 0, cells, attrs, OPERATION)?;
                // Hosts such as Windows Terminal keep their scrollback otherwise.
                if let Ok(e3) = self.emitter.render(Capability::ClearScrollback, &[]) {
                    if let Err(e) = self.emitter.emit_raw(&e3, OPERATION) {
                        warn!(error = %e, "could not clear the scrollback");
                    }
                }
            }
            EraseMode::FromCursorToEndOfLine => {
                self.fill(
                    cursor.X,
                    cursor.Y,
                    i32::from(window.Right) - i32::from(cursor.X) + 1,
                    attrs,
                    OPERATION,
                )?;
            }
            EraseMode::FromBeginningOfLineToCursor => {
                self.fill(
                    window.Left,
                    cursor.Y,
                    i32::from(cursor.X) - i32::from(window.Left) + 1,
                    attrs,
                    OPERATION,
                )?;
            }
            EraseMode::EntireLine => {
                self.fill(window.Left, cursor.Y, width, attrs, OPERATION)?;
            }
        }
        Ok(())
    }
}

/// Console input as characters.
///
/// Ordinary reads use `ReadConsoleW` (line editing and echo stay with the
/// console); cursor queries read raw key events so the reply is never echoed.
pub struct ConsoleCharSource {
    handle: ConsoleHandle,
    decoded: VecDeque<char>,
    high_surrogate: Option<u16>,
}

impl ConsoleCharSource {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            handle: ConsoleHandle::standard(STD_INPUT_HANDLE)?,
            decoded: VecDeque::new(),
            high_surrogate: None,
        })
    }

    fn push_unit(&mut self, unit: u16) {
        if (0xd800..0xdc00).contains(&unit) {
            self.high_surrogate = Some(unit);
            return;
        }
        let units: Vec<u16> = self.high_surrogate.take().into_iter().chain(Some(unit)).collect();
        self.decoded.extend(
            char::decode_utf16(units).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)),
        );
    }
}

impl TokenSource<char> for ConsoleCharSource {
    fn read(&mut self, buf: &mut [char]) -> io::Result<usize> {
        if self.decoded.is_empty() {
            let mut units = [0u16; 256];
            let mut read = 0u32;
            unsafe {
                ReadConsoleW(
                    self.handle.0,
                    units.as_mut_ptr().cast(),
                    units.len() as u32,
                    &mut read,
                    None,
                )
            }
            .map_err(to_io)?;
            for &unit in &units[..read as usize] {
                self.push_unit(unit);
            }
        }
        let n = buf.len().min(self.decoded.len());
        for (slot, c) in buf.iter_mut().zip(self.decoded.drain(..n)) {
            *slot = c;
        }
        Ok(n)
    }

    /// Blocks until a key event carrying a character arrives.
    fn read_reply_token(&mut self) -> io::Result<Option<char>> {
        loop {
            if let Some(c) = self.decoded.pop_front() {
                return Ok(Some(c));
            }
            let mut record = [INPUT_RECORD::default()];
            let mut read = 0u32;
            unsafe { ReadConsoleInputW(self.handle.0, &mut record, &mut read) }.map_err(to_io)?;
            if read == 0 || u32::from(record[0].EventType) != KEY_EVENT {
                continue;
            }
            let key = unsafe { record[0].Event.KeyEvent };
            let unit = unsafe { key.uChar.UnicodeChar };
            if key.bKeyDown.as_bool() && unit != 0 {
                self.push_unit(unit);
            }
        }
    }
}

/// Visibility flag and cell fill percentage for a cursor visibility.
fn cursor_shape(visibility: CursorVisibility) -> (bool, u32) {
    match visibility {
        CursorVisibility::Invisible => (false, 1),
        CursorVisibility::Normal => (true, 25),
        CursorVisibility::HighVisibility => (true, 100),
    }
}

/// Redirected stdin, decoded as UTF-8.
#[derive(Default)]
pub struct RedirectedStdin {
    decoder: Utf8Decoder,
    decoded: VecDeque<char>,
}

impl RedirectedStdin {
    pub fn new() -> Self {
        Self::default()
    }

    fn fill(&mut self) -> io::Result<bool> {
        let mut chunk = [0u8; 1024];
        let n = io::stdin().read(&mut chunk)?;
        if n == 0 {
            self.decoder.finish(&mut self.decoded);
            return Ok(!self.decoded.is_empty());
        }
        self.decoder.push(&chunk[..n], &mut self.decoded);
        Ok(true)
    }
}

impl TokenSource<char> for RedirectedStdin {
    fn read(&mut self, buf: &mut [char]) -> io::Result<usize> {
        while self.decoded.is_empty() {
            if !self.fill()? {
                return Ok(0);
            }
        }
        let n = buf.len().min(self.decoded.len());
        for (slot, c) in buf.iter_mut().zip(self.decoded.drain(..n)) {
            *slot = c;
        }
        Ok(n)
    }

    fn read_reply_token(&mut self) -> io::Result<Option<char>> {
        let mut one = ['\0'];
        Ok((self.read(&mut one)? == 1).then_some(one[0]))
    }
}

/// Window size of the console the process is attached to.
pub fn window_size() -> Option<(u16, u16)> {
    crossterm::terminal::size().ok()
}

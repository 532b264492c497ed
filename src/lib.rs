//! tinyconsole - console control with cursor position queries
//!
//! Colors, cursor movement, erasing, titles and line-drawing characters on
//! any terminal, through either the Windows console API or escape codes
//! resolved from a terminal capability table.
//!
//! The hard part is [`Console::cursor_position`] on an escape-code terminal:
//! the request is written to the terminal and the reply comes back on the
//! same stream as the user's keystrokes. The reply is picked out token by
//! token and everything else is kept, in order, for the next ordinary read.
//!
//! # Example
//!
//! ```no_run
//! use tinyconsole::{Config, Console, ConsoleColor};
//!
//! let console = Console::open(&Config::load())?;
//! console.set_foreground(ConsoleColor::Green)?;
//! console.write_line("ready")?;
//! console.reset_color()?;
//!
//! let position = console.cursor_position()?;
//! console.set_cursor_position(0, position.top)?;
//! # Ok::<(), tinyconsole::ConsoleError>(())
//! ```
//!
//! # Module Hierarchy
//!
//! ```text
//! src/
//! ├── console.rs  - Console session (backend chosen once)
//! ├── config.rs   - ~/.tinyconsole/config.toml
//! ├── core/       - CPR scanner, push-back buffer, input, errors
//! ├── term/       - capabilities, templates, colors, line drawing
//! └── backend/    - native and ANSI implementations
//! ```

pub mod backend;
pub mod config;
pub mod console;
pub mod core;
pub mod term;

pub use crate::backend::{BackendKind, CursorVisibility, EraseMode, RedirectionState};
pub use crate::config::Config;
pub use crate::console::{Console, ConsoleBuilder};
pub use crate::core::cpr::CursorPosition;
pub use crate::core::error::{ConsoleError, ErrorKind, ProtocolFault, Result};
pub use crate::term::acs::AltChar;
pub use crate::term::caps::{Capability, TerminalCapabilities};
pub use crate::term::color::ConsoleColor;

/// Unit of console input: bytes on Unix, UTF-16 decoded characters on Windows.
#[cfg(not(windows))]
pub type InputToken = u8;
#[cfg(windows)]
pub type InputToken = char;

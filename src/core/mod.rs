//! Protocol core: everything needed to read a cursor position report out of
//! an input stream that also carries the user's keystrokes.
//!
//! - **error**: `ConsoleError` and the `ErrorKind` taxonomy
//! - **token**: bytes (Unix) or characters (Windows) as scanned units
//! - **pushback**: FIFO of tokens read ahead of ordinary consumers
//! - **cpr**: reply scanner and the query engine built on it
//! - **input**: ordinary reads that replay pushed-back tokens first
//!
//! # Data Flow
//!
//! ```text
//! live stream ──► CprScanner ──► CursorPosition
//!                     │
//!                     └─(foreign tokens)─► PushbackBuffer ──► ConsoleInput::read
//! ```

pub mod cpr;
pub mod error;
pub mod input;
pub mod pushback;
pub mod token;

pub use cpr::{CursorPosition, CursorQuery, QueryTiming, TokenSource};
pub use error::{ConsoleError, ErrorKind, ProtocolFault};
pub use input::ConsoleInput;
pub use pushback::PushbackBuffer;
pub use token::Token;

//! Terminal description.
//!
//! - **caps**: built-in capability tables keyed by `TERM`
//! - **tparm**: the terminfo parameter language
//! - **color**: the 16 console colors as ANSI indexes and attribute words
//! - **acs**: alternate character set lookup

pub mod acs;
pub mod caps;
pub mod color;
pub mod tparm;

pub use acs::{AcsMap, AltChar};
pub use caps::{Capability, TerminalCapabilities};
pub use color::{ConsoleAttributes, ConsoleColor};

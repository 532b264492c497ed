//! Console error taxonomy
//!
//! Every facade operation fails with a [`ConsoleError`]. Callers branch on
//! [`ConsoleError::kind`], never on message text.

use std::fmt;
use std::io;
use thiserror::Error;

use crate::term::tparm::TemplateError;

/// Closed set of failure kinds exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The channel the operation needs is redirected away from the terminal.
    Unavailable,
    /// The terminal type has no usable template for the operation.
    UnsupportedCapability,
    /// A cursor position reply was malformed, out of range or never arrived.
    Protocol,
    /// An argument was outside the range the console accepts.
    InvalidArgument,
    /// The underlying stream or console API failed.
    Io,
}

/// Why a cursor position reply was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolFault {
    /// A row or column field was less than 1.
    FieldOutOfRange,
    /// A row or column field did not fit in an integer.
    FieldOverflow,
    /// The candidate reply grew past the scratch buffer bound.
    ReplyTooLong,
    /// Nothing arrived within the read timeout.
    Timeout,
}

impl fmt::Display for ProtocolFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ProtocolFault::FieldOutOfRange => "row or column value is less than 1",
            ProtocolFault::FieldOverflow => "row or column value too large",
            ProtocolFault::ReplyTooLong => "reply exceeds the scan buffer",
            ProtocolFault::Timeout => "terminal did not reply in time",
        };
        f.write_str(text)
    }
}

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("cannot {operation}: standard output and standard error are both redirected")]
    OutputUnavailable { operation: &'static str },

    #[error("cannot {operation}: standard input is redirected")]
    InputUnavailable { operation: &'static str },

    #[error("terminal `{terminal}` does not define the `{capability}` capability")]
    UnsupportedCapability {
        terminal: String,
        capability: &'static str,
    },

    #[error("invalid cursor position report from the terminal ({fault}): \"{raw}\"")]
    Protocol { raw: String, fault: ProtocolFault },

    #[error("capability `{capability}` could not be expanded: {source}")]
    Template {
        capability: &'static str,
        #[source]
        source: TemplateError,
    },

    #[error("invalid value for `{name}`: {value}")]
    InvalidArgument { name: &'static str, value: i64 },

    #[error("console I/O failed while trying to {operation}: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConsoleError>;

impl ConsoleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsoleError::OutputUnavailable { .. } | ConsoleError::InputUnavailable { .. } => {
                ErrorKind::Unavailable
            }
            ConsoleError::UnsupportedCapability { .. } | ConsoleError::Template { .. } => {
                ErrorKind::UnsupportedCapability
            }
            ConsoleError::Protocol { .. } => ErrorKind::Protocol,
            ConsoleError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            ConsoleError::Io { .. } => ErrorKind::Io,
        }
    }

    /// The protocol sub-case, if this is a protocol error.
    pub fn protocol_fault(&self) -> Option<ProtocolFault> {
        match self {
            ConsoleError::Protocol { fault, .. } => Some(*fault),
            _ => None,
        }
    }

    /// True for a silent terminal, as opposed to a malformed reply.
    pub fn is_timeout(&self) -> bool {
        self.protocol_fault() == Some(ProtocolFault::Timeout)
    }

    pub(crate) fn io(operation: &'static str) -> impl FnOnce(io::Error) -> ConsoleError {
        move |source| ConsoleError::Io { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err = ConsoleError::OutputUnavailable { operation: "beep" };
        assert_eq!(err.kind(), ErrorKind::Unavailable);

        let err = ConsoleError::Protocol {
            raw: "\\u001b[".to_string(),
            fault: ProtocolFault::Timeout,
        };
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.is_timeout());

        let err = ConsoleError::Protocol {
            raw: "\\u001b[0R".to_string(),
            fault: ProtocolFault::FieldOutOfRange,
        };
        assert!(!err.is_timeout());
        assert_eq!(err.protocol_fault(), Some(ProtocolFault::FieldOutOfRange));
    }

    #[test]
    fn test_message_carries_raw_reply() {
        let err = ConsoleError::Protocol {
            raw: "\\u001b[0;5R".to_string(),
            fault: ProtocolFault::FieldOutOfRange,
        };
        let text = err.to_string();
        assert!(text.contains("\\u001b[0;5R"));
        assert!(text.contains("less than 1"));
    }
}
